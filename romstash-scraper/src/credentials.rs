use std::path::PathBuf;

use crate::error::ScrapeError;

/// Credentials for authenticating with the catalog service.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub dev_id: String,
    pub dev_password: String,
    pub soft_name: String,
    pub user_id: Option<String>,
    pub user_password: Option<String>,
}

/// TOML config file format.
#[derive(Debug, serde::Deserialize, serde::Serialize)]
struct ConfigFile {
    screenscraper: Option<ScreenScraperSection>,
}

#[derive(Debug, serde::Deserialize, serde::Serialize)]
struct ScreenScraperSection {
    dev_id: Option<String>,
    dev_password: Option<String>,
    soft_name: Option<String>,
    user_id: Option<String>,
    user_password: Option<String>,
}

impl Credentials {
    /// Load credentials from environment variables or the config file.
    ///
    /// Priority: env vars > config file.
    /// Required: dev_id, dev_password. Optional: user_id, user_password;
    /// soft_name defaults to "romstash".
    pub fn load() -> Result<Self, ScrapeError> {
        let config = load_config_file();

        let dev_id = std::env::var("SCREENSCRAPER_DEVID")
            .ok()
            .or_else(|| config.as_ref().and_then(|c| c.dev_id.clone()))
            .ok_or_else(|| {
                ScrapeError::Config(
                    "Missing dev_id. Set SCREENSCRAPER_DEVID env var or add to config file"
                        .to_string(),
                )
            })?;

        let dev_password = std::env::var("SCREENSCRAPER_DEVPASSWORD")
            .ok()
            .or_else(|| config.as_ref().and_then(|c| c.dev_password.clone()))
            .ok_or_else(|| {
                ScrapeError::Config(
                    "Missing dev_password. Set SCREENSCRAPER_DEVPASSWORD env var or add to config file"
                        .to_string(),
                )
            })?;

        let soft_name = std::env::var("SCREENSCRAPER_SOFTNAME")
            .ok()
            .or_else(|| config.as_ref().and_then(|c| c.soft_name.clone()))
            .unwrap_or_else(|| "romstash".to_string());

        let user_id = std::env::var("SCREENSCRAPER_SSID")
            .ok()
            .or_else(|| config.as_ref().and_then(|c| c.user_id.clone()));

        let user_password = std::env::var("SCREENSCRAPER_SSPASSWORD")
            .ok()
            .or_else(|| config.as_ref().and_then(|c| c.user_password.clone()));

        Ok(Self {
            dev_id,
            dev_password,
            soft_name,
            user_id,
            user_password,
        })
    }

    /// Apply explicit values (e.g. from CLI args) over loaded ones.
    pub fn with_overrides(
        mut self,
        dev_id: Option<String>,
        dev_password: Option<String>,
        user_id: Option<String>,
        user_password: Option<String>,
    ) -> Self {
        if let Some(id) = dev_id {
            self.dev_id = id;
        }
        if let Some(pw) = dev_password {
            self.dev_password = pw;
        }
        if let Some(id) = user_id {
            self.user_id = Some(id);
        }
        if let Some(pw) = user_password {
            self.user_password = Some(pw);
        }
        self
    }
}

/// Path to the credentials config file.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("romstash").join("credentials.toml"))
}

/// Save credentials to the config file, creating parent directories.
/// Returns the path the file was written to.
pub fn save_to_file(creds: &Credentials) -> Result<PathBuf, ScrapeError> {
    let path = config_path()
        .ok_or_else(|| ScrapeError::Config("Could not determine config directory".to_string()))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let config = ConfigFile {
        screenscraper: Some(ScreenScraperSection {
            dev_id: Some(creds.dev_id.clone()),
            dev_password: Some(creds.dev_password.clone()),
            soft_name: if creds.soft_name == "romstash" {
                None
            } else {
                Some(creds.soft_name.clone())
            },
            user_id: creds.user_id.clone(),
            user_password: creds.user_password.clone(),
        }),
    };

    let toml_str = toml::to_string_pretty(&config)
        .map_err(|e| ScrapeError::Config(format!("Failed to serialize config: {e}")))?;

    std::fs::write(&path, toml_str)?;
    Ok(path)
}

fn load_config_file() -> Option<ScreenScraperSection> {
    let path = config_path()?;
    let content = std::fs::read_to_string(&path).ok()?;
    let config: ConfigFile = toml::from_str(&content).ok()?;
    config.screenscraper
}
