//! Typed adapter over the ScreenScraper catalog API.
//!
//! The engine consumes only the [`CatalogApi`] trait and the classification
//! predicates on its replies; everything HTTP-specific (status codes, the
//! French error prose the service returns with HTTP 200, credential query
//! parameters) stays inside this module.

use async_trait::async_trait;
use serde::Deserialize;
use tokio::time::Duration;

use crate::credentials::Credentials;
use crate::error::ScrapeError;
use crate::types::Game;

const BASE_URL: &str = "https://api.screenscraper.fr/api2";

/// Hard timeout for API requests (covers connect + headers + body read).
const API_TIMEOUT: Duration = Duration::from_secs(30);

/// Hard timeout for media downloads.
const MEDIA_TIMEOUT: Duration = Duration::from_secs(120);

/// Literal bodies meaning "no media to return". The service answers these
/// with HTTP 200; they must be treated like a structural not-found.
pub const NO_DATA_BODIES: [&str; 4] = ["NOMEDIA", "CRCOK", "MD5OK", "SHA1OK"];

/// Parameters for a game lookup.
#[derive(Debug, Clone, Default)]
pub struct GameInfoQuery {
    pub system_id: String,
    pub crc32: Option<String>,
    pub md5: Option<String>,
    pub sha1: Option<String>,
    pub file_size: u64,
    pub filename: Option<String>,
    pub serial: Option<String>,
}

/// Parameters for a media download.
#[derive(Debug, Clone)]
pub struct MediaQuery {
    pub system_id: String,
    pub game_id: String,
    /// Media identifier: `type(region)`, or the bare type when the
    /// descriptor carries no region.
    pub media: String,
}

impl MediaQuery {
    pub fn new(system_id: &str, game_id: &str, media_type: &str, region: &str) -> Self {
        let media = if region.is_empty() {
            media_type.to_string()
        } else {
            format!("{media_type}({region})")
        };
        Self {
            system_id: system_id.to_string(),
            game_id: game_id.to_string(),
            media,
        }
    }
}

/// Upstream response classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyStatus {
    Success,
    NotFound,
    RateLimited,
    /// Any other upstream failure; details are in the reply body.
    Failed,
}

/// A classified game lookup reply.
#[derive(Debug, Clone)]
pub struct GameReply {
    pub status: ReplyStatus,
    pub body: String,
}

impl GameReply {
    pub fn is_rate_limited(&self) -> bool {
        self.status == ReplyStatus::RateLimited
    }

    pub fn is_not_found(&self) -> bool {
        self.status == ReplyStatus::NotFound
    }

    pub fn is_success(&self) -> bool {
        self.status == ReplyStatus::Success
    }

    /// Parse the game record out of a successful reply body.
    pub fn parse_game(&self) -> Result<Game, ScrapeError> {
        let parsed: GameInfoResponse = serde_json::from_str(&self.body).map_err(|e| {
            ScrapeError::Api(format!(
                "Failed to parse game info: {e}. Response: {}",
                truncate(&self.body, 200)
            ))
        })?;
        Ok(parsed.response.game)
    }
}

/// A classified media download reply.
#[derive(Debug, Clone)]
pub struct MediaReply {
    pub status: ReplyStatus,
    pub body: Vec<u8>,
}

impl MediaReply {
    pub fn is_rate_limited(&self) -> bool {
        self.status == ReplyStatus::RateLimited
    }

    pub fn is_not_found(&self) -> bool {
        self.status == ReplyStatus::NotFound
    }

    pub fn is_success(&self) -> bool {
        self.status == ReplyStatus::Success
    }

    /// Whether a successful body is one of the literal no-data strings.
    pub fn is_no_data(&self) -> bool {
        std::str::from_utf8(&self.body)
            .map(|s| NO_DATA_BODIES.contains(&s.trim()))
            .unwrap_or(false)
    }
}

/// The two catalog operations the engine depends on.
#[async_trait]
pub trait CatalogApi: Send + Sync {
    async fn get_game_info(&self, query: &GameInfoQuery) -> Result<GameReply, ScrapeError>;
    async fn download_media(&self, query: &MediaQuery) -> Result<MediaReply, ScrapeError>;
}

// -- Wire model wrappers --

#[derive(Debug, Deserialize)]
struct GameInfoResponse {
    response: GameInfoData,
}

#[derive(Debug, Deserialize)]
struct GameInfoData {
    #[serde(rename = "jeu")]
    game: Game,
}

#[derive(Debug, Deserialize)]
struct UserInfoResponse {
    response: UserInfoData,
}

#[derive(Debug, Deserialize)]
struct UserInfoData {
    ssuser: UserInfo,
}

/// Account information from ssuserInfos.php. All numeric fields arrive as
/// strings on the wire.
#[derive(Debug, Deserialize, Clone)]
pub struct UserInfo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub maxthreads: Option<String>,
    #[serde(default)]
    pub maxrequestspermin: Option<String>,
    #[serde(default)]
    pub requeststoday: Option<String>,
    #[serde(default)]
    pub maxrequestsperday: Option<String>,
}

impl UserInfo {
    pub fn max_threads(&self) -> usize {
        self.maxthreads
            .as_ref()
            .and_then(|s| s.parse().ok())
            .unwrap_or(1)
    }

    pub fn max_requests_per_min(&self) -> usize {
        self.maxrequestspermin
            .as_ref()
            .and_then(|s| s.parse().ok())
            .unwrap_or(60)
    }

    pub fn requests_today(&self) -> u32 {
        self.requeststoday
            .as_ref()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0)
    }

    pub fn max_requests_per_day(&self) -> u32 {
        self.maxrequestsperday
            .as_ref()
            .and_then(|s| s.parse().ok())
            .unwrap_or(20000)
    }
}

/// HTTP client for the ScreenScraper API.
///
/// Rate limiting and concurrency control live in the engine's
/// [`RateLimiter`](crate::limiter::RateLimiter); this client only shapes
/// requests and classifies responses.
pub struct ScreenScraperClient {
    http: reqwest::Client,
    creds: Credentials,
}

impl ScreenScraperClient {
    pub fn new(creds: Credentials) -> Result<Self, ScrapeError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(API_TIMEOUT)
            .read_timeout(API_TIMEOUT)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(10))
            .tcp_keepalive(Duration::from_secs(30))
            .tcp_nodelay(true)
            .build()?;
        Ok(Self { http, creds })
    }

    /// Fetch account info and quota from ssuserInfos.php.
    ///
    /// Callers use this to clamp their thread and per-minute settings to
    /// the account's allowance before starting a run.
    pub async fn user_info(&self) -> Result<UserInfo, ScrapeError> {
        let params = self.base_params();
        let resp = self
            .http
            .get(format!("{BASE_URL}/ssuserInfos.php"))
            .query(&params)
            .send()
            .await
            .map_err(|e| ScrapeError::Api(redact_credentials(&e.to_string())))?;
        let status = resp.status();
        let text = resp.text().await.map_err(|e| ScrapeError::ServerError {
            status: status.as_u16(),
            message: redact_credentials(&e.to_string()),
        })?;

        if let Some(e) = classify_auth_failure(status, &text) {
            return Err(e);
        }

        let info: UserInfoResponse = serde_json::from_str(&text).map_err(|e| {
            ScrapeError::Api(format!(
                "Failed to parse user info: {e}. Response: {}",
                truncate(&text, 200)
            ))
        })?;
        Ok(info.response.ssuser)
    }

    fn base_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("devid", self.creds.dev_id.clone()),
            ("devpassword", self.creds.dev_password.clone()),
            ("softname", self.creds.soft_name.clone()),
            ("output", "json".to_string()),
        ];
        if let Some(ref id) = self.creds.user_id {
            params.push(("ssid", id.clone()));
        }
        if let Some(ref pw) = self.creds.user_password {
            params.push(("sspassword", pw.clone()));
        }
        params
    }
}

#[async_trait]
impl CatalogApi for ScreenScraperClient {
    async fn get_game_info(&self, query: &GameInfoQuery) -> Result<GameReply, ScrapeError> {
        let mut params = self.base_params();
        params.push(("systemeid", query.system_id.clone()));
        params.push(("romtype", "rom".to_string()));
        params.push(("romtaille", query.file_size.to_string()));
        if let Some(ref crc) = query.crc32 {
            params.push(("crc", crc.to_uppercase()));
        }
        if let Some(ref md5) = query.md5 {
            params.push(("md5", md5.clone()));
        }
        if let Some(ref sha1) = query.sha1 {
            params.push(("sha1", sha1.clone()));
        }
        if let Some(ref name) = query.filename {
            params.push(("romnom", name.clone()));
        }
        if let Some(ref serial) = query.serial {
            params.push(("serialnum", serial.clone()));
        }

        let result = tokio::time::timeout(API_TIMEOUT, async {
            let resp = self
                .http
                .get(format!("{BASE_URL}/jeuInfos.php"))
                .query(&params)
                .send()
                .await
                .map_err(|e| ScrapeError::Api(redact_credentials(&e.to_string())))?;

            let status = resp.status();
            let text = resp.text().await.map_err(|e| ScrapeError::ServerError {
                status: status.as_u16(),
                message: redact_credentials(&e.to_string()),
            })?;
            Ok::<_, ScrapeError>((status, text))
        })
        .await
        .map_err(|_| {
            ScrapeError::Api(format!(
                "API request timed out after {}s",
                API_TIMEOUT.as_secs()
            ))
        })?;

        let (status, text) = result?;
        Ok(classify_game_reply(status, text))
    }

    async fn download_media(&self, query: &MediaQuery) -> Result<MediaReply, ScrapeError> {
        let mut params = self.base_params();
        params.push(("systemeid", query.system_id.clone()));
        params.push(("jeuid", query.game_id.clone()));
        params.push(("media", query.media.clone()));

        let result = tokio::time::timeout(MEDIA_TIMEOUT, async {
            let resp = self
                .http
                .get(format!("{BASE_URL}/mediaJeu.php"))
                .query(&params)
                .send()
                .await
                .map_err(|e| ScrapeError::Api(redact_credentials(&e.to_string())))?;

            let status = resp.status();
            let body = resp
                .bytes()
                .await
                .map_err(|e| ScrapeError::ServerError {
                    status: status.as_u16(),
                    message: redact_credentials(&e.to_string()),
                })?
                .to_vec();
            Ok::<_, ScrapeError>((status, body))
        })
        .await
        .map_err(|_| {
            ScrapeError::Api(format!(
                "Media download timed out after {}s",
                MEDIA_TIMEOUT.as_secs()
            ))
        })?;

        let (status, body) = result?;
        let reply_status = if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            ReplyStatus::RateLimited
        } else if status == reqwest::StatusCode::NOT_FOUND {
            ReplyStatus::NotFound
        } else if status.is_success() {
            ReplyStatus::Success
        } else {
            ReplyStatus::Failed
        };
        Ok(MediaReply {
            status: reply_status,
            body,
        })
    }
}

/// Classify a game lookup response.
///
/// The service returns HTTP 200 for most conditions and signals errors with
/// French prose in the body, so the text checks matter as much as the
/// status code. Ordering matters: fatal conditions contain "Erreur" too.
fn classify_game_reply(status: reqwest::StatusCode, text: String) -> GameReply {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return GameReply {
            status: ReplyStatus::RateLimited,
            body: text,
        };
    }
    if status == reqwest::StatusCode::NOT_FOUND {
        return GameReply {
            status: ReplyStatus::NotFound,
            body: text,
        };
    }
    if !status.is_success() {
        return GameReply {
            status: ReplyStatus::Failed,
            body: text,
        };
    }

    // Quota and closed-API conditions mean "stop hammering the service":
    // classified as rate-limited so the engine backs off.
    if text.contains("Le quota de scrape journalier")
        || text.contains("API fermé")
        || text.contains("API closed")
    {
        return GameReply {
            status: ReplyStatus::RateLimited,
            body: text,
        };
    }

    // "non trouvé(e)" marks games that genuinely don't exist in the catalog.
    if text.contains("non trouvé") {
        return GameReply {
            status: ReplyStatus::NotFound,
            body: text,
        };
    }

    // Other "Erreur" prose (login failures, server hiccups) is a failure,
    // not a not-found, so entries don't get permanently marked missing.
    if text.is_empty() || text.contains("Erreur") || looks_like_html_error(&text) {
        return GameReply {
            status: ReplyStatus::Failed,
            body: text,
        };
    }

    GameReply {
        status: ReplyStatus::Success,
        body: text,
    }
}

fn classify_auth_failure(status: reqwest::StatusCode, text: &str) -> Option<ScrapeError> {
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Some(ScrapeError::InvalidCredentials(
            "Credentials rejected".to_string(),
        ));
    }
    if text.contains("Erreur de login") || text.contains("Identifiants") {
        return Some(ScrapeError::InvalidCredentials(
            "Invalid developer or user credentials".to_string(),
        ));
    }
    None
}

/// CDN/proxy servers sometimes return 200 with an HTML error page instead
/// of a proper HTTP error status.
fn looks_like_html_error(text: &str) -> bool {
    let trimmed = text.trim_start();
    trimmed.starts_with("<!DOCTYPE") || trimmed.starts_with("<html") || trimmed.starts_with("<HTML")
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Redact credential query parameters from error messages that may contain
/// URLs. Replaces values for `devpassword`, `sspassword`, `devid`, `ssid`.
fn redact_credentials(msg: &str) -> String {
    let mut result = msg.to_string();
    for param in &["devpassword", "sspassword", "devid", "ssid"] {
        let prefix = format!("{param}=");
        let mut search_from = 0;
        while let Some(found) = result[search_from..].find(&prefix) {
            let value_start = search_from + found + prefix.len();
            let value_end = result[value_start..]
                .find(|c: char| c == '&' || c.is_whitespace() || c == '"' || c == '\'')
                .map(|i| value_start + i)
                .unwrap_or(result.len());
            result.replace_range(value_start..value_end, "[REDACTED]");
            search_from = value_start + "[REDACTED]".len();
        }
    }
    result
}

#[cfg(test)]
#[path = "tests/client_tests.rs"]
mod tests;
