// ListenBrainz scrobbler implementation
// API Documentation: https://listenbrainz.readthedocs.io/

use super::traits::{Scrobbler, ScrobblerError, Song};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;

pub const DEFAULT_API_URL: &str = "https://api.listenbrainz.org";
const SETTINGS_URL: &str = "https://listenbrainz.org/settings/";
const STATUS_URL: &str = "https://listenbrainz.org/";

#[derive(Debug, Deserialize)]
struct TokenValidation {
    valid: bool,
    #[serde(default)]
    user_name: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

pub struct ListenBrainzScrobbler {
    label: String,
    token: String,
    api_url: String,
    status_url: Url,
    client: Client,
}

impl ListenBrainzScrobbler {
    pub fn new(name: &str, token: String, api_url: String) -> Result<Self> {
        Url::parse(&api_url)
            .with_context(|| format!("Invalid ListenBrainz api_url (instance: {})", name))?;

        Ok(Self {
            label: format!("ListenBrainz ({})", name),
            token,
            api_url: api_url.trim_end_matches('/').to_string(),
            status_url: Url::parse(STATUS_URL).context("Invalid ListenBrainz status URL")?,
            client: Client::new(),
        })
    }

    async fn post(&self, endpoint: &str, payload: &Value) -> Result<(), ScrobblerError> {
        let url = format!("{}{}", self.api_url, endpoint);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Token {}", self.token))
            .json(payload)
            .send()
            .await
            .context("Failed to send request to ListenBrainz")?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, body))
    }

    /// Submit a listen to ListenBrainz
    async fn submit_listen(&self, listen_type: &str, song: &Song) -> Result<(), ScrobblerError> {
        self.post("/1/submit-listens", &listen_payload(listen_type, song))
            .await
    }
}

fn status_error(status: StatusCode, body: String) -> ScrobblerError {
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|value| value["error"].as_str().map(str::to_string))
        .unwrap_or(body);

    if status == StatusCode::UNAUTHORIZED {
        ScrobblerError::Auth(message)
    } else {
        ScrobblerError::Service {
            code: Some(u32::from(status.as_u16())),
            message,
        }
    }
}

fn listen_payload(listen_type: &str, song: &Song) -> Value {
    let mut track_metadata = json!({
        "artist_name": song.artist,
        "track_name": song.title,
    });

    if let Some(ref album) = song.album {
        track_metadata["release_name"] = json!(album);
    }

    let mut additional_info = serde_json::Map::new();
    if let Some(duration) = song.duration {
        additional_info.insert("duration".to_string(), json!(duration));
    }
    if let Some(ref mbid) = song.recording_mbid {
        additional_info.insert("recording_mbid".to_string(), json!(mbid));
    }
    if !additional_info.is_empty() {
        track_metadata["additional_info"] = Value::Object(additional_info);
    }

    if listen_type == "playing_now" {
        json!({
            "listen_type": listen_type,
            "payload": [{
                "track_metadata": track_metadata,
            }]
        })
    } else {
        // "single" type requires timestamp
        json!({
            "listen_type": listen_type,
            "payload": [{
                "listened_at": song.timestamp(),
                "track_metadata": track_metadata,
            }]
        })
    }
}

#[async_trait]
impl Scrobbler for ListenBrainzScrobbler {
    fn label(&self) -> &str {
        &self.label
    }

    async fn fetch_session(&self) -> Result<()> {
        if self.token.is_empty() {
            anyhow::bail!("No ListenBrainz token configured");
        }

        let url = format!("{}/1/validate-token", self.api_url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Token {}", self.token))
            .send()
            .await
            .context("Failed to validate ListenBrainz token")?;

        if response.status() == StatusCode::UNAUTHORIZED {
            anyhow::bail!("ListenBrainz rejected the token");
        }

        let validation: TokenValidation = response
            .error_for_status()
            .context("ListenBrainz token validation failed")?
            .json()
            .await
            .context("Failed to decode ListenBrainz token validation")?;

        if !validation.valid {
            anyhow::bail!(
                "ListenBrainz token is not valid: {}",
                validation.message.unwrap_or_default()
            );
        }

        log::info!(
            "{}: Signed in as {}",
            self.label,
            validation.user_name.as_deref().unwrap_or("unknown user")
        );
        Ok(())
    }

    async fn fetch_auth_url(&self) -> Result<Url> {
        // User tokens are issued on the settings page, there is no OAuth handshake
        Url::parse(SETTINGS_URL).context("Failed to build ListenBrainz settings URL")
    }

    fn status_url(&self) -> Url {
        self.status_url.clone()
    }

    async fn now_playing(&self, song: &Song) -> Result<(), ScrobblerError> {
        log::debug!(
            "Sending now playing to {}: {} - {}",
            self.label,
            song.artist,
            song.title
        );

        self.submit_listen("playing_now", song).await?;

        log::info!("{}: Now playing updated", self.label);
        Ok(())
    }

    async fn scrobble(&self, song: &Song) -> Result<(), ScrobblerError> {
        log::debug!(
            "Scrobbling to {}: {} - {}",
            self.label,
            song.artist,
            song.title
        );

        self.submit_listen("single", song).await?;

        log::info!("{}: Scrobbled successfully", self.label);
        Ok(())
    }

    async fn set_love_status(&self, song: &Song, loved: bool) -> Result<(), ScrobblerError> {
        let mbid = song.recording_mbid.as_deref().ok_or_else(|| {
            ScrobblerError::Unsupported("ListenBrainz feedback needs a recording MBID".to_string())
        })?;

        let score = if loved { 1 } else { 0 };
        let payload = json!({
            "recording_mbid": mbid,
            "score": score,
        });
        self.post("/1/feedback/recording-feedback", &payload).await?;

        log::info!(
            "{}: {} {} - {}",
            self.label,
            if loved { "Loved" } else { "Unloved" },
            song.artist,
            song.title
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_label_includes_instance_name() {
        let api_url = format!("{}/", DEFAULT_API_URL);
        let scrobbler = ListenBrainzScrobbler::new("Primary", "token".to_string(), api_url).unwrap();
        assert_eq!(scrobbler.label(), "ListenBrainz (Primary)");
        assert_eq!(scrobbler.api_url, DEFAULT_API_URL);
        assert_eq!(scrobbler.status_url().as_str(), STATUS_URL);
    }

    #[test]
    fn test_rejects_malformed_api_url() {
        let api_url = "not a url".to_string();
        assert!(ListenBrainzScrobbler::new("Primary", "token".to_string(), api_url).is_err());
    }

    #[test]
    fn test_playing_now_payload_has_no_timestamp() {
        let song = Song::new("Broadcast", "Tears in the Typing Pool").with_album("Haha Sound");
        let payload = listen_payload("playing_now", &song);

        assert_eq!(payload["listen_type"], "playing_now");
        assert!(payload["payload"][0].get("listened_at").is_none());
        assert_eq!(payload["payload"][0]["track_metadata"]["release_name"], "Haha Sound");
        assert!(payload["payload"][0]["track_metadata"].get("additional_info").is_none());
    }

    #[test]
    fn test_single_payload_uses_start_time() {
        let mut song = Song::new("Broadcast", "Tears in the Typing Pool");
        song.started_at = Some(Utc.with_ymd_and_hms(2024, 5, 4, 20, 15, 0).unwrap());
        song.duration = Some(175);
        song.recording_mbid = Some("a1b2".to_string());

        let payload = listen_payload("single", &song);
        let listen = &payload["payload"][0];

        assert_eq!(listen["listened_at"], 1714853700);
        assert_eq!(listen["track_metadata"]["additional_info"]["duration"], 175);
        assert_eq!(listen["track_metadata"]["additional_info"]["recording_mbid"], "a1b2");
    }

    #[test]
    fn test_status_error_mapping() {
        let err = status_error(
            StatusCode::UNAUTHORIZED,
            r#"{"code": 401, "error": "Invalid authorization token."}"#.to_string(),
        );
        assert!(err.is_auth_error());
        assert_eq!(err.to_string(), "authentication rejected: Invalid authorization token.");

        let err = status_error(StatusCode::SERVICE_UNAVAILABLE, "maintenance".to_string());
        assert!(matches!(err, ScrobblerError::Service { code: Some(503), .. }));
    }

    #[tokio::test]
    async fn test_love_without_mbid_is_unsupported() {
        let scrobbler =
            ListenBrainzScrobbler::new("Primary", "token".to_string(), DEFAULT_API_URL.to_string())
                .unwrap();
        let song = Song::new("Broadcast", "Pendulum");

        let err = scrobbler.set_love_status(&song, true).await.unwrap_err();
        assert!(matches!(err, ScrobblerError::Unsupported(_)));
    }

    #[tokio::test]
    async fn test_fetch_session_without_token_fails() {
        let scrobbler =
            ListenBrainzScrobbler::new("Primary", String::new(), DEFAULT_API_URL.to_string()).unwrap();
        assert!(scrobbler.fetch_session().await.is_err());
    }
}
