// Common traits for scrobbling services

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use url::Url;

/// Song information handed to every scrobbler unchanged
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Song {
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub duration: Option<u64>, // Duration in seconds
    pub recording_mbid: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
}

impl Song {
    pub fn new(artist: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            artist: artist.into(),
            album: None,
            duration: None,
            recording_mbid: None,
            started_at: None,
        }
    }

    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album = Some(album.into());
        self
    }

    /// Playback start, or now if the song carries none
    pub fn timestamp(&self) -> i64 {
        self.started_at.unwrap_or_else(Utc::now).timestamp()
    }
}

/// Failure of a single submission to a scrobbler
#[derive(Debug, thiserror::Error)]
pub enum ScrobblerError {
    /// Credentials were rejected; the scrobbler needs to sign in again
    #[error("authentication rejected: {0}")]
    Auth(String),

    #[error("service error{}: {message}", code_suffix(.code))]
    Service { code: Option<u32>, message: String },

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

fn code_suffix(code: &Option<u32>) -> String {
    code.map(|c| format!(" {}", c)).unwrap_or_default()
}

impl ScrobblerError {
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}

/// Common trait for all scrobbling services
#[async_trait]
pub trait Scrobbler: Send + Sync {
    /// Stable, unique name of this scrobbler
    fn label(&self) -> &str;

    /// Succeeds once the scrobbler holds a usable session
    async fn fetch_session(&self) -> Result<()>;

    /// Produce the URL where the user authorizes this scrobbler
    async fn fetch_auth_url(&self) -> Result<Url>;

    /// Page shown to the user when signing in fails
    fn status_url(&self) -> Url;

    /// Update "now playing" status
    async fn now_playing(&self, song: &Song) -> Result<(), ScrobblerError>;

    /// Submit a scrobble
    async fn scrobble(&self, song: &Song) -> Result<(), ScrobblerError>;

    /// Love or unlove a song
    async fn set_love_status(&self, song: &Song, loved: bool) -> Result<(), ScrobblerError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_only_auth_variant_is_auth_error() {
        assert!(ScrobblerError::Auth("invalid session key".to_string()).is_auth_error());
        assert!(!ScrobblerError::Service {
            code: Some(11),
            message: "service offline".to_string()
        }
        .is_auth_error());
        assert!(!ScrobblerError::Unsupported("love".to_string()).is_auth_error());
        assert!(!ScrobblerError::Transport(anyhow::anyhow!("timeout")).is_auth_error());
    }

    #[test]
    fn test_service_error_display_includes_code() {
        let err = ScrobblerError::Service {
            code: Some(29),
            message: "rate limit exceeded".to_string(),
        };
        assert_eq!(err.to_string(), "service error 29: rate limit exceeded");

        let err = ScrobblerError::Service {
            code: None,
            message: "bad gateway".to_string(),
        };
        assert_eq!(err.to_string(), "service error: bad gateway");
    }

    #[test]
    fn test_timestamp_prefers_started_at() {
        let started = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let mut song = Song::new("Boards of Canada", "Roygbiv");
        song.started_at = Some(started);
        assert_eq!(song.timestamp(), started.timestamp());

        song.started_at = None;
        assert!(song.timestamp() >= started.timestamp());
    }
}
