// Last.fm scrobbler implementation

use super::lastfm_auth::LastFmApi;
use super::traits::{Scrobbler, ScrobblerError, Song};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use url::Url;

pub const LABEL: &str = "Last.fm";
const STATUS_URL: &str = "https://www.last.fm/settings/applications";

pub struct LastFmScrobbler {
    api: Arc<LastFmApi>,
    session_key: Mutex<Option<String>>,
    pending_token: Mutex<Option<String>>,
    status_url: Url,
}

impl LastFmScrobbler {
    /// `session_key` may be empty when the user has not signed in yet
    pub fn new(api_key: String, api_secret: String, session_key: String) -> Result<Self> {
        Ok(Self {
            api: Arc::new(LastFmApi::new(api_key, api_secret)),
            session_key: Mutex::new(Some(session_key).filter(|key| !key.is_empty())),
            pending_token: Mutex::new(None),
            status_url: Url::parse(STATUS_URL).context("Invalid Last.fm status URL")?,
        })
    }

    /// Session key acquired through the web auth flow, for the caller to persist
    pub fn session_key(&self) -> Option<String> {
        lock(&self.session_key).clone()
    }

    /// Run a blocking API call off the async runtime
    async fn run<T, F>(&self, call: F) -> Result<T, ScrobblerError>
    where
        F: FnOnce(&LastFmApi) -> Result<T, ScrobblerError> + Send + 'static,
        T: Send + 'static,
    {
        let api = Arc::clone(&self.api);
        tokio::task::spawn_blocking(move || call(&api))
            .await
            .context("Last.fm request task failed")?
    }

    /// Call a write method on behalf of the signed in user
    async fn submit(
        &self,
        method: &'static str,
        mut params: Vec<(&'static str, String)>,
    ) -> Result<(), ScrobblerError> {
        let session_key = self
            .session_key()
            .ok_or_else(|| ScrobblerError::Auth("not signed in to Last.fm".to_string()))?;
        params.push(("sk", session_key));

        self.run(move |api| api.call(method, params, true)).await?;
        Ok(())
    }
}

fn track_params(song: &Song) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("artist", song.artist.clone()),
        ("track", song.title.clone()),
    ];
    if let Some(ref album) = song.album {
        params.push(("album", album.clone()));
    }
    if let Some(duration) = song.duration {
        params.push(("duration", duration.to_string()));
    }
    if let Some(ref mbid) = song.recording_mbid {
        params.push(("mbid", mbid.clone()));
    }
    params
}

fn lock(mutex: &Mutex<Option<String>>) -> MutexGuard<'_, Option<String>> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl Scrobbler for LastFmScrobbler {
    fn label(&self) -> &str {
        LABEL
    }

    async fn fetch_session(&self) -> Result<()> {
        if self.session_key().is_some() {
            return Ok(());
        }

        let token = lock(&self.pending_token)
            .clone()
            .context("Not signed in to Last.fm")?;

        let session_key = self
            .run(move |api| api.get_session(&token).map_err(ScrobblerError::from))
            .await
            .context("Failed to get Last.fm session")?;

        log::info!("Last.fm: Session acquired");
        *lock(&self.session_key) = Some(session_key);
        *lock(&self.pending_token) = None;
        Ok(())
    }

    async fn fetch_auth_url(&self) -> Result<Url> {
        let token = self
            .run(|api| api.get_token().map_err(ScrobblerError::from))
            .await
            .context("Failed to get Last.fm auth token")?;

        let url = self.api.auth_url(&token)?;
        *lock(&self.pending_token) = Some(token);
        Ok(url)
    }

    fn status_url(&self) -> Url {
        self.status_url.clone()
    }

    async fn now_playing(&self, song: &Song) -> Result<(), ScrobblerError> {
        log::debug!("Sending now playing to Last.fm: {} - {}", song.artist, song.title);
        self.submit("track.updateNowPlaying", track_params(song)).await?;
        log::info!("Last.fm: Now playing updated");
        Ok(())
    }

    async fn scrobble(&self, song: &Song) -> Result<(), ScrobblerError> {
        log::debug!("Scrobbling to Last.fm: {} - {}", song.artist, song.title);
        let mut params = track_params(song);
        params.push(("timestamp", song.timestamp().to_string()));
        self.submit("track.scrobble", params).await?;
        log::info!("Last.fm: Scrobbled successfully");
        Ok(())
    }

    async fn set_love_status(&self, song: &Song, loved: bool) -> Result<(), ScrobblerError> {
        let method = if loved { "track.love" } else { "track.unlove" };
        let params = vec![
            ("artist", song.artist.clone()),
            ("track", song.title.clone()),
        ];
        self.submit(method, params).await?;

        log::info!(
            "Last.fm: {} {} - {}",
            if loved { "Loved" } else { "Unloved" },
            song.artist,
            song.title
        );
        Ok(())
    }
}
