// Scrobble manager
// Routes now playing, scrobble and love events to every bound scrobbler

use crate::diagnostics::{Diagnostic, DiagnosticSink, LogSink};
use crate::scrobbler::{Scrobbler, ScrobblerError, Song};
use crate::ui::{Notifier, TabOpener};
use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

type ScrobblerMap = BTreeMap<String, Arc<dyn Scrobbler>>;

/// Event sent to every bound scrobbler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    NowPlaying,
    Scrobble,
    /// `true` loves the song, `false` unloves it
    Love(bool),
}

/// Outcome of one action for one scrobbler
#[derive(Debug)]
pub struct DispatchResult {
    pub label: String,
    pub outcome: Result<(), ScrobblerError>,
}

impl DispatchResult {
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Keeps track of known (registered) and usable (bound) scrobblers.
///
/// Both sets are keyed by [`Scrobbler::label`]: two handles sharing a label
/// are the same entry. Registered scrobblers are never removed; bound ones
/// leave the bound set on [`unbind`](Self::unbind) or when a broadcast sees
/// their credentials rejected.
pub struct ScrobbleManager {
    registered: RwLock<ScrobblerMap>,
    bound: RwLock<ScrobblerMap>,
    notifier: Arc<dyn Notifier>,
    tab_opener: Arc<dyn TabOpener>,
    diagnostics: Arc<dyn DiagnosticSink>,
}

impl ScrobbleManager {
    /// Create a manager with empty sets, reporting diagnostics to the log
    pub fn new(notifier: Arc<dyn Notifier>, tab_opener: Arc<dyn TabOpener>) -> Self {
        Self {
            registered: RwLock::new(BTreeMap::new()),
            bound: RwLock::new(BTreeMap::new()),
            notifier,
            tab_opener,
            diagnostics: Arc::new(LogSink),
        }
    }

    /// Replace the diagnostic sink
    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn DiagnosticSink>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Register every scrobbler and bind those that already hold a session.
    ///
    /// Session fetches run concurrently; a failing one leaves its scrobbler
    /// unbound without affecting the others. Returns the bound set once all
    /// attempts have settled.
    pub async fn register_and_bind_all(
        &self,
        scrobblers: Vec<Arc<dyn Scrobbler>>,
    ) -> Vec<Arc<dyn Scrobbler>> {
        let attempts = scrobblers.into_iter().map(|scrobbler| async move {
            self.register(Arc::clone(&scrobbler));

            let session = scrobbler.fetch_session().await;
            match session {
                Ok(()) => self.bind(scrobbler),
                Err(err) => self.diagnostics.record(Diagnostic::SessionUnavailable {
                    label: scrobbler.label().to_string(),
                    reason: format!("{:#}", err),
                }),
            }
        });
        join_all(attempts).await;

        self.list_bound()
    }

    fn register(&self, scrobbler: Arc<dyn Scrobbler>) {
        let mut registered = write(&self.registered);
        if registered.contains_key(scrobbler.label()) {
            self.diagnostics.record(Diagnostic::AlreadyRegistered {
                label: scrobbler.label().to_string(),
            });
            return;
        }

        log::debug!("Registered {}", scrobbler.label());
        registered.insert(scrobbler.label().to_string(), scrobbler);
    }

    /// Mark a scrobbler as eligible for broadcasts. No-op if already bound.
    pub fn bind(&self, scrobbler: Arc<dyn Scrobbler>) {
        let mut bound = write(&self.bound);
        if !bound.contains_key(scrobbler.label()) {
            log::info!("Bound {}", scrobbler.label());
            bound.insert(scrobbler.label().to_string(), scrobbler);
        }
    }

    /// Remove a scrobbler from the bound set.
    ///
    /// Unbinding a scrobbler that is not bound is reported as a diagnostic,
    /// never as an error to the caller.
    pub fn unbind(&self, scrobbler: &dyn Scrobbler) {
        self.unbind_label(scrobbler.label());
    }

    fn unbind_label(&self, label: &str) {
        if !self.remove_bound(label) {
            self.diagnostics.record(Diagnostic::NotBound {
                label: label.to_string(),
            });
        }
    }

    fn remove_bound(&self, label: &str) -> bool {
        let removed = write(&self.bound).remove(label).is_some();
        if removed {
            log::info!("Unbound {}", label);
        }
        removed
    }

    /// Start the sign-in flow for a scrobbler.
    ///
    /// The scrobbler is bound as soon as an auth URL is available, before the
    /// user completes the flow. Interactive mode hands the URL to the
    /// notifier, otherwise it is opened in a new browser tab.
    pub async fn authenticate(&self, scrobbler: Arc<dyn Scrobbler>, interactive: bool) {
        let label = scrobbler.label().to_string();

        let auth_url = match scrobbler.fetch_auth_url().await {
            Ok(url) => url,
            Err(err) => {
                self.diagnostics.record(Diagnostic::AuthUrlUnavailable {
                    label: label.clone(),
                    reason: format!("{:#}", err),
                });
                self.notifier.show_sign_in_error(&label, &scrobbler.status_url());
                return;
            }
        };

        self.bind(scrobbler);

        if interactive {
            self.notifier.show_authenticate(&label, &auth_url);
        } else if let Err(err) = self.tab_opener.open_tab(&auth_url) {
            self.diagnostics.record(Diagnostic::TabOpenFailed {
                label,
                reason: format!("{:#}", err),
            });
        }
    }

    /// Send `action` to every scrobbler bound at call time, concurrently.
    ///
    /// Every scrobbler gets exactly one result entry. A scrobbler whose
    /// credentials are rejected is unbound; other failures leave it bound.
    pub async fn broadcast(&self, action: Action, song: &Song) -> Vec<DispatchResult> {
        let targets = self.list_bound();

        let submissions = targets.into_iter().map(|scrobbler| async move {
            let outcome = match action {
                Action::NowPlaying => scrobbler.now_playing(song).await,
                Action::Scrobble => scrobbler.scrobble(song).await,
                Action::Love(loved) => scrobbler.set_love_status(song, loved).await,
            };

            let label = scrobbler.label().to_string();
            if let Err(err) = &outcome {
                if err.is_auth_error() {
                    self.diagnostics.record(Diagnostic::CredentialsRevoked {
                        label: label.clone(),
                        reason: err.to_string(),
                    });
                    // An overlapping broadcast may have unbound it already
                    if !self.remove_bound(&label) {
                        log::debug!("{} was already unbound", label);
                    }
                } else {
                    self.diagnostics.record(Diagnostic::SubmissionFailed {
                        label: label.clone(),
                        reason: err.to_string(),
                    });
                }
            }

            DispatchResult { label, outcome }
        });

        join_all(submissions).await
    }

    pub async fn send_now_playing(&self, song: &Song) -> Vec<DispatchResult> {
        self.broadcast(Action::NowPlaying, song).await
    }

    pub async fn scrobble(&self, song: &Song) -> Vec<DispatchResult> {
        self.broadcast(Action::Scrobble, song).await
    }

    pub async fn toggle_love(&self, song: &Song, loved: bool) -> Vec<DispatchResult> {
        self.broadcast(Action::Love(loved), song).await
    }

    /// All registered scrobblers, bound or not
    pub fn list_registered(&self) -> Vec<Arc<dyn Scrobbler>> {
        read(&self.registered).values().cloned().collect()
    }

    /// Snapshot of the bound scrobblers
    pub fn list_bound(&self) -> Vec<Arc<dyn Scrobbler>> {
        read(&self.bound).values().cloned().collect()
    }

    pub fn find_registered(&self, label: &str) -> Option<Arc<dyn Scrobbler>> {
        read(&self.registered).get(label).cloned()
    }

    pub fn is_bound(&self, label: &str) -> bool {
        read(&self.bound).contains_key(label)
    }
}

// Set updates are single inserts/removes, so a poisoned lock still holds a consistent map
fn read(lock: &RwLock<ScrobblerMap>) -> RwLockReadGuard<'_, ScrobblerMap> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write(lock: &RwLock<ScrobblerMap>) -> RwLockWriteGuard<'_, ScrobblerMap> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}
