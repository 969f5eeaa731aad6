//! Fans out now playing, scrobble and love events to every signed-in scrobbler.
//!
//! [`ScrobbleManager`] owns the registered and bound scrobbler sets; the
//! services themselves implement [`Scrobbler`].

pub mod config;
pub mod diagnostics;
pub mod manager;
pub mod scrobbler;
pub mod ui;

pub use diagnostics::{Diagnostic, DiagnosticSink, LogSink};
pub use manager::{Action, DispatchResult, ScrobbleManager};
pub use scrobbler::{Scrobbler, ScrobblerError, Song};
