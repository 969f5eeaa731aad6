// Scrobbler module
// Contains implementations for various scrobbling services

pub mod lastfm;
pub mod lastfm_auth;
pub mod listenbrainz;
pub mod traits;

pub use lastfm::LastFmScrobbler;
pub use listenbrainz::ListenBrainzScrobbler;
pub use traits::{Scrobbler, ScrobblerError, Song};
