// Diagnostics module
// Failures the manager recovers from locally are reported here instead of being returned

use std::fmt;

/// A recovered failure or notable decision made by the manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// Registration skipped because the label is already known
    AlreadyRegistered { label: String },
    /// Session fetch failed, scrobbler stays unbound
    SessionUnavailable { label: String, reason: String },
    /// Unbind requested for a scrobbler that is not bound
    NotBound { label: String },
    /// Could not obtain an authorization URL
    AuthUrlUnavailable { label: String, reason: String },
    /// The authorization URL could not be opened in the browser
    TabOpenFailed { label: String, reason: String },
    /// Scrobbler unbound after its credentials were rejected
    CredentialsRevoked { label: String, reason: String },
    /// Submission failed for a reason other than credentials
    SubmissionFailed { label: String, reason: String },
}

impl Diagnostic {
    pub fn label(&self) -> &str {
        match self {
            Self::AlreadyRegistered { label }
            | Self::SessionUnavailable { label, .. }
            | Self::NotBound { label }
            | Self::AuthUrlUnavailable { label, .. }
            | Self::TabOpenFailed { label, .. }
            | Self::CredentialsRevoked { label, .. }
            | Self::SubmissionFailed { label, .. } => label,
        }
    }

    pub fn level(&self) -> log::Level {
        match self {
            Self::AlreadyRegistered { .. } => log::Level::Debug,
            Self::NotBound { .. } => log::Level::Error,
            _ => log::Level::Warn,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyRegistered { label } => write!(f, "{} is already registered", label),
            Self::SessionUnavailable { label, reason } => {
                write!(f, "{}: not authenticated: {}", label, reason)
            }
            Self::NotBound { label } => write!(f, "{} is not bound", label),
            Self::AuthUrlUnavailable { label, reason } => {
                write!(f, "{}: unable to get auth URL: {}", label, reason)
            }
            Self::TabOpenFailed { label, reason } => {
                write!(f, "{}: unable to open auth URL: {}", label, reason)
            }
            Self::CredentialsRevoked { label, reason } => {
                write!(f, "{}: credentials rejected, unbinding: {}", label, reason)
            }
            Self::SubmissionFailed { label, reason } => write!(f, "{}: {}", label, reason),
        }
    }
}

/// Destination for manager diagnostics
pub trait DiagnosticSink: Send + Sync {
    fn record(&self, diagnostic: Diagnostic);
}

/// Forwards diagnostics to the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn record(&self, diagnostic: Diagnostic) {
        log::log!(diagnostic.level(), "{}", diagnostic);
    }
}
