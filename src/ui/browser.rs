// Opens authorization pages in the user's browser

use anyhow::{Context, Result};
use std::process::Command;
use url::Url;

/// Host facility for opening a URL in a new browser tab
pub trait TabOpener: Send + Sync {
    fn open_tab(&self, url: &Url) -> Result<()>;
}

/// Hands the URL to the platform opener
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTabOpener;

impl SystemTabOpener {
    fn program() -> &'static str {
        if cfg!(target_os = "macos") {
            "open"
        } else {
            "xdg-open"
        }
    }
}

impl TabOpener for SystemTabOpener {
    fn open_tab(&self, url: &Url) -> Result<()> {
        let program = Self::program();
        let status = Command::new(program)
            .arg(url.as_str())
            .status()
            .with_context(|| format!("Failed to run {}", program))?;

        if !status.success() {
            anyhow::bail!("{} exited with {}", program, status);
        }

        log::debug!("Opened {}", url);
        Ok(())
    }
}
