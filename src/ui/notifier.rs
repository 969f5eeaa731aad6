// User-facing notifications for the sign-in flow

use url::Url;

/// Presents authentication prompts and sign-in failures to the user
pub trait Notifier: Send + Sync {
    /// Ask the user to finish authorizing `label` at `auth_url`
    fn show_authenticate(&self, label: &str, auth_url: &Url);

    /// Tell the user that signing in to `label` failed
    fn show_sign_in_error(&self, label: &str, status_url: &Url);
}

/// Prints notifications to the terminal
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn show_authenticate(&self, label: &str, auth_url: &Url) {
        log::info!("Waiting for {} authorization", label);
        println!(
            "To allow scrobbling to {}, open this URL and approve access:\n\n    {}\n",
            label, auth_url
        );
    }

    fn show_sign_in_error(&self, label: &str, status_url: &Url) {
        log::warn!("Sign in to {} failed", label);
        println!(
            "Unable to sign in to {}. Check the service status at:\n\n    {}\n",
            label, status_url
        );
    }
}
