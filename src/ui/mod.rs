// User interaction: notifications and browser hand-off

pub mod browser;
pub mod notifier;

pub use browser::{SystemTabOpener, TabOpener};
pub use notifier::{ConsoleNotifier, Notifier};
