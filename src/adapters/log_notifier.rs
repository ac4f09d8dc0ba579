//! Notifier that routes user-visible errors to the log.
//!
//! Used by headless embeddings (and the CLI) where there is no toast
//! surface; a GUI embedding supplies its own [`Notifier`].

use crate::traits::Notifier;

#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier {
    /// Also print to stderr
    echo: bool,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stderr(mut self) -> Self {
        self.echo = true;
        self
    }
}

impl Notifier for LogNotifier {
    fn notify_error(&self, message: &str) {
        tracing::warn!(target: "kbchat::notify", "{}", message);
        if self.echo {
            eprintln!("error: {}", message);
        }
    }
}
