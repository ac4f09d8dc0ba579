//! Notifier that records every message instead of showing it.

use std::sync::{Arc, Mutex};

use crate::traits::Notifier;

#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    errors: Arc<Mutex<Vec<String>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every error message shown so far, oldest first.
    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify_error(&self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_in_order() {
        let notifier = RecordingNotifier::new();
        notifier.notify_error("first");
        notifier.notify_error("second");
        assert_eq!(notifier.errors(), vec!["first", "second"]);
    }
}
