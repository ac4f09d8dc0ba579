//! User-visible notification seam (the UI's toast).

/// Surface for messages the user must see.
///
/// The session calls this exactly once per failed turn.
pub trait Notifier: Send + Sync {
    fn notify_error(&self, message: &str);
}
