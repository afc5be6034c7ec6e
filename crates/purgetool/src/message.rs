//! Events delivered to the presentation loop.
//!
//! Background tasks report back by sending one of these; the loop handles them
//! on the owner thread.

/// Application messages.
#[derive(Debug, Clone)]
pub enum Message {
    /// Restoring the saved session finished. `true` if one was rebuilt.
    Restored(Result<bool, String>),
    /// Interactive sign-in finished.
    SignedIn(Result<(), String>),
    /// Session authenticated and senders discovered, sorted for display.
    SendersLoaded(Result<Vec<String>, String>),
    /// Cleanup finished with the number of messages removed.
    Cleansed(Result<usize, String>),
    /// Session closed.
    LoggedOut,
}
