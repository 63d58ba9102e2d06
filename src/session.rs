//! Session handle.

/// A proxy to session state managed by an external session subsystem.
///
/// The context stores the proxy and hands it to whoever asks; reading,
/// writing, and persisting session data stay with the subsystem that
/// created it.
pub trait SessionProxy: Send + Sync {
    /// The session's identifier, stable for the session's lifetime.
    fn id(&self) -> &str;
}
