use anyhow::Result;

/// String key-value store in the shape of the Web Storage API.
///
/// Two instances back the relay: a session-scoped store for the reload
/// marker and a durable per-origin store for the cached state. Both are
/// injected so tests can substitute an in-memory backend.
pub trait KeyValueStore {
    /// Look up a value. Returns `None` if the key is absent.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Insert or replace a value.
    fn set(&mut self, key: &str, value: &str) -> Result<()>;

    /// Delete a key. Returns `Ok(())` even if the key was absent.
    fn remove(&mut self, key: &str) -> Result<()>;

    /// Write any buffered entries out. Invoked once at shutdown.
    fn flush(&mut self) -> Result<()>;
}
