use serde_json::Value;

use crate::state::{sanitize, CollectionState};
use crate::storage::KeyValueStore;

/// Durable store key holding the serialized state snapshot.
pub const CACHE_KEY: &str = "bayou_collected_items";

/// Session store key holding the reload-reason marker.
pub const RELOAD_REASON_KEY: &str = "reloadReason";

/// Marker value written before a deliberate camera-switch reload.
pub const RELOAD_REASON_CAMERA_SWITCH: &str = "switchCamera";

/// Bridges `CollectionState` across the forced page reload that works around
/// the lens runtime's front-to-rear camera switch limitation.
///
/// The session store carries the reload marker (gone when the session ends);
/// the durable store carries the serialized state. Store failures are never
/// fatal here: a failed write means "cache write skipped" and a failed or
/// corrupt read means "no cached state".
pub struct StateCache<S, D> {
    session: S,
    durable: D,
}

impl<S: KeyValueStore, D: KeyValueStore> StateCache<S, D> {
    pub fn new(session: S, durable: D) -> Self {
        StateCache { session, durable }
    }

    /// Record that the next load is a deliberate camera-switch reload,
    /// not a manual refresh.
    pub fn mark_reload_for_camera_switch(&mut self) {
        if let Err(e) = self
            .session
            .set(RELOAD_REASON_KEY, RELOAD_REASON_CAMERA_SWITCH)
        {
            tracing::warn!("failed to write reload marker: {:#}", e);
        } else {
            tracing::debug!("marked camera switch in session store");
        }
    }

    /// Read and clear the reload marker. Returns whether it was present;
    /// every call after the first returns false.
    pub fn consume_reload_marker(&mut self) -> bool {
        let reason = match self.session.get(RELOAD_REASON_KEY) {
            Ok(reason) => reason,
            Err(e) => {
                tracing::warn!("failed to read reload marker: {:#}", e);
                None
            }
        };

        if reason.as_deref() == Some(RELOAD_REASON_CAMERA_SWITCH) {
            if let Err(e) = self.session.remove(RELOAD_REASON_KEY) {
                tracing::warn!("failed to clear reload marker: {:#}", e);
            }
            tracing::debug!("detected camera switch reload");
            true
        } else {
            tracing::debug!("normal load (not camera switch)");
            false
        }
    }

    /// Serialize the state into the durable store.
    pub fn persist_state(&mut self, state: &CollectionState) {
        let json = match serde_json::to_string(state) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!("failed to serialize state for cache: {:#}", e);
                return;
            }
        };
        if let Err(e) = self.durable.set(CACHE_KEY, &json) {
            tracing::warn!("failed to save state to cache: {:#}", e);
        } else {
            tracing::debug!("state saved to cache");
        }
    }

    /// Deserialize the cached state, or `None` if absent or corrupt. A valid
    /// JSON document of the wrong shape degrades through the sanitizer
    /// instead of being dropped.
    pub fn restore_state(&self) -> Option<CollectionState> {
        let cached = match self.durable.get(CACHE_KEY) {
            Ok(Some(cached)) => cached,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("failed to load state from cache: {:#}", e);
                return None;
            }
        };

        match serde_json::from_str::<Value>(&cached) {
            Ok(value) => Some(sanitize(&value)),
            Err(e) => {
                tracing::warn!("ignoring corrupt cached state: {}", e);
                None
            }
        }
    }

    /// Drop any cached state so a stale snapshot never resurfaces after a
    /// manual refresh.
    pub fn clear_persisted(&mut self) {
        if let Err(e) = self.durable.remove(CACHE_KEY) {
            tracing::warn!("failed to clear cached state: {:#}", e);
        }
    }

    /// Teardown hook: flush both stores.
    pub fn flush(&mut self) {
        if let Err(e) = self.session.flush() {
            tracing::warn!("failed to flush session store: {:#}", e);
        }
        if let Err(e) = self.durable.flush() {
            tracing::warn!("failed to flush durable store: {:#}", e);
        }
    }
}
