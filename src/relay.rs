use std::time::Instant;

use crate::cache::StateCache;
use crate::endpoints;
use crate::protocol::{Request, ResponseEnvelope};
use crate::state::CollectionState;
use crate::storage::KeyValueStore;

/// Owns the relay's mutable pieces: the active state, the ping counter and
/// the cache. One instance is built at startup and handed to the transport;
/// there are no module-level globals.
pub struct RelayService<S, D> {
    state: CollectionState,
    ping_count: u64,
    cache: StateCache<S, D>,
}

impl<S: KeyValueStore, D: KeyValueStore> RelayService<S, D> {
    /// Build the service and apply the startup policy: a consumed reload
    /// marker means "adopt the cached state", anything else means "clear the
    /// cache so a stale snapshot never resurfaces after a manual refresh".
    pub fn start(mut cache: StateCache<S, D>) -> Self {
        let state = if cache.consume_reload_marker() {
            match cache.restore_state() {
                Some(state) => {
                    tracing::info!(
                        names = state.names.len(),
                        "restored state from cache after camera switch"
                    );
                    state
                }
                None => CollectionState::default(),
            }
        } else {
            tracing::debug!("manual refresh or first load, starting fresh");
            cache.clear_persisted();
            CollectionState::default()
        };

        RelayService {
            state,
            ping_count: 0,
            cache,
        }
    }

    /// Dispatch a request to its endpoint handler. Returns `None` when the
    /// endpoint id is unknown; otherwise every branch produces exactly one
    /// envelope, never an error escaping to the transport.
    pub fn route(&mut self, request: &Request) -> Option<ResponseEnvelope> {
        let started = Instant::now();
        tracing::debug!(
            endpoint = %request.endpoint_id,
            params = ?request.parameters,
            body_len = request.body.as_ref().map_or(0, |b| b.len()),
            "REQ"
        );

        let result = match request.endpoint_id.as_str() {
            "ping" => endpoints::ping::handle(self),
            "get_state" => endpoints::get_state::handle(self),
            "set_state" => endpoints::set_state::handle(self, request),
            _ => return None,
        };

        let envelope = result.unwrap_or_else(|e| {
            tracing::warn!(endpoint = %request.endpoint_id, "handler failed: {:#}", e);
            ResponseEnvelope::error(&crate::error::RelayError::Parse(e.to_string()))
        });

        tracing::debug!(
            endpoint = %request.endpoint_id,
            status = ?envelope.status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "RES"
        );
        Some(envelope)
    }

    /// Persist-before-reload path for the front-to-rear camera switch: write
    /// the session marker, then snapshot the state into the durable cache.
    pub fn prepare_camera_switch_reload(&mut self) {
        tracing::info!("camera switch requested, persisting state before reload");
        self.cache.mark_reload_for_camera_switch();
        self.cache.persist_state(&self.state);
    }

    /// Teardown hook run once at shutdown.
    pub fn shutdown(&mut self) {
        self.cache.flush();
    }

    pub(crate) fn state(&self) -> &CollectionState {
        &self.state
    }

    /// Wholesale replacement; the previous state is discarded, never merged.
    pub(crate) fn replace_state(&mut self, state: CollectionState) {
        self.state = state;
        self.cache.persist_state(&self.state);
    }

    pub(crate) fn next_ping(&mut self) -> u64 {
        self.ping_count += 1;
        self.ping_count
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde_json::{json, Value};

    use crate::cache::CACHE_KEY;
    use crate::protocol::Status;
    use crate::storage::{KeyValueStore, MemoryStore};

    use super::*;

    fn relay() -> RelayService<MemoryStore, MemoryStore> {
        RelayService::start(StateCache::new(MemoryStore::new(), MemoryStore::new()))
    }

    fn request(endpoint: &str) -> Request {
        Request {
            endpoint_id: endpoint.to_string(),
            parameters: BTreeMap::new(),
            body: None,
        }
    }

    fn set_state_request(payload: &str) -> Request {
        Request {
            endpoint_id: "set_state".to_string(),
            parameters: BTreeMap::from([("payload".to_string(), payload.to_string())]),
            body: None,
        }
    }

    fn body_json(envelope: &ResponseEnvelope) -> Value {
        serde_json::from_slice(&envelope.body).unwrap()
    }

    #[test]
    fn test_ping_counts_up_without_gaps() {
        let mut relay = relay();
        for expected in 1..=5u64 {
            let envelope = relay.route(&request("ping")).unwrap();
            assert_eq!(envelope.status, Status::Success);
            assert_eq!(envelope.metadata.get("n"), Some(&expected.to_string()));

            let body = body_json(&envelope);
            assert_eq!(body["pong"], json!(true));
            assert_eq!(body["n"], json!(expected));
        }
    }

    #[test]
    fn test_get_state_reflects_latest_set_state_only() {
        let mut relay = relay();

        relay
            .route(&set_state_request(r#"{"names":["heron","gator"]}"#))
            .unwrap();
        relay
            .route(&set_state_request(r#"{"names":["ibis"]}"#))
            .unwrap();

        let envelope = relay.route(&request("get_state")).unwrap();
        assert_eq!(envelope.metadata.get("count"), Some(&"1".to_string()));

        let body = body_json(&envelope);
        assert_eq!(body["names"], json!(["ibis"]));
        assert_eq!(body["collected"], json!({"ibis": true}));
        assert!(body["t"].is_number());
    }

    #[test]
    fn test_set_state_success_envelope() {
        let mut relay = relay();
        let envelope = relay
            .route(&set_state_request(r#"{"names":["a","b"],"collected":{"a":false}}"#))
            .unwrap();

        assert_eq!(envelope.status, Status::Success);
        assert_eq!(envelope.metadata.get("count"), Some(&"2".to_string()));
        assert_eq!(body_json(&envelope), json!({"ok": true}));
    }

    #[test]
    fn test_set_state_missing_payload_is_bad_request() {
        let mut relay = relay();
        let envelope = relay.route(&request("set_state")).unwrap();

        assert_eq!(envelope.status, Status::BadRequest);
        assert!(envelope.metadata.is_empty());
        let message = String::from_utf8(envelope.body).unwrap();
        assert!(message.contains("payload"));
    }

    #[test]
    fn test_set_state_invalid_json_leaves_state_untouched() {
        let mut relay = relay();
        relay
            .route(&set_state_request(r#"{"names":["heron"]}"#))
            .unwrap();

        let envelope = relay.route(&set_state_request("not json")).unwrap();
        assert_eq!(envelope.status, Status::ServerError);
        assert!(envelope.metadata.is_empty());

        let after = relay.route(&request("get_state")).unwrap();
        assert_eq!(body_json(&after)["names"], json!(["heron"]));
    }

    #[test]
    fn test_set_state_falls_back_to_request_body() {
        let mut relay = relay();
        let envelope = relay
            .route(&Request {
                endpoint_id: "set_state".to_string(),
                parameters: BTreeMap::new(),
                body: Some(br#"{"names":["egret"]}"#.to_vec()),
            })
            .unwrap();

        assert_eq!(envelope.status, Status::Success);
        assert_eq!(envelope.metadata.get("count"), Some(&"1".to_string()));
    }

    #[test]
    fn test_unknown_endpoint_returns_none() {
        assert!(relay().route(&request("upload_photo")).is_none());
    }

    #[test]
    fn test_set_state_persists_to_durable_store() {
        let dir = tempfile::TempDir::new().unwrap();
        let durable_path = dir.path().join("store.json");

        let durable = crate::storage::FilesystemStore::open(&durable_path).unwrap();
        let mut relay = RelayService::start(StateCache::new(MemoryStore::new(), durable));
        relay
            .route(&set_state_request(r#"{"names":["heron"]}"#))
            .unwrap();
        drop(relay);

        // Cached immediately, not only at camera-switch time.
        let reopened = crate::storage::FilesystemStore::open(&durable_path).unwrap();
        let cached = reopened.get(CACHE_KEY).unwrap().expect("state not cached");
        let cached: Value = serde_json::from_str(&cached).unwrap();
        assert_eq!(cached["names"], json!(["heron"]));
    }

    #[test]
    fn test_startup_without_marker_clears_stale_cache() {
        let mut durable = MemoryStore::new();
        durable
            .set(CACHE_KEY, r#"{"names":["stale"],"collected":{"stale":true},"t":1}"#)
            .unwrap();

        let mut relay = RelayService::start(StateCache::new(MemoryStore::new(), durable));
        let envelope = relay.route(&request("get_state")).unwrap();
        assert_eq!(envelope.metadata.get("count"), Some(&"0".to_string()));
    }

    #[test]
    fn test_startup_with_marker_restores_cache() {
        let mut session = MemoryStore::new();
        session
            .set(crate::cache::RELOAD_REASON_KEY, crate::cache::RELOAD_REASON_CAMERA_SWITCH)
            .unwrap();
        let mut durable = MemoryStore::new();
        durable
            .set(CACHE_KEY, r#"{"names":["heron"],"collected":{"heron":true},"t":1}"#)
            .unwrap();

        let mut relay = RelayService::start(StateCache::new(session, durable));
        let envelope = relay.route(&request("get_state")).unwrap();
        assert_eq!(envelope.metadata.get("count"), Some(&"1".to_string()));
        assert_eq!(body_json(&envelope)["names"], json!(["heron"]));
    }
}
