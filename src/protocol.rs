use std::collections::BTreeMap;
use std::io::{BufRead, Write};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::error::RelayError;
use crate::relay::RelayService;
use crate::storage::KeyValueStore;

/// A request arriving from the embedded lens runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub endpoint_id: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
    /// Raw request body, base64 on the wire.
    #[serde(default, with = "base64_bytes_opt", skip_serializing_if = "Option::is_none")]
    pub body: Option<Vec<u8>>,
}

/// Response status codes understood by the lens runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Success,
    BadRequest,
    ServerError,
}

/// Single response sent back for a routed request.
///
/// Metadata values are strings (an external protocol constraint) and the body
/// is a byte sequence, conventionally UTF-8 JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub status: Status,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(with = "base64_bytes")]
    pub body: Vec<u8>,
}

impl ResponseEnvelope {
    pub fn success(metadata: BTreeMap<String, String>, body: Vec<u8>) -> Self {
        ResponseEnvelope {
            status: Status::Success,
            metadata,
            body,
        }
    }

    /// Error envelope: empty metadata, bare message as the body.
    pub fn error(err: &RelayError) -> Self {
        ResponseEnvelope {
            status: err.status(),
            metadata: BTreeMap::new(),
            body: err.to_string().into_bytes(),
        }
    }
}

/// One input line from the runtime bridge.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RequestFrame {
    /// An endpoint request to route.
    Request(Request),
    /// The host page is about to force a reload for a front-to-rear camera
    /// switch; persist state first, then let the supervisor relaunch us.
    CameraSwitch,
}

/// One output line to the runtime bridge.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseFrame {
    Response(ResponseEnvelope),
    /// The router had no handler for the endpoint id.
    #[serde(rename_all = "camelCase")]
    NotFound { endpoint_id: String },
}

/// How a serve loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Input closed; normal shutdown.
    Shutdown,
    /// A camera switch was requested; the caller should exit so the
    /// supervisor can relaunch (the "reload").
    Reload,
}

/// Main protocol loop - reads frames from the runtime bridge and dispatches
/// them, one JSON object per line in and out.
pub fn serve<S, D, R, W>(
    relay: &mut RelayService<S, D>,
    reader: R,
    output: &mut W,
) -> Result<Outcome>
where
    S: KeyValueStore,
    D: KeyValueStore,
    R: BufRead,
    W: Write,
{
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let frame: RequestFrame = match serde_json::from_str(line) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!("skipping malformed frame: {}", e);
                continue;
            }
        };

        match frame {
            RequestFrame::Request(request) => {
                let response = match relay.route(&request) {
                    Some(envelope) => ResponseFrame::Response(envelope),
                    None => {
                        let err = RelayError::UnknownEndpoint(request.endpoint_id.clone());
                        tracing::warn!("{}", err);
                        ResponseFrame::NotFound {
                            endpoint_id: request.endpoint_id,
                        }
                    }
                };
                serde_json::to_writer(&mut *output, &response)?;
                writeln!(output)?;
                output.flush()?;
            }
            RequestFrame::CameraSwitch => {
                relay.prepare_camera_switch_reload();
                return Ok(Outcome::Reload);
            }
        }
    }

    Ok(Outcome::Shutdown)
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

mod base64_bytes_opt {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        bytes: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(bytes) => serializer.serialize_str(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        let encoded: Option<String> = Option::deserialize(deserializer)?;
        encoded
            .map(|s| STANDARD.decode(s.as_bytes()))
            .transpose()
            .map_err(serde::de::Error::custom)
    }
}
