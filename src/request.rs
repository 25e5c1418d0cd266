//! Inbound payload decoding and validation.
//!
//! Nothing here touches the network: a request that fails these checks never
//! reaches the upstream provider.

use crate::models::{ImageInput, InboundRequest};
use crate::{Error, Result};
use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::http::Method;
use serde_json::Value;

/// JSON pointer and display name for each required field, in report order.
const REQUIRED_FIELDS: [(&str, &str); 4] = [
    ("/promptText", "promptText"),
    ("/image/data", "image.data"),
    ("/image/mimeType", "image.mimeType"),
    ("/model", "model"),
];

pub fn ensure_post(method: &Method) -> Result<()> {
    if *method == Method::POST {
        Ok(())
    } else {
        Err(Error::MethodNotAllowed)
    }
}

/// Decode a raw request body.
///
/// A body that arrives as a JSON string holding JSON (double-encoded by the
/// host) is unwrapped once. Undecodable bodies yield `None`.
pub fn try_decode_body(raw: &[u8]) -> Option<Value> {
    match serde_json::from_slice::<Value>(raw) {
        Ok(Value::String(inner)) => serde_json::from_str(&inner).ok(),
        Ok(value) => Some(value),
        Err(e) => {
            if !raw.is_empty() {
                tracing::debug!("Request body is not valid JSON: {}", e);
            }
            None
        }
    }
}

/// Check that every required field is a non-empty string.
pub fn validate(body: Option<&Value>) -> Result<InboundRequest> {
    let field = |pointer: &str| {
        body.and_then(|b| b.pointer(pointer))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    };

    let missing: Vec<&str> = REQUIRED_FIELDS
        .iter()
        .filter(|(pointer, _)| field(pointer).is_none())
        .map(|(_, name)| *name)
        .collect();

    if !missing.is_empty() {
        return Err(Error::InvalidRequest(missing.join(", ")));
    }

    // Presence of all four was checked above.
    let get = |pointer: &str| field(pointer).unwrap_or_default().to_string();

    Ok(InboundRequest {
        prompt_text: get("/promptText"),
        image: ImageInput {
            data: get("/image/data"),
            mime_type: get("/image/mimeType"),
        },
        model: get("/model"),
    })
}

/// Method check, body read, body decode, and field validation, in that order.
///
/// The body arrives still wrapped in its extraction result so that a body the
/// server refused to buffer never outranks a wrong method.
pub fn parse_inbound(
    method: &Method,
    body: std::result::Result<Bytes, BytesRejection>,
) -> Result<InboundRequest> {
    ensure_post(method)?;
    let raw = body?;
    validate(try_decode_body(&raw).as_ref())
}
