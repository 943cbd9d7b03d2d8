//! Turns a successful API response into content the extractors can read.
//!
//! Markup and product lists pass through untouched. Network captures carry
//! base64 JSON bodies; each exchange is parsed and decoded on its own so a
//! bad capture only costs that capture.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::DecodeError;
use crate::models::{CapturedExchange, ExtractResponse, PayloadKind};

/// The part of a response a job works with.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Markup(String),
    Captures(Vec<Value>),
    ProductList(Value),
}

impl Payload {
    /// Picks the payload the request asked for, if the response carries it.
    pub fn from_response(response: ExtractResponse, kind: PayloadKind) -> Option<Self> {
        match kind {
            PayloadKind::BrowserHtml => response.browser_html.map(Self::Markup),
            PayloadKind::NetworkCapture => response.network_capture.map(Self::Captures),
            PayloadKind::ProductList => response.product_list.map(Self::ProductList),
        }
    }
}

/// A capture body decoded to JSON, with the exchange it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedBody {
    pub url: String,
    pub method: String,
    pub status: Option<u16>,
    pub json: Value,
}

/// A capture whose body could not be decoded.
#[derive(Debug)]
pub struct DecodeFailure {
    pub url: String,
    pub error: DecodeError,
}

#[derive(Debug, Default)]
pub struct DecodedCaptures {
    /// Successfully decoded bodies, in capture order.
    pub bodies: Vec<DecodedBody>,
    pub failures: Vec<DecodeFailure>,
}

/// Base64-decodes a capture body and parses it as JSON.
pub fn decode_body(encoded: &str) -> Result<Value, DecodeError> {
    let bytes = STANDARD.decode(encoded.trim())?;
    let text = String::from_utf8(bytes)?;
    Ok(serde_json::from_str(&text)?)
}

/// Decodes every capture that has a body.
///
/// Captures without a body are skipped silently. Entries that are not a
/// well-formed exchange, and bodies that fail to decode, are logged and
/// listed in `failures`.
pub fn decode_captures(captures: &[Value]) -> DecodedCaptures {
    let mut decoded = DecodedCaptures::default();

    for raw in captures {
        let capture = match CapturedExchange::deserialize(raw) {
            Ok(capture) => capture,
            Err(e) => {
                let url = raw.get("url").and_then(Value::as_str).unwrap_or("<unknown>");
                warn!("Skipping capture {}: {}", url, e);
                decoded.failures.push(DecodeFailure {
                    url: url.to_string(),
                    error: DecodeError::Exchange(e),
                });
                continue;
            }
        };

        let Some(body) = capture
            .http_response_body
            .as_deref()
            .filter(|b| !b.is_empty())
        else {
            debug!("Capture {} has no body, skipping", capture.url);
            continue;
        };

        match decode_body(body) {
            Ok(json) => decoded.bodies.push(DecodedBody {
                url: capture.url.clone(),
                method: capture.method.clone(),
                status: capture.status,
                json,
            }),
            Err(error) => {
                warn!("Skipping capture {}: {}", capture.url, error);
                decoded.failures.push(DecodeFailure {
                    url: capture.url.clone(),
                    error,
                });
            }
        }
    }

    decoded
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn capture(url: &str, body: Option<String>) -> Value {
        json!({
            "url": url,
            "method": "GET",
            "status": 200,
            "httpResponseBody": body,
        })
    }

    fn encoded(value: &Value) -> String {
        STANDARD.encode(value.to_string())
    }

    #[test]
    fn malformed_base64_only_drops_that_capture() {
        let captures = vec![
            capture("/api/quotes?page=1", Some(encoded(&json!({"page": 1})))),
            capture("/api/quotes?page=2", Some("%%%not-base64%%%".to_string())),
            capture("/api/quotes?page=3", Some(encoded(&json!({"page": 3})))),
        ];

        let decoded = decode_captures(&captures);

        assert_eq!(decoded.bodies.len(), 2);
        assert_eq!(decoded.bodies[0].json, json!({"page": 1}));
        assert_eq!(decoded.bodies[1].json, json!({"page": 3}));
        assert_eq!(decoded.failures.len(), 1);
        assert_eq!(decoded.failures[0].url, "/api/quotes?page=2");
        assert!(matches!(decoded.failures[0].error, DecodeError::Base64(_)));
    }

    #[test]
    fn mistyped_exchange_only_drops_that_capture() {
        let captures = vec![
            json!({"url": "/api/quotes?page=1", "method": null, "status": 200,
                   "httpResponseBody": encoded(&json!({"page": 1}))}),
            json!({"url": null, "method": "GET", "httpResponseBody": "e30="}),
            capture("/api/quotes?page=2", Some(encoded(&json!({"page": 2})))),
        ];

        let decoded = decode_captures(&captures);

        assert_eq!(decoded.bodies.len(), 1);
        assert_eq!(decoded.bodies[0].url, "/api/quotes?page=2");
        assert_eq!(decoded.failures.len(), 2);
        assert_eq!(decoded.failures[0].url, "/api/quotes?page=1");
        assert_eq!(decoded.failures[1].url, "<unknown>");
        assert!(matches!(decoded.failures[0].error, DecodeError::Exchange(_)));
    }

    #[test]
    fn invalid_json_is_reported() {
        let captures = vec![capture("/api/x", Some(STANDARD.encode("{not json")))];

        let decoded = decode_captures(&captures);

        assert!(decoded.bodies.is_empty());
        assert!(matches!(decoded.failures[0].error, DecodeError::Json(_)));
    }

    #[test]
    fn empty_bodies_are_skipped_without_failure() {
        let captures = vec![
            capture("/api/a", None),
            capture("/api/b", Some(String::new())),
        ];

        let decoded = decode_captures(&captures);

        assert!(decoded.bodies.is_empty());
        assert!(decoded.failures.is_empty());
    }

    #[test]
    fn exchange_details_are_kept() {
        let mut exchange = capture("/api/quotes?page=1", Some(encoded(&json!([]))));
        exchange["method"] = json!("POST");
        exchange["status"] = json!(201);

        let decoded = decode_captures(&[exchange]);

        assert_eq!(decoded.bodies[0].method, "POST");
        assert_eq!(decoded.bodies[0].status, Some(201));
        assert_eq!(decoded.bodies[0].url, "/api/quotes?page=1");
    }

    #[test]
    fn payload_follows_requested_kind() {
        let response = ExtractResponse {
            browser_html: Some("<p>hi</p>".to_string()),
            network_capture: Some(vec![]),
            ..ExtractResponse::default()
        };

        assert_eq!(
            Payload::from_response(response.clone(), PayloadKind::BrowserHtml),
            Some(Payload::Markup("<p>hi</p>".to_string()))
        );
        assert_eq!(
            Payload::from_response(response.clone(), PayloadKind::NetworkCapture),
            Some(Payload::Captures(vec![]))
        );
        assert_eq!(Payload::from_response(response, PayloadKind::ProductList), None);
    }
}
