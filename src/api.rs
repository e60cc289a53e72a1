//! JSON request interface: `{ "input": string }` in,
//! `{ "segments": [{ "type", "content" }] }` out.

use serde::Serialize;
use serde_json::Value;

use crate::convert::{ConversionCache, Provider, reconcile_or_degrade};
use crate::document::RenderedSegment;
use crate::error::Error;

/// Kind of a response segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentKind {
    Latex,
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponseSegment {
    #[serde(rename = "type")]
    pub kind: SegmentKind,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConversionResponse {
    pub segments: Vec<ResponseSegment>,
}

impl ConversionResponse {
    /// Response view of reconciled segments; placeholders are not reported.
    pub fn from_segments(segments: &[RenderedSegment]) -> Self {
        let segments = segments
            .iter()
            .filter_map(|segment| match segment {
                RenderedSegment::Text(content) => Some(ResponseSegment {
                    kind: SegmentKind::Text,
                    content: content.clone(),
                }),
                RenderedSegment::Latex(content) => Some(ResponseSegment {
                    kind: SegmentKind::Latex,
                    content: content.clone(),
                }),
                RenderedSegment::Placeholder(_) => None,
            })
            .collect();
        Self { segments }
    }
}

/// Body returned for a rejected or failed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorResponse {
    pub error: &'static str,
    pub message: String,
}

impl From<&Error> for ErrorResponse {
    fn from(err: &Error) -> Self {
        Self {
            error: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Pull the `input` string out of a request body.
///
/// # Errors
/// Returns [`Error::InvalidInput`] for malformed JSON, a missing `input`,
/// or an `input` that is not a string.
pub fn parse_request(body: &str) -> Result<String, Error> {
    let value: Value = serde_json::from_str(body)
        .map_err(|err| Error::InvalidInput(format!("request is not valid JSON: {err}")))?;
    match value.get("input") {
        Some(Value::String(input)) => Ok(input.clone()),
        Some(_) => Err(Error::InvalidInput("`input` must be a string".to_string())),
        None => Err(Error::InvalidInput("missing `input`".to_string())),
    }
}

/// Handle one request against the session cache.
///
/// Provider failures degrade to the fallback converter, so the only error
/// is a rejected request.
///
/// # Errors
/// Returns [`Error::InvalidInput`] before any conversion is attempted.
pub fn handle_request(
    body: &str,
    cache: &mut ConversionCache,
    provider: &Provider,
) -> Result<ConversionResponse, Error> {
    let input = parse_request(body)?;
    let reconciled = reconcile_or_degrade(&input, cache, provider);
    Ok(ConversionResponse::from_segments(&reconciled.segments))
}

/// Serialize the outcome of [`handle_request`] as a JSON body.
pub fn respond(body: &str, cache: &mut ConversionCache, provider: &Provider) -> String {
    let value = match handle_request(body, cache, provider) {
        Ok(response) => serde_json::to_value(response),
        Err(err) => serde_json::to_value(ErrorResponse::from(&err)),
    };
    value.map_or_else(
        |err| format!(r#"{{"error":"internal","message":"{err}"}}"#),
        |value| value.to_string(),
    )
}
