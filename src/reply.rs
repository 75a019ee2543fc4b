//! Recovers a [`ProductRecord`] from free-form model output.

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::record::ProductRecord;

/// Characters of the raw reply kept as the fallback description.
pub const FALLBACK_DESCRIPTION_CHARS: usize = 150;
/// Marker appended to the fallback description.
pub const FALLBACK_ELISION: &str = "...";

/// Normalization failures. Both are reported to the caller rather than hidden
/// behind a default record.
#[derive(Debug, Error)]
pub enum ReplyError {
    /// The reply carried no text.
    #[error("the model returned an empty reply")]
    Empty,
    /// A JSON object was opened but never closed.
    #[error("the model reply opens a JSON object at byte {0} but never closes it")]
    Unclosed(usize),
    /// The brace-delimited span is not a valid JSON object.
    #[error("the model reply contains malformed JSON: {0}")]
    Malformed(#[source] serde_json::Error),
}

impl ReplyError {
    /// True for structural failures (as opposed to an empty reply).
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Unclosed(_) | Self::Malformed(_))
    }
}

/// Location of the candidate JSON object inside a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonSpan<'a> {
    /// Text from the first `{` through the last `}`.
    Found(&'a str),
    /// A `{` with no `}` after it, at the given byte offset.
    Unclosed(usize),
    /// No opening brace at all.
    Missing,
}

/// Finds the greedy span from the first `{` to the last `}`.
///
/// This is not brace matching: a reply with two separate objects yields one span
/// covering both, which then fails to parse.
pub fn json_span(reply: &str) -> JsonSpan<'_> {
    let Some(start) = reply.find('{') else {
        return JsonSpan::Missing;
    };
    match reply.rfind('}') {
        Some(end) if end > start => JsonSpan::Found(&reply[start..=end]),
        _ => JsonSpan::Unclosed(start),
    }
}

/// Turns a model reply into a fully populated [`ProductRecord`].
///
/// Replies without any brace produce a best-effort record whose description is
/// the start of the reply.
pub fn normalize_reply(reply: &str) -> Result<ProductRecord, ReplyError> {
    if reply.trim().is_empty() {
        return Err(ReplyError::Empty);
    }

    match json_span(reply) {
        JsonSpan::Found(span) => {
            let fields: Map<String, Value> =
                serde_json::from_str(span).map_err(|err| {
                    warn!(error = %err, span_len = span.len(), "reply JSON failed to parse");
                    ReplyError::Malformed(err)
                })?;
            debug!(keys = fields.len(), "merging reply fields over defaults");
            Ok(ProductRecord::from_fields(&fields))
        }
        JsonSpan::Unclosed(offset) => {
            warn!(offset, "reply opens a JSON object without closing it");
            Err(ReplyError::Unclosed(offset))
        }
        JsonSpan::Missing => {
            debug!("reply has no JSON object; using fallback record");
            Ok(fallback_record(reply))
        }
    }
}

fn fallback_record(reply: &str) -> ProductRecord {
    let mut description: String = reply.chars().take(FALLBACK_DESCRIPTION_CHARS).collect();
    description.push_str(FALLBACK_ELISION);
    ProductRecord {
        description,
        ..ProductRecord::default()
    }
}
