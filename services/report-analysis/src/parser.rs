//! Response Parser
//!
//! Grammar accepted from the model, after trimming:
//!
//! ```text
//! reply   := fence? payload fence?
//! fence   := "```" tag?          (tag is alphanumeric, e.g. `json`)
//! payload := { "englishSummary": <non-blank string>, "urduSummary": <non-blank string> }
//! ```
//!
//! Anything else yields the fixed bilingual fallback. Parsing never fails.

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use healthmate_models::BilingualSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummarySource {
    Model,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSummary {
    pub summary: BilingualSummary,
    pub source: SummarySource,
}

impl ParsedSummary {
    fn fallback() -> Self {
        Self {
            summary: BilingualSummary::fallback(),
            source: SummarySource::Fallback,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.source == SummarySource::Fallback
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryPayload {
    english_summary: String,
    urdu_summary: String,
}

pub fn parse_summary(raw: &str) -> ParsedSummary {
    let payload = strip_fences(raw);

    match decode_payload(payload) {
        Ok(parsed) => {
            let english = parsed.english_summary.trim();
            let urdu = parsed.urdu_summary.trim();
            if english.is_empty() || urdu.is_empty() {
                warn!("Model returned a blank summary field");
                return ParsedSummary::fallback();
            }

            ParsedSummary {
                summary: BilingualSummary::new(english, urdu),
                source: SummarySource::Model,
            }
        }
        Err(e) => {
            warn!(error = %e, response_len = raw.len(), "Model output is not a valid summary payload");
            ParsedSummary::fallback()
        }
    }
}

/// Only a JSON object qualifies. A derived struct decode on its own would
/// also fill the fields positionally from an array.
fn decode_payload(payload: &str) -> Result<SummaryPayload, String> {
    match serde_json::from_str::<Value>(payload).map_err(|e| e.to_string())? {
        object @ Value::Object(_) => serde_json::from_value(object).map_err(|e| e.to_string()),
        _ => Err("payload is not a JSON object".to_string()),
    }
}

/// Remove one surrounding markdown code fence, if present.
fn strip_fences(raw: &str) -> &str {
    let mut body = raw.trim();

    if let Some(rest) = body.strip_prefix("```") {
        let tag_len = rest
            .find(|c: char| !c.is_ascii_alphanumeric())
            .unwrap_or(rest.len());
        body = &rest[tag_len..];
    }

    if let Some(rest) = body.trim_end().strip_suffix("```") {
        body = rest;
    }

    body.trim()
}
