//! Cross-report insights and chat assistant models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Returned in place of generated insights when the user has no completed reports.
pub const NO_REPORTS_INSIGHT: &str = "Upload and analyze medical reports to get personalized \
HealthMate AI insights about your well-being.";

/// Attached to every insights response.
pub const INSIGHTS_DISCLAIMER: &str =
    "HealthMate AI provides general wellness insights only. This is not medical advice.";

/// Trend narrative across a user's recent completed reports.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HealthInsights {
    pub insights: String,
    pub total_reports: usize,
    pub last_analyzed: Option<DateTime<Utc>>,
    pub disclaimer: String,
}

impl HealthInsights {
    pub fn new(insights: String, total_reports: usize, last_analyzed: Option<DateTime<Utc>>) -> Self {
        Self {
            insights,
            total_reports,
            last_analyzed,
            disclaimer: INSIGHTS_DISCLAIMER.to_string(),
        }
    }

    /// Static encouragement for a user with nothing to aggregate yet.
    pub fn empty() -> Self {
        Self::new(NO_REPORTS_INSIGHT.to_string(), 0, None)
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ChatRequest {
    #[validate(length(min = 1, max = 2000, message = "Message must be between 1 and 2000 characters"))]
    pub message: String,
    #[validate(length(max = 4000, message = "Context must be at most 4000 characters"))]
    pub context: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    pub reply: String,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_insights() {
        let insights = HealthInsights::empty();
        assert_eq!(insights.total_reports, 0);
        assert!(insights.last_analyzed.is_none());
        assert!(!insights.insights.is_empty());
        assert_eq!(insights.disclaimer, INSIGHTS_DISCLAIMER);
    }

    #[test]
    fn test_chat_request_validation() {
        let empty = ChatRequest { message: String::new(), context: None };
        assert!(empty.validate().is_err());

        let ok = ChatRequest { message: "Is 9 g/dL hemoglobin low?".to_string(), context: None };
        assert!(ok.validate().is_ok());
    }
}
