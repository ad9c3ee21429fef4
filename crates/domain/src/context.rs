use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::record::EnrichmentSummary;

/// Per-user carry-forward of the last completed round, used to bias the
/// next request's prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviousContext {
    pub query: String,
    pub answer: String,
    #[serde(default)]
    pub mcp_summary: Option<EnrichmentSummary>,
    pub updated_at: DateTime<Utc>,
}

impl PreviousContext {
    /// One-line rendering used inside prompts.
    pub fn prompt_line(&self) -> String {
        let mut line = format!("Previous context: {} | {}", self.query, self.answer);
        if let Some(ref summary) = self.mcp_summary {
            if !summary.title.is_empty() || !summary.extract.is_empty() {
                line.push_str(&format!(" | {}: {}", summary.title, summary.extract));
            }
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_line_includes_summary_when_present() {
        let mut ctx = PreviousContext {
            query: "선충이 뭐야?".into(),
            answer: "선형동물".into(),
            mcp_summary: None,
            updated_at: Utc::now(),
        };
        assert_eq!(ctx.prompt_line(), "Previous context: 선충이 뭐야? | 선형동물");

        ctx.mcp_summary = Some(EnrichmentSummary {
            title: "선충".into(),
            extract: "선형동물문".into(),
            image: None,
        });
        assert_eq!(
            ctx.prompt_line(),
            "Previous context: 선충이 뭐야? | 선형동물 | 선충: 선형동물문"
        );
    }
}
