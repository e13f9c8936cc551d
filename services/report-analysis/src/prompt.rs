//! Prompt Builder
//!
//! Pure functions from extracted content to instruction text. Output is
//! byte-identical for identical input: no clocks, no randomness.

use healthmate_models::{FileKind, Report};

const ANALYSIS_INSTRUCTIONS: &str = r#"You are HealthMate AI, a friendly medical report analyzer.

Please:
1. Explain the test results in simple, plain English.
2. Clearly flag every value that is out of range as HIGH, LOW or ABNORMAL.
3. Provide general wellness or diet tips.
4. Be concise (under 200 words).
5. Do not give a medical diagnosis.
6. End with a friendly motivational note."#;

const URDU_INSTRUCTIONS: &str = r#"7. Translate your English summary into Roman Urdu (Urdu written in Latin script).
8. Return JSON only, with no other text, in exactly this format:
{
  "englishSummary": "...",
  "urduSummary": "..."
}"#;

const ATTACHMENT_INSTRUCTION: &str = "The report is attached as a file. No text could be extracted from it, \
so read the attached document directly.";

const INSIGHTS_INSTRUCTIONS: &str = r#"You are HealthMate AI, a compassionate wellness analyst.
Review the following summaries of recent medical reports and identify health patterns.

Guidelines:
1. Detect trends (improving, stable, or concerning).
2. Offer simple lifestyle or nutrition tips.
3. Avoid any medical diagnosis.
4. Keep response under 300 words.
5. Use a warm, human-friendly tone.
6. End with a motivational wellness note."#;

const CHAT_INSTRUCTIONS: &str = r#"You are HealthMate AI, a friendly virtual health assistant.
Use empathy, kindness, and accuracy. Keep replies short and practical (under 150 words).
If the user asks about medical symptoms, include a clear disclaimer:
"This is general information only. Please consult a healthcare provider for personal advice.""#;

/// Instruction text for one analysis attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisPrompt {
    pub english_prompt: String,
    /// Translation and output-format instructions appended to the English prompt
    pub urdu_prompt: String,
}

impl AnalysisPrompt {
    /// The single prompt actually sent to the model.
    pub fn combined(&self) -> String {
        format!("{}\n\n{}", self.english_prompt, self.urdu_prompt)
    }
}

/// Build the analysis prompt. Images, and PDFs with no extractable text, are
/// analyzed from the attached file instead of inline text.
pub fn build_analysis_prompt(extracted_text: &str, kind: FileKind) -> AnalysisPrompt {
    let text = extracted_text.trim();

    let english_prompt = if kind == FileKind::Image || text.is_empty() {
        format!("{}\n\n{}", ANALYSIS_INSTRUCTIONS, ATTACHMENT_INSTRUCTION)
    } else {
        format!("{}\n\nMedical Report Text:\n{}", ANALYSIS_INSTRUCTIONS, text)
    };

    AnalysisPrompt {
        english_prompt,
        urdu_prompt: URDU_INSTRUCTIONS.to_string(),
    }
}

/// One consolidated prompt over the given completed reports, in the order given.
pub fn build_insights_prompt(reports: &[Report]) -> String {
    let summaries = reports
        .iter()
        .map(|report| {
            format!(
                "Report ({}): {}",
                report.created_at.format("%a %b %d %Y"),
                report.summary_en.as_deref().unwrap_or_default()
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "{}\n\nReports:\n{}\n\nGenerate an insightful health overview:",
        INSIGHTS_INSTRUCTIONS, summaries
    )
}

pub fn build_chat_prompt(message: &str, context: Option<&str>) -> String {
    let context = context.map(str::trim).filter(|c| !c.is_empty()).unwrap_or("None");

    format!(
        "{}\n\nPrevious Context (if any):\n{}\n\nUser Message:\n{}\n\nAI Response:",
        CHAT_INSTRUCTIONS,
        context,
        message.trim()
    )
}
