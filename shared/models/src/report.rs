//! Report domain models for the HealthMate analysis system.
//!
//! A report points at an externally stored medical document and carries the
//! bilingual summary produced by the analysis pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// English text committed whenever a report cannot be summarized.
pub const FALLBACK_SUMMARY_EN: &str = "HealthMate AI could not automatically analyze this report. \
Please ensure it contains readable text.";

/// Roman Urdu counterpart of [`FALLBACK_SUMMARY_EN`].
pub const FALLBACK_SUMMARY_UR: &str = "HealthMate AI report ka automatic analysis nahi kar saka. \
Barah-e-karam readable text wala clear report upload karein.";

/// A user's uploaded medical report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Report {
    pub id: Uuid,
    pub owner: Uuid,
    pub file_name: String,
    pub file_kind: FileKind,
    pub file_ref: String,
    pub report_type: ReportType,
    pub status: AnalysisStatus,
    pub summary_en: Option<String>,
    pub summary_ur: Option<String>,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Token of the attempt holding the `analyzing` lease
    #[serde(skip)]
    pub analysis_lease: Option<Uuid>,
}

impl Report {
    /// Register a freshly uploaded artifact. Analysis has not started yet.
    pub fn new(owner: Uuid, file_name: String, file_kind: FileKind, file_ref: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner,
            file_name,
            file_kind,
            file_ref,
            report_type: ReportType::General,
            status: AnalysisStatus::Pending,
            summary_en: None,
            summary_ur: None,
            archived: false,
            created_at: now,
            updated_at: now,
            analysis_lease: None,
        }
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.owner == user_id
    }

    /// Both summaries, if the report has reached a terminal status.
    pub fn summary(&self) -> Option<BilingualSummary> {
        match (&self.summary_en, &self.summary_ur) {
            (Some(english), Some(urdu)) => Some(BilingualSummary {
                english: english.clone(),
                urdu: urdu.clone(),
            }),
            _ => None,
        }
    }
}

/// Kind of stored artifact. Fixed at upload time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Pdf,
    Image,
}

impl FileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Image => "image",
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pdf" => Ok(Self::Pdf),
            "image" => Ok(Self::Image),
            other => Err(UnknownVariant::new("file kind", other)),
        }
    }
}

/// Clinical category of the report, used for display and filtering only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
    BloodTest,
    XRay,
    Mri,
    CtScan,
    Ultrasound,
    Ecg,
    General,
    Other,
}

impl ReportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BloodTest => "blood_test",
            Self::XRay => "x_ray",
            Self::Mri => "mri",
            Self::CtScan => "ct_scan",
            Self::Ultrasound => "ultrasound",
            Self::Ecg => "ecg",
            Self::General => "general",
            Self::Other => "other",
        }
    }
}

impl FromStr for ReportType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "blood_test" => Ok(Self::BloodTest),
            "x_ray" => Ok(Self::XRay),
            "mri" => Ok(Self::Mri),
            "ct_scan" => Ok(Self::CtScan),
            "ultrasound" => Ok(Self::Ultrasound),
            "ecg" => Ok(Self::Ecg),
            "general" => Ok(Self::General),
            "other" => Ok(Self::Other),
            other => Err(UnknownVariant::new("report type", other)),
        }
    }
}

/// Lifecycle status of a report's analysis.
///
/// `Analyzing` doubles as the lease: only the attempt that moved the report
/// into it, identified by its lease token, may commit a terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    /// Uploaded, never analyzed
    Pending,
    /// An attempt holds the lease
    Analyzing,
    /// Summaries written by the model
    Completed,
    /// Fallback summaries written
    Failed,
}

impl AnalysisStatus {
    /// Check if transition is valid
    pub fn can_transition_to(&self, target: AnalysisStatus) -> bool {
        use AnalysisStatus::*;

        match (self, target) {
            (Pending, Analyzing) => true,
            // Retry after a failure
            (Failed, Analyzing) => true,
            // Re-analysis overwrites the previous result
            (Completed, Analyzing) => true,

            (Analyzing, Completed) => true,
            (Analyzing, Failed) => true,

            _ => false,
        }
    }

    /// No attempt-specific follow-up is pending.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AnalysisStatus::Completed | AnalysisStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Analyzing => "analyzing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "analyzing" => Ok(Self::Analyzing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(UnknownVariant::new("analysis status", other)),
        }
    }
}

/// English and Roman Urdu explanation of one report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BilingualSummary {
    pub english: String,
    pub urdu: String,
}

impl BilingualSummary {
    pub fn new(english: impl Into<String>, urdu: impl Into<String>) -> Self {
        Self {
            english: english.into(),
            urdu: urdu.into(),
        }
    }

    /// The fixed pair substituted whenever no real summary can be produced.
    pub fn fallback() -> Self {
        Self::new(FALLBACK_SUMMARY_EN, FALLBACK_SUMMARY_UR)
    }

    pub fn is_fallback(&self) -> bool {
        self.english == FALLBACK_SUMMARY_EN && self.urdu == FALLBACK_SUMMARY_UR
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
