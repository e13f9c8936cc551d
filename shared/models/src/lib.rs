//! # HealthMate Domain Models
//!
//! Shared types for the report analysis pipeline.
//!
//! ## Key Models
//!
//! - **Report**: an uploaded medical document and its bilingual analysis result
//! - **AnalysisStatus**: the report lifecycle, whose `analyzing` state acts as a lease
//! - **BilingualSummary**: English / Roman Urdu explanation, or the fixed fallback pair
//! - **HealthInsights**: trend narrative across a user's recent reports
//! - **ReportFilter / ReportPage**: paginated listing

pub mod report;
pub mod insights;
pub mod listing;


pub use report::*;
pub use insights::*;
pub use listing::*;
