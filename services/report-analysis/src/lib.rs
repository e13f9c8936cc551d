//! # HealthMate Report Analysis
//!
//! Turns an uploaded medical report into an English / Roman Urdu summary and
//! synthesizes trend insights across a user's recent reports.
//!
//! ## Pipeline
//!
//! 1. [`state_machine::LeaseManager`] moves the report into `analyzing`
//! 2. [`extractor::TextExtractor`] fetches the artifact and decodes its text
//! 3. [`prompt`] builds the instruction text
//! 4. [`ai_client::AiAdapter`] calls the generative service
//! 5. [`parser`] validates the reply or substitutes the fallback
//! 6. the state machine commits `completed` or `failed`

pub mod ai_client;
pub mod api;
pub mod chat;
pub mod extractor;
pub mod gemini;
pub mod insights;
pub mod metrics;
pub mod parser;
pub mod prompt;
pub mod service;
pub mod state_machine;
pub mod storage;
pub mod watchdog;

#[cfg(test)]
mod test_support;

pub use ai_client::{AiAdapter, GenerativeService, RetryPolicy};
pub use api::{router, AppState};
pub use service::{AnalysisResult, AnalysisService};
