//! Text Extractor
//!
//! Turns a stored artifact into analyzable text. PDFs are decoded with
//! `pdf-extract`; images are never OCR'd and are handed back as an
//! attachment for a vision-capable prompt instead.

use regex::Regex;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{debug, warn};

use healthmate_models::FileKind;

use crate::ai_client::InlineBinary;
use crate::storage::{ArtifactFetcher, FetchError};

/// Note attached when a PDF carries no embedded text layer.
pub const NO_READABLE_TEXT_NOTE: &str =
    "No readable text found in this PDF. It may be a scanned document.";

/// Note attached to every image-based report.
pub const IMAGE_BASED_NOTE: &str =
    "This report is image-based. Text extraction is unavailable, so the image itself is analyzed.";

/// Decodes the embedded text layer of a PDF.
pub type PdfDecoder = fn(&[u8]) -> anyhow::Result<String>;

/// Must stay well under the analysis lease timeout.
pub const DEFAULT_DECODE_TIMEOUT: Duration = Duration::from_secs(60);

/// Raw artifact bytes handed to the generative service when no text is available.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl Attachment {
    pub fn as_inline(&self) -> InlineBinary<'_> {
        InlineBinary {
            bytes: &self.bytes,
            mime_type: &self.mime_type,
        }
    }
}

/// Extraction result
#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    pub text: String,
    pub note: Option<String>,
    /// Present whenever `text` is empty
    pub attachment: Option<Attachment>,
}

impl ExtractedDocument {
    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

pub struct TextExtractor {
    fetcher: Arc<dyn ArtifactFetcher>,
    decoder: PdfDecoder,
    decode_timeout: Duration,
}

impl TextExtractor {
    pub fn new(fetcher: Arc<dyn ArtifactFetcher>) -> Self {
        Self::with_decoder(fetcher, decode_pdf_text)
    }

    pub fn with_decoder(fetcher: Arc<dyn ArtifactFetcher>, decoder: PdfDecoder) -> Self {
        Self {
            fetcher,
            decoder,
            decode_timeout: DEFAULT_DECODE_TIMEOUT,
        }
    }

    pub fn with_decode_timeout(mut self, decode_timeout: Duration) -> Self {
        self.decode_timeout = decode_timeout;
        self
    }

    /// Fetch the artifact and produce its text or a no-text signal.
    ///
    /// Fetch failures are returned as-is; retrying is the caller's decision.
    pub async fn extract(&self, file_ref: &str, kind: FileKind) -> Result<ExtractedDocument, FetchError> {
        let bytes = self.fetcher.fetch(file_ref).await?;
        debug!(kind = %kind, size_bytes = bytes.len(), "Fetched report artifact");

        match kind {
            FileKind::Image => {
                let mime_type = sniff_image_mime(&bytes).to_string();
                Ok(ExtractedDocument {
                    text: String::new(),
                    note: Some(IMAGE_BASED_NOTE.to_string()),
                    attachment: Some(Attachment { bytes, mime_type }),
                })
            }
            FileKind::Pdf => {
                let (bytes, text) = self.decode(bytes).await;
                if text.is_empty() {
                    Ok(ExtractedDocument {
                        text,
                        note: Some(NO_READABLE_TEXT_NOTE.to_string()),
                        attachment: Some(Attachment {
                            bytes,
                            mime_type: "application/pdf".to_string(),
                        }),
                    })
                } else {
                    Ok(ExtractedDocument {
                        text,
                        note: None,
                        attachment: None,
                    })
                }
            }
        }
    }

    /// Decode off the async runtime. A decoder error, panic or overrun on a
    /// malformed PDF yields empty text rather than failing the attempt.
    async fn decode(&self, bytes: Vec<u8>) -> (Vec<u8>, String) {
        let decoder = self.decoder;
        let shared = Arc::new(bytes);
        let input = Arc::clone(&shared);

        let decoding = tokio::task::spawn_blocking(move || decoder(&input));
        let text = match tokio::time::timeout(self.decode_timeout, decoding).await {
            Ok(Ok(Ok(text))) => normalize_text(&text),
            Ok(Ok(Err(e))) => {
                warn!(error = %e, "PDF text decoding failed");
                String::new()
            }
            Ok(Err(e)) => {
                warn!(error = %e, "PDF decoder aborted");
                String::new()
            }
            Err(_) => {
                // The blocking thread runs on; its result is dropped
                warn!(timeout_secs = self.decode_timeout.as_secs_f64(), "PDF text decoding timed out");
                String::new()
            }
        };

        let bytes = Arc::try_unwrap(shared).unwrap_or_else(|shared| shared.as_ref().clone());
        (bytes, text)
    }
}

pub fn decode_pdf_text(data: &[u8]) -> anyhow::Result<String> {
    Ok(pdf_extract::extract_text_from_mem(data)?)
}

/// Collapse runs of blank lines and trailing whitespace left by the PDF text layer.
fn normalize_text(text: &str) -> String {
    static BLANK_RUNS: OnceLock<Regex> = OnceLock::new();
    let blank_runs = BLANK_RUNS.get_or_init(|| Regex::new(r"\n[ \t\r\f]*(\n[ \t\r\f]*)+").expect("valid regex"));

    let trimmed_lines: Vec<&str> = text.lines().map(str::trim_end).collect();
    blank_runs.replace_all(&trimmed_lines.join("\n"), "\n\n").trim().to_string()
}

/// Best-effort MIME type from magic bytes. Photographed reports are nearly
/// always JPEG, which is the default.
pub fn sniff_image_mime(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        "image/png"
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        "image/webp"
    } else {
        "image/jpeg"
    }
}
