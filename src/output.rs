//! Result types returned by a composition job.

use crate::error::PdfGridError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

/// The composed document plus job statistics.
#[derive(Debug, Clone)]
pub struct ComposeOutput {
    /// Serialised PDF bytes.
    pub pdf: Vec<u8>,
    pub stats: ComposeStats,
}

impl ComposeOutput {
    /// The document as standard base64, as handed across the bridge.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.pdf)
    }

    /// Write the PDF to `path` (temp file + rename, so readers never see a
    /// partial file).
    pub async fn save(&self, path: impl AsRef<std::path::Path>) -> Result<(), PdfGridError> {
        crate::job::write_atomic(path.as_ref(), &self.pdf).await
    }
}

/// Counters for one job.
///
/// Deliberately counts only: the caller learns *how many* inputs were
/// skipped, not which ones (use a progress callback for that).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposeStats {
    /// Input references passed in.
    pub total_items: usize,
    /// Inputs that contributed at least one page.
    pub composed_items: usize,
    /// Inputs that contributed nothing.
    pub skipped_items: usize,
    /// Pixel pages placed (images + rendered PDF pages).
    pub placed_images: usize,
    /// Pages in the output document.
    pub output_pages: usize,
    /// Wall-clock time for the whole job.
    pub duration_ms: u64,
}

/// Structured result of [`crate::job::edit_pdf`], the operation exposed to
/// the surrounding application.
///
/// Serialises with an explicit `status` tag:
///
/// ```json
/// {"status":"ok","pdf_base64":"JVBERi0x...","pages":3}
/// {"status":"error","code":"INVALID_ORIENTATION","message":"..."}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum EditResponse {
    Ok {
        /// Base64-encoded bytes of the generated PDF.
        pdf_base64: String,
        /// Output page count.
        pages: usize,
    },
    Error {
        /// Stable code from [`PdfGridError::code`].
        code: String,
        message: String,
    },
}

impl EditResponse {
    pub fn is_ok(&self) -> bool {
        matches!(self, EditResponse::Ok { .. })
    }
}

impl From<Result<ComposeOutput, PdfGridError>> for EditResponse {
    fn from(result: Result<ComposeOutput, PdfGridError>) -> Self {
        match result {
            Ok(output) => EditResponse::Ok {
                pdf_base64: output.to_base64(),
                pages: output.stats.output_pages,
            },
            Err(e) => EditResponse::Error {
                code: e.code().to_string(),
                message: e.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_response_carries_base64() {
        let output = ComposeOutput {
            pdf: b"%PDF-1.5".to_vec(),
            stats: ComposeStats {
                output_pages: 2,
                ..Default::default()
            },
        };
        let resp = EditResponse::from(Ok(output));
        match resp {
            EditResponse::Ok { pdf_base64, pages } => {
                assert_eq!(pages, 2);
                assert_eq!(STANDARD.decode(pdf_base64).unwrap(), b"%PDF-1.5");
            }
            other => panic!("expected ok, got {other:?}"),
        }
    }

    #[test]
    fn error_response_is_tagged_json() {
        let resp = EditResponse::from(Err(PdfGridError::NoInputs));
        assert!(!resp.is_ok());
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["code"], "NO_INPUTS");
        assert!(json["message"].as_str().unwrap().contains("No input"));
    }

    #[test]
    fn ok_response_json_shape() {
        let resp = EditResponse::Ok {
            pdf_base64: "AAAA".into(),
            pages: 1,
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert_eq!(json, r#"{"status":"ok","pdf_base64":"AAAA","pages":1}"#);
    }
}
