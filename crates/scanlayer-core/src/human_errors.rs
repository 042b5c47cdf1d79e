// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages for operators of the conversion pipeline.
//
// Every technical error is mapped to plain English with a clear suggestion.
// The `retriable` flag is advice for the orchestration layer; the core itself
// never retries.

use crate::error::ScanLayerError;

/// Severity of an error from the operator's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Nothing to fix, the document still converts.
    Informational,
    /// An input file must be fixed or regenerated.
    BadInput,
    /// The environment (disk, native libraries) needs attention.
    Environment,
    /// The input uses something Scanlayer cannot process.
    Unsupported,
}

/// A human-readable error with plain English message and actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// Plain English summary.
    pub message: String,
    /// What the operator should try.
    pub suggestion: String,
    /// Whether re-running the same job may succeed.
    pub retriable: bool,
    pub severity: Severity,
}

/// Convert a `ScanLayerError` into a `HumanError`.
pub fn humanize_error(err: &ScanLayerError) -> HumanError {
    match err {
        ScanLayerError::MalformedInput(detail) => {
            if detail.contains("child") {
                HumanError {
                    message: "The OCR output refers to blocks that are missing.".into(),
                    suggestion: format!(
                        "The OCR result file looks truncated. Fetch the complete result (all pages of the OCR job) and try again. ({detail})"
                    ),
                    retriable: false,
                    severity: Severity::BadInput,
                }
            } else {
                HumanError {
                    message: "The OCR output could not be read.".into(),
                    suggestion: format!(
                        "Check that the block file is the JSON produced by the OCR service. ({detail})"
                    ),
                    retriable: false,
                    severity: Severity::BadInput,
                }
            }
        }

        ScanLayerError::PageNotFound(page) => HumanError {
            message: format!("No text was recognised on page {page}."),
            suggestion: "Nothing to do. The page is kept as an image without a text layer.".into(),
            retriable: false,
            severity: Severity::Informational,
        },

        ScanLayerError::Render { page, reason } => HumanError {
            message: format!("Page {page} of the PDF could not be turned into an image."),
            suggestion: format!(
                "The page may be damaged or use an image format the built-in renderer does not read. Try the pdfium renderer. ({reason})"
            ),
            retriable: false,
            severity: Severity::Unsupported,
        },

        ScanLayerError::UnsupportedFeature(detail) => {
            if detail.contains("encrypt") {
                HumanError {
                    message: "This PDF is password protected.".into(),
                    suggestion: "Remove the password protection and try again.".into(),
                    retriable: false,
                    severity: Severity::Unsupported,
                }
            } else {
                HumanError {
                    message: "This PDF cannot be processed.".into(),
                    suggestion: format!("The file may be damaged or not a PDF. ({detail})"),
                    retriable: false,
                    severity: Severity::Unsupported,
                }
            }
        }

        ScanLayerError::PdfError(_) | ScanLayerError::ImageError(_) => HumanError {
            message: "The searchable PDF could not be written.".into(),
            suggestion: "Try again. If this keeps happening, try the lossless image encoding.".into(),
            retriable: true,
            severity: Severity::Environment,
        },

        ScanLayerError::InvalidConfig(detail) => HumanError {
            message: "The settings are not valid.".into(),
            suggestion: format!("Fix the configuration and run again. ({detail})"),
            retriable: false,
            severity: Severity::BadInput,
        },

        ScanLayerError::Io(io_err) => {
            if io_err.kind() == std::io::ErrorKind::NotFound {
                HumanError {
                    message: "The file couldn't be found.".into(),
                    suggestion: "Check the input paths and try again.".into(),
                    retriable: false,
                    severity: Severity::BadInput,
                }
            } else if io_err.kind() == std::io::ErrorKind::PermissionDenied {
                HumanError {
                    message: "Permission denied while reading or writing a file.".into(),
                    suggestion: "Check the file permissions of the input and output locations.".into(),
                    retriable: false,
                    severity: Severity::Environment,
                }
            } else {
                HumanError {
                    message: "There was a problem reading or writing a file.".into(),
                    suggestion: "Try again. If this keeps happening, the disk may be full.".into(),
                    retriable: true,
                    severity: Severity::Environment,
                }
            }
        }

        ScanLayerError::Serialization(_) => HumanError {
            message: "The OCR output is not valid JSON.".into(),
            suggestion: "Check that the block file was downloaded completely.".into(),
            retriable: false,
            severity: Severity::BadInput,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_child_is_bad_input() {
        let err = ScanLayerError::MalformedInput("LINE b-7 references missing child w-9".into());
        let human = humanize_error(&err);
        assert_eq!(human.severity, Severity::BadInput);
        assert!(human.message.contains("missing"));
        assert!(!human.retriable);
    }

    #[test]
    fn missing_page_is_informational() {
        let human = humanize_error(&ScanLayerError::PageNotFound(2));
        assert_eq!(human.severity, Severity::Informational);
        assert!(human.message.contains('2'));
    }

    #[test]
    fn encrypted_pdf_is_unsupported() {
        let err = ScanLayerError::UnsupportedFeature("document is encrypted".into());
        let human = humanize_error(&err);
        assert_eq!(human.severity, Severity::Unsupported);
        assert!(human.message.contains("password"));
    }

    #[test]
    fn transient_io_is_retriable() {
        let err = ScanLayerError::Io(std::io::Error::other("disk hiccup"));
        assert!(humanize_error(&err).retriable);
    }
}
