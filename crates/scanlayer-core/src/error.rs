// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Scanlayer.

use thiserror::Error;

/// Top-level error type for all Scanlayer operations.
#[derive(Debug, Error)]
pub enum ScanLayerError {
    // -- OCR block graph --
    #[error("malformed OCR block graph: {0}")]
    MalformedInput(String),

    #[error("no PAGE block for page {0}")]
    PageNotFound(u32),

    // -- Source PDF / rasterization --
    #[error("failed to rasterize page {page}: {reason}")]
    Render { page: u32, reason: String },

    #[error("unsupported source document: {0}")]
    UnsupportedFeature(String),

    // -- Output assembly --
    #[error("PDF operation failed: {0}")]
    PdfError(String),

    #[error("image processing failed: {0}")]
    ImageError(String),

    // -- Configuration --
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ScanLayerError {
    /// Whether this error aborts the whole document.
    ///
    /// A missing PAGE block only means the page carries no recognised text.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::PageNotFound(_))
    }

    /// Shorthand for a rasterization failure on a 1-based page number.
    pub fn render(page: u32, reason: impl Into<String>) -> Self {
        Self::Render {
            page,
            reason: reason.into(),
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ScanLayerError>;
