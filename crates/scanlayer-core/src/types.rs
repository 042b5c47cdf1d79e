// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Scanlayer compositor.

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScanLayerError};

/// Slack allowed around the [0, 1] range of normalised OCR coordinates.
///
/// OCR engines report boxes touching the page edge with small overshoots
/// (e.g. `left = -0.0004`), which are clamped rather than rejected.
pub const BBOX_EPSILON: f32 = 0.01;

/// A rectangle in normalised page-fraction coordinates, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    /// Validate and normalise a raw OCR bounding box.
    ///
    /// Negative offsets within [`BBOX_EPSILON`] are clamped to zero. Anything
    /// non-finite, negative beyond the slack, or extending past `1 + ε` is
    /// rejected as malformed input.
    pub fn normalized(left: f32, top: f32, width: f32, height: f32) -> Result<Self> {
        let values = [left, top, width, height];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ScanLayerError::MalformedInput(format!(
                "bounding box has non-finite component: {values:?}"
            )));
        }
        if left < -BBOX_EPSILON || top < -BBOX_EPSILON || width < 0.0 || height < 0.0 {
            return Err(ScanLayerError::MalformedInput(format!(
                "bounding box out of range: left={left}, top={top}, width={width}, height={height}"
            )));
        }

        let left = left.max(0.0);
        let top = top.max(0.0);
        if left + width > 1.0 + BBOX_EPSILON || top + height > 1.0 + BBOX_EPSILON {
            return Err(ScanLayerError::MalformedInput(format!(
                "bounding box exceeds page: left={left}, top={top}, width={width}, height={height}"
            )));
        }

        Ok(Self {
            left,
            top,
            width,
            height,
        })
    }

    /// Scale to absolute page units (still top-left origin).
    pub fn to_page_rect(&self, page_width: f32, page_height: f32) -> PageRect {
        PageRect {
            x: self.left * page_width,
            y: self.top * page_height,
            width: self.width * page_width,
            height: self.height * page_height,
        }
    }
}

/// A bounding box scaled to page units, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// A resolved, page-scoped line (or word) of recognised text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextLine {
    pub text: String,
    pub bbox: BoundingBox,
}

impl TextLine {
    pub fn new(text: impl Into<String>, bbox: BoundingBox) -> Self {
        Self {
            text: text.into(),
            bbox,
        }
    }
}

/// How the rasterised page is stored in the output PDF.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageEncoding {
    /// JPEG (`DCTDecode`): photographic scans.
    #[default]
    Lossy,
    /// Deflated raw RGB (`FlateDecode`): line art and synthetic scans.
    Lossless,
}

/// Fixed-width standard-14 font faces available for the overlay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverlayFont {
    #[default]
    Courier,
    CourierBold,
    CourierOblique,
    CourierBoldOblique,
}

impl OverlayFont {
    /// PostScript name used as the font's `/BaseFont`.
    pub fn base_font(&self) -> &'static str {
        match self {
            Self::Courier => "Courier",
            Self::CourierBold => "Courier-Bold",
            Self::CourierOblique => "Courier-Oblique",
            Self::CourierBoldOblique => "Courier-BoldOblique",
        }
    }

    /// Parse a face from its PostScript or kebab-case name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().replace('_', "-").as_str() {
            "courier" => Some(Self::Courier),
            "courier-bold" => Some(Self::CourierBold),
            "courier-oblique" => Some(Self::CourierOblique),
            "courier-boldoblique" | "courier-bold-oblique" => Some(Self::CourierBoldOblique),
            _ => None,
        }
    }
}

/// Unit of text placed by the overlay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// One text draw per LINE block.
    #[default]
    Line,
    /// One text draw per WORD block under each LINE.
    Word,
}

/// Per-document composition summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositionStats {
    pub pages: usize,
    pub text_draws: usize,
    pub skipped_lines: usize,
    /// Overlay characters replaced by `?` (no WinAnsi code).
    pub replaced_chars: usize,
}
