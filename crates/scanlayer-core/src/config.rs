// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Compositor configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScanLayerError};
use crate::{Granularity, ImageEncoding, OverlayFont};

/// Accepted rasterization resolutions, in dots per inch.
pub const DPI_RANGE: std::ops::RangeInclusive<u32> = 36..=1200;

/// Diagnostics that make the overlay visible.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugOverlay {
    /// Fill overlay text in red instead of drawing it invisibly.
    pub visible_text: bool,
    /// Stroke a red rectangle around every placed box.
    pub draw_boxes: bool,
}

/// Settings for one compositor run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositorConfig {
    /// Rasterization resolution (default 300).
    pub dpi: u32,
    /// Storage of the page raster in the output PDF.
    pub image_encoding: ImageEncoding,
    /// JPEG quality (1-100), used when `image_encoding` is lossy.
    pub jpeg_quality: u8,
    /// Fixed-width face used uniformly for all overlay text.
    pub font: OverlayFont,
    /// Place text per LINE (default) or per WORD.
    pub granularity: Granularity,
    /// Rasterize and plan pages on a worker pool.
    pub parallel: bool,
    pub debug: DebugOverlay,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            dpi: 300,
            image_encoding: ImageEncoding::Lossy,
            jpeg_quality: 90,
            font: OverlayFont::Courier,
            granularity: Granularity::Line,
            parallel: false,
            debug: DebugOverlay::default(),
        }
    }
}

impl CompositorConfig {
    /// Parse a JSON configuration; missing keys take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&raw)
    }

    /// Reject settings the compositor cannot honour.
    pub fn validate(&self) -> Result<()> {
        if !DPI_RANGE.contains(&self.dpi) {
            return Err(ScanLayerError::InvalidConfig(format!(
                "dpi must be within {}..={}, got {}",
                DPI_RANGE.start(),
                DPI_RANGE.end(),
                self.dpi
            )));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ScanLayerError::InvalidConfig(format!(
                "jpeg_quality must be within 1..=100, got {}",
                self.jpeg_quality
            )));
        }
        Ok(())
    }

    /// PDF user units per source point at this resolution.
    pub fn scale(&self) -> f32 {
        self.dpi as f32 / 72.0
    }
}
