// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Rasterization: turns source PDF pages into RGB pixel buffers.
//
// The built-in `EmbeddedImageRasterizer` composites the scanned images each
// page draws. With the `pdfium` feature, `PdfiumRasterizer` renders pages
// with full fidelity (vector art, text, annotations).

pub mod embedded;
#[cfg(feature = "pdfium")]
pub mod pdfium;

use image::RgbImage;
use scanlayer_core::error::{Result, ScanLayerError};

pub use embedded::EmbeddedImageRasterizer;
#[cfg(feature = "pdfium")]
pub use pdfium::PdfiumRasterizer;

/// Largest raster a single page may allocate: a 60 x 60 inch page at 300 dpi
/// still fits.
pub const MAX_RASTER_PIXELS: u64 = 330_000_000;

/// Pixel size of a `points`-long page edge at `dpi`, never less than one pixel.
pub fn pixels_for(points: f32, dpi: u32) -> u32 {
    ((f64::from(points) * f64::from(dpi) / 72.0).round() as u32).max(1)
}

/// Raster dimensions of a `width` x `height` point page at `dpi`.
///
/// Pages whose raster would exceed [`MAX_RASTER_PIXELS`] (or whose size is
/// not finite) are a render error for `page_number` rather than an
/// allocation failure.
pub fn raster_size(page_number: u32, width: f32, height: f32, dpi: u32) -> Result<(u32, u32)> {
    let edge = |points: f32| (f64::from(points) * f64::from(dpi) / 72.0).round().max(1.0);
    let (w, h) = (edge(width), edge(height));
    if !(w.is_finite() && h.is_finite()) || w * h > MAX_RASTER_PIXELS as f64 {
        return Err(ScanLayerError::render(
            page_number,
            format!(
                "a {width} x {height} pt page at {dpi} dpi needs a {w} x {h} pixel raster, over the {MAX_RASTER_PIXELS} pixel limit"
            ),
        ));
    }
    Ok((pixels_for(width, dpi), pixels_for(height, dpi)))
}

/// One rasterized page.
#[derive(Debug, Clone)]
pub struct PageImage {
    /// 1-based page number.
    pub page_number: u32,
    pub image: RgbImage,
}

impl PageImage {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Renders source pages to RGB rasters.
///
/// Implementations are shared read-only across page workers, so rendering
/// takes `&self`.
pub trait PageRasterizer: Send + Sync {
    fn page_count(&self) -> usize;

    /// Render the page at 0-based `page_index` at `dpi`.
    ///
    /// Any failure is a [`ScanLayerError::Render`](scanlayer_core::ScanLayerError::Render)
    /// for that page.
    fn rasterize(&self, page_index: usize, dpi: u32) -> Result<PageImage>;
}
