// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// scanlayer-document: turns an image-only scanned PDF plus its OCR block graph
// into a searchable PDF.
//
// The block graph is resolved into per-page text lines, every source page is
// rasterized, and each output page carries the raster image with the recognised
// text drawn invisibly on top, scaled to the OCR bounding boxes.

pub mod blocks;
pub mod compose;
pub mod image;
pub mod pdf;
pub mod raster;

#[cfg(test)]
pub(crate) mod fixtures;

pub use blocks::{BlockGraph, BlockResolver};
pub use compose::{ComposedDocument, Compositor};
pub use pdf::SourcePdf;
pub use raster::{EmbeddedImageRasterizer, PageImage, PageRasterizer};

#[cfg(feature = "pdfium")]
pub use raster::pdfium::PdfiumRasterizer;

use scanlayer_core::CompositorConfig;
use scanlayer_core::error::Result;
use tracing::instrument;

/// Build a searchable PDF from `pdf_bytes` and the OCR block graph JSON in
/// `blocks_json`, rasterizing with the built-in embedded-image rasterizer.
///
/// Pages that draw anything but images fail with a render error; render those
/// documents through a [`Compositor`] over the pdfium rasterizer instead.
///
/// The block graph is parsed and resolved completely before any page is
/// touched, so malformed OCR input fails fast.
#[instrument(skip_all, fields(pdf_len = pdf_bytes.len(), blocks_len = blocks_json.len()))]
pub fn make_searchable(
    pdf_bytes: &[u8],
    blocks_json: &[u8],
    config: &CompositorConfig,
) -> Result<ComposedDocument> {
    config.validate()?;
    let resolver = BlockResolver::from_json_bytes(blocks_json)?;
    let source = SourcePdf::from_bytes(pdf_bytes)?;
    let rasterizer = EmbeddedImageRasterizer::new(&source);
    Compositor::new(&rasterizer, &resolver, config)?.compose()
}
