// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Full-fidelity rasterization through the pdfium library.

use pdfium_render::prelude::*;
use scanlayer_core::error::{Result, ScanLayerError};
use tracing::{debug, info, instrument};

use super::{PageImage, PageRasterizer, raster_size};

/// Renders pages with pdfium: vector art, fonts, and annotations included.
///
/// pdfium documents borrow the library handle and are not shareable across
/// threads, so each call reloads the document from the retained bytes.
pub struct PdfiumRasterizer {
    pdfium: Pdfium,
    bytes: Vec<u8>,
    page_count: usize,
}

impl PdfiumRasterizer {
    /// Bind pdfium (next to the executable first, then system-wide) and open
    /// `bytes`.
    #[instrument(skip_all, fields(bytes_len = bytes.len()))]
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library())
            .map_err(|err| {
                ScanLayerError::UnsupportedFeature(format!("pdfium library unavailable: {err}"))
            })?;
        let pdfium = Pdfium::new(bindings);

        let page_count = {
            let document = pdfium
                .load_pdf_from_byte_slice(&bytes, None)
                .map_err(|err| ScanLayerError::UnsupportedFeature(format!("pdfium failed to load PDF: {err}")))?;
            document.pages().len() as usize
        };
        if page_count == 0 {
            return Err(ScanLayerError::UnsupportedFeature("document has no pages".into()));
        }

        info!(pages = page_count, "pdfium rasterizer ready");
        Ok(Self {
            pdfium,
            bytes,
            page_count,
        })
    }
}

impl PageRasterizer for PdfiumRasterizer {
    fn page_count(&self) -> usize {
        self.page_count
    }

    #[instrument(skip(self))]
    fn rasterize(&self, page_index: usize, dpi: u32) -> Result<PageImage> {
        let page_number = page_index as u32 + 1;
        let fail = |reason: String| ScanLayerError::render(page_number, reason);

        let document = self
            .pdfium
            .load_pdf_from_byte_slice(&self.bytes, None)
            .map_err(|err| fail(format!("pdfium failed to load PDF: {err}")))?;
        let index = page_index
            .try_into()
            .map_err(|_| fail("page index exceeds pdfium's range".into()))?;
        let page = document
            .pages()
            .get(index)
            .map_err(|err| fail(format!("pdfium has no such page: {err}")))?;

        // pdfium reports the displayed size, /Rotate already applied.
        let (width, height) = raster_size(page_number, page.width().value, page.height().value, dpi)?;
        let bitmap = page
            .render_with_config(
                &PdfRenderConfig::new()
                    .set_target_width(width as i32)
                    .set_target_height(height as i32)
                    .render_form_data(true)
                    .render_annotations(true),
            )
            .map_err(|err| fail(format!("pdfium render failed: {err}")))?;

        let image = bitmap.as_image().to_rgb8();
        debug!(page = page_number, width = image.width(), height = image.height(), "Page rendered by pdfium");
        Ok(PageImage { page_number, image })
    }
}
