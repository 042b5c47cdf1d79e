// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page compositor: rasterizes each source page, plans its invisible text
// overlay from the resolved OCR lines, and assembles the searchable PDF.

use rayon::prelude::*;
use scanlayer_core::error::Result;
use scanlayer_core::{CompositionStats, CompositorConfig};
use tracing::{debug, info, instrument};

use super::font::FontMetrics;
use super::overlay::{OverlayPlan, overlay_operations, plan_overlay};
use crate::blocks::BlockResolver;
use crate::image::EncodedImage;
use crate::pdf::writer::{EncodedPage, FONT_RESOURCE, OutputDocument};
use crate::raster::{PageImage, PageRasterizer};

/// A rasterized page together with its overlay plan.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub image: PageImage,
    pub overlay: OverlayPlan,
}

/// The finished searchable PDF.
#[derive(Debug, Clone)]
pub struct ComposedDocument {
    pub bytes: Vec<u8>,
    pub stats: CompositionStats,
}

/// Drives one document through rasterization, overlay planning, and assembly.
///
/// The resolver must be fully built before a compositor exists; both it and
/// the rasterizer are only read from here on.
pub struct Compositor<'a, R: PageRasterizer + ?Sized> {
    rasterizer: &'a R,
    resolver: &'a BlockResolver,
    config: CompositorConfig,
    metrics: FontMetrics,
}

impl<'a, R: PageRasterizer + ?Sized> Compositor<'a, R> {
    pub fn new(rasterizer: &'a R, resolver: &'a BlockResolver, config: &CompositorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            rasterizer,
            resolver,
            config: config.clone(),
            metrics: FontMetrics::for_font(config.font),
        })
    }

    pub fn config(&self) -> &CompositorConfig {
        &self.config
    }

    /// Rasterize the page at 0-based `page_index` and position the text of
    /// OCR page `page_index + 1` over it.
    ///
    /// The overlay is laid out in raster pixels, which become the output
    /// page's user units.
    #[instrument(skip(self))]
    pub fn render_page(&self, page_index: usize) -> Result<RenderedPage> {
        let image = self.rasterizer.rasterize(page_index, self.config.dpi)?;
        let lines = self
            .resolver
            .text_on_page(image.page_number, self.config.granularity);
        let overlay = plan_overlay(
            lines,
            image.width() as f32,
            image.height() as f32,
            &self.metrics,
        );

        debug!(
            page = image.page_number,
            draws = overlay.placements.len(),
            skipped = overlay.skipped,
            "Page overlay planned"
        );
        Ok(RenderedPage { image, overlay })
    }

    /// Encode a rendered page into its final image and content operations.
    pub fn encode_page(&self, page: &RenderedPage) -> Result<EncodedPage> {
        let image = EncodedImage::encode(
            &page.image.image,
            self.config.image_encoding,
            self.config.jpeg_quality,
        )?;
        Ok(EncodedPage {
            page_number: page.image.page_number,
            image,
            overlay: overlay_operations(&page.overlay, FONT_RESOURCE, self.config.debug),
        })
    }

    fn prepare_page(&self, page_index: usize) -> Result<(EncodedPage, CompositionStats)> {
        let rendered = self.render_page(page_index)?;
        let stats = CompositionStats {
            pages: 1,
            text_draws: rendered.overlay.placements.len(),
            skipped_lines: rendered.overlay.skipped,
            replaced_chars: rendered.overlay.replaced_chars,
        };
        Ok((self.encode_page(&rendered)?, stats))
    }

    /// Composite every source page, in page order, into one searchable PDF.
    ///
    /// Any page failure aborts the document; nothing is returned but the
    /// error.
    #[instrument(skip(self), fields(pages = self.rasterizer.page_count(), parallel = self.config.parallel))]
    pub fn compose(&self) -> Result<ComposedDocument> {
        let page_count = self.rasterizer.page_count();
        let mut output = OutputDocument::new(self.config.font);
        let mut stats = CompositionStats::default();

        let mut emit = |page: &EncodedPage, page_stats: CompositionStats| -> Result<()> {
            output.emit_page(page)?;
            stats.pages += page_stats.pages;
            stats.text_draws += page_stats.text_draws;
            stats.skipped_lines += page_stats.skipped_lines;
            stats.replaced_chars += page_stats.replaced_chars;
            Ok(())
        };

        if self.config.parallel {
            // Pages are independent; collect keeps page-index order.
            let prepared = (0..page_count)
                .into_par_iter()
                .map(|index| self.prepare_page(index))
                .collect::<Result<Vec<_>>>()?;
            for (page, page_stats) in &prepared {
                emit(page, *page_stats)?;
            }
        } else {
            for index in 0..page_count {
                let (page, page_stats) = self.prepare_page(index)?;
                emit(&page, page_stats)?;
            }
        }

        let bytes = output.save_to_bytes()?;
        info!(
            pages = stats.pages,
            text_draws = stats.text_draws,
            skipped_lines = stats.skipped_lines,
            replaced_chars = stats.replaced_chars,
            "Document composed"
        );
        Ok(ComposedDocument { bytes, stats })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::pdf::SourcePdf;
    use crate::raster::EmbeddedImageRasterizer;
    use image::{Rgb, RgbImage};
    use lopdf::content::Operation;
    use lopdf::{Document, Object};
    use scanlayer_core::error::ScanLayerError;
    use scanlayer_core::{Granularity, ImageEncoding};

    fn config() -> CompositorConfig {
        CompositorConfig {
            dpi: 72,
            ..CompositorConfig::default()
        }
    }

    fn compose(pdf: &[u8], blocks: serde_json::Value, config: &CompositorConfig) -> Result<ComposedDocument> {
        let resolver = BlockResolver::from_json_bytes(blocks.to_string().as_bytes())?;
        let source = SourcePdf::from_bytes(pdf)?;
        let rasterizer = EmbeddedImageRasterizer::new(&source);
        Compositor::new(&rasterizer, &resolver, config)?.compose()
    }

    fn page_operations(bytes: &[u8], page_number: u32) -> Vec<Operation> {
        let doc = Document::load_mem(bytes).unwrap();
        let page_id = doc.get_pages()[&page_number];
        doc.get_and_decode_page_content(page_id).unwrap().operations
    }

    fn operands(ops: &[Operation], operator: &str) -> Vec<Vec<f32>> {
        ops.iter()
            .filter(|op| op.operator == operator)
            .map(|op| op.operands.iter().filter_map(|o| o.as_float().ok()).collect())
            .collect()
    }

    #[test]
    fn output_page_count_matches_source() {
        let pdf = fixtures::scanned_pdf(&[(100.0, 150.0), (100.0, 150.0), (100.0, 150.0)]);
        let blocks = fixtures::blocks_for_pages(&[(1, &["first page"]), (3, &["third page"])]);
        let composed = compose(&pdf, blocks, &config()).unwrap();

        let doc = Document::load_mem(&composed.bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 3);
        assert_eq!(composed.stats.pages, 3);
        assert_eq!(composed.stats.text_draws, 2);
    }

    #[test]
    fn page_without_lines_has_image_and_no_text() {
        let pdf = fixtures::scanned_pdf(&[(100.0, 150.0), (100.0, 150.0)]);
        let blocks = fixtures::blocks_for_pages(&[(1, &["only page one"])]);
        let composed = compose(&pdf, blocks, &config()).unwrap();

        let ops = page_operations(&composed.bytes, 2);
        assert!(ops.iter().any(|op| op.operator == "Do"));
        assert!(ops.iter().all(|op| op.operator != "BT"));
    }

    #[test]
    fn example_scenario_at_300_dpi() {
        let pdf = fixtures::scanned_pdf(&[(200.0, 300.0)]);
        let config = CompositorConfig::default();
        let composed = compose(&pdf, fixtures::employment_application_blocks(), &config).unwrap();

        let doc = Document::load_mem(&composed.bytes).unwrap();
        let page_id = doc.get_pages()[&1];
        let media_box: Vec<f32> = doc
            .get_dictionary(page_id)
            .unwrap()
            .get(b"MediaBox")
            .unwrap()
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_float().unwrap())
            .collect();
        assert_eq!(media_box, [0.0, 0.0, 833.0, 1250.0]);

        let ops = page_operations(&composed.bytes, 1);
        assert_eq!(ops.iter().filter(|op| op.operator == "BT").count(), 1);

        let td = &operands(&ops, "Td")[0];
        assert!((td[0] - 0.35 * 833.0).abs() < 0.01, "x offset {}", td[0]);

        let size = operands(&ops, "Tf")[0][0];
        let rendered_width = size * 0.6 * "Employment Application".len() as f32;
        assert!((rendered_width - 0.29 * 833.0).abs() <= 1.0, "rendered width {rendered_width}");

        let tr = &operands(&ops, "Tr")[0];
        assert_eq!(tr, &[3.0]);
    }

    #[test]
    fn line_at_top_of_box_lands_at_top_of_page() {
        let pdf = fixtures::scanned_pdf(&[(100.0, 200.0)]);
        let blocks = fixtures::single_line_blocks("Heading", 0.1, 0.0, 0.8, 0.1);
        let composed = compose(&pdf, blocks, &config()).unwrap();

        let ops = page_operations(&composed.bytes, 1);
        let y = operands(&ops, "Td")[0][1];
        let size = operands(&ops, "Tf")[0][0];
        let line_height = 1.055 * size;
        assert!(y > 100.0, "baseline {y} is in the lower half");
        assert!(200.0 - y <= line_height + 0.01, "baseline {y} is more than a line below the top");
    }

    #[test]
    fn parallel_output_is_identical_to_sequential() {
        let pdf = fixtures::scanned_pdf(&[(80.0, 80.0), (90.0, 60.0), (60.0, 90.0), (70.0, 70.0)]);
        let blocks = fixtures::blocks_for_pages(&[(1, &["a", "b"]), (2, &["c"]), (4, &["d", "e", "f"])]);

        let sequential = compose(&pdf, blocks.clone(), &config()).unwrap();
        let parallel = compose(
            &pdf,
            blocks,
            &CompositorConfig {
                parallel: true,
                ..config()
            },
        )
        .unwrap();

        assert_eq!(sequential.stats, parallel.stats);
        assert_eq!(sequential.bytes, parallel.bytes);
    }

    #[test]
    fn word_granularity_places_each_word() {
        let pdf = fixtures::scanned_pdf(&[(200.0, 300.0)]);
        let config = CompositorConfig {
            granularity: Granularity::Word,
            ..config()
        };
        let composed = compose(&pdf, fixtures::employment_application_blocks(), &config).unwrap();
        assert_eq!(composed.stats.text_draws, 2);
    }

    #[test]
    fn blank_lines_are_counted_as_skipped() {
        let pdf = fixtures::scanned_pdf(&[(100.0, 100.0)]);
        let blocks = fixtures::blocks_for_pages(&[(1, &["kept", "   "])]);
        let composed = compose(&pdf, blocks, &config()).unwrap();
        assert_eq!(composed.stats.text_draws, 1);
        assert_eq!(composed.stats.skipped_lines, 1);
    }

    #[test]
    fn unencodable_characters_are_counted() {
        let pdf = fixtures::scanned_pdf(&[(100.0, 100.0)]);
        let blocks = fixtures::blocks_for_pages(&[(1, &["Città", "東京 Tower"])]);
        let composed = compose(&pdf, blocks, &config()).unwrap();
        assert_eq!(composed.stats.text_draws, 2);
        assert_eq!(composed.stats.replaced_chars, 2);
    }

    #[test]
    fn debug_overlay_is_visible() {
        let pdf = fixtures::scanned_pdf(&[(100.0, 100.0)]);
        let mut config = config();
        config.debug.visible_text = true;
        config.debug.draw_boxes = true;
        let composed = compose(&pdf, fixtures::blocks_for_pages(&[(1, &["shown"])]), &config).unwrap();

        let ops = page_operations(&composed.bytes, 1);
        assert_eq!(operands(&ops, "Tr")[0], [0.0]);
        assert_eq!(ops.iter().filter(|op| op.operator == "re").count(), 1);
    }

    #[test]
    fn lossless_encoding_is_honoured() {
        let pdf = fixtures::scanned_pdf(&[(50.0, 50.0)]);
        let config = CompositorConfig {
            image_encoding: ImageEncoding::Lossless,
            ..config()
        };
        let composed = compose(&pdf, fixtures::blocks_for_pages(&[]), &config).unwrap();
        let doc = Document::load_mem(&composed.bytes).unwrap();
        let has_flate_image = doc.objects.values().any(|object| match object {
            Object::Stream(stream) => {
                stream.dict.get(b"Subtype").and_then(Object::as_name).ok() == Some(b"Image".as_slice())
                    && stream.dict.get(b"Filter").and_then(Object::as_name).ok() == Some(b"FlateDecode".as_slice())
            }
            _ => false,
        });
        assert!(has_flate_image);
    }

    #[test]
    fn invalid_config_is_rejected_before_work() {
        let resolver = BlockResolver::from_json_bytes(b"[]").unwrap();
        let rasterizer = FailingRasterizer { fail_on: 0 };
        let config = CompositorConfig {
            dpi: 5,
            ..config()
        };
        assert!(matches!(
            Compositor::new(&rasterizer, &resolver, &config),
            Err(ScanLayerError::InvalidConfig(_))
        ));
    }

    /// Renders blank pages, except `fail_on` which is corrupt.
    struct FailingRasterizer {
        fail_on: usize,
    }

    impl PageRasterizer for FailingRasterizer {
        fn page_count(&self) -> usize {
            3
        }

        fn rasterize(&self, page_index: usize, _dpi: u32) -> Result<PageImage> {
            if page_index == self.fail_on {
                return Err(ScanLayerError::render(page_index as u32 + 1, "corrupt page"));
            }
            Ok(PageImage {
                page_number: page_index as u32 + 1,
                image: RgbImage::from_pixel(10, 10, Rgb([255, 255, 255])),
            })
        }
    }

    #[test]
    fn render_failure_aborts_the_document() {
        let resolver = BlockResolver::from_json_bytes(b"[]").unwrap();
        for parallel in [false, true] {
            let rasterizer = FailingRasterizer { fail_on: 1 };
            let config = CompositorConfig { parallel, ..config() };
            let err = Compositor::new(&rasterizer, &resolver, &config)
                .unwrap()
                .compose()
                .unwrap_err();
            assert!(matches!(err, ScanLayerError::Render { page: 2, .. }), "parallel={parallel}: {err}");
        }
    }

    #[test]
    fn render_page_uses_lines_of_the_next_page_number() {
        let resolver = BlockResolver::from_json_bytes(
            fixtures::blocks_for_pages(&[(2, &["second"])]).to_string().as_bytes(),
        )
        .unwrap();
        let rasterizer = FailingRasterizer { fail_on: 99 };
        let compositor = Compositor::new(&rasterizer, &resolver, &config()).unwrap();

        assert!(compositor.render_page(0).unwrap().overlay.is_empty());
        let rendered = compositor.render_page(1).unwrap();
        assert_eq!(rendered.overlay.placements[0].text, "second");
        assert_eq!(rendered.image.page_number, 2);
    }
}
