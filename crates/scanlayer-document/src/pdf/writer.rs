// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Output document: assembles the searchable PDF page by page with `lopdf`.
//
// Every page is a full-bleed image XObject whose MediaBox equals the raster's
// pixel dimensions, followed in the same content stream by the invisible text
// overlay. Pages are appended strictly in the order `emit_page` is called.

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use scanlayer_core::OverlayFont;
use scanlayer_core::error::{Result, ScanLayerError};
use tracing::{debug, info, instrument};

use crate::image::{EncodedImage, ImageFilter};

/// Resource name of the overlay font on every page.
pub const FONT_RESOURCE: &str = "F1";
/// Resource name of the page raster on every page.
pub const IMAGE_RESOURCE: &str = "Im0";

/// A page ready to be appended: its encoded raster plus the overlay's
/// content-stream operations.
#[derive(Debug, Clone)]
pub struct EncodedPage {
    /// 1-based page number, used only for diagnostics.
    pub page_number: u32,
    pub image: EncodedImage,
    pub overlay: Vec<Operation>,
}

impl EncodedPage {
    /// The page content: draw the raster over the full page, then the overlay.
    pub fn content(&self) -> Result<Vec<u8>> {
        let (w, h) = (self.image.width as i64, self.image.height as i64);
        let mut operations = vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![w.into(), 0.into(), 0.into(), h.into(), 0.into(), 0.into()],
            ),
            Operation::new("Do", vec![Object::Name(IMAGE_RESOURCE.as_bytes().to_vec())]),
            Operation::new("Q", vec![]),
        ];
        operations.extend(self.overlay.iter().cloned());

        Content { operations }.encode().map_err(|err| {
            ScanLayerError::PdfError(format!(
                "failed to encode content stream for page {}: {err}",
                self.page_number
            ))
        })
    }
}

/// The searchable PDF under construction.
pub struct OutputDocument {
    document: Document,
    pages_id: ObjectId,
    font_id: ObjectId,
    kids: Vec<Object>,
}

impl OutputDocument {
    /// Start an empty document whose overlay text uses `font`.
    pub fn new(font: OverlayFont) -> Self {
        let mut document = Document::with_version("1.5");
        let pages_id = document.new_object_id();
        let font_id = document.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Font".to_vec())),
            ("Subtype", Object::Name(b"Type1".to_vec())),
            ("BaseFont", Object::Name(font.base_font().as_bytes().to_vec())),
            ("Encoding", Object::Name(b"WinAnsiEncoding".to_vec())),
        ]));

        Self {
            document,
            pages_id,
            font_id,
            kids: Vec::new(),
        }
    }

    pub fn page_count(&self) -> usize {
        self.kids.len()
    }

    /// Append `page` as the next page of the document.
    #[instrument(skip_all, fields(page = page.page_number))]
    pub fn emit_page(&mut self, page: &EncodedPage) -> Result<()> {
        let content = page.content()?;
        let image_id = self.document.add_object(image_stream(&page.image));
        let content_id = self
            .document
            .add_object(Stream::new(Dictionary::new(), content));

        let resources = Dictionary::from_iter([
            (
                "Font",
                Object::Dictionary(Dictionary::from_iter([(
                    FONT_RESOURCE,
                    Object::Reference(self.font_id),
                )])),
            ),
            (
                "XObject",
                Object::Dictionary(Dictionary::from_iter([(
                    IMAGE_RESOURCE,
                    Object::Reference(image_id),
                )])),
            ),
        ]);

        let page_id = self.document.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(self.pages_id)),
            (
                "MediaBox",
                Object::Array(vec![
                    0.into(),
                    0.into(),
                    (page.image.width as i64).into(),
                    (page.image.height as i64).into(),
                ]),
            ),
            ("Resources", Object::Dictionary(resources)),
            ("Contents", Object::Reference(content_id)),
        ]));
        self.kids.push(Object::Reference(page_id));

        debug!(
            width = page.image.width,
            height = page.image.height,
            overlay_ops = page.overlay.len(),
            "Page emitted"
        );
        Ok(())
    }

    /// Close the page tree, compress, and serialise.
    #[instrument(skip_all, fields(pages = self.kids.len()))]
    pub fn save_to_bytes(mut self) -> Result<Vec<u8>> {
        if self.kids.is_empty() {
            return Err(ScanLayerError::PdfError(
                "refusing to write a document with no pages".into(),
            ));
        }

        let count = self.kids.len() as i64;
        self.document.objects.insert(
            self.pages_id,
            Object::Dictionary(Dictionary::from_iter([
                ("Type", Object::Name(b"Pages".to_vec())),
                ("Kids", Object::Array(self.kids)),
                ("Count", Object::Integer(count)),
            ])),
        );

        let catalog_id = self.document.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(self.pages_id)),
        ]));
        self.document.trailer.set("Root", Object::Reference(catalog_id));
        self.document.compress();

        let mut output = Vec::new();
        self.document
            .save_to(&mut output)
            .map_err(|err| ScanLayerError::PdfError(format!("failed to serialise PDF: {err}")))?;

        info!(pages = count, bytes = output.len(), "Searchable PDF written");
        Ok(output)
    }
}

/// Image XObject for a page raster.
///
/// JPEG data is stored verbatim and excluded from compression; raw samples are
/// left unfiltered so that `Document::compress` deflates them.
fn image_stream(image: &EncodedImage) -> Stream {
    let mut dict = Dictionary::from_iter([
        ("Type", Object::Name(b"XObject".to_vec())),
        ("Subtype", Object::Name(b"Image".to_vec())),
        ("Width", Object::Integer(image.width as i64)),
        ("Height", Object::Integer(image.height as i64)),
        ("ColorSpace", Object::Name(b"DeviceRGB".to_vec())),
        ("BitsPerComponent", Object::Integer(8)),
    ]);

    match image.filter {
        ImageFilter::Dct => {
            dict.set("Filter", Object::Name(b"DCTDecode".to_vec()));
            Stream::new(dict, image.data.clone()).with_compression(false)
        }
        ImageFilter::Raw => Stream::new(dict, image.data.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use scanlayer_core::ImageEncoding;

    fn page(width: u32, height: u32, encoding: ImageEncoding, overlay: Vec<Operation>) -> EncodedPage {
        let raster = RgbImage::from_pixel(width, height, Rgb([250, 250, 250]));
        EncodedPage {
            page_number: 1,
            image: EncodedImage::encode(&raster, encoding, 80).unwrap(),
            overlay,
        }
    }

    fn image_dict(doc: &Document, page_id: ObjectId) -> Dictionary {
        let resources = doc.get_dictionary(page_id).unwrap().get(b"Resources").unwrap();
        let xobjects = resources.as_dict().unwrap().get(b"XObject").unwrap().as_dict().unwrap();
        let image_id = xobjects.get(b"Im0").unwrap().as_reference().unwrap();
        doc.get_object(image_id).unwrap().as_stream().unwrap().dict.clone()
    }

    #[test]
    fn media_box_matches_raster_pixels() {
        let mut output = OutputDocument::new(OverlayFont::Courier);
        output.emit_page(&page(120, 80, ImageEncoding::Lossy, vec![])).unwrap();
        let bytes = output.save_to_bytes().unwrap();

        let doc = Document::load_mem(&bytes).unwrap();
        let pages = doc.get_pages();
        assert_eq!(pages.len(), 1);
        let media_box = doc
            .get_dictionary(pages[&1])
            .unwrap()
            .get(b"MediaBox")
            .unwrap()
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_i64().unwrap())
            .collect::<Vec<_>>();
        assert_eq!(media_box, [0, 0, 120, 80]);
    }

    #[test]
    fn lossy_pages_embed_dct_images() {
        let mut output = OutputDocument::new(OverlayFont::Courier);
        output.emit_page(&page(64, 64, ImageEncoding::Lossy, vec![])).unwrap();
        let doc = Document::load_mem(&output.save_to_bytes().unwrap()).unwrap();

        let dict = image_dict(&doc, doc.get_pages()[&1]);
        assert_eq!(dict.get(b"Filter").unwrap().as_name().unwrap(), b"DCTDecode");
        assert_eq!(dict.get(b"Width").unwrap().as_i64().unwrap(), 64);
    }

    #[test]
    fn lossless_pages_embed_deflated_rgb() {
        let mut output = OutputDocument::new(OverlayFont::Courier);
        output.emit_page(&page(64, 64, ImageEncoding::Lossless, vec![])).unwrap();
        let doc = Document::load_mem(&output.save_to_bytes().unwrap()).unwrap();

        let dict = image_dict(&doc, doc.get_pages()[&1]);
        assert_eq!(dict.get(b"Filter").unwrap().as_name().unwrap(), b"FlateDecode");
        assert_eq!(dict.get(b"ColorSpace").unwrap().as_name().unwrap(), b"DeviceRGB");
    }

    #[test]
    fn image_is_drawn_before_overlay_text() {
        let overlay = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![Object::Name(b"F1".to_vec()), Object::Real(12.0)]),
            Operation::new("Tr", vec![Object::Integer(3)]),
            Operation::new("Td", vec![Object::Real(10.0), Object::Real(20.0)]),
            Operation::new("Tj", vec![Object::string_literal("hidden")]),
            Operation::new("ET", vec![]),
        ];
        let mut output = OutputDocument::new(OverlayFont::Courier);
        output.emit_page(&page(50, 40, ImageEncoding::Lossy, overlay)).unwrap();
        let doc = Document::load_mem(&output.save_to_bytes().unwrap()).unwrap();

        let content = doc.get_and_decode_page_content(doc.get_pages()[&1]).unwrap();
        let ops: Vec<&str> = content.operations.iter().map(|op| op.operator.as_str()).collect();
        let draw = ops.iter().position(|op| *op == "Do").unwrap();
        let text = ops.iter().position(|op| *op == "BT").unwrap();
        assert!(draw < text, "image must be painted before the text layer: {ops:?}");
        assert_eq!(&ops[..4], ["q", "cm", "Do", "Q"]);
    }

    #[test]
    fn pages_keep_emit_order() {
        let mut output = OutputDocument::new(OverlayFont::CourierBold);
        for width in [10, 20, 30] {
            output.emit_page(&page(width, 10, ImageEncoding::Lossless, vec![])).unwrap();
        }
        assert_eq!(output.page_count(), 3);
        let doc = Document::load_mem(&output.save_to_bytes().unwrap()).unwrap();

        let widths: Vec<i64> = doc
            .get_pages()
            .values()
            .map(|&id| image_dict(&doc, id).get(b"Width").unwrap().as_i64().unwrap())
            .collect();
        assert_eq!(widths, [10, 20, 30]);
    }

    #[test]
    fn font_is_a_win_ansi_courier() {
        let mut output = OutputDocument::new(OverlayFont::CourierOblique);
        output.emit_page(&page(10, 10, ImageEncoding::Lossy, vec![])).unwrap();
        let doc = Document::load_mem(&output.save_to_bytes().unwrap()).unwrap();

        let resources = doc.get_dictionary(doc.get_pages()[&1]).unwrap().get(b"Resources").unwrap();
        let fonts = resources.as_dict().unwrap().get(b"Font").unwrap().as_dict().unwrap();
        let font = doc.get_dictionary(fonts.get(b"F1").unwrap().as_reference().unwrap()).unwrap();
        assert_eq!(font.get(b"BaseFont").unwrap().as_name().unwrap(), b"Courier-Oblique");
        assert_eq!(font.get(b"Encoding").unwrap().as_name().unwrap(), b"WinAnsiEncoding");
    }

    #[test]
    fn empty_document_is_not_written() {
        let output = OutputDocument::new(OverlayFont::Courier);
        assert!(matches!(output.save_to_bytes(), Err(ScanLayerError::PdfError(_))));
    }
}
