// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Test fixtures: synthetic scanned PDFs and OCR block documents.

use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, Stream};
use serde_json::{Value, json};

/// Sampled image data for an image XObject.
#[derive(Debug, Clone)]
pub struct FixtureImage {
    pub width: i64,
    pub height: i64,
    pub color_space: Object,
    pub bits_per_component: i64,
    pub data: Vec<u8>,
    pub decode: Option<[i64; 2]>,
}

impl FixtureImage {
    pub fn rgb(width: i64, height: i64, color: [u8; 3]) -> Self {
        Self {
            width,
            height,
            color_space: Object::Name(b"DeviceRGB".to_vec()),
            bits_per_component: 8,
            data: color.repeat((width * height) as usize),
            decode: None,
        }
    }

    pub fn gray(width: i64, height: i64, level: u8) -> Self {
        Self {
            width,
            height,
            color_space: Object::Name(b"DeviceGray".to_vec()),
            bits_per_component: 8,
            data: vec![level; (width * height) as usize],
            decode: None,
        }
    }

    /// Uncompressed image XObject stream.
    pub fn stream(&self) -> Stream {
        let mut dict = Dictionary::from_iter([
            ("Type", Object::Name(b"XObject".to_vec())),
            ("Subtype", Object::Name(b"Image".to_vec())),
            ("Width", Object::Integer(self.width)),
            ("Height", Object::Integer(self.height)),
            ("ColorSpace", self.color_space.clone()),
            ("BitsPerComponent", Object::Integer(self.bits_per_component)),
        ]);
        if let Some([lo, hi]) = self.decode {
            dict.set("Decode", Object::Array(vec![Object::Integer(lo), Object::Integer(hi)]));
        }
        Stream::new(dict, self.data.clone()).with_compression(false)
    }
}

/// JPEG image XObject stream of a solid colour.
pub fn jpeg_stream(width: u32, height: u32, color: [u8; 3]) -> Stream {
    let image = RgbImage::from_pixel(width, height, Rgb(color));
    let mut data = Vec::new();
    image
        .write_with_encoder(JpegEncoder::new_with_quality(&mut data, 95))
        .unwrap();

    let dict = Dictionary::from_iter([
        ("Type", Object::Name(b"XObject".to_vec())),
        ("Subtype", Object::Name(b"Image".to_vec())),
        ("Width", Object::Integer(width as i64)),
        ("Height", Object::Integer(height as i64)),
        ("ColorSpace", Object::Name(b"DeviceRGB".to_vec())),
        ("BitsPerComponent", Object::Integer(8)),
        ("Filter", Object::Name(b"DCTDecode".to_vec())),
    ]);
    Stream::new(dict, data).with_compression(false)
}

/// One page of a fixture document.
pub struct FixturePage {
    pub size: (f32, f32),
    pub content: String,
    pub images: Vec<(&'static str, Stream)>,
    pub rotate: Option<i64>,
}

impl FixturePage {
    pub fn new(size: (f32, f32), content: &str, images: Vec<(&'static str, Stream)>) -> Self {
        Self {
            size,
            content: content.to_string(),
            images,
            rotate: None,
        }
    }

    /// Set the page's `/Rotate`.
    pub fn rotated(mut self, degrees: i64) -> Self {
        self.rotate = Some(degrees);
        self
    }

    /// A page entirely covered by one image, the way scanners write them.
    pub fn full_page(size: (f32, f32), image: FixtureImage) -> Self {
        let content = format!("q {} 0 0 {} 0 0 cm /Im0 Do Q", size.0, size.1);
        Self::new(size, &content, vec![("Im0", image.stream())])
    }
}

fn media_box(width: f32, height: f32) -> Object {
    Object::Array(vec![
        Object::Integer(0),
        Object::Integer(0),
        Object::Real(width),
        Object::Real(height),
    ])
}

fn add_page(doc: &mut Document, pages_id: lopdf::ObjectId, page: FixturePage, with_media_box: bool) -> Object {
    let xobjects: Dictionary = page
        .images
        .into_iter()
        .map(|(name, stream)| (name, Object::Reference(doc.add_object(stream))))
        .collect();
    let content_id = doc.add_object(Stream::new(Dictionary::new(), page.content.into_bytes()));

    let mut dict = Dictionary::from_iter([
        ("Type", Object::Name(b"Page".to_vec())),
        ("Parent", Object::Reference(pages_id)),
        ("Contents", Object::Reference(content_id)),
        (
            "Resources",
            Object::Dictionary(Dictionary::from_iter([("XObject", Object::Dictionary(xobjects))])),
        ),
    ]);
    if let Some(degrees) = page.rotate {
        dict.set("Rotate", Object::Integer(degrees));
    }
    if with_media_box {
        dict.set("MediaBox", media_box(page.size.0, page.size.1));
    }
    Object::Reference(doc.add_object(dict))
}

fn finish(mut doc: Document, pages_id: lopdf::ObjectId, mut pages: Dictionary) -> Vec<u8> {
    pages.set("Type", Object::Name(b"Pages".to_vec()));
    doc.objects.insert(pages_id, Object::Dictionary(pages));
    let catalog_id = doc.add_object(Dictionary::from_iter([
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]));
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// Assemble `pages` into a PDF.
pub fn build_pdf(pages: Vec<FixturePage>) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let kids: Vec<Object> = pages
        .into_iter()
        .map(|page| add_page(&mut doc, pages_id, page, true))
        .collect();
    let count = kids.len() as i64;
    finish(
        doc,
        pages_id,
        Dictionary::from_iter([("Kids", Object::Array(kids)), ("Count", Object::Integer(count))]),
    )
}

/// An image-only PDF with one light-grey full-page scan per `(width, height)`.
pub fn scanned_pdf(sizes: &[(f32, f32)]) -> Vec<u8> {
    build_pdf(
        sizes
            .iter()
            .map(|&size| FixturePage::full_page(size, FixtureImage::rgb(4, 4, [235, 235, 235])))
            .collect(),
    )
}

/// A one-page PDF whose MediaBox lives only on the page tree root.
pub fn pdf_with_inherited_media_box(width: f32, height: f32) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let page = FixturePage::full_page((width, height), FixtureImage::gray(2, 2, 128));
    let kid = add_page(&mut doc, pages_id, page, false);
    finish(
        doc,
        pages_id,
        Dictionary::from_iter([
            ("Kids", Object::Array(vec![kid])),
            ("Count", Object::Integer(1)),
            ("MediaBox", media_box(width, height)),
        ]),
    )
}

/// A page drawing a form XObject that squeezes a full-page image into the
/// left half of the page.
pub fn pdf_with_form_xobject(size: (f32, f32), image: FixtureImage) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let image_id = doc.add_object(image.stream());
    let form_content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    Object::Real(size.0),
                    0.into(),
                    0.into(),
                    Object::Real(size.1),
                    0.into(),
                    0.into(),
                ],
            ),
            Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
            Operation::new("Q", vec![]),
        ],
    }
    .encode()
    .unwrap();
    let form = Stream::new(
        Dictionary::from_iter([
            ("Type", Object::Name(b"XObject".to_vec())),
            ("Subtype", Object::Name(b"Form".to_vec())),
            (
                "BBox",
                Object::Array(vec![0.into(), 0.into(), Object::Real(size.0), Object::Real(size.1)]),
            ),
            (
                "Matrix",
                Object::Array(vec![
                    Object::Real(0.5),
                    0.into(),
                    0.into(),
                    1.into(),
                    0.into(),
                    0.into(),
                ]),
            ),
            (
                "Resources",
                Object::Dictionary(Dictionary::from_iter([(
                    "XObject",
                    Object::Dictionary(Dictionary::from_iter([("Im0", Object::Reference(image_id))])),
                )])),
            ),
        ]),
        form_content,
    );

    let page = FixturePage::new(size, "/Fm0 Do", vec![("Fm0", form)]);
    let kid = add_page(&mut doc, pages_id, page, true);
    finish(
        doc,
        pages_id,
        Dictionary::from_iter([("Kids", Object::Array(vec![kid])), ("Count", Object::Integer(1))]),
    )
}

/// A scanned page whose trailer declares standard security handler encryption.
pub fn encrypted_pdf() -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let page = FixturePage::full_page((100.0, 100.0), FixtureImage::gray(2, 2, 0));
    let kid = add_page(&mut doc, pages_id, page, true);

    let encrypt_id = doc.add_object(Dictionary::from_iter([
        ("Filter", Object::Name(b"Standard".to_vec())),
        ("V", Object::Integer(1)),
        ("R", Object::Integer(2)),
        ("O", Object::string_literal(vec![0x11u8; 32])),
        ("U", Object::string_literal(vec![0x22u8; 32])),
        ("P", Object::Integer(-4)),
    ]));
    doc.trailer.set("Encrypt", Object::Reference(encrypt_id));
    doc.trailer.set(
        "ID",
        Object::Array(vec![
            Object::string_literal(vec![0x33u8; 16]),
            Object::string_literal(vec![0x33u8; 16]),
        ]),
    );

    finish(
        doc,
        pages_id,
        Dictionary::from_iter([("Kids", Object::Array(vec![kid])), ("Count", Object::Integer(1))]),
    )
}

// -- OCR block documents --------------------------------------------------------

fn geometry(left: f32, top: f32, width: f32, height: f32) -> Value {
    json!({"BoundingBox": {"Left": left, "Top": top, "Width": width, "Height": height}})
}

/// The single-line "Employment Application" page, with its two WORD children.
pub fn employment_application_blocks() -> Value {
    json!({
        "DocumentMetadata": {"Pages": 1},
        "Blocks": [
            {"Id": "page-1", "BlockType": "PAGE", "Page": 1,
             "Geometry": geometry(0.0, 0.0, 1.0, 1.0),
             "Relationships": [{"Type": "CHILD", "Ids": ["line-1"]}]},
            {"Id": "line-1", "BlockType": "LINE", "Page": 1, "Confidence": 99.6,
             "Text": "Employment Application",
             "Geometry": geometry(0.35, 0.04, 0.29, 0.03),
             "Relationships": [{"Type": "CHILD", "Ids": ["word-1", "word-2"]}]},
            {"Id": "word-1", "BlockType": "WORD", "Page": 1, "Text": "Employment",
             "Geometry": geometry(0.35, 0.04, 0.14, 0.03)},
            {"Id": "word-2", "BlockType": "WORD", "Page": 1, "Text": "Application",
             "Geometry": geometry(0.50, 0.04, 0.14, 0.03)}
        ]
    })
}

/// One PAGE block per entry, each with its lines stacked down the page.
pub fn blocks_for_pages(pages: &[(u32, &[&str])]) -> Value {
    let mut blocks = Vec::new();
    for &(page, lines) in pages {
        let ids: Vec<String> = (0..lines.len()).map(|i| format!("p{page}-l{i}")).collect();
        blocks.push(json!({
            "Id": format!("p{page}"), "BlockType": "PAGE", "Page": page,
            "Relationships": [{"Type": "CHILD", "Ids": ids}]
        }));
        for (i, text) in lines.iter().enumerate() {
            blocks.push(json!({
                "Id": ids[i], "BlockType": "LINE", "Page": page, "Text": text,
                "Geometry": geometry(0.1, 0.05 + 0.1 * i as f32, 0.5, 0.05)
            }));
        }
    }
    json!({ "Blocks": blocks })
}

/// A single page holding one line with the given box.
pub fn single_line_blocks(text: &str, left: f32, top: f32, width: f32, height: f32) -> Value {
    json!([
        {"Id": "p", "BlockType": "PAGE", "Page": 1,
         "Relationships": [{"Type": "CHILD", "Ids": ["l"]}]},
        {"Id": "l", "BlockType": "LINE", "Page": 1, "Text": text,
         "Geometry": geometry(left, top, width, height)}
    ])
}
