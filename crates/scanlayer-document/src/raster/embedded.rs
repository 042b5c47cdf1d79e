// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Built-in rasterizer for scanned PDFs.
//
// A scanned page is one or more image XObjects placed by the content stream.
// Rendering therefore needs no PDF graphics engine: walk the content stream,
// track the current transformation matrix, and resample every drawn image onto
// a white canvas. Pages that paint anything else (vector paths, visible text,
// shadings, inline images) are refused rather than rendered incompletely.

use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use scanlayer_core::error::{Result, ScanLayerError};
use tracing::{debug, info, instrument, warn};

use super::{PageImage, PageRasterizer, raster_size};
use crate::pdf::SourcePdf;
use crate::pdf::reader::{inherited_attribute, number, resolve};

/// Nesting limit for form XObjects drawing other form XObjects.
const MAX_FORM_DEPTH: usize = 8;

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

// -- Geometry -----------------------------------------------------------------

/// A PDF transformation matrix `[a b c d e f]`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix([f32; 6]);

impl Matrix {
    const IDENTITY: Self = Self([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    fn from_operands(operands: &[Object]) -> Option<Self> {
        let values: Vec<f32> = operands.iter().filter_map(|o| o.as_float().ok()).collect();
        let m: [f32; 6] = values.try_into().ok()?;
        Some(Self(m))
    }

    /// `self` applied first, then `next`.
    fn then(&self, next: &Matrix) -> Matrix {
        let [a1, b1, c1, d1, e1, f1] = self.0;
        let [a2, b2, c2, d2, e2, f2] = next.0;
        Matrix([
            a1 * a2 + b1 * c2,
            a1 * b2 + b1 * d2,
            c1 * a2 + d1 * c2,
            c1 * b2 + d1 * d2,
            e1 * a2 + f1 * c2 + e2,
            e1 * b2 + f1 * d2 + f2,
        ])
    }

    fn is_axis_aligned(&self) -> bool {
        self.0[1] == 0.0 && self.0[2] == 0.0
    }

    fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        let [a, b, c, d, e, f] = self.0;
        (a * x + c * y + e, b * x + d * y + f)
    }
}

// -- Extraction ---------------------------------------------------------------

/// Colour model of sampled (non-JPEG) image data.
#[derive(Debug, Clone, PartialEq)]
enum ColorModel {
    Gray,
    Rgb,
    Cmyk,
    Indexed { base: Box<ColorModel>, palette: Vec<u8> },
}

impl ColorModel {
    fn components(&self) -> usize {
        match self {
            Self::Gray | Self::Indexed { .. } => 1,
            Self::Rgb => 3,
            Self::Cmyk => 4,
        }
    }

    /// Convert one pixel's 8-bit components to RGB.
    fn to_rgb(&self, c: &[u8]) -> [u8; 3] {
        match self {
            Self::Gray => [c[0]; 3],
            Self::Rgb => [c[0], c[1], c[2]],
            Self::Cmyk => {
                let k = 255 - c[3] as u32;
                let channel = |v: u8| ((255 - v as u32) * k / 255) as u8;
                [channel(c[0]), channel(c[1]), channel(c[2])]
            }
            Self::Indexed { base, palette } => {
                let n = base.components();
                let start = c[0] as usize * n;
                match palette.get(start..start + n) {
                    Some(entry) => base.to_rgb(entry),
                    None => [0, 0, 0],
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
enum ImageKind {
    Jpeg,
    Samples(ColorModel),
}

/// One image XObject painted by the page, with the CTM in force at `Do`.
#[derive(Debug, Clone)]
struct ImageDraw {
    name: String,
    ctm: Matrix,
    kind: ImageKind,
    stream: Stream,
}

/// Everything needed to rasterize one page, detached from the source document.
#[derive(Debug, Clone)]
struct PagePlan {
    media_box: [f32; 4],
    /// Clockwise display rotation in degrees.
    rotation: u16,
    draws: Vec<ImageDraw>,
}

/// The parts of the graphics state that decide what gets painted.
#[derive(Debug, Clone, Copy)]
struct GraphicsState {
    ctm: Matrix,
    /// Text rendering mode set by `Tr`.
    text_mode: i64,
}

impl GraphicsState {
    /// Modes 3 (invisible) and 7 (clip only) put no ink on the page.
    fn text_is_invisible(&self) -> bool {
        matches!(self.text_mode, 3 | 7)
    }
}

fn unpaintable(what: &str, operator: &str) -> String {
    format!("page paints {what} (`{operator}`), which the built-in rasterizer cannot draw; use the pdfium renderer")
}

/// Walks content streams and records image draws.
struct PlanBuilder<'a> {
    document: &'a Document,
    draws: Vec<ImageDraw>,
}

impl<'a> PlanBuilder<'a> {
    /// Record the image draws of `content`, failing on any operator that
    /// would put ink on the page some other way.
    fn walk(
        &mut self,
        content: &[u8],
        resources: Option<&'a Dictionary>,
        base: GraphicsState,
        depth: usize,
    ) -> std::result::Result<(), String> {
        let content = Content::decode(content).map_err(|err| format!("unreadable content stream: {err}"))?;
        let mut state = base;
        let mut stack: Vec<GraphicsState> = Vec::new();

        for op in &content.operations {
            let operator = op.operator.as_str();
            match operator {
                "q" => stack.push(state),
                "Q" => state = stack.pop().unwrap_or(base),
                "cm" => match Matrix::from_operands(&op.operands) {
                    Some(m) => state.ctm = m.then(&state.ctm),
                    None => warn!(operands = ?op.operands, "Ignoring malformed cm operator"),
                },
                "Tr" => {
                    if let Some(mode) = op.operands.first().and_then(|o| o.as_i64().ok()) {
                        state.text_mode = mode;
                    }
                }
                "Do" => {
                    let Some(name) = op.operands.first().and_then(|o| o.as_name().ok()) else {
                        continue;
                    };
                    self.paint_xobject(name, resources, state, depth)?;
                }
                "Tj" | "TJ" | "'" | "\"" if !state.text_is_invisible() => {
                    return Err(unpaintable("visible text", operator));
                }
                "f" | "F" | "f*" | "S" | "s" | "B" | "B*" | "b" | "b*" => {
                    return Err(unpaintable("vector paths", operator));
                }
                "sh" => return Err(unpaintable("a shading", operator)),
                "BI" | "ID" | "EI" => return Err(unpaintable("an inline image", operator)),
                _ => {}
            }
        }
        Ok(())
    }

    fn paint_xobject(
        &mut self,
        name: &[u8],
        resources: Option<&'a Dictionary>,
        state: GraphicsState,
        depth: usize,
    ) -> std::result::Result<(), String> {
        let xobject_name = String::from_utf8_lossy(name).into_owned();
        let stream = resources
            .and_then(|r| r.get(b"XObject").ok())
            .map(|x| resolve(self.document, x))
            .and_then(|x| x.as_dict().ok())
            .and_then(|x| x.get(name).ok())
            .map(|x| resolve(self.document, x))
            .and_then(|x| x.as_stream().ok())
            .ok_or_else(|| format!("XObject /{xobject_name} not found in page resources"))?;

        match stream.dict.get(b"Subtype").and_then(Object::as_name) {
            Ok(b"Image") => {
                if image_mask(&stream.dict) {
                    return Err(unpaintable(&format!("stencil mask /{xobject_name}"), "Do"));
                }
                let kind = self.image_kind(stream, resources)?;
                let ctm = state.ctm;
                debug!(xobject = %xobject_name, ?ctm, "Image draw recorded");
                self.draws.push(ImageDraw {
                    name: xobject_name,
                    ctm,
                    kind,
                    stream: stream.clone(),
                });
                Ok(())
            }
            Ok(b"Form") => {
                if depth >= MAX_FORM_DEPTH {
                    return Err(format!("form XObject /{xobject_name} nests more than {MAX_FORM_DEPTH} deep"));
                }
                let matrix = stream
                    .dict
                    .get(b"Matrix")
                    .ok()
                    .and_then(|m| resolve(self.document, m).as_array().ok())
                    .and_then(|m| Matrix::from_operands(m))
                    .unwrap_or(Matrix::IDENTITY);
                let form_resources = stream
                    .dict
                    .get(b"Resources")
                    .ok()
                    .and_then(|r| resolve(self.document, r).as_dict().ok())
                    .or(resources);
                let content = stream_bytes(stream)?;
                let form_state = GraphicsState {
                    ctm: matrix.then(&state.ctm),
                    ..state
                };
                self.walk(&content, form_resources, form_state, depth + 1)
            }
            _ => Ok(()),
        }
    }

    fn image_kind(
        &self,
        stream: &Stream,
        resources: Option<&Dictionary>,
    ) -> std::result::Result<ImageKind, String> {
        let filters = filter_names(self.document, &stream.dict);
        if let Some(unsupported) = filters
            .iter()
            .find(|f| matches!(f.as_str(), "CCITTFaxDecode" | "JBIG2Decode" | "JPXDecode"))
        {
            return Err(format!("image filter {unsupported} is not supported"));
        }
        if let Some(position) = filters.iter().position(|f| f == "DCTDecode") {
            if filters.len() != 1 || position != 0 {
                return Err(format!("filter chain {filters:?} is not supported"));
            }
            return Ok(ImageKind::Jpeg);
        }

        let space = stream
            .dict
            .get(b"ColorSpace")
            .map_err(|_| "image has no ColorSpace".to_string())?;
        Ok(ImageKind::Samples(self.color_model(space, resources, 0)?))
    }

    fn color_model(
        &self,
        space: &Object,
        resources: Option<&Dictionary>,
        depth: usize,
    ) -> std::result::Result<ColorModel, String> {
        if depth > 4 {
            return Err("colour space nests too deeply".into());
        }
        match resolve(self.document, space) {
            Object::Name(name) => match name.as_slice() {
                b"DeviceGray" | b"CalGray" | b"G" => Ok(ColorModel::Gray),
                b"DeviceRGB" | b"CalRGB" | b"RGB" => Ok(ColorModel::Rgb),
                b"DeviceCMYK" | b"CMYK" => Ok(ColorModel::Cmyk),
                other => {
                    let named = resources
                        .and_then(|r| r.get(b"ColorSpace").ok())
                        .map(|cs| resolve(self.document, cs))
                        .and_then(|cs| cs.as_dict().ok())
                        .and_then(|cs| cs.get(other).ok())
                        .ok_or_else(|| {
                            format!("colour space /{} is not supported", String::from_utf8_lossy(other))
                        })?;
                    self.color_model(named, resources, depth + 1)
                }
            },
            Object::Array(items) => {
                let family = items.first().and_then(|f| f.as_name().ok()).unwrap_or_default();
                match family {
                    b"ICCBased" => {
                        let profile = items
                            .get(1)
                            .map(|p| resolve(self.document, p))
                            .and_then(|p| p.as_stream().ok())
                            .ok_or("ICCBased colour space without a profile stream")?;
                        match profile.dict.get(b"N").ok().and_then(|n| number(self.document, n)) {
                            Some(n) if n == 1.0 => Ok(ColorModel::Gray),
                            Some(n) if n == 3.0 => Ok(ColorModel::Rgb),
                            Some(n) if n == 4.0 => Ok(ColorModel::Cmyk),
                            n => Err(format!("ICCBased colour space with N = {n:?} is not supported")),
                        }
                    }
                    b"CalGray" => Ok(ColorModel::Gray),
                    b"CalRGB" => Ok(ColorModel::Rgb),
                    b"Indexed" | b"I" => {
                        let base = items.get(1).ok_or("Indexed colour space without a base")?;
                        let base = self.color_model(base, resources, depth + 1)?;
                        let palette = match items.get(3).map(|p| resolve(self.document, p)) {
                            Some(Object::String(bytes, _)) => bytes.clone(),
                            Some(Object::Stream(stream)) => stream_bytes(stream)?,
                            _ => return Err("Indexed colour space without a lookup table".into()),
                        };
                        Ok(ColorModel::Indexed {
                            base: Box::new(base),
                            palette,
                        })
                    }
                    other => Err(format!(
                        "colour space family /{} is not supported",
                        String::from_utf8_lossy(other)
                    )),
                }
            }
            other => Err(format!("unexpected colour space object {other:?}")),
        }
    }
}

fn image_mask(dict: &Dictionary) -> bool {
    matches!(dict.get(b"ImageMask"), Ok(Object::Boolean(true)))
}

fn filter_names(document: &Document, dict: &Dictionary) -> Vec<String> {
    match dict.get(b"Filter").map(|f| resolve(document, f)) {
        Ok(Object::Name(name)) => vec![String::from_utf8_lossy(name).into_owned()],
        Ok(Object::Array(items)) => items
            .iter()
            .filter_map(|f| f.as_name().ok())
            .map(|f| String::from_utf8_lossy(f).into_owned())
            .collect(),
        _ => Vec::new(),
    }
}

/// Stream data with its filters removed.
fn stream_bytes(stream: &Stream) -> std::result::Result<Vec<u8>, String> {
    if stream.dict.has(b"Filter") {
        stream
            .decompressed_content()
            .map_err(|err| format!("failed to decode stream: {err}"))
    } else {
        Ok(stream.content.clone())
    }
}

fn build_plan(source: &SourcePdf, index: usize) -> std::result::Result<PagePlan, String> {
    let document = source.document();
    let media_box = source.media_box(index).map_err(|err| err.to_string())?;
    let rotation = source.rotation(index).map_err(|err| err.to_string())?;
    let page_id: ObjectId = source.page_id(index).map_err(|err| err.to_string())?;

    let resources = inherited_attribute(document, page_id, b"Resources")
        .map(|r| resolve(document, r))
        .and_then(|r| r.as_dict().ok());
    let content = if document
        .get_dictionary(page_id)
        .map(|page| page.has(b"Contents"))
        .unwrap_or(false)
    {
        document
            .get_page_content(page_id)
            .map_err(|err| format!("unreadable page content: {err}"))?
    } else {
        Vec::new()
    };

    let mut builder = PlanBuilder {
        document,
        draws: Vec::new(),
    };
    let initial = GraphicsState {
        ctm: Matrix::IDENTITY,
        text_mode: 0,
    };
    builder.walk(&content, resources, initial, 0)?;

    if builder.draws.is_empty() {
        warn!(page = index + 1, "Page draws no images; it will rasterize blank");
    }
    Ok(PagePlan {
        media_box,
        rotation,
        draws: builder.draws,
    })
}

// -- Decoding -----------------------------------------------------------------

fn dict_number(dict: &Dictionary, key: &[u8]) -> Option<i64> {
    match dict.get(key).ok()? {
        Object::Integer(i) => Some(*i),
        Object::Real(r) => Some(*r as i64),
        _ => None,
    }
}

/// Decode an image XObject to RGBA pixels.
fn decode_image(draw: &ImageDraw) -> std::result::Result<RgbaImage, String> {
    let color = match &draw.kind {
        ImageKind::Jpeg => {
            return image::load_from_memory_with_format(&draw.stream.content, ImageFormat::Jpeg)
                .map(|img| img.to_rgba8())
                .map_err(|err| format!("image /{}: JPEG decoding failed: {err}", draw.name));
        }
        ImageKind::Samples(color) => color,
    };

    let dict = &draw.stream.dict;
    let (width, height) = match (dict_number(dict, b"Width"), dict_number(dict, b"Height")) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w as u32, h as u32),
        _ => return Err(format!("image /{} has no usable Width/Height", draw.name)),
    };
    let bpc = dict_number(dict, b"BitsPerComponent").unwrap_or(8);
    if !matches!(bpc, 1 | 2 | 4 | 8) {
        return Err(format!("image /{}: {bpc} bits per component is not supported", draw.name));
    }
    let bpc = bpc as usize;

    let data = stream_bytes(&draw.stream).map_err(|err| format!("image /{}: {err}", draw.name))?;
    let components = color.components();
    let row_bytes = (width as usize * components * bpc).div_ceil(8);
    if data.len() < row_bytes * height as usize {
        return Err(format!(
            "image /{}: {} bytes of samples, expected {}",
            draw.name,
            data.len(),
            row_bytes * height as usize
        ));
    }

    let indexed = matches!(color, ColorModel::Indexed { .. });
    let invert = !indexed && decode_is_inverted(dict);
    let max = (1u32 << bpc) - 1;

    let mut out = RgbaImage::new(width, height);
    let mut pixel = [0u8; 4];
    for (y, row) in data.chunks(row_bytes).take(height as usize).enumerate() {
        for x in 0..width as usize {
            for (c, slot) in pixel.iter_mut().enumerate().take(components) {
                let raw = sample(row, x * components + c, bpc);
                let value = if indexed {
                    raw as u8
                } else {
                    (raw * 255 / max) as u8
                };
                *slot = if invert { 255 - value } else { value };
            }
            let [r, g, b] = color.to_rgb(&pixel[..components]);
            out.put_pixel(x as u32, y as u32, Rgba([r, g, b, 255]));
        }
    }
    Ok(out)
}

/// The `index`-th `bpc`-bit sample of a packed row.
fn sample(row: &[u8], index: usize, bpc: usize) -> u32 {
    if bpc == 8 {
        return row[index] as u32;
    }
    let bit = index * bpc;
    let shift = 8 - bpc - bit % 8;
    ((row[bit / 8] >> shift) as u32) & ((1 << bpc) - 1)
}

/// `/Decode [1 0 ...]` flips the sample range.
fn decode_is_inverted(dict: &Dictionary) -> bool {
    let Ok(Object::Array(decode)) = dict.get(b"Decode") else {
        return false;
    };
    let values: Vec<f32> = decode.iter().take(2).filter_map(|v| v.as_float().ok()).collect();
    matches!(values.as_slice(), [lo, hi] if lo > hi)
}

// -- Painting -------------------------------------------------------------------

/// Paint an upright (possibly mirrored) image by resampling it to its target
/// rectangle. `placement` maps the image's unit square to raster pixels.
fn paint_scaled(canvas: &mut RgbaImage, img: &RgbaImage, placement: &Matrix) -> bool {
    let (ax, ay) = placement.apply(0.0, 0.0);
    let (bx, by) = placement.apply(1.0, 1.0);
    let (left, right) = (ax.min(bx).round(), ax.max(bx).round());
    let (top, bottom) = (ay.min(by).round(), ay.max(by).round());
    if right - left < 1.0 || bottom - top < 1.0 {
        return false;
    }

    let mut scaled = imageops::resize(
        img,
        (right - left) as u32,
        (bottom - top) as u32,
        FilterType::Triangle,
    );
    let [a, _, _, d, _, _] = placement.0;
    if a < 0.0 {
        imageops::flip_horizontal_in_place(&mut scaled);
    }
    // The first sample row is v = 1, which lands on top only when d < 0.
    if d > 0.0 {
        imageops::flip_vertical_in_place(&mut scaled);
    }
    imageops::overlay(canvas, &scaled, left as i64, top as i64);
    true
}

/// Paint a rotated or skewed image through a projective warp.
fn paint_warped(canvas: &mut RgbaImage, img: &RgbaImage, placement: &Matrix) -> bool {
    let (w, h) = (img.width() as f32, img.height() as f32);
    // Sample centres on both sides, so pixel (0, 0) covers [0, 1) x [0, 1).
    let from = [(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)].map(|(x, y)| (x - 0.5, y - 0.5));
    let to = [(0.0, 1.0), (1.0, 1.0), (1.0, 0.0), (0.0, 0.0)].map(|(u, v)| {
        let (x, y) = placement.apply(u, v);
        (x - 0.5, y - 0.5)
    });
    let Some(projection) = Projection::from_control_points(from, to) else {
        return false;
    };

    let mut layer = RgbaImage::from_pixel(canvas.width(), canvas.height(), TRANSPARENT);
    warp_into(img, &projection, Interpolation::Bilinear, TRANSPARENT, &mut layer);
    imageops::overlay(canvas, &layer, 0, 0);
    true
}

// -- Rasterizer -----------------------------------------------------------------

/// Pure-Rust rasterizer that paints a page's embedded images.
///
/// Page plans are extracted once, up front, so rendering never touches the
/// source document and pages can be rendered from any thread.
pub struct EmbeddedImageRasterizer {
    pages: Vec<std::result::Result<PagePlan, String>>,
}

impl EmbeddedImageRasterizer {
    #[instrument(skip_all, fields(pages = source.page_count()))]
    pub fn new(source: &SourcePdf) -> Self {
        let pages: Vec<_> = (0..source.page_count())
            .map(|index| build_plan(source, index))
            .collect();

        let images: usize = pages.iter().flatten().map(|p| p.draws.len()).sum();
        let broken = pages.iter().filter(|p| p.is_err()).count();
        info!(images, broken, "Page image plans extracted");
        Self { pages }
    }
}

impl PageRasterizer for EmbeddedImageRasterizer {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    #[instrument(skip(self))]
    fn rasterize(&self, page_index: usize, dpi: u32) -> Result<PageImage> {
        let page_number = page_index as u32 + 1;
        let plan = match self.pages.get(page_index) {
            Some(Ok(plan)) => plan,
            Some(Err(reason)) => return Err(ScanLayerError::render(page_number, reason.clone())),
            None => return Err(ScanLayerError::render(page_number, "page index out of range")),
        };

        let [x0, y0, x1, y1] = plan.media_box;
        let scale = dpi as f32 / 72.0;
        let (width, height) = raster_size(page_number, x1 - x0, y1 - y0, dpi)?;
        let upright = Matrix([scale, 0.0, 0.0, -scale, -x0 * scale, y1 * scale]);
        let (w, h) = (width as f32, height as f32);
        // Turn the upright raster clockwise into display orientation.
        let (to_raster, width, height) = match plan.rotation {
            90 => (upright.then(&Matrix([0.0, 1.0, -1.0, 0.0, h, 0.0])), height, width),
            180 => (upright.then(&Matrix([-1.0, 0.0, 0.0, -1.0, w, h])), width, height),
            270 => (upright.then(&Matrix([0.0, -1.0, 1.0, 0.0, 0.0, w])), height, width),
            _ => (upright, width, height),
        };

        let mut canvas = RgbaImage::from_pixel(width, height, WHITE);
        for draw in &plan.draws {
            let img = decode_image(draw).map_err(|reason| ScanLayerError::render(page_number, reason))?;
            let placement = draw.ctm.then(&to_raster);
            let painted = if placement.is_axis_aligned() {
                paint_scaled(&mut canvas, &img, &placement)
            } else {
                paint_warped(&mut canvas, &img, &placement)
            };
            if !painted {
                warn!(page = page_number, xobject = %draw.name, "Degenerate image transform; skipping");
            }
        }
        debug!(
            page = page_number,
            width,
            height,
            rotation = plan.rotation,
            images = plan.draws.len(),
            "Page rasterized"
        );
        Ok(PageImage {
            page_number,
            image: DynamicImage::ImageRgba8(canvas).to_rgb8(),
        })
    }
}
