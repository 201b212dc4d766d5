use std::collections::HashMap;
use std::io::Cursor;

use kurbo::Affine;
use printpdf::graphics::{LinePoint, PaintMode, Point, Polygon, PolygonRing, WindingOrder};
use printpdf::matrix::TextMatrix;
use printpdf::ops::Op;
use printpdf::text::TextItem;
use printpdf::xobject::{XObject, XObjectRotation, XObjectTransform};
use printpdf::{FontId, Layer, Mm, PdfDocument, PdfSaveOptions, Pt, Px, Rgb, XObjectId};

use crate::color::Rgba;
use crate::error::{FolioError, FolioResult};
use crate::model::Align;
use crate::surface::{BoxSize, PaintSurface, TextOptions};

/// Concrete document writer emitting a PDF via `printpdf`'s op stream.
///
/// Scene coordinates are top-left/y-down; PDF pages are bottom-left/y-up.
/// An affine stack mirrors the compiler's `save`/`translate`/`rotate`/
/// `restore` calls and every drawing op maps its geometry through the
/// current transform before flipping into page space.
pub struct PdfSurface {
    document: PdfDocument,
    page_width: f64,
    page_height: f64,
    page_ops: Vec<Op>,
    fonts: HashMap<String, LoadedFont>,
    current_font: Option<(String, f64)>,
    fill: Rgba,
    state: TransformState,
    stack: Vec<TransformState>,
    oversample: u32,
    finished: Option<Vec<u8>>,
}

struct LoadedFont {
    id: FontId,
    bytes: Vec<u8>,
}

#[derive(Clone, Copy)]
struct TransformState {
    affine: Affine,
    angle_deg: f64,
}

impl TransformState {
    const IDENTITY: TransformState = TransformState {
        affine: Affine::IDENTITY,
        angle_deg: 0.0,
    };
}

impl Default for PdfSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfSurface {
    pub fn new() -> Self {
        Self::with_title("Document")
    }

    pub fn with_title(title: &str) -> Self {
        Self {
            document: PdfDocument::new(title),
            page_width: 0.0,
            page_height: 0.0,
            page_ops: Vec::new(),
            fonts: HashMap::new(),
            current_font: None,
            fill: Rgba::BLACK,
            state: TransformState::IDENTITY,
            stack: Vec::new(),
            oversample: 2,
            finished: None,
        }
    }

    /// Rasterization factor for vector content embedded as images.
    pub fn with_oversample(mut self, oversample: u32) -> Self {
        self.oversample = oversample.max(1);
        self
    }

    /// Serialized document; available after [`PaintSurface::end`].
    pub fn into_bytes(self) -> FolioResult<Vec<u8>> {
        self.finished
            .ok_or_else(|| FolioError::validation("document was not finished (end() not called)"))
    }

    /// Map a point in the current element-local frame to PDF page space.
    fn map_point(&self, x: f64, y: f64) -> (f32, f32) {
        let p = self.state.affine * kurbo::Point::new(x, y);
        (p.x as f32, (self.page_height - p.y) as f32)
    }

    fn polygon(&self, points: &[(f64, f64)], mode: PaintMode) -> Polygon {
        let ring = PolygonRing {
            points: points
                .iter()
                .map(|&(x, y)| {
                    let (px, py) = self.map_point(x, y);
                    LinePoint {
                        p: Point {
                            x: Pt(px),
                            y: Pt(py),
                        },
                        bezier: false,
                    }
                })
                .collect(),
        };
        Polygon {
            rings: vec![ring],
            mode,
            winding_order: WindingOrder::EvenOdd,
        }
    }

    /// Decode raster bytes and place them as an image XObject filling the
    /// given box in the current frame.
    fn place_raster(&mut self, bytes: &[u8], x: f64, y: f64, size: BoxSize) -> FolioResult<()> {
        let mut warnings = Vec::new();
        let raw = match printpdf::image::RawImage::decode_from_bytes(bytes, &mut warnings) {
            Ok(raw) => raw,
            Err(_) => {
                // Non-PNG inputs (page backgrounds fetched as JPEG etc.)
                // are transcoded before handing off.
                let decoded = image::load_from_memory(bytes).map_err(|e| {
                    FolioError::fetch_failed("<raster bytes>", format!("decode failed: {e}"))
                })?;
                let mut png = Vec::new();
                decoded
                    .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
                    .map_err(|e| FolioError::Other(anyhow::anyhow!("transcode image: {e}")))?;
                printpdf::image::RawImage::decode_from_bytes(&png, &mut warnings)
                    .map_err(|e| FolioError::Other(anyhow::anyhow!("decode image: {e}")))?
            }
        };

        let (img_w, img_h) = (raw.width.max(1), raw.height.max(1));
        let xobj_id = XObjectId::new();
        self.document
            .resources
            .xobjects
            .map
            .insert(xobj_id.clone(), XObject::Image(raw));

        // Anchor at the box's bottom-left corner; rotation (if any) pivots
        // about the element-local origin, the box's top-left.
        let (tx, ty) = self.map_point(x, y + size.height);
        let rotate = if self.state.angle_deg == 0.0 {
            None
        } else {
            Some(XObjectRotation {
                angle_ccw_degrees: -self.state.angle_deg as f32,
                rotation_center_x: Px(0),
                rotation_center_y: Px(img_h),
            })
        };
        let transform = XObjectTransform {
            translate_x: Some(Pt(tx)),
            translate_y: Some(Pt(ty)),
            rotate,
            scale_x: Some((size.width / img_w as f64) as f32),
            scale_y: Some((size.height / img_h as f64) as f32),
            dpi: Some(72.0),
        };
        self.page_ops.push(Op::UseXobject {
            id: xobj_id,
            transform,
        });
        Ok(())
    }
}

fn to_pdf_color(color: Rgba) -> printpdf::color::Color {
    let [r, g, b] = color.to_rgb_f32();
    printpdf::color::Color::Rgb(Rgb::new(r, g, b, None))
}

impl PaintSurface for PdfSurface {
    fn begin_document(&mut self, width: f64, height: f64) -> FolioResult<()> {
        if !(width > 0.0) || !(height > 0.0) {
            return Err(FolioError::validation("document width/height must be > 0"));
        }
        self.page_width = width;
        self.page_height = height;
        Ok(())
    }

    fn begin_page(&mut self) -> FolioResult<()> {
        self.page_ops = Vec::new();
        self.state = TransformState::IDENTITY;
        self.stack.clear();

        let page_num = self.document.pages.len() + 1;
        let name = format!("Page {page_num} Layer 1");
        let layer = Layer::new(name.as_str());
        let layer_id = self.document.add_layer(&layer);
        self.page_ops.push(Op::BeginLayer { layer_id });
        Ok(())
    }

    fn end_page(&mut self) -> FolioResult<()> {
        let ops = std::mem::take(&mut self.page_ops);
        let width_mm: Mm = Pt(self.page_width as f32).into();
        let height_mm: Mm = Pt(self.page_height as f32).into();
        self.document
            .pages
            .push(printpdf::PdfPage::new(width_mm, height_mm, ops));
        Ok(())
    }

    fn register_font(&mut self, family: &str, bytes: &[u8]) -> FolioResult<()> {
        let mut warnings = Vec::new();
        let parsed = printpdf::font::ParsedFont::from_bytes(bytes, 0, &mut warnings)
            .ok_or_else(|| {
                FolioError::font_unavailable(format!("'{family}': font data did not parse"))
            })?;
        let id = self.document.add_font(&parsed);
        self.fonts.insert(
            family.to_string(),
            LoadedFont {
                id,
                bytes: bytes.to_vec(),
            },
        );
        Ok(())
    }

    fn set_font(&mut self, family: &str, size: f64) -> FolioResult<()> {
        if !self.fonts.contains_key(family) {
            return Err(FolioError::font_unavailable(format!(
                "'{family}' was not registered"
            )));
        }
        self.current_font = Some((family.to_string(), size));
        Ok(())
    }

    fn set_fill_color(&mut self, color: Rgba) -> FolioResult<()> {
        self.fill = color;
        Ok(())
    }

    fn draw_text(&mut self, text: &str, x: f64, y: f64, options: &TextOptions) -> FolioResult<()> {
        let (family, size) = self
            .current_font
            .clone()
            .ok_or_else(|| FolioError::validation("draw_text called before set_font"))?;
        let font_id = self
            .fonts
            .get(&family)
            .map(|f| f.id.clone())
            .ok_or_else(|| FolioError::font_unavailable(format!("'{family}'")))?;

        let layout = {
            let bytes = &self
                .fonts
                .get(&family)
                .expect("font present, checked above")
                .bytes;
            let face = ttf_parser::Face::parse(bytes, 0).ok();
            layout_text(text, size, options, face.as_ref())
        };

        self.page_ops.push(Op::StartTextSection);
        self.page_ops.push(Op::SetFillColor {
            col: to_pdf_color(self.fill),
        });
        self.page_ops.push(Op::SetFontSize {
            size: Pt(size as f32),
            font: font_id.clone(),
        });

        let angle = self.state.angle_deg;
        for line in &layout.lines {
            let (px, py) = self.map_point(x + line.x_offset, y + line.baseline_y);
            let matrix = if angle == 0.0 {
                TextMatrix::Translate(Pt(px), Pt(py))
            } else {
                TextMatrix::TranslateRotate(Pt(px), Pt(py), -angle as f32)
            };
            self.page_ops.push(Op::SetTextMatrix { matrix });
            self.page_ops.push(Op::WriteText {
                items: vec![TextItem::Text(line.text.clone())],
                font: font_id.clone(),
            });
        }
        self.page_ops.push(Op::EndTextSection);

        if options.underline {
            let color = to_pdf_color(self.fill);
            for line in &layout.lines {
                if line.width <= 0.0 {
                    continue;
                }
                let uy = y + line.baseline_y + layout.underline_offset;
                let polygon = self.polygon(
                    &[
                        (x + line.x_offset, uy),
                        (x + line.x_offset + line.width, uy),
                    ],
                    PaintMode::Stroke,
                );
                self.page_ops.push(Op::SetOutlineColor { col: color.clone() });
                self.page_ops.push(Op::SetOutlineThickness {
                    pt: Pt(layout.underline_thickness as f32),
                });
                self.page_ops.push(Op::DrawPolygon { polygon });
            }
        }

        Ok(())
    }

    fn draw_image(&mut self, bytes: &[u8], x: f64, y: f64, size: BoxSize) -> FolioResult<()> {
        self.place_raster(bytes, x, y, size)
    }

    fn draw_vector(&mut self, markup: &str, x: f64, y: f64, size: BoxSize) -> FolioResult<()> {
        let tree = usvg::Tree::from_str(markup, &usvg::Options::default())
            .map_err(|e| FolioError::markup(format!("invalid svg: {e}")))?;
        let natural = tree.size();
        let (vw, vh) = (f64::from(natural.width()), f64::from(natural.height()));
        if !(vw > 0.0) || !(vh > 0.0) {
            return Err(FolioError::degenerate("svg has no intrinsic size"));
        }

        // Scale to fit, anchored top-left (xMinYMin meet).
        let fit = (size.width / vw).min(size.height / vh);
        if !(fit > 0.0) || !fit.is_finite() {
            return Err(FolioError::degenerate("svg target box has no area"));
        }

        let raster_scale = fit * f64::from(self.oversample.max(1));
        let pixel_w = ((vw * raster_scale).ceil() as u32).max(1);
        let pixel_h = ((vh * raster_scale).ceil() as u32).max(1);
        let mut pixmap = tiny_skia::Pixmap::new(pixel_w, pixel_h)
            .ok_or_else(|| FolioError::degenerate("svg raster buffer has no area"))?;
        resvg::render(
            &tree,
            tiny_skia::Transform::from_scale(raster_scale as f32, raster_scale as f32),
            &mut pixmap.as_mut(),
        );
        let png = pixmap
            .encode_png()
            .map_err(|e| FolioError::Other(anyhow::anyhow!("encode svg raster: {e}")))?;

        self.place_raster(
            &png,
            x,
            y,
            BoxSize {
                width: vw * fit,
                height: vh * fit,
            },
        )
    }

    fn translate(&mut self, x: f64, y: f64) -> FolioResult<()> {
        self.state.affine = self.state.affine * Affine::translate((x, y));
        Ok(())
    }

    fn rotate(&mut self, degrees: f64) -> FolioResult<()> {
        self.state.affine = self.state.affine * Affine::rotate(degrees.to_radians());
        self.state.angle_deg += degrees;
        Ok(())
    }

    fn save(&mut self) -> FolioResult<()> {
        self.stack.push(self.state);
        Ok(())
    }

    fn restore(&mut self) -> FolioResult<()> {
        self.state = self
            .stack
            .pop()
            .ok_or_else(|| FolioError::validation("restore without matching save"))?;
        Ok(())
    }

    fn fill_rect(
        &mut self,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        color: Rgba,
    ) -> FolioResult<()> {
        let polygon = self.polygon(
            &[
                (x, y),
                (x + width, y),
                (x + width, y + height),
                (x, y + height),
            ],
            PaintMode::Fill,
        );
        self.page_ops.push(Op::SetFillColor {
            col: to_pdf_color(color),
        });
        self.page_ops.push(Op::DrawPolygon { polygon });
        Ok(())
    }

    fn stroke_line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, width: f64) -> FolioResult<()> {
        let polygon = self.polygon(&[(x1, y1), (x2, y2)], PaintMode::Stroke);
        self.page_ops.push(Op::SetOutlineColor {
            col: to_pdf_color(Rgba::BLACK),
        });
        self.page_ops.push(Op::SetOutlineThickness {
            pt: Pt(width as f32),
        });
        self.page_ops.push(Op::DrawPolygon { polygon });
        Ok(())
    }

    fn end(&mut self) -> FolioResult<()> {
        let mut warnings = Vec::new();
        let bytes = self.document.save(&PdfSaveOptions::default(), &mut warnings);
        self.finished = Some(bytes);
        Ok(())
    }
}

struct TextLayout {
    lines: Vec<LaidOutLine>,
    underline_offset: f64,
    underline_thickness: f64,
}

struct LaidOutLine {
    text: String,
    x_offset: f64,
    baseline_y: f64,
    width: f64,
}

/// Flow `text` into lines and position them inside the box.
///
/// Explicit newlines always break; within a paragraph, words wrap greedily
/// at `options.width`. Measurement uses the face's advance widths when the
/// face parses, else a flat per-character estimate. Justified text falls
/// back to left placement.
fn layout_text(
    text: &str,
    size: f64,
    options: &TextOptions,
    face: Option<&ttf_parser::Face<'_>>,
) -> TextLayout {
    let measure = |s: &str| measure_text(s, size, face);

    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        flow_paragraph(paragraph, options.width, &measure, &mut lines);
    }

    let (ascent, underline_offset, underline_thickness) = match face {
        Some(face) => {
            let upem = f64::from(face.units_per_em().max(1));
            let scale = size / upem;
            let ascent = f64::from(face.ascender()) * scale;
            let (off, thick) = match face.underline_metrics() {
                // Font-unit position is relative to the baseline, positive
                // upwards; scene y grows downwards.
                Some(m) => (
                    -f64::from(m.position) * scale,
                    (f64::from(m.thickness) * scale).max(0.1),
                ),
                None => (size * 0.1, size / 15.0),
            };
            (ascent, off, thick)
        }
        None => (size * 0.8, size * 0.1, size / 15.0),
    };

    let line_advance = size + options.line_gap;
    let laid_out = lines
        .into_iter()
        .enumerate()
        .map(|(i, line)| {
            let width = measure(&line);
            let x_offset = match options.align {
                Align::Left | Align::Justify => 0.0,
                Align::Center => (options.width - width) / 2.0,
                Align::Right => options.width - width,
            };
            LaidOutLine {
                text: line,
                x_offset,
                baseline_y: ascent + i as f64 * line_advance,
                width,
            }
        })
        .collect();

    TextLayout {
        lines: laid_out,
        underline_offset,
        underline_thickness,
    }
}

fn flow_paragraph(
    paragraph: &str,
    width: f64,
    measure: &dyn Fn(&str) -> f64,
    out: &mut Vec<String>,
) {
    if paragraph.trim().is_empty() {
        out.push(String::new());
        return;
    }

    let mut current = String::new();
    for word in paragraph.split_whitespace() {
        if current.is_empty() {
            current = word.to_string();
            continue;
        }
        let candidate = format!("{current} {word}");
        if measure(&candidate) <= width {
            current = candidate;
        } else {
            out.push(std::mem::take(&mut current));
            current = word.to_string();
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
}

fn measure_text(text: &str, size: f64, face: Option<&ttf_parser::Face<'_>>) -> f64 {
    match face {
        Some(face) => {
            let upem = f64::from(face.units_per_em().max(1));
            let scale = size / upem;
            let fallback = upem / 2.0;
            text.chars()
                .map(|c| {
                    face.glyph_index(c)
                        .and_then(|gid| face.glyph_hor_advance(gid))
                        .map(f64::from)
                        .unwrap_or(fallback)
                })
                .sum::<f64>()
                * scale
        }
        None => text.chars().count() as f64 * size * 0.6,
    }
}
