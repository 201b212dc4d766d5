use std::collections::BTreeMap;

use crate::error::{FolioError, FolioResult};

/// Root of a page-design document: page dimensions, declared fonts and the
/// ordered list of pages. Read-only input for one compilation run.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub fonts: Vec<FontSource>,
    pub pages: Vec<Page>,
}

/// A font to preload; `font_family` is the cache key.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FontSource {
    pub font_family: String,
    pub url: String,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    /// Solid color string, raster asset locator, or absent.
    #[serde(default)]
    pub background: Option<String>,
    #[serde(default)]
    pub children: Vec<Element>,
}

/// Position and extent shared by every element kind. `rotation` is in
/// degrees, applied about the element's local origin after translation.
#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub rotation: f64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    #[default]
    Left,
    Center,
    Right,
    Justify,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Element {
    Text(TextElement),
    Image(ImageElement),
    Svg(SvgElement),
    Line(LineElement),
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextElement {
    #[serde(flatten)]
    pub place: Placement,
    pub text: String,
    pub font_family: String,
    pub font_size: f64,
    pub fill: String,
    #[serde(default)]
    pub align: Align,
    #[serde(default = "default_line_height")]
    pub line_height: f64,
    #[serde(default)]
    pub text_decoration: String,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageElement {
    #[serde(flatten)]
    pub place: Placement,
    pub src: String,
    #[serde(default)]
    pub crop_x: f64,
    #[serde(default)]
    pub crop_y: f64,
    #[serde(default = "default_crop_extent")]
    pub crop_width: f64,
    #[serde(default = "default_crop_extent")]
    pub crop_height: f64,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SvgElement {
    #[serde(flatten)]
    pub place: Placement,
    pub src: String,
    /// Replacement table matched by canonical color equality, never by
    /// string equality.
    #[serde(default)]
    pub colors_replace: BTreeMap<String, String>,
    #[serde(default)]
    pub crop_x: f64,
    #[serde(default)]
    pub crop_y: f64,
    #[serde(default = "default_crop_extent")]
    pub crop_width: f64,
    #[serde(default = "default_crop_extent")]
    pub crop_height: f64,
}

/// Horizontal rule from the local origin to `(width, 0)`; `height` is the
/// stroke thickness.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineElement {
    #[serde(flatten)]
    pub place: Placement,
}

fn default_line_height() -> f64 {
    1.0
}

fn default_crop_extent() -> f64 {
    1.0
}

impl Element {
    pub fn placement(&self) -> &Placement {
        match self {
            Element::Text(e) => &e.place,
            Element::Image(e) => &e.place,
            Element::Svg(e) => &e.place,
            Element::Line(e) => &e.place,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Element::Text(_) => "text",
            Element::Image(_) => "image",
            Element::Svg(_) => "svg",
            Element::Line(_) => "line",
        }
    }
}

impl Scene {
    pub fn validate(&self) -> FolioResult<()> {
        if !(self.width > 0.0) || !(self.height > 0.0) {
            return Err(FolioError::validation("scene width/height must be > 0"));
        }

        for font in &self.fonts {
            if font.font_family.trim().is_empty() {
                return Err(FolioError::validation("font source has empty fontFamily"));
            }
            if font.url.trim().is_empty() {
                return Err(FolioError::validation(format!(
                    "font source '{}' has empty url",
                    font.font_family
                )));
            }
        }

        for (pi, page) in self.pages.iter().enumerate() {
            for (ei, child) in page.children.iter().enumerate() {
                validate_element(child).map_err(|e| FolioError::element(pi, ei, child.kind(), e))?;
            }
        }

        Ok(())
    }
}

fn validate_element(element: &Element) -> FolioResult<()> {
    let place = element.placement();
    if !(place.width > 0.0) || !(place.height > 0.0) {
        return Err(FolioError::validation("element width/height must be > 0"));
    }
    if !place.x.is_finite() || !place.y.is_finite() || !place.rotation.is_finite() {
        return Err(FolioError::validation("element coordinates must be finite"));
    }

    match element {
        Element::Text(text) => {
            if text.font_family.trim().is_empty() {
                return Err(FolioError::validation("text element has empty fontFamily"));
            }
            if !(text.font_size > 0.0) {
                return Err(FolioError::validation("text fontSize must be > 0"));
            }
            if !(text.line_height > 0.0) {
                return Err(FolioError::validation("text lineHeight must be > 0"));
            }
        }
        Element::Image(image) => {
            validate_crop(
                image.crop_x,
                image.crop_y,
                image.crop_width,
                image.crop_height,
            )?;
        }
        Element::Svg(svg) => {
            validate_crop(svg.crop_x, svg.crop_y, svg.crop_width, svg.crop_height)?;
        }
        Element::Line(_) => {}
    }

    Ok(())
}

fn validate_crop(x: f64, y: f64, width: f64, height: f64) -> FolioResult<()> {
    if !(0.0..=1.0).contains(&x) || !(0.0..=1.0).contains(&y) {
        return Err(FolioError::validation("cropX/cropY must be within [0, 1]"));
    }
    if !(width > 0.0 && width <= 1.0) || !(height > 0.0 && height <= 1.0) {
        return Err(FolioError::validation(
            "cropWidth/cropHeight must be within (0, 1]",
        ));
    }
    Ok(())
}
