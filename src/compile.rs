use crate::color::{self, Rgba};
use crate::cropfit::{self, CropWindow};
use crate::error::{FolioError, FolioResult};
use crate::fetch::AssetFetcher;
use crate::fonts::{FontCache, FontCatalog};
use crate::model::{Element, ImageElement, LineElement, Scene, SvgElement, TextElement};
use crate::recolor::recolor;
use crate::surface::{BoxSize, PaintSurface, TextOptions};

/// Fill color painted in place of an image/svg whose asset could not be
/// fetched, when the policy allows degrading instead of aborting.
const PLACEHOLDER_FILL: Rgba = Rgba {
    r: 229,
    g: 229,
    b: 229,
    a: 255,
};

/// What to do when fetching an image/svg asset fails. Fonts are always
/// fatal: a missing font would silently misrepresent the document.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FetchFailurePolicy {
    /// Abort the whole run with full element context.
    #[default]
    Abort,
    /// Paint a flat placeholder box, log, and continue.
    Placeholder,
}

#[derive(Clone, Debug)]
pub struct CompileConfig {
    /// Raster oversampling factor for cropped images.
    pub oversample: u32,
    /// Extra width added to text boxes so glyph edges are not clipped.
    pub text_box_padding: f64,
    pub fetch_failure: FetchFailurePolicy,
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            oversample: 2,
            text_box_padding: 2.0,
            fetch_failure: FetchFailurePolicy::Abort,
        }
    }
}

/// Walks a scene once and emits paint operations to a [`PaintSurface`] in
/// strict document order: pages in scene order, children in array order,
/// later siblings painting over earlier ones.
///
/// The font cache is created fresh per run and lives for the run only.
pub struct SceneCompiler<'a> {
    fetcher: &'a dyn AssetFetcher,
    catalog: &'a dyn FontCatalog,
    config: CompileConfig,
    fonts: FontCache,
}

impl<'a> SceneCompiler<'a> {
    pub fn new(fetcher: &'a dyn AssetFetcher, catalog: &'a dyn FontCatalog) -> Self {
        Self::with_config(fetcher, catalog, CompileConfig::default())
    }

    pub fn with_config(
        fetcher: &'a dyn AssetFetcher,
        catalog: &'a dyn FontCatalog,
        config: CompileConfig,
    ) -> Self {
        Self {
            fetcher,
            catalog,
            config,
            fonts: FontCache::new(),
        }
    }

    /// Compile `scene` into paint operations on `surface`.
    #[tracing::instrument(skip_all)]
    pub fn compile(mut self, scene: &Scene, surface: &mut dyn PaintSurface) -> FolioResult<()> {
        scene.validate()?;
        surface.begin_document(scene.width, scene.height)?;
        self.fonts.preload(&scene.fonts, self.fetcher, surface)?;

        for (page_index, page) in scene.pages.iter().enumerate() {
            surface.begin_page()?;

            if let Some(background) = &page.background {
                self.paint_background(background, scene, surface)
                    .map_err(|e| {
                        FolioError::Other(anyhow::anyhow!("page {page_index} background: {e}"))
                    })?;
            }

            for (child_index, child) in page.children.iter().enumerate() {
                let place = child.placement();
                surface.save()?;
                // The transform stack is unwound unconditionally so a
                // failed element cannot skew its later siblings.
                let painted = surface
                    .translate(place.x, place.y)
                    .and_then(|()| surface.rotate(place.rotation))
                    .and_then(|()| self.paint_element(child, scene, surface));
                surface.restore()?;
                painted
                    .map_err(|e| FolioError::element(page_index, child_index, child.kind(), e))?;
            }

            surface.end_page()?;
        }

        surface.end()
    }

    fn paint_element(
        &mut self,
        element: &Element,
        scene: &Scene,
        surface: &mut dyn PaintSurface,
    ) -> FolioResult<()> {
        match element {
            Element::Text(text) => self.paint_text(text, scene, surface),
            Element::Line(line) => paint_line(line, surface),
            Element::Image(image) => {
                let result = self.paint_image(image, surface);
                self.recover_content_failure(result, element, surface)
            }
            Element::Svg(svg) => {
                let result = self.paint_svg(svg, surface);
                self.recover_content_failure(result, element, surface)
            }
        }
    }

    fn paint_text(
        &mut self,
        text: &TextElement,
        scene: &Scene,
        surface: &mut dyn PaintSurface,
    ) -> FolioResult<()> {
        self.fonts.ensure_loaded(
            &text.font_family,
            &scene.fonts,
            self.fetcher,
            self.catalog,
            surface,
        )?;
        surface.set_font(&text.font_family, text.font_size)?;
        surface.set_fill_color(color::resolve(&text.fill)?)?;

        let options = TextOptions {
            align: text.align,
            line_gap: (text.line_height - 1.0) * text.font_size,
            width: text.place.width + self.config.text_box_padding,
            underline: text.text_decoration.contains("underline"),
        };
        surface.draw_text(&text.text, 0.0, 0.0, &options)
    }

    fn paint_image(&self, image: &ImageElement, surface: &mut dyn PaintSurface) -> FolioResult<()> {
        let bytes = self.fetcher.fetch_bytes(&image.src)?;
        let crop = CropWindow::new(image.crop_x, image.crop_y, image.crop_width, image.crop_height);
        let png = cropfit::render_crop(
            &bytes,
            crop,
            image.place.width,
            image.place.height,
            self.config.oversample,
        )?;
        surface.draw_image(
            &png,
            0.0,
            0.0,
            BoxSize {
                width: image.place.width,
                height: image.place.height,
            },
        )
    }

    fn paint_svg(&self, svg: &SvgElement, surface: &mut dyn PaintSurface) -> FolioResult<()> {
        let markup = self.fetcher.fetch_text(&svg.src)?;
        let recolored = recolor(&markup, &svg.colors_replace)?;

        let (natural_width, natural_height) = vector_natural_size(&recolored)?;
        let crop = CropWindow::new(svg.crop_x, svg.crop_y, svg.crop_width, svg.crop_height);
        // Vector sources rescale without loss; the sampling pass only
        // validates the geometry (identity modulo the renderer's scale).
        cropfit::compute_sampling(
            natural_width,
            natural_height,
            crop,
            svg.place.width,
            svg.place.height,
            true,
        )?;

        surface.draw_vector(
            &recolored,
            0.0,
            0.0,
            BoxSize {
                width: svg.place.width,
                height: svg.place.height,
            },
        )
    }

    fn paint_background(
        &self,
        background: &str,
        scene: &Scene,
        surface: &mut dyn PaintSurface,
    ) -> FolioResult<()> {
        if is_raster_locator(background) {
            let bytes = self.fetcher.fetch_bytes(background)?;
            surface.draw_image(
                &bytes,
                0.0,
                0.0,
                BoxSize {
                    width: scene.width,
                    height: scene.height,
                },
            )
        } else {
            let rgba = color::resolve(background)?;
            surface.fill_rect(0.0, 0.0, scene.width, scene.height, rgba)
        }
    }

    /// Degenerate geometry skips the element; a fetch failure skips it only
    /// under the placeholder policy. Everything else stays fatal.
    fn recover_content_failure(
        &self,
        result: FolioResult<()>,
        element: &Element,
        surface: &mut dyn PaintSurface,
    ) -> FolioResult<()> {
        let Err(err) = result else {
            return Ok(());
        };

        if err.is_degenerate() {
            tracing::warn!(kind = element.kind(), error = %err, "skipping degenerate element");
            return Ok(());
        }

        if err.is_fetch_failure() && self.config.fetch_failure == FetchFailurePolicy::Placeholder {
            tracing::warn!(kind = element.kind(), error = %err, "painting placeholder");
            let place = element.placement();
            return surface.fill_rect(0.0, 0.0, place.width, place.height, PLACEHOLDER_FILL);
        }

        Err(err)
    }
}

fn paint_line(line: &LineElement, surface: &mut dyn PaintSurface) -> FolioResult<()> {
    surface.stroke_line(0.0, 0.0, line.place.width, 0.0, line.place.height)
}

/// A page background is a raster locator (vs a color string) when it is a
/// URL, a data-URI, or a path with a known raster extension.
fn is_raster_locator(background: &str) -> bool {
    let lower = background.to_ascii_lowercase();
    lower.contains("http")
        || lower.starts_with("data:")
        || lower.ends_with(".png")
        || lower.ends_with(".jpg")
        || lower.ends_with(".jpeg")
}

/// Intrinsic size of vector markup, from its width/height or viewBox.
fn vector_natural_size(markup: &str) -> FolioResult<(f64, f64)> {
    let tree = usvg::Tree::from_str(markup, &usvg::Options::default())
        .map_err(|e| FolioError::markup(format!("invalid svg: {e}")))?;
    let size = tree.size();
    Ok((f64::from(size.width()), f64::from(size.height())))
}
