#![forbid(unsafe_code)]

pub mod color;
pub mod compile;
pub mod cropfit;
pub mod error;
pub mod fetch;
pub mod fingerprint;
pub mod fonts;
pub mod model;
#[cfg(feature = "pdf")]
pub mod pdf;
pub mod pipeline;
pub mod recolor;
pub mod surface;

pub use color::{Rgba, resolve as resolve_color};
pub use compile::{CompileConfig, FetchFailurePolicy, SceneCompiler};
pub use cropfit::{CropWindow, SamplingRect, compute_sampling};
pub use error::{FolioError, FolioResult};
pub use fetch::{AssetFetcher, HttpFetcher, StaticFetcher};
pub use fingerprint::fingerprint_ops;
pub use fonts::{EmptyFontCatalog, FontCache, FontCatalog, RemoteFontCatalog};
pub use model::{
    Align, Element, FontSource, ImageElement, LineElement, Page, Placement, Scene, SvgElement,
    TextElement,
};
#[cfg(feature = "pdf")]
pub use pdf::PdfSurface;
#[cfg(feature = "pdf")]
pub use pipeline::render_to_pdf;
pub use pipeline::{RenderOptions, compile_to_ops};
pub use recolor::recolor;
pub use surface::{BoxSize, PaintOp, PaintSurface, RecordingSurface, TextOptions};
