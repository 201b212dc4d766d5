#[cfg(any(feature = "pdf", test))]
use std::path::Path;
use std::time::Duration;

#[cfg(any(feature = "pdf", test))]
use anyhow::Context as _;

use crate::compile::{CompileConfig, SceneCompiler};
use crate::error::FolioResult;
use crate::fetch::AssetFetcher;
use crate::fonts::FontCatalog;
use crate::model::Scene;
use crate::surface::{PaintOp, RecordingSurface};

/// Options for a full render run.
#[derive(Clone, Debug)]
pub struct RenderOptions {
    pub config: CompileConfig,
    /// Per-request timeout for remote asset fetches.
    pub fetch_timeout: Duration,
    /// Override for the font-catalog CSS endpoint.
    pub catalog_base_url: Option<String>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            config: CompileConfig::default(),
            fetch_timeout: Duration::from_secs(30),
            catalog_base_url: None,
        }
    }
}

/// Compile `scene` into its recorded paint-operation stream.
///
/// This is the backend-independent entry point: the op stream is what any
/// paint surface would receive, in document order.
pub fn compile_to_ops(
    scene: &Scene,
    fetcher: &dyn AssetFetcher,
    catalog: &dyn FontCatalog,
    config: CompileConfig,
) -> FolioResult<Vec<PaintOp>> {
    let mut surface = RecordingSurface::new();
    SceneCompiler::with_config(fetcher, catalog, config).compile(scene, &mut surface)?;
    Ok(surface.into_ops())
}

/// Render `scene` to a PDF file at `out_path`.
///
/// The document is fully compiled in memory and written via a temporary
/// sibling plus rename, so a failed run never leaves a truncated file that
/// claims to be complete.
#[cfg(feature = "pdf")]
pub fn render_to_pdf(
    scene: &Scene,
    out_path: impl AsRef<Path>,
    options: &RenderOptions,
) -> FolioResult<()> {
    use crate::fetch::HttpFetcher;
    use crate::fonts::RemoteFontCatalog;
    use crate::pdf::PdfSurface;

    let fetcher = HttpFetcher::new(options.fetch_timeout);
    let catalog = match &options.catalog_base_url {
        Some(base) => RemoteFontCatalog::new(base.clone()),
        None => RemoteFontCatalog::default(),
    };

    let mut surface = PdfSurface::new().with_oversample(options.config.oversample);
    SceneCompiler::with_config(&fetcher, &catalog, options.config.clone())
        .compile(scene, &mut surface)?;
    let bytes = surface.into_bytes()?;

    write_atomic(out_path.as_ref(), &bytes)
}

/// Write via tmp-sibling + rename; cleans the tmp file up on failure.
#[cfg(any(feature = "pdf", test))]
fn write_atomic(path: &Path, bytes: &[u8]) -> FolioResult<()> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("output");
    let tmp = path.with_file_name(format!("{file_name}.tmp"));

    std::fs::write(&tmp, bytes).with_context(|| format!("write '{}'", tmp.display()))?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(anyhow::Error::new(e)
            .context(format!("rename into '{}'", path.display()))
            .into());
    }
    Ok(())
}
