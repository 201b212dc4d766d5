use std::collections::BTreeSet;

use crate::error::{FolioError, FolioResult};
use crate::fetch::AssetFetcher;
use crate::model::FontSource;
use crate::surface::PaintSurface;

/// Looks up a font-catalog stylesheet for a family name. The first asset
/// URL embedded in the returned CSS is the font to fetch.
pub trait FontCatalog {
    fn lookup_font_css(&self, family: &str, fetcher: &dyn AssetFetcher) -> FolioResult<String>;
}

/// Catalog backed by a CSS endpoint in the Google Fonts style:
/// `<base>?family=<name>`.
pub struct RemoteFontCatalog {
    base_url: String,
}

impl RemoteFontCatalog {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

impl Default for RemoteFontCatalog {
    fn default() -> Self {
        Self::new("https://fonts.googleapis.com/css")
    }
}

impl FontCatalog for RemoteFontCatalog {
    fn lookup_font_css(&self, family: &str, fetcher: &dyn AssetFetcher) -> FolioResult<String> {
        let query = family.trim().replace(' ', "+");
        let url = format!("{}?family={}", self.base_url, query);
        fetcher.fetch_text(&url)
    }
}

/// A catalog with no entries; every lookup fails. Useful when remote
/// fallback is unwanted (tests, air-gapped runs).
pub struct EmptyFontCatalog;

impl FontCatalog for EmptyFontCatalog {
    fn lookup_font_css(&self, family: &str, _fetcher: &dyn AssetFetcher) -> FolioResult<String> {
        Err(FolioError::font_unavailable(format!(
            "no catalog entry for '{family}'"
        )))
    }
}

/// First `http(s)` URL embedded in a stylesheet body, as it appears inside
/// `url(...)` or quoted strings.
pub fn first_asset_url(css: &str) -> Option<&str> {
    let start = match (css.find("https://"), css.find("http://")) {
        (Some(a), Some(b)) => a.min(b),
        (Some(a), None) => a,
        (None, Some(b)) => b,
        (None, None) => return None,
    };
    let rest = &css[start..];
    let end = rest
        .find([')', '"', '\'', ' ', '\n', '\r', '\t'])
        .unwrap_or(rest.len());
    Some(&rest[..end])
}

/// Run-scoped font registry: each family is fetched and registered on the
/// paint surface at most once per compilation run. Created fresh per run;
/// no cross-run persistence.
#[derive(Debug, Default)]
pub struct FontCache {
    loaded: BTreeSet<String>,
}

impl FontCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loaded(&self, family: &str) -> bool {
        self.loaded.contains(family)
    }

    /// Register every scene-declared font up front. Later duplicates of a
    /// family are redundant and skipped.
    pub fn preload(
        &mut self,
        fonts: &[FontSource],
        fetcher: &dyn AssetFetcher,
        surface: &mut dyn PaintSurface,
    ) -> FolioResult<()> {
        for font in fonts {
            if self.is_loaded(&font.font_family) {
                continue;
            }
            let bytes = fetcher.fetch_bytes(&font.url).map_err(|e| {
                FolioError::font_unavailable(format!("'{}': {e}", font.font_family))
            })?;
            surface.register_font(&font.font_family, &bytes)?;
            self.loaded.insert(font.font_family.clone());
        }
        Ok(())
    }

    /// Ensure `family` is registered before text using it is emitted.
    ///
    /// Resolution order: already loaded → scene-declared source → catalog
    /// fallback (first asset URL of the family's stylesheet). Any failure
    /// on the fallback path is fatal for the family: silently omitting
    /// text would misrepresent the document.
    pub fn ensure_loaded(
        &mut self,
        family: &str,
        preloaded: &[FontSource],
        fetcher: &dyn AssetFetcher,
        catalog: &dyn FontCatalog,
        surface: &mut dyn PaintSurface,
    ) -> FolioResult<()> {
        if self.is_loaded(family) {
            return Ok(());
        }

        let bytes = if let Some(source) = preloaded.iter().find(|f| f.font_family == family) {
            fetcher
                .fetch_bytes(&source.url)
                .map_err(|e| FolioError::font_unavailable(format!("'{family}': {e}")))?
        } else {
            tracing::debug!(family, "family not preloaded, querying font catalog");
            let css = catalog
                .lookup_font_css(family, fetcher)
                .map_err(|e| match e {
                    FolioError::FontUnavailable(_) => e,
                    other => FolioError::font_unavailable(format!(
                        "catalog lookup for '{family}': {other}"
                    )),
                })?;
            let url = first_asset_url(&css).ok_or_else(|| {
                FolioError::font_unavailable(format!(
                    "catalog stylesheet for '{family}' contains no asset url"
                ))
            })?;
            fetcher
                .fetch_bytes(url)
                .map_err(|e| FolioError::font_unavailable(format!("'{family}': {e}")))?
        };

        surface.register_font(family, &bytes)?;
        self.loaded.insert(family.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_asset_url_finds_url_inside_css() {
        let css = "@font-face {\n  font-family: 'Arial';\n  src: url(https://fonts.example/a.ttf) format('truetype');\n}";
        assert_eq!(
            first_asset_url(css),
            Some("https://fonts.example/a.ttf")
        );
    }

    #[test]
    fn first_asset_url_takes_the_first_of_many() {
        let css = "url(http://a.example/1.woff2); url(http://a.example/2.woff2)";
        assert_eq!(first_asset_url(css), Some("http://a.example/1.woff2"));
    }

    #[test]
    fn first_asset_url_handles_quoted_sources() {
        let css = r#"src: url("https://fonts.example/b.ttf");"#;
        assert_eq!(first_asset_url(css), Some("https://fonts.example/b.ttf"));
    }

    #[test]
    fn first_asset_url_none_without_urls() {
        assert_eq!(first_asset_url("body { color: red }"), None);
    }

    #[test]
    fn catalog_query_encodes_spaces() {
        use crate::fetch::StaticFetcher;

        let mut fetcher = StaticFetcher::new();
        fetcher.insert(
            "https://fonts.googleapis.com/css?family=Open+Sans",
            "url(https://fonts.example/os.ttf)",
        );
        let catalog = RemoteFontCatalog::default();
        let css = catalog.lookup_font_css("Open Sans", &fetcher).unwrap();
        assert!(css.contains("os.ttf"));
    }
}
