pub type FolioResult<T> = Result<T, FolioError>;

#[derive(thiserror::Error, Debug)]
pub enum FolioError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("invalid color '{0}'")]
    InvalidColor(String),

    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(String),

    #[error("font unavailable: {0}")]
    FontUnavailable(String),

    #[error("asset fetch failed for '{locator}': {reason}")]
    AssetFetchFailed { locator: String, reason: String },

    #[error("markup parse failed: {0}")]
    MarkupParseFailed(String),

    #[error("page {page}, element {element} ({kind}): {source}")]
    Element {
        page: usize,
        element: usize,
        kind: &'static str,
        #[source]
        source: Box<FolioError>,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FolioError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_color(color: impl Into<String>) -> Self {
        Self::InvalidColor(color.into())
    }

    pub fn degenerate(msg: impl Into<String>) -> Self {
        Self::DegenerateGeometry(msg.into())
    }

    pub fn font_unavailable(msg: impl Into<String>) -> Self {
        Self::FontUnavailable(msg.into())
    }

    pub fn fetch_failed(locator: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::AssetFetchFailed {
            locator: locator.into(),
            reason: reason.into(),
        }
    }

    pub fn markup(msg: impl Into<String>) -> Self {
        Self::MarkupParseFailed(msg.into())
    }

    /// Wrap an element-scoped failure with its document location.
    pub fn element(page: usize, element: usize, kind: &'static str, source: FolioError) -> Self {
        Self::Element {
            page,
            element,
            kind,
            source: Box::new(source),
        }
    }

    pub fn is_degenerate(&self) -> bool {
        matches!(self, Self::DegenerateGeometry(_))
    }

    pub fn is_fetch_failure(&self) -> bool {
        matches!(self, Self::AssetFetchFailed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            FolioError::validation("x")
                .to_string()
                .contains("validation error:")
        );
        assert!(
            FolioError::invalid_color("bogus")
                .to_string()
                .contains("invalid color 'bogus'")
        );
        assert!(
            FolioError::degenerate("x")
                .to_string()
                .contains("degenerate geometry:")
        );
        assert!(
            FolioError::font_unavailable("x")
                .to_string()
                .contains("font unavailable:")
        );
        assert!(
            FolioError::markup("x")
                .to_string()
                .contains("markup parse failed:")
        );
    }

    #[test]
    fn element_wrapper_reports_location_and_cause() {
        let err = FolioError::element(2, 5, "image", FolioError::fetch_failed("http://x", "404"));
        let msg = err.to_string();
        assert!(msg.contains("page 2, element 5 (image)"));
        assert!(msg.contains("http://x"));
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = FolioError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}
