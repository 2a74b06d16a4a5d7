//! Render backend contract: adapted options, capabilities, and the engine trait.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use thiserror::Error;

use crate::config::{MediaType, Orientation, PaperSize, RenderConfig};

pub mod printpdf;

/// Subdirectory of the system temp dir used for backend font files and caches.
const FONT_SUBDIR: &str = "stampa-fonts";

/// Placeholder resolved to the one-based page number in page annotations.
pub const PAGE_NUM_PLACEHOLDER: &str = "{PAGE_NUM}";

/// Placeholder resolved to the total page count in page annotations.
pub const PAGE_COUNT_PLACEHOLDER: &str = "{PAGE_COUNT}";

/// Backend-facing options, translated verbatim from a [`RenderConfig`].
///
/// Carries the nine configured rendering fields plus the three path options
/// every backend receives. Backends consume the subset they have knobs for;
/// the full set is part of the contract so alternative backends can honor it.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineOptions {
    pub temp_dir: PathBuf,
    pub font_dir: PathBuf,
    pub font_cache_dir: PathBuf,
    pub default_media_type: MediaType,
    pub default_paper_size: PaperSize,
    pub default_paper_orientation: Orientation,
    pub default_font: String,
    pub dpi: u32,
    pub font_height_ratio: f32,
    pub scripts_enabled: bool,
    pub remote_enabled: bool,
    pub javascript_enabled: bool,
}

impl From<&RenderConfig> for EngineOptions {
    fn from(config: &RenderConfig) -> Self {
        let font_dir = std::env::temp_dir().join(FONT_SUBDIR);
        Self {
            temp_dir: std::env::temp_dir(),
            font_cache_dir: font_dir.clone(),
            font_dir,
            default_media_type: config.default_media_type,
            default_paper_size: config.default_paper_size,
            default_paper_orientation: config.default_paper_orientation,
            default_font: config.default_font.clone(),
            dpi: config.dpi,
            font_height_ratio: config.font_height_ratio,
            scripts_enabled: config.scripts_enabled,
            remote_enabled: config.remote_enabled,
            javascript_enabled: config.javascript_enabled,
        }
    }
}

impl EngineOptions {
    /// Effective page dimensions in millimeters, orientation applied.
    pub fn page_size_mm(&self) -> (f32, f32) {
        let (width, height) = self.default_paper_size.dimensions_mm();
        match self.default_paper_orientation {
            Orientation::Portrait => (width, height),
            Orientation::Landscape => (height, width),
        }
    }
}

/// Optional behavior a backend may declare.
///
/// Callers query capabilities instead of downcasting to concrete backend
/// types, so new backends only have to declare what they support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Document encryption applied to the rendered page canvas.
    Encryption,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Encryption => f.write_str("document encryption"),
        }
    }
}

/// Outcome of one render pass.
///
/// Warnings are explicit return values so nothing accumulates in process-wide
/// state; the caller inspects them immediately and decides whether to escalate.
#[derive(Debug, Default, Clone)]
pub struct RenderReport {
    pub warnings: Vec<String>,
}

/// A literal text annotation drawn at a fixed position on every page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageText {
    /// Text to draw; may contain the page-number placeholders.
    pub text: String,
    /// Horizontal position in points from the left page edge.
    pub x_pt: f32,
    /// Vertical position in points measured from the top page edge.
    pub y_from_top_pt: f32,
    pub size_pt: f32,
}

/// Encryption request recorded on a rendered document.
#[derive(Debug, Clone, PartialEq)]
pub struct EncryptionSpec {
    pub user_password: String,
    /// Falls back to the user password when empty.
    pub owner_password: String,
    /// Granted permissions; an empty list grants everything.
    pub permissions: Vec<PdfPermission>,
}

/// Reader permissions grantable on an encrypted document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PdfPermission {
    Print,
    Modify,
    Copy,
    Annotate,
    FillForms,
    ExtractForAccessibility,
    Assemble,
    PrintHighQuality,
}

/// Output-time options passed through to the backend's save path.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputOptions {
    /// Apply content stream compression; on by default.
    pub compress: bool,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self { compress: true }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no document source has been loaded")]
    NothingLoaded,
    #[error("no rendered document is available")]
    NotRendered,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unsupported encoding `{0}`")]
    UnsupportedEncoding(String),
    #[error("render failed: {0}")]
    Render(String),
    #[error("encryption failed: {0}")]
    Encryption(String),
}

/// An HTML-to-PDF backend.
///
/// One engine instance serves one document session: load a source, render it,
/// optionally annotate or encrypt the rendered document, and produce bytes.
/// Rendering again replaces the previous rendered document; recorded
/// annotations are re-applied so they survive forced re-renders.
pub trait RenderEngine: Send {
    fn name(&self) -> &'static str;

    fn supports(&self, capability: Capability) -> bool;

    fn options(&self) -> &EngineOptions;

    fn options_mut(&mut self) -> &mut EngineOptions;

    /// Replace the document source with an HTML string.
    fn load_html(&mut self, html: &str, encoding: Option<&str>) -> Result<(), EngineError>;

    /// Replace the document source with the contents of an HTML file.
    fn load_file(&mut self, path: &Path) -> Result<(), EngineError>;

    fn render(&mut self) -> Result<RenderReport, EngineError>;

    /// Draw a text annotation on every rendered page.
    fn page_text(&mut self, annotation: &PageText) -> Result<(), EngineError>;

    /// Record encryption to be applied when output is produced.
    fn set_encryption(&mut self, spec: &EncryptionSpec) -> Result<(), EngineError>;

    /// Produce the final PDF byte stream.
    fn output(&mut self, options: &OutputOptions) -> Result<Vec<u8>, EngineError>;
}

#[cfg(test)]
pub(crate) mod stub {
    use std::sync::{Arc, Mutex, MutexGuard};

    use super::*;

    /// Shared view into a [`StubEngine`]'s recorded activity.
    #[derive(Clone, Default)]
    pub struct StubHandle(Arc<Mutex<StubState>>);

    impl StubHandle {
        pub fn state(&self) -> MutexGuard<'_, StubState> {
            self.0.lock().expect("stub state")
        }
    }

    #[derive(Default)]
    pub struct StubState {
        pub loaded: Vec<(String, Option<String>)>,
        pub renders: usize,
        pub annotations: Vec<PageText>,
        pub encryption: Option<EncryptionSpec>,
    }

    /// In-memory backend for facade tests: records calls, emits configured
    /// warnings, and returns configured bytes.
    pub struct StubEngine {
        options: EngineOptions,
        handle: StubHandle,
        warnings: Vec<String>,
        encryption_supported: bool,
        output_bytes: Vec<u8>,
    }

    impl StubEngine {
        pub fn new() -> (Self, StubHandle) {
            let handle = StubHandle::default();
            let engine = Self {
                options: EngineOptions::from(&RenderConfig::default()),
                handle: handle.clone(),
                warnings: Vec::new(),
                encryption_supported: true,
                output_bytes: b"%PDF-stub".to_vec(),
            };
            (engine, handle)
        }

        pub fn with_warnings(mut self, warnings: &[&str]) -> Self {
            self.warnings = warnings.iter().map(ToString::to_string).collect();
            self
        }

        pub fn without_encryption_support(mut self) -> Self {
            self.encryption_supported = false;
            self
        }

        pub fn with_output(mut self, bytes: &[u8]) -> Self {
            self.output_bytes = bytes.to_vec();
            self
        }
    }

    impl RenderEngine for StubEngine {
        fn name(&self) -> &'static str {
            "stub"
        }

        fn supports(&self, capability: Capability) -> bool {
            match capability {
                Capability::Encryption => self.encryption_supported,
            }
        }

        fn options(&self) -> &EngineOptions {
            &self.options
        }

        fn options_mut(&mut self) -> &mut EngineOptions {
            &mut self.options
        }

        fn load_html(&mut self, html: &str, encoding: Option<&str>) -> Result<(), EngineError> {
            self.handle
                .state()
                .loaded
                .push((html.to_string(), encoding.map(ToString::to_string)));
            Ok(())
        }

        fn load_file(&mut self, path: &Path) -> Result<(), EngineError> {
            let html = std::fs::read_to_string(path)?;
            self.load_html(&html, None)
        }

        fn render(&mut self) -> Result<RenderReport, EngineError> {
            self.handle.state().renders += 1;
            Ok(RenderReport {
                warnings: self.warnings.clone(),
            })
        }

        fn page_text(&mut self, annotation: &PageText) -> Result<(), EngineError> {
            self.handle.state().annotations.push(annotation.clone());
            Ok(())
        }

        fn set_encryption(&mut self, spec: &EncryptionSpec) -> Result<(), EngineError> {
            self.handle.state().encryption = Some(spec.clone());
            Ok(())
        }

        fn output(&mut self, _options: &OutputOptions) -> Result<Vec<u8>, EngineError> {
            Ok(self.output_bytes.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> RenderConfig {
        RenderConfig {
            default_media_type: MediaType::Print,
            default_paper_size: PaperSize::Legal,
            default_paper_orientation: Orientation::Landscape,
            default_font: "courier".to_string(),
            dpi: 150,
            font_height_ratio: 0.9,
            scripts_enabled: true,
            remote_enabled: true,
            javascript_enabled: true,
            show_warnings: true,
            convert_entities: false,
        }
    }

    #[test]
    fn adapter_copies_every_configured_field() {
        let config = sample_config();
        let options = EngineOptions::from(&config);

        assert_eq!(options.default_media_type, config.default_media_type);
        assert_eq!(options.default_paper_size, config.default_paper_size);
        assert_eq!(
            options.default_paper_orientation,
            config.default_paper_orientation
        );
        assert_eq!(options.default_font, config.default_font);
        assert_eq!(options.dpi, config.dpi);
        assert_eq!(options.font_height_ratio, config.font_height_ratio);
        assert_eq!(options.scripts_enabled, config.scripts_enabled);
        assert_eq!(options.remote_enabled, config.remote_enabled);
        assert_eq!(options.javascript_enabled, config.javascript_enabled);
    }

    #[test]
    fn adapter_fixes_the_three_path_options() {
        let options = EngineOptions::from(&RenderConfig::default());
        let font_dir = std::env::temp_dir().join(FONT_SUBDIR);

        assert_eq!(options.temp_dir, std::env::temp_dir());
        assert_eq!(options.font_dir, font_dir);
        assert_eq!(options.font_cache_dir, font_dir);
    }

    #[test]
    fn page_size_swaps_dimensions_in_landscape() {
        let mut options = EngineOptions::from(&RenderConfig::default());
        assert_eq!(options.page_size_mm(), (210.0, 297.0));

        options.default_paper_orientation = Orientation::Landscape;
        assert_eq!(options.page_size_mm(), (297.0, 210.0));
    }
}
