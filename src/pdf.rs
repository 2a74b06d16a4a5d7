//! Render facade: one PDF session per request, from loaded HTML to bytes.

use std::path::Path;

use metrics::counter;
use serde_json::Value;
use tracing::debug;

use crate::{
    config::{Orientation, PaperSize, RenderConfig},
    engine::{
        Capability, EncryptionSpec, EngineOptions, OutputOptions, PAGE_COUNT_PLACEHOLDER,
        PAGE_NUM_PLACEHOLDER, PageText, PdfPermission, RenderEngine, printpdf::PrintpdfEngine,
    },
    error::Error,
    views::ViewRenderer,
};

/// Currency symbols rewritten to named entities before the backend sees the
/// HTML. Extend the table to cover further backend encoding quirks; call
/// sites never change.
const HTML_ENTITIES: &[(char, &str)] = &[('\u{20AC}', "&euro;"), ('\u{A3}', "&pound;")];

const DEFAULT_FOOTER_SEPARATOR: &str = "-";
const FOOTER_X_PT: f32 = 500.0;
const FOOTER_Y_FROM_TOP_PT: f32 = 820.0;
const FOOTER_SIZE_PT: f32 = 7.0;

/// Render lifecycle of the current session.
///
/// Every mutating load or option change resets to `Unrendered`; only a
/// successful render pass (including the warning gate) reaches `Rendered`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RenderState {
    Unrendered,
    Rendered,
}

/// A single PDF rendering session.
///
/// Owns a render backend, tracks whether the loaded source has been rendered,
/// and hands rendered bytes to the response assembler. One value serves one
/// render cycle within one request or CLI invocation.
pub struct Pdf {
    engine: Box<dyn RenderEngine>,
    state: RenderState,
    show_warnings: bool,
    convert_entities: bool,
}

impl std::fmt::Debug for Pdf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pdf")
            .field("engine", &self.engine.name())
            .field("state", &self.state)
            .field("show_warnings", &self.show_warnings)
            .field("convert_entities", &self.convert_entities)
            .finish()
    }
}

impl Pdf {
    /// Create a session backed by the default printpdf engine.
    pub fn new(config: &RenderConfig) -> Self {
        Self::with_engine(
            Box::new(PrintpdfEngine::new(EngineOptions::from(config))),
            config,
        )
    }

    /// Create a session around a caller-supplied backend.
    pub fn with_engine(engine: Box<dyn RenderEngine>, config: &RenderConfig) -> Self {
        Self {
            engine,
            state: RenderState::Unrendered,
            show_warnings: config.show_warnings,
            convert_entities: config.convert_entities,
        }
    }

    /// The underlying backend, for option inspection.
    pub fn engine(&self) -> &dyn RenderEngine {
        self.engine.as_ref()
    }

    /// Toggle warning escalation for this session.
    pub fn set_warnings(&mut self, show_warnings: bool) -> &mut Self {
        self.show_warnings = show_warnings;
        self
    }

    /// Load an HTML string, applying entity conversion when enabled.
    pub fn load_html(&mut self, html: &str, encoding: Option<&str>) -> Result<&mut Self, Error> {
        if self.convert_entities {
            let converted = convert_entities(html);
            self.engine.load_html(&converted, encoding)?;
        } else {
            self.engine.load_html(html, encoding)?;
        }
        self.state = RenderState::Unrendered;
        Ok(self)
    }

    /// Load HTML from a file through the backend's own file-loading routine.
    pub fn load_file(&mut self, path: &Path) -> Result<&mut Self, Error> {
        self.engine.load_file(path)?;
        self.state = RenderState::Unrendered;
        Ok(self)
    }

    /// Render a named view through the host's view layer, then load the HTML.
    pub fn load_view(
        &mut self,
        views: &dyn ViewRenderer,
        name: &str,
        data: &Value,
        encoding: Option<&str>,
    ) -> Result<&mut Self, Error> {
        let html = views.render(name, data)?;
        self.load_html(&html, encoding)
    }

    /// Override the paper format for this session.
    pub fn set_paper(&mut self, size: PaperSize, orientation: Orientation) -> &mut Self {
        let options = self.engine.options_mut();
        options.default_paper_size = size;
        options.default_paper_orientation = orientation;
        self.state = RenderState::Unrendered;
        self
    }

    /// Override the rendering resolution for this session.
    pub fn set_dpi(&mut self, dpi: u32) -> &mut Self {
        self.engine.options_mut().dpi = dpi;
        self.state = RenderState::Unrendered;
        self
    }

    /// Run a render pass unconditionally.
    ///
    /// When warning escalation is on and the backend reports anything, the
    /// pass fails with the concatenated messages and the session stays
    /// unrendered: a later `output` call repeats the render (and the failure,
    /// unless warnings are suppressed in between).
    pub fn render(&mut self) -> Result<(), Error> {
        let report = self.engine.render()?;
        counter!("stampa_render_total").increment(1);

        if self.show_warnings && !report.warnings.is_empty() {
            counter!("stampa_render_warning_total").increment(report.warnings.len() as u64);
            let mut messages = String::new();
            for warning in &report.warnings {
                messages.push_str(warning);
                messages.push('\n');
            }
            return Err(Error::RenderingWarnings { messages });
        }

        if !report.warnings.is_empty() {
            debug!(
                backend = self.engine.name(),
                warnings = report.warnings.len(),
                "render pass reported warnings"
            );
        }

        self.state = RenderState::Rendered;
        Ok(())
    }

    /// Return the rendered PDF bytes, rendering on demand first.
    pub fn output(&mut self) -> Result<Vec<u8>, Error> {
        self.output_with(&OutputOptions::default())
    }

    /// Like [`Pdf::output`], with explicit output-time options.
    pub fn output_with(&mut self, options: &OutputOptions) -> Result<Vec<u8>, Error> {
        if self.state == RenderState::Unrendered {
            self.render()?;
        }
        Ok(self.engine.output(options)?)
    }

    /// Encrypt the rendered document.
    ///
    /// Requires a backend with the encryption capability; a non-capable
    /// backend fails before any state is touched. An empty owner password
    /// falls back to the user password, and an empty permission list grants
    /// every permission.
    pub fn set_encryption(
        &mut self,
        password: &str,
        owner_password: &str,
        permissions: &[PdfPermission],
    ) -> Result<(), Error> {
        if !self.engine.supports(Capability::Encryption) {
            return Err(Error::UnsupportedBackend {
                backend: self.engine.name(),
                capability: Capability::Encryption,
            });
        }

        self.render()?;
        let spec = EncryptionSpec {
            user_password: password.to_string(),
            owner_password: owner_password.to_string(),
            permissions: permissions.to_vec(),
        };
        Ok(self.engine.set_encryption(&spec)?)
    }

    /// Draw a page footer with the default `-` separator.
    pub fn set_footer(&mut self, text: &str) -> Result<(), Error> {
        self.set_footer_with(text, DEFAULT_FOOTER_SEPARATOR)
    }

    /// Draw `"<text> <separator> <page>/<count>"` near the bottom-right of
    /// every page. Forces a render; repeated calls stack annotations rather
    /// than replacing them, so call at most once per document.
    pub fn set_footer_with(&mut self, text: &str, separator: &str) -> Result<(), Error> {
        self.render()?;
        let annotation = PageText {
            text: format!("{text} {separator} {PAGE_NUM_PLACEHOLDER}/{PAGE_COUNT_PLACEHOLDER}"),
            x_pt: FOOTER_X_PT,
            y_from_top_pt: FOOTER_Y_FROM_TOP_PT,
            size_pt: FOOTER_SIZE_PT,
        };
        Ok(self.engine.page_text(&annotation)?)
    }
}

fn convert_entities(html: &str) -> String {
    let mut converted = String::with_capacity(html.len());
    for character in html.chars() {
        match HTML_ENTITIES
            .iter()
            .find(|(symbol, _)| *symbol == character)
        {
            Some((_, entity)) => converted.push_str(entity),
            None => converted.push(character),
        }
    }
    converted
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::engine::stub::StubEngine;
    use crate::views::ViewError;

    fn session(engine: StubEngine, config: &RenderConfig) -> Pdf {
        Pdf::with_engine(Box::new(engine), config)
    }

    #[test]
    fn output_renders_once_across_repeated_calls() {
        let (engine, handle) = StubEngine::new();
        let mut pdf = session(engine, &RenderConfig::default());

        pdf.load_html("<p>invoice</p>", None).expect("load");
        pdf.output().expect("first output");
        pdf.output().expect("second output");
        pdf.output().expect("third output");

        assert_eq!(handle.state().renders, 1);
    }

    #[test]
    fn reloading_forces_the_next_output_to_rerender() {
        let (engine, handle) = StubEngine::new();
        let mut pdf = session(engine, &RenderConfig::default());

        pdf.load_html("<p>one</p>", None).expect("load");
        pdf.output().expect("output");
        pdf.load_html("<p>two</p>", None).expect("reload");
        pdf.output().expect("output after reload");

        assert_eq!(handle.state().renders, 2);
    }

    #[test]
    fn option_changes_force_the_next_output_to_rerender() {
        let (engine, handle) = StubEngine::new();
        let mut pdf = session(engine, &RenderConfig::default());

        pdf.load_html("<p>doc</p>", None).expect("load");
        pdf.output().expect("output");
        pdf.set_paper(PaperSize::A5, Orientation::Landscape);
        pdf.output().expect("output after set_paper");
        pdf.set_dpi(300);
        pdf.output().expect("output after set_dpi");

        assert_eq!(handle.state().renders, 3);
    }

    #[test]
    fn currency_symbols_become_named_entities() {
        let (engine, handle) = StubEngine::new();
        let mut pdf = session(engine, &RenderConfig::default());

        pdf.load_html("€100 and £50", None).expect("load");

        let state = handle.state();
        assert_eq!(state.loaded[0].0, "&euro;100 and &pound;50");
    }

    #[test]
    fn entity_conversion_can_be_disabled() {
        let config = RenderConfig {
            convert_entities: false,
            ..RenderConfig::default()
        };
        let (engine, handle) = StubEngine::new();
        let mut pdf = session(engine, &config);

        pdf.load_html("€100 and £50", None).expect("load");

        let state = handle.state();
        assert_eq!(state.loaded[0].0, "€100 and £50");
    }

    #[test]
    fn encoding_is_passed_through_to_the_backend() {
        let (engine, handle) = StubEngine::new();
        let mut pdf = session(engine, &RenderConfig::default());

        pdf.load_html("<p>doc</p>", Some("utf-8")).expect("load");

        let state = handle.state();
        assert_eq!(state.loaded[0].1.as_deref(), Some("utf-8"));
    }

    #[test]
    fn warnings_escalate_to_a_hard_error() {
        let config = RenderConfig {
            show_warnings: true,
            ..RenderConfig::default()
        };
        let (engine, _handle) = StubEngine::new();
        let engine = engine.with_warnings(&["missing font X"]);
        let mut pdf = session(engine, &config);

        pdf.load_html("<p>doc</p>", None).expect("load");
        let error = pdf.render().expect_err("warnings escalate");

        assert_eq!(error.to_string(), "missing font X\n");
    }

    #[test]
    fn multiple_warnings_concatenate_in_order() {
        let config = RenderConfig {
            show_warnings: true,
            ..RenderConfig::default()
        };
        let (engine, _handle) = StubEngine::new();
        let engine = engine.with_warnings(&["first", "second"]);
        let mut pdf = session(engine, &config);

        pdf.load_html("<p>doc</p>", None).expect("load");
        let error = pdf.render().expect_err("warnings escalate");

        assert_eq!(error.to_string(), "first\nsecond\n");
    }

    #[test]
    fn warning_failure_leaves_the_session_unrendered() {
        let config = RenderConfig {
            show_warnings: true,
            ..RenderConfig::default()
        };
        let (engine, handle) = StubEngine::new();
        let engine = engine.with_warnings(&["missing font X"]);
        let mut pdf = session(engine, &config);

        pdf.load_html("<p>doc</p>", None).expect("load");
        pdf.render().expect_err("first failure");
        pdf.output().expect_err("output re-renders and fails again");

        assert_eq!(handle.state().renders, 2);
    }

    #[test]
    fn warnings_are_ignored_when_escalation_is_off() {
        let (engine, _handle) = StubEngine::new();
        let engine = engine.with_warnings(&["missing font X"]);
        let mut pdf = session(engine, &RenderConfig::default());

        pdf.load_html("<p>doc</p>", None).expect("load");
        pdf.render().expect("warnings tolerated");
    }

    #[test]
    fn warning_escalation_can_be_toggled_per_session() {
        let (engine, _handle) = StubEngine::new();
        let engine = engine.with_warnings(&["late warning"]);
        let mut pdf = session(engine, &RenderConfig::default());
        pdf.set_warnings(true);

        pdf.load_html("<p>doc</p>", None).expect("load");
        assert!(pdf.render().is_err());
    }

    #[test]
    fn encryption_on_a_non_capable_backend_touches_nothing() {
        let (engine, handle) = StubEngine::new();
        let engine = engine.without_encryption_support();
        let mut pdf = session(engine, &RenderConfig::default());

        pdf.load_html("<p>doc</p>", None).expect("load");
        let error = pdf
            .set_encryption("secret", "", &[])
            .expect_err("capability missing");

        assert!(matches!(error, Error::UnsupportedBackend { .. }));
        let state = handle.state();
        assert_eq!(state.renders, 0);
        assert!(state.encryption.is_none());
    }

    #[test]
    fn encryption_forces_a_render_and_records_the_spec() {
        let (engine, handle) = StubEngine::new();
        let mut pdf = session(engine, &RenderConfig::default());

        pdf.load_html("<p>doc</p>", None).expect("load");
        pdf.set_encryption("secret", "owner", &[PdfPermission::Print])
            .expect("encryption recorded");

        let state = handle.state();
        assert_eq!(state.renders, 1);
        let spec = state.encryption.as_ref().expect("spec recorded");
        assert_eq!(spec.user_password, "secret");
        assert_eq!(spec.owner_password, "owner");
        assert_eq!(spec.permissions, vec![PdfPermission::Print]);
    }

    #[test]
    fn footer_calls_stack_annotations() {
        let (engine, handle) = StubEngine::new();
        let mut pdf = session(engine, &RenderConfig::default());

        pdf.load_html("<p>doc</p>", None).expect("load");
        pdf.set_footer("Acme Invoices").expect("first footer");
        pdf.set_footer_with("Confidential", "|")
            .expect("second footer");

        let state = handle.state();
        assert_eq!(state.renders, 2);
        assert_eq!(state.annotations.len(), 2);
        assert_eq!(
            state.annotations[0].text,
            "Acme Invoices - {PAGE_NUM}/{PAGE_COUNT}"
        );
        assert_eq!(
            state.annotations[1].text,
            "Confidential | {PAGE_NUM}/{PAGE_COUNT}"
        );
        assert_eq!(state.annotations[0].size_pt, 7.0);
        assert_eq!(state.annotations[0].x_pt, 500.0);
        assert_eq!(state.annotations[0].y_from_top_pt, 820.0);
    }

    #[test]
    fn views_render_through_the_collaborator() {
        let (engine, handle) = StubEngine::new();
        let mut pdf = session(engine, &RenderConfig::default());

        let views = |name: &str, data: &Value| -> Result<String, ViewError> {
            assert_eq!(name, "invoice");
            Ok(format!(
                "<h1>{}</h1>",
                data["title"].as_str().unwrap_or_default()
            ))
        };

        pdf.load_view(&views, "invoice", &json!({ "title": "Q3" }), None)
            .expect("view loaded");

        let state = handle.state();
        assert_eq!(state.loaded[0].0, "<h1>Q3</h1>");
    }

    #[test]
    fn view_failures_propagate() {
        let (engine, _handle) = StubEngine::new();
        let mut pdf = session(engine, &RenderConfig::default());

        let views = |name: &str, _data: &Value| -> Result<String, ViewError> {
            Err(ViewError::new(name, "template not found"))
        };

        let error = pdf
            .load_view(&views, "missing", &Value::Null, None)
            .expect_err("view failure");
        assert!(matches!(error, Error::View(_)));
    }

    #[test]
    fn load_file_surfaces_filesystem_errors() {
        let (engine, _handle) = StubEngine::new();
        let mut pdf = session(engine, &RenderConfig::default());

        let error = pdf
            .load_file(Path::new("/nonexistent/view.html"))
            .expect_err("missing file");
        assert!(matches!(
            error,
            Error::Engine(crate::engine::EngineError::Io(_))
        ));
    }
}
