//! printpdf-backed render engine.

use std::{collections::BTreeMap, fs, path::Path};

use ::printpdf::{
    BuiltinFont, Color, GeneratePdfOptions, Mm, Op, PdfDocument, PdfFontHandle, PdfPage,
    PdfParseErrorSeverity, PdfSaveOptions, PdfWarnMsg, Point, Pt, Rgb, TextItem,
};
use lopdf::encryption::{EncryptionState, EncryptionVersion, Permissions};
use tracing::debug;

use super::{
    Capability, EncryptionSpec, EngineError, EngineOptions, OutputOptions, PAGE_COUNT_PLACEHOLDER,
    PAGE_NUM_PLACEHOLDER, PageText, PdfPermission, RenderEngine, RenderReport,
};

const ENGINE_NAME: &str = "printpdf";
const ENCRYPTION_KEY_LENGTH: usize = 128;

/// The default backend: printpdf's HTML renderer plus lopdf encryption.
pub struct PrintpdfEngine {
    options: EngineOptions,
    source: Option<String>,
    rendered: Option<RenderedDocument>,
    annotations: Vec<PageText>,
    encryption: Option<EncryptionSpec>,
}

struct RenderedDocument {
    document: PdfDocument,
    pages: Vec<PdfPage>,
    page_height_pt: f32,
}

impl PrintpdfEngine {
    pub fn new(options: EngineOptions) -> Self {
        Self {
            options,
            source: None,
            rendered: None,
            annotations: Vec::new(),
            encryption: None,
        }
    }

    fn reset_session(&mut self) {
        self.rendered = None;
        self.annotations.clear();
        self.encryption = None;
    }
}

impl RenderEngine for PrintpdfEngine {
    fn name(&self) -> &'static str {
        ENGINE_NAME
    }

    fn supports(&self, capability: Capability) -> bool {
        match capability {
            Capability::Encryption => true,
        }
    }

    fn options(&self) -> &EngineOptions {
        &self.options
    }

    fn options_mut(&mut self) -> &mut EngineOptions {
        &mut self.options
    }

    fn load_html(&mut self, html: &str, encoding: Option<&str>) -> Result<(), EngineError> {
        if let Some(label) = encoding {
            if !label.eq_ignore_ascii_case("utf-8") && !label.eq_ignore_ascii_case("utf8") {
                return Err(EngineError::UnsupportedEncoding(label.to_string()));
            }
        }

        self.source = Some(html.to_string());
        self.reset_session();
        Ok(())
    }

    fn load_file(&mut self, path: &Path) -> Result<(), EngineError> {
        let html = fs::read_to_string(path)?;
        self.load_html(&html, None)
    }

    fn render(&mut self) -> Result<RenderReport, EngineError> {
        let source = self.source.as_ref().ok_or(EngineError::NothingLoaded)?;

        fs::create_dir_all(&self.options.font_dir)?;
        fs::create_dir_all(&self.options.font_cache_dir)?;

        let (width_mm, height_mm) = self.options.page_size_mm();
        let render_options = GeneratePdfOptions {
            page_width: Some(width_mm),
            page_height: Some(height_mm),
            ..GeneratePdfOptions::default()
        };

        let mut raw_warnings: Vec<PdfWarnMsg> = Vec::new();
        let mut document = PdfDocument::from_html(
            source,
            &BTreeMap::new(),
            &BTreeMap::new(),
            &render_options,
            &mut raw_warnings,
        )
        .map_err(EngineError::Render)?;
        document.metadata.info.document_title = String::new();
        let mut pages = std::mem::take(&mut document.pages);
        if pages.is_empty() {
            pages.push(PdfPage::new(Mm(width_mm), Mm(height_mm), Vec::new()));
        }

        debug!(
            pages = pages.len(),
            warnings = raw_warnings.len(),
            "rendered html source"
        );

        let mut rendered = RenderedDocument {
            document,
            pages,
            page_height_pt: Mm(height_mm).into_pt().0,
        };

        // A forced re-render must not drop annotations recorded earlier.
        for annotation in &self.annotations {
            apply_annotation(&mut rendered, annotation);
        }
        self.rendered = Some(rendered);

        Ok(RenderReport {
            warnings: collect_warnings(&raw_warnings),
        })
    }

    fn page_text(&mut self, annotation: &PageText) -> Result<(), EngineError> {
        let rendered = self.rendered.as_mut().ok_or(EngineError::NotRendered)?;
        apply_annotation(rendered, annotation);
        self.annotations.push(annotation.clone());
        Ok(())
    }

    fn set_encryption(&mut self, spec: &EncryptionSpec) -> Result<(), EngineError> {
        if self.rendered.is_none() {
            return Err(EngineError::NotRendered);
        }
        self.encryption = Some(spec.clone());
        Ok(())
    }

    fn output(&mut self, options: &OutputOptions) -> Result<Vec<u8>, EngineError> {
        let rendered = self.rendered.as_ref().ok_or(EngineError::NotRendered)?;

        let mut document = rendered.document.clone();
        document.with_pages(rendered.pages.clone());

        let save_options = PdfSaveOptions {
            optimize: options.compress,
            ..PdfSaveOptions::default()
        };
        let bytes = document.save(&save_options, &mut Vec::new());

        match &self.encryption {
            Some(spec) => encrypt_document(&bytes, spec),
            None => Ok(bytes),
        }
    }
}

/// Severity label printpdf uses for informational chatter; everything else is
/// surfaced to the warning gate.
const INFO_SEVERITY: PdfParseErrorSeverity = PdfParseErrorSeverity::Info;

fn collect_warnings(raw: &[PdfWarnMsg]) -> Vec<String> {
    raw.iter()
        .filter(|warning| warning.severity != INFO_SEVERITY)
        .map(|warning| warning.msg.clone())
        .collect()
}

fn apply_annotation(rendered: &mut RenderedDocument, annotation: &PageText) {
    let page_count = rendered.pages.len();
    let y = Pt((rendered.page_height_pt - annotation.y_from_top_pt).max(0.0));

    for (index, page) in rendered.pages.iter_mut().enumerate() {
        let resolved = annotation
            .text
            .replace(PAGE_NUM_PLACEHOLDER, &(index + 1).to_string())
            .replace(PAGE_COUNT_PLACEHOLDER, &page_count.to_string());

        page.ops.extend([
            Op::StartTextSection,
            Op::SetTextCursor {
                pos: Point {
                    x: Pt(annotation.x_pt),
                    y,
                },
            },
            Op::SetFont {
                font: PdfFontHandle::Builtin(BuiltinFont::Helvetica),
                size: Pt(annotation.size_pt),
            },
            Op::SetFillColor {
                col: Color::Rgb(Rgb {
                    r: 0.0,
                    g: 0.0,
                    b: 0.0,
                    icc_profile: None,
                }),
            },
            Op::ShowText {
                items: vec![TextItem::Text(resolved)],
            },
            Op::EndTextSection,
        ]);
    }
}

fn encrypt_document(bytes: &[u8], spec: &EncryptionSpec) -> Result<Vec<u8>, EngineError> {
    let mut document =
        lopdf::Document::load_mem(bytes).map_err(|err| EngineError::Encryption(err.to_string()))?;

    let owner_password = if spec.owner_password.is_empty() {
        spec.user_password.as_str()
    } else {
        spec.owner_password.as_str()
    };

    let state = EncryptionState::try_from(EncryptionVersion::V2 {
        document: &document,
        owner_password,
        user_password: spec.user_password.as_str(),
        key_length: ENCRYPTION_KEY_LENGTH,
        permissions: granted_permissions(spec),
    })
    .map_err(|err| EngineError::Encryption(err.to_string()))?;

    document
        .encrypt(&state)
        .map_err(|err| EngineError::Encryption(err.to_string()))?;

    let mut encrypted = Vec::new();
    document
        .save_to(&mut encrypted)
        .map_err(|err| EngineError::Encryption(err.to_string()))?;
    Ok(encrypted)
}

fn granted_permissions(spec: &EncryptionSpec) -> Permissions {
    if spec.permissions.is_empty() {
        return Permissions::all();
    }

    let mut granted = Permissions::empty();
    for permission in &spec.permissions {
        granted |= match permission {
            PdfPermission::Print => Permissions::PRINTABLE,
            PdfPermission::Modify => Permissions::MODIFIABLE,
            PdfPermission::Copy => Permissions::COPYABLE,
            PdfPermission::Annotate => Permissions::ANNOTABLE,
            PdfPermission::FillForms => Permissions::FILLABLE,
            PdfPermission::ExtractForAccessibility => Permissions::COPYABLE_FOR_ACCESSIBILITY,
            PdfPermission::Assemble => Permissions::ASSEMBLABLE,
            PdfPermission::PrintHighQuality => Permissions::PRINTABLE_IN_HIGH_QUALITY,
        };
    }
    granted
}
