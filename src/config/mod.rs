//! Configuration layer: typed rendering defaults with layered precedence (file → env).

use std::{fmt, path::Path, str::FromStr};

use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;


/// Basename of the configuration file read from the consuming application,
/// relative to its working directory. The publisher writes the same file.
pub const CONFIG_BASENAME: &str = "config/pdf";

/// Prefix for environment-variable overrides (`STAMPA_DPI=150` and friends).
pub const ENV_PREFIX: &str = "STAMPA";

const DEFAULT_MEDIA_TYPE: MediaType = MediaType::Screen;
const DEFAULT_PAPER_SIZE: PaperSize = PaperSize::A4;
const DEFAULT_PAPER_ORIENTATION: Orientation = Orientation::Portrait;
const DEFAULT_FONT: &str = "serif";
const DEFAULT_DPI: u32 = 96;
const DEFAULT_FONT_HEIGHT_RATIO: f32 = 1.1;
const MAX_DPI: u32 = 2400;

/// Fully-resolved rendering defaults after precedence resolution and validation.
///
/// Immutable once loaded; one value configures one render engine instance.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    pub default_media_type: MediaType,
    pub default_paper_size: PaperSize,
    pub default_paper_orientation: Orientation,
    pub default_font: String,
    pub dpi: u32,
    pub font_height_ratio: f32,
    /// Allow the backend to execute scripts embedded in the document source.
    pub scripts_enabled: bool,
    /// Allow the backend to fetch remote resources referenced by the document.
    pub remote_enabled: bool,
    /// Allow the backend to run client-side JavaScript found in the document.
    pub javascript_enabled: bool,
    /// Promote backend warnings to hard rendering errors.
    pub show_warnings: bool,
    /// Rewrite known currency symbols to named HTML entities before loading.
    pub convert_entities: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            default_media_type: DEFAULT_MEDIA_TYPE,
            default_paper_size: DEFAULT_PAPER_SIZE,
            default_paper_orientation: DEFAULT_PAPER_ORIENTATION,
            default_font: DEFAULT_FONT.to_string(),
            dpi: DEFAULT_DPI,
            font_height_ratio: DEFAULT_FONT_HEIGHT_RATIO,
            scripts_enabled: false,
            remote_enabled: false,
            javascript_enabled: false,
            show_warnings: false,
            convert_entities: true,
        }
    }
}

/// CSS media type the backend styles the document for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Screen,
    Print,
}

impl MediaType {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaType::Screen => "screen",
            MediaType::Print => "print",
        }
    }
}

impl FromStr for MediaType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "screen" => Ok(MediaType::Screen),
            "print" => Ok(MediaType::Print),
            other => Err(format!(
                "unknown media type `{other}`, expected `screen` or `print`"
            )),
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named paper formats the backends understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaperSize {
    A3,
    A4,
    A5,
    Letter,
    Legal,
    Tabloid,
}

impl PaperSize {
    /// Portrait dimensions in millimeters (width, height).
    pub fn dimensions_mm(self) -> (f32, f32) {
        match self {
            PaperSize::A3 => (297.0, 420.0),
            PaperSize::A4 => (210.0, 297.0),
            PaperSize::A5 => (148.0, 210.0),
            PaperSize::Letter => (215.9, 279.4),
            PaperSize::Legal => (215.9, 355.6),
            PaperSize::Tabloid => (279.4, 431.8),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PaperSize::A3 => "a3",
            PaperSize::A4 => "a4",
            PaperSize::A5 => "a5",
            PaperSize::Letter => "letter",
            PaperSize::Legal => "legal",
            PaperSize::Tabloid => "tabloid",
        }
    }
}

impl FromStr for PaperSize {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "a3" => Ok(PaperSize::A3),
            "a4" => Ok(PaperSize::A4),
            "a5" => Ok(PaperSize::A5),
            "letter" => Ok(PaperSize::Letter),
            "legal" => Ok(PaperSize::Legal),
            "tabloid" => Ok(PaperSize::Tabloid),
            other => Err(format!(
                "unknown paper size `{other}`, expected one of a3, a4, a5, letter, legal, tabloid"
            )),
        }
    }
}

impl fmt::Display for PaperSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Portrait,
    Landscape,
}

impl Orientation {
    pub fn as_str(self) -> &'static str {
        match self {
            Orientation::Portrait => "portrait",
            Orientation::Landscape => "landscape",
        }
    }
}

impl FromStr for Orientation {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "portrait" => Ok(Orientation::Portrait),
            "landscape" => Ok(Orientation::Landscape),
            other => Err(format!(
                "unknown orientation `{other}`, expected `portrait` or `landscape`"
            )),
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load rendering defaults using the configured precedence (file → environment).
///
/// `config_file` adds an explicit file source on top of the conventional
/// `config/pdf.toml` lookup; `None` keeps the conventional sources only.
pub fn load(config_file: Option<&Path>) -> Result<RenderConfig, LoadError> {
    let mut builder =
        Config::builder().add_source(File::with_name(CONFIG_BASENAME).required(false));

    if let Some(path) = config_file {
        builder = builder.add_source(File::from(path).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let raw: RawRenderConfig = builder.build()?.try_deserialize()?;
    RenderConfig::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRenderConfig {
    default_media_type: Option<String>,
    default_paper_size: Option<String>,
    default_paper_orientation: Option<String>,
    default_font: Option<String>,
    dpi: Option<u32>,
    font_height_ratio: Option<f32>,
    scripts_enabled: Option<bool>,
    remote_enabled: Option<bool>,
    javascript_enabled: Option<bool>,
    show_warnings: Option<bool>,
    convert_entities: Option<bool>,
}

impl RenderConfig {
    fn from_raw(raw: RawRenderConfig) -> Result<Self, LoadError> {
        let default_media_type = match raw.default_media_type {
            Some(value) => value
                .parse()
                .map_err(|reason| LoadError::invalid("default_media_type", reason))?,
            None => DEFAULT_MEDIA_TYPE,
        };

        let default_paper_size = match raw.default_paper_size {
            Some(value) => value
                .parse()
                .map_err(|reason| LoadError::invalid("default_paper_size", reason))?,
            None => DEFAULT_PAPER_SIZE,
        };

        let default_paper_orientation = match raw.default_paper_orientation {
            Some(value) => value
                .parse()
                .map_err(|reason| LoadError::invalid("default_paper_orientation", reason))?,
            None => DEFAULT_PAPER_ORIENTATION,
        };

        let default_font = raw.default_font.unwrap_or_else(|| DEFAULT_FONT.to_string());
        if default_font.trim().is_empty() {
            return Err(LoadError::invalid("default_font", "must not be empty"));
        }

        let dpi = raw.dpi.unwrap_or(DEFAULT_DPI);
        if dpi == 0 || dpi > MAX_DPI {
            return Err(LoadError::invalid(
                "dpi",
                format!("must be between 1 and {MAX_DPI}"),
            ));
        }

        let font_height_ratio = raw.font_height_ratio.unwrap_or(DEFAULT_FONT_HEIGHT_RATIO);
        if !font_height_ratio.is_finite() || font_height_ratio <= 0.0 {
            return Err(LoadError::invalid(
                "font_height_ratio",
                "must be a finite value greater than zero",
            ));
        }

        Ok(Self {
            default_media_type,
            default_paper_size,
            default_paper_orientation,
            default_font,
            dpi,
            font_height_ratio,
            scripts_enabled: raw.scripts_enabled.unwrap_or(false),
            remote_enabled: raw.remote_enabled.unwrap_or(false),
            javascript_enabled: raw.javascript_enabled.unwrap_or(false),
            show_warnings: raw.show_warnings.unwrap_or(false),
            convert_entities: raw.convert_entities.unwrap_or(true),
        })
    }
}
