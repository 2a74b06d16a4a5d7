//! One-shot publisher that materializes the default configuration file into a
//! consuming application's config directory.

use std::{
    fs,
    path::{Path, PathBuf},
};

use askama::Template;
use thiserror::Error;
use tracing::info;

use crate::config;

/// Destination of the published file, relative to the application root. Keep
/// in sync with [`config::CONFIG_BASENAME`].
pub const PUBLISHED_RELATIVE_PATH: &str = "config/pdf.toml";

/// The published file is rendered from a parameterized template rather than
/// copied and patched, so there is no post-hoc string surgery to drift.
#[derive(Template)]
#[template(path = "pdf.toml.txt")]
struct ConfigTemplate<'a> {
    crate_name: &'a str,
    crate_version: &'a str,
    env_prefix: &'a str,
}

#[derive(Debug, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The file was written for the first time.
    Published(PathBuf),
    /// A file already existed at the destination and was left untouched.
    SkippedExisting(PathBuf),
}

impl PublishOutcome {
    pub fn path(&self) -> &Path {
        match self {
            PublishOutcome::Published(path) | PublishOutcome::SkippedExisting(path) => path,
        }
    }
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config template failed to render: {0}")]
    Template(#[from] askama::Error),
}

/// Publish the default configuration into `<app_dir>/config/pdf.toml`.
///
/// Existing destinations are skipped, never overwritten; running the command
/// twice is safe and both runs succeed. Unexpected I/O failures propagate.
pub fn publish_config(app_dir: &Path) -> Result<PublishOutcome, PublishError> {
    let destination = app_dir.join(PUBLISHED_RELATIVE_PATH);

    if destination.exists() {
        info!(path = %destination.display(), "configuration already published, skipping");
        return Ok(PublishOutcome::SkippedExisting(destination));
    }

    let rendered = ConfigTemplate {
        crate_name: env!("CARGO_PKG_NAME"),
        crate_version: env!("CARGO_PKG_VERSION"),
        env_prefix: config::ENV_PREFIX,
    }
    .render()?;

    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&destination, rendered)?;

    info!(path = %destination.display(), "configuration published");
    Ok(PublishOutcome::Published(destination))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publishes_into_a_fresh_application_tree() {
        let dir = tempfile::tempdir().expect("tempdir");

        let outcome = publish_config(dir.path()).expect("publish");

        let expected = dir.path().join(PUBLISHED_RELATIVE_PATH);
        assert_eq!(outcome, PublishOutcome::Published(expected.clone()));
        let contents = fs::read_to_string(&expected).expect("published file");
        assert!(contents.contains("default_paper_size"));
        assert!(contents.contains("STAMPA"));
    }

    #[test]
    fn published_file_loads_back_through_the_config_layer() {
        let dir = tempfile::tempdir().expect("tempdir");
        let outcome = publish_config(dir.path()).expect("publish");

        let settings = config::load(Some(outcome.path())).expect("published file parses");
        assert_eq!(settings, crate::config::RenderConfig::default());
    }

    #[test]
    fn existing_destination_is_left_untouched() {
        let dir = tempfile::tempdir().expect("tempdir");
        let destination = dir.path().join(PUBLISHED_RELATIVE_PATH);
        fs::create_dir_all(destination.parent().expect("parent")).expect("mkdir");
        fs::write(&destination, "# customized\n").expect("seed file");

        let outcome = publish_config(dir.path()).expect("second publish");

        assert_eq!(outcome, PublishOutcome::SkippedExisting(destination.clone()));
        let contents = fs::read_to_string(&destination).expect("read back");
        assert_eq!(contents, "# customized\n");
    }
}
