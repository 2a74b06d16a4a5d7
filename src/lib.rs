//! stampa: PDF responses for axum applications.
//!
//! A thin layer between an axum handler and an HTML-to-PDF backend. Load a
//! view, a file, or a raw HTML string into a [`Pdf`] session, then hand the
//! rendered bytes back as a download or an inline stream:
//!
//! ```rust,no_run
//! use axum::response::Response;
//! use stampa::Pdf;
//!
//! async fn invoice() -> Result<Response, stampa::Error> {
//!     let settings = stampa::config::load(None)?;
//!     let mut pdf = Pdf::new(&settings);
//!     pdf.load_html("<h1>Invoice #42</h1>", None)?;
//!     pdf.download("invoice.pdf")
//! }
//! ```
//!
//! Rendering is lazy and memoized per session: `download`, `stream`, and
//! `output` render on demand, and only a new `load_*` call (or an option
//! change) forces the next render. Backend warnings can be escalated to hard
//! errors via the `show_warnings` setting.

pub mod config;
pub mod engine;
mod error;
pub mod pdf;
pub mod publish;
pub mod response;
pub mod telemetry;
pub mod views;

pub use error::Error;
pub use pdf::Pdf;
pub use response::{DEFAULT_FILENAME, MIME_TYPE};
