//! Seam to the host application's view layer.

use serde_json::Value;
use thiserror::Error;

/// A named-view renderer supplied by the host application.
///
/// The host owns the actual templating engine; this layer only needs
/// `name + data → HTML`. Closures implement the trait directly, and typed
/// template sets (askama and friends) implement it by dispatching on `name`:
///
/// ```rust,ignore
/// struct AppViews;
///
/// impl ViewRenderer for AppViews {
///     fn render(&self, name: &str, data: &Value) -> Result<String, ViewError> {
///         match name {
///             "invoice" => InvoiceView::from_data(data).render()
///                 .map_err(|err| ViewError::new(name, err.to_string())),
///             other => Err(ViewError::new(other, "unknown view")),
///         }
///     }
/// }
/// ```
pub trait ViewRenderer {
    fn render(&self, name: &str, data: &Value) -> Result<String, ViewError>;
}

impl<F> ViewRenderer for F
where
    F: Fn(&str, &Value) -> Result<String, ViewError>,
{
    fn render(&self, name: &str, data: &Value) -> Result<String, ViewError> {
        self(name, data)
    }
}

#[derive(Debug, Error)]
#[error("view `{view}` failed to render: {message}")]
pub struct ViewError {
    pub view: String,
    pub message: String,
}

impl ViewError {
    pub fn new(view: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            view: view.into(),
            message: message.into(),
        }
    }
}
