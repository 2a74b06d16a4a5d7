//! Response assembly: rendered bytes into download or inline HTTP responses.

use axum::{
    body::Body,
    http::{HeaderValue, StatusCode, header},
    response::Response,
};
use bytes::Bytes;
use metrics::counter;

use crate::{error::Error, pdf::Pdf};

pub const MIME_TYPE: &str = "application/pdf";
pub const DEFAULT_FILENAME: &str = "document.pdf";

enum Disposition {
    Attachment,
    Inline,
}

impl Disposition {
    fn as_str(&self) -> &'static str {
        match self {
            Disposition::Attachment => "attachment",
            Disposition::Inline => "inline",
        }
    }
}

impl Pdf {
    /// Build a download response: the body is offered as an attachment with
    /// an exact `Content-Length`. Renders on demand if needed. An empty
    /// `filename` falls back to [`DEFAULT_FILENAME`].
    pub fn download(&mut self, filename: &str) -> Result<Response, Error> {
        let bytes = Bytes::from(self.output()?);
        Ok(build_pdf_response(bytes, &Disposition::Attachment, filename))
    }

    /// Build an inline response so browsers display the document; the
    /// transport layer decides how to frame the body. An empty `filename`
    /// falls back to [`DEFAULT_FILENAME`].
    pub fn stream(&mut self, filename: &str) -> Result<Response, Error> {
        let bytes = Bytes::from(self.output()?);
        Ok(build_pdf_response(bytes, &Disposition::Inline, filename))
    }
}

fn build_pdf_response(bytes: Bytes, disposition: &Disposition, filename: &str) -> Response {
    counter!("stampa_response_bytes_total").increment(bytes.len() as u64);

    let filename = if filename.is_empty() {
        DEFAULT_FILENAME
    } else {
        filename
    };

    let body_len = bytes.len();
    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(MIME_TYPE));

    if matches!(disposition, Disposition::Attachment) {
        if let Ok(value) = HeaderValue::from_str(&body_len.to_string()) {
            headers.insert(header::CONTENT_LENGTH, value);
        }
    }

    let safe_name = filename.replace('"', "'");
    if let Ok(value) = HeaderValue::from_str(&format!(
        "{}; filename=\"{safe_name}\"",
        disposition.as_str()
    )) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    response
}
