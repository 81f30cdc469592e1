use super::html;
use crate::domain::error::AppError;
use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, ResponseError};
use serde_json::json;
use std::fmt;

impl AppError {
    pub fn http_status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        self.http_status()
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.http_status()).json(json!({
            "success": false,
            "error": self.to_string(),
        }))
    }
}

/// Error for routes that answer with a page instead of JSON.
#[derive(Debug)]
pub struct HtmlError(pub AppError);

impl fmt::Display for HtmlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<AppError> for HtmlError {
    fn from(err: AppError) -> Self {
        HtmlError(err)
    }
}

impl ResponseError for HtmlError {
    fn status_code(&self) -> StatusCode {
        self.0.http_status()
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.0.http_status();
        HttpResponse::build(status)
            .content_type("text/html; charset=utf-8")
            .body(html::error_page(status, &self.0.to_string()))
    }
}

/// Malformed JSON bodies get the same `{success:false}` envelope as every
/// other failure.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        AppError::ValidationError(format!("Invalid request body: {err}")).into()
    })
}

/// Route parameters that fail to parse (`/generate_pdf/transponder/abc`).
pub fn path_config() -> web::PathConfig {
    web::PathConfig::default().error_handler(|err, _req| {
        AppError::ValidationError(format!("Invalid path parameter: {err}")).into()
    })
}
