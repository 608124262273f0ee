//! Shared pieces of the HTTP email providers

use reqwest::{Response, StatusCode};

use aliasman_core::Error;

/// User agent sent by every provider request
pub const USER_AGENT: &str = concat!("aliasman/", env!("CARGO_PKG_VERSION"));

pub fn transport(e: reqwest::Error) -> Error {
    Error::Network(e.to_string())
}

/// Error for a failed response, classified by status.
pub fn status_error(provider: &str, status: StatusCode, message: &str) -> Error {
    let message = if message.is_empty() {
        status.to_string()
    } else {
        message.to_string()
    };
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Error::Auth(format!("{provider}: {message}"))
        }
        StatusCode::NOT_FOUND => Error::NotFound(format!("{provider}: {message}")),
        _ => Error::Network(format!("{provider}: {message}")),
    }
}

/// Pass successful responses through; read the body of failures into the
/// error message.
pub async fn check(provider: &str, response: Response) -> Result<Response, Error> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(status_error(provider, status, body.trim()))
}
