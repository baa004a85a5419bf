//! Shared HTTP plumbing for the REST clients

use reqwest::{RequestBuilder, Response};
use serde::Deserialize;

use crate::credentials::Credentials;
use crate::error::{Error, Result};

/// Attach bearer credentials when present
pub(crate) fn authorize(builder: RequestBuilder, credentials: Option<&Credentials>) -> RequestBuilder {
    match credentials {
        Some(credentials) => builder.bearer_auth(credentials.access_token()),
        None => builder,
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Pass 2xx responses through, turn anything else into [`Error::Api`]
pub(crate) async fn check(service: &'static str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(Error::Api {
        service,
        status: status.as_u16(),
        message: error_message(&body),
    })
}

/// Google APIs wrap errors as `{"error": {"message": ...}}`
fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .map(|envelope| envelope.error.message)
        .unwrap_or_else(|_| body.trim().to_string())
}
