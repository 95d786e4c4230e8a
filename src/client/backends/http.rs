use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::error::{AgsError, Result};

/// Pass `response` through when its status is one of `accepted`, otherwise
/// turn it into an [`AgsError::Api`] carrying the raw body.
pub(crate) async fn ensure_status(
    response: Response,
    accepted: &[StatusCode],
    context: &str,
) -> Result<Response> {
    let status = response.status();
    if accepted.contains(&status) {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(AgsError::Api {
        context: context.to_string(),
        status,
        body,
    })
}

/// Read the whole body and decode it as JSON.
pub(crate) async fn decode_json<T: DeserializeOwned>(response: Response, context: &str) -> Result<T> {
    let body = response
        .bytes()
        .await
        .map_err(|e| AgsError::from(e).context(context.to_string()))?;
    serde_json::from_slice(&body).map_err(|source| AgsError::Decode {
        context: context.to_string(),
        source,
    })
}
