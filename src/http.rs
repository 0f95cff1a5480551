//! Shared response handling for the remote clients

use reqwest::Response;

use crate::{Error, Result, Stage};

/// Turn a sent request into a successful response or a staged error
///
/// Transport failures become [`Error::Transport`]; non-2xx statuses become
/// [`Error::RequestFailed`] carrying the body text when it can be read.
pub(crate) async fn expect_success(
    stage: Stage,
    sent: std::result::Result<Response, reqwest::Error>,
) -> Result<Response> {
    let response = sent.map_err(|source| {
        tracing::error!(%stage, error = %source, "request failed");
        Error::Transport { stage, source }
    })?;

    let status = response.status();
    tracing::debug!(%stage, status = %status, "received response");

    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    tracing::error!(%stage, status = %status, body = %body, "remote endpoint returned an error");
    Err(Error::RequestFailed {
        stage,
        status: status.as_u16(),
        body,
    })
}

/// Read the full response body
pub(crate) async fn read_body(stage: Stage, response: Response) -> Result<Vec<u8>> {
    response
        .bytes()
        .await
        .map(|b| b.to_vec())
        .map_err(|source| Error::Transport { stage, source })
}
