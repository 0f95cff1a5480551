//! Workflow webhook client
//!
//! Sends the user's message to the workflow engine and returns its reply.

mod reply;

use async_trait::async_trait;

pub use reply::WorkflowReply;

use crate::http::{expect_success, read_body};
use crate::{Result, Stage};

/// Maps a user message to a reply
#[async_trait]
pub trait Workflow: Send + Sync {
    /// Send a message and return the reply as received
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or returns a non-2xx status
    async fn send(&self, message: &str) -> Result<WorkflowReply>;
}

/// Workflow webhook over HTTP: JSON `{ "message" }` in, free-form reply out
pub struct HttpWorkflow {
    client: reqwest::Client,
    url: String,
}

impl HttpWorkflow {
    /// Create a client posting to `url`
    #[must_use]
    pub const fn new(client: reqwest::Client, url: String) -> Self {
        Self { client, url }
    }
}

#[async_trait]
impl Workflow for HttpWorkflow {
    async fn send(&self, message: &str) -> Result<WorkflowReply> {
        #[derive(serde::Serialize)]
        struct WorkflowRequest<'a> {
            message: &'a str,
        }

        tracing::debug!(chars = message.len(), "sending message to workflow");

        let sent = self
            .client
            .post(&self.url)
            .json(&WorkflowRequest { message })
            .send()
            .await;
        let response = expect_success(Stage::Workflow, sent).await?;
        let body = read_body(Stage::Workflow, response).await?;

        Ok(WorkflowReply::parse(&String::from_utf8_lossy(&body)))
    }
}
