use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use thiserror::Error;

use crate::error::Result;

use super::payload::Payload;

/// No HTTP response was obtained. The payload's fate at the sink is unknown.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransportError {
    #[error("request could not be built: {0}")]
    Build(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_builder() {
            TransportError::Build(e.to_string())
        } else if e.is_timeout() {
            TransportError::Timeout(e.to_string())
        } else if e.is_connect() {
            TransportError::Connect(e.to_string())
        } else {
            TransportError::Other(e.to_string())
        }
    }
}

/// One HTTP POST to a sink. Returns the response status code.
#[async_trait]
pub trait WebhookTransport: Send + Sync {
    async fn send(&self, target: &str, payload: &Payload) -> std::result::Result<u16, TransportError>;
}

pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl WebhookTransport for ReqwestTransport {
    async fn send(&self, target: &str, payload: &Payload) -> std::result::Result<u16, TransportError> {
        let request = match payload {
            Payload::Text { .. } => self.client.post(target).json(&payload.json_content()),
            Payload::Image { image, .. } => {
                let file = Part::bytes(image.bytes.clone())
                    .file_name(image.file_name.clone())
                    .mime_str(&image.content_type)?;
                let form = Form::new()
                    .text("payload_json", payload.json_content().to_string())
                    .part("file", file);
                self.client.post(target).multipart(form)
            }
        };
        let resp = request.send().await?;
        Ok(resp.status().as_u16())
    }
}
