use serde_json::json;

use crate::render::{ArtifactBody, ImageBuffer, RenderedArtifact};

/// What goes over the wire to the sink.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// JSON body `{"content": ...}`.
    Text { content: String },
    /// Multipart: the image as `file` plus a `payload_json` caption field.
    Image { image: ImageBuffer, caption: String },
}

impl Payload {
    #[cfg(test)]
    pub fn text(content: impl Into<String>) -> Self {
        Payload::Text {
            content: content.into(),
        }
    }

    /// JSON that accompanies the request: the whole body for text, the
    /// `payload_json` form field for images.
    pub fn json_content(&self) -> serde_json::Value {
        match self {
            Payload::Text { content } => json!({ "content": content }),
            Payload::Image { caption, .. } => json!({ "content": caption }),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Text { .. } => "text",
            Payload::Image { .. } => "image",
        }
    }
}

impl From<RenderedArtifact> for Payload {
    fn from(artifact: RenderedArtifact) -> Self {
        match artifact.body {
            ArtifactBody::Image(image) => Payload::Image {
                image,
                caption: artifact.caption,
            },
            ArtifactBody::Text(content) => Payload::Text { content },
        }
    }
}
