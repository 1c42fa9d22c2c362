//! Chat collaboration with the editing assistant.
//!
//! The network round trip is performed by an external transport; this
//! module pins down what crosses that boundary:
//!
//! - The request and response bodies exchanged with the chat endpoint
//! - The system prompt that frames the current document for the model
//! - Error classification and the user-facing hint for each failure
//! - Extraction of structured document updates from assistant replies

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod update;

pub use update::{parse_assistant_reply, AssistantReply};

/// Who authored a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One turn of the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> ChatMessage {
        ChatMessage {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> ChatMessage {
        ChatMessage {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Request body sent to the chat endpoint: the conversation so far plus
/// the current document HTML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub document_content: String,
}

/// Success body returned by the chat endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub message: String,
}

/// Failure body returned by the chat endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatErrorBody {
    pub error: String,
}

/// Caller-side bounds on the chat round trip.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// How long to wait before treating the round trip as failed rather
    /// than hung.
    pub timeout: Duration,
}

impl Default for ChatConfig {
    fn default() -> Self {
        ChatConfig {
            timeout: Duration::from_secs(300),
        }
    }
}

/// Failures of the chat round trip. None of these mutate the document;
/// the session surfaces [`TransportError::user_hint`] as a chat message.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The round trip exceeded the configured timeout.
    #[error("chat request timed out")]
    Timeout,

    /// The caller aborted the round trip.
    #[error("chat request aborted")]
    Aborted,

    /// The endpoint could not be reached at all.
    #[error("chat endpoint unreachable: {0}")]
    Network(String),

    /// The endpoint answered with a failure status.
    #[error("chat endpoint returned {status}: {message}")]
    Http { status: u16, message: String },

    /// The endpoint answered successfully but the body was not the
    /// expected shape.
    #[error("malformed chat response: {0}")]
    Invalid(String),
}

impl TransportError {
    /// Classify a non-success status plus whatever error body came with
    /// it. A 504 is the endpoint's way of signalling a timeout.
    pub fn from_status(status: u16, body: Option<ChatErrorBody>) -> TransportError {
        if status == 504 {
            return TransportError::Timeout;
        }
        TransportError::Http {
            status,
            message: body.map(|b| b.error).unwrap_or_default(),
        }
    }

    /// The hint shown in the chat pane when the round trip fails.
    pub fn user_hint(&self) -> &'static str {
        match self {
            TransportError::Timeout => {
                "The request took too long. Try asking a simpler question or working with a smaller document section."
            }
            TransportError::Aborted => "The request was cancelled.",
            TransportError::Network(_) => {
                "Could not reach the assistant. Check your connection and try again."
            }
            TransportError::Http { .. } | TransportError::Invalid(_) => {
                "Failed to process chat request"
            }
        }
    }
}

/// The external collaborator that performs the round trip. The session
/// drives any implementation through this seam, so tests can swap in a
/// canned transport.
pub trait ChatTransport {
    fn send(&self, request: &ChatRequest) -> Result<ChatResponse, TransportError>;
}

/// Build the system message framing the current document for the model.
pub fn system_prompt(document_content: &str) -> String {
    format!(
        concat!(
            "You are a document analyser and editor. Here is the document:\n",
            "\n",
            "<document>\n",
            "{}\n",
            "</document>\n",
            "\n",
            "Answer any questions the user has, strictly based on this document.\n",
            "If the user requests a change, provide a complete new copy of the HTML within a JSON object, like:\n",
            "```json\n",
            "{{\"updatedHtml\": \"<p>your update...</p>\"}}\n",
            "```\n",
            "\n",
            "- Please refer to the document you're working on as \"the document\" or \"your document\".\n",
            "- Please provide a brief explanation of what you changed.\n",
        ),
        document_content
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serializes_with_camel_case_keys() {
        let request = ChatRequest {
            messages: vec![
                ChatMessage::user("Shorten the intro"),
                ChatMessage::assistant("Done."),
            ],
            document_content: "<p>intro</p>".to_string(),
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["documentContent"], "<p>intro</p>");
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["messages"][1]["role"], "assistant");
    }

    #[test]
    fn test_status_504_classifies_as_timeout() {
        let err = TransportError::from_status(504, None);
        assert!(matches!(err, TransportError::Timeout));
        assert!(err.user_hint().starts_with("The request took too long."));
    }

    #[test]
    fn test_other_statuses_keep_the_endpoint_message() {
        let body = ChatErrorBody {
            error: "Failed to process chat request".to_string(),
        };
        let err = TransportError::from_status(500, Some(body));
        match err {
            TransportError::Http { status, ref message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "Failed to process chat request");
            }
            ref other => panic!("unexpected classification {:?}", other),
        }
        assert_eq!(err.user_hint(), "Failed to process chat request");
    }

    #[test]
    fn test_system_prompt_embeds_the_document() {
        let prompt = system_prompt("<p>body</p>");
        assert!(prompt.contains("<document>\n<p>body</p>\n</document>"));
        assert!(prompt.contains(r#"{"updatedHtml": "<p>your update...</p>"}"#));
    }

    #[test]
    fn test_default_config_allows_several_minutes() {
        assert_eq!(ChatConfig::default().timeout, Duration::from_secs(300));
    }
}
