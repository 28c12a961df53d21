//! Messages exchanged between the primary and its workers.

use std::collections::BTreeMap;

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::GatewayError;

/// Kind of request carried by a dispatch. Only HTTP exists today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestType {
    #[serde(rename = "HTTP")]
    Http,
}

/// One inbound request, sent primary → worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchMessage {
    /// Correlation id echoed back in the reply.
    pub id: Uuid,
    pub request_type: RequestType,
    pub headers: BTreeMap<String, String>,
    /// Request bodies are not forwarded; always `null` on the wire.
    pub body: Option<String>,
    /// Path and query of the inbound request.
    pub url: String,
}

impl DispatchMessage {
    pub fn new(url: impl Into<String>, headers: BTreeMap<String, String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            request_type: RequestType::Http,
            headers,
            body: None,
            url: url.into(),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

/// Outcome of handling a dispatch. Presence of `errorCode` means failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReplyMessage {
    Failure {
        #[serde(rename = "errorCode")]
        error_code: String,
        error: String,
    },
    Success {
        data: String,
    },
}

impl ReplyMessage {
    pub fn success(data: impl Into<String>) -> Self {
        ReplyMessage::Success { data: data.into() }
    }

    pub fn failure(status: StatusCode, error: impl Into<String>) -> Self {
        ReplyMessage::Failure {
            error_code: status.as_str().to_string(),
            error: error.into(),
        }
    }

    /// Status the front server answers with. Unparseable codes become 500.
    pub fn status(&self) -> StatusCode {
        match self {
            ReplyMessage::Success { .. } => StatusCode::OK,
            ReplyMessage::Failure { error_code, .. } => StatusCode::from_bytes(error_code.as_bytes())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ReplyMessage::Failure { .. })
    }

    /// Body text: upstream data on success, error text on failure.
    pub fn body(&self) -> &str {
        match self {
            ReplyMessage::Success { data } => data,
            ReplyMessage::Failure { error, .. } => error,
        }
    }
}

impl From<&GatewayError> for ReplyMessage {
    fn from(err: &GatewayError) -> Self {
        ReplyMessage::failure(err.status_code(), err.to_string())
    }
}

/// A reply tagged with the id of the dispatch it answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyEnvelope {
    pub id: Uuid,
    #[serde(flatten)]
    pub reply: ReplyMessage,
}

impl ReplyEnvelope {
    pub fn new(id: Uuid, reply: ReplyMessage) -> Self {
        Self { id, reply }
    }
}
