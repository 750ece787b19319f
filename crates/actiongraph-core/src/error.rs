use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("invalid intent graph: {reason}")]
    InvalidIntentGraph {
        reason: String,
        action_id: Option<String>,
        allowed_kinds: Option<Vec<String>>,
    },

    #[error("config file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CompileError>;

impl CompileError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        CompileError::InvalidIntentGraph {
            reason: reason.into(),
            action_id: None,
            allowed_kinds: None,
        }
    }

    pub fn invalid_action(reason: impl Into<String>, action_id: impl Into<String>) -> Self {
        CompileError::InvalidIntentGraph {
            reason: reason.into(),
            action_id: Some(action_id.into()),
            allowed_kinds: None,
        }
    }

    /// The wire shape handed back to the caller for unrecoverable documents.
    /// `None` for I/O and parse failures, which never reach the pipeline.
    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            CompileError::InvalidIntentGraph {
                reason,
                action_id,
                allowed_kinds,
            } => Some(Rejection {
                kind: "InvalidIntentGraph",
                reason: reason.clone(),
                action_id: action_id.clone(),
                allowed_kinds: allowed_kinds.clone(),
                status: "rejected",
            }),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Rejection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rejection {
    pub kind: &'static str,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_kinds: Option<Vec<String>>,
    pub status: &'static str,
}
