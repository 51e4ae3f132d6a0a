//! Error taxonomy for the command pipeline
//!
//! Every failure inside the pipeline ends up as one of these variants and is
//! rendered into a single bot message. Nothing here escapes the
//! command-handling entry points in `pipeline`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backend::BackendError;

/// Errors raised while turning input into an executed command
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommandError {
    #[error("Sorry, I didn't understand that command. Type 'help' to see what I can do.")]
    UnrecognizedIntent,

    #[error("Please provide the following parameters: {}", .0.join(", "))]
    MissingParameters(Vec<String>),

    #[error("Invalid {param}: {reason}")]
    MalformedPayload { param: String, reason: String },

    #[error("Error: {0}")]
    OperationFailed(String),

    #[error("Speech recognition error: {0}")]
    SpeechRecognitionFailed(String),

    #[error("Unknown action: {0}")]
    UnknownAction(String),
}

/// Flat discriminant of [`CommandError`] for callers that only branch on kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnrecognizedIntent,
    MissingParameters,
    MalformedPayload,
    OperationFailed,
    SpeechRecognitionFailed,
    UnknownAction,
}

impl CommandError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CommandError::UnrecognizedIntent => ErrorKind::UnrecognizedIntent,
            CommandError::MissingParameters(_) => ErrorKind::MissingParameters,
            CommandError::MalformedPayload { .. } => ErrorKind::MalformedPayload,
            CommandError::OperationFailed(_) => ErrorKind::OperationFailed,
            CommandError::SpeechRecognitionFailed(_) => ErrorKind::SpeechRecognitionFailed,
            CommandError::UnknownAction(_) => ErrorKind::UnknownAction,
        }
    }

    pub(crate) fn malformed(param: &str, reason: impl Into<String>) -> Self {
        CommandError::MalformedPayload {
            param: param.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<BackendError> for CommandError {
    fn from(err: BackendError) -> Self {
        CommandError::OperationFailed(err.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_parameters_display() {
        let err = CommandError::MissingParameters(vec!["name".into(), "catalogName".into()]);
        assert_eq!(
            err.to_string(),
            "Please provide the following parameters: name, catalogName"
        );
        assert_eq!(err.kind(), ErrorKind::MissingParameters);
    }

    #[test]
    fn test_backend_error_passes_message_through() {
        let err: CommandError = BackendError::new("catalog already exists").into();
        assert_eq!(err.kind(), ErrorKind::OperationFailed);
        assert_eq!(err.to_string(), "Error: catalog already exists");
    }
}
