//! Upload error taxonomy and user-facing classification

use std::path::PathBuf;
use thiserror::Error;

/// Fallback text when a failure carries no message at all.
const UNKNOWN_ERROR: &str = "Unknown error";

/// Substring rules checked in order against a raw failure message.
const CLASSIFICATION_RULES: &[(&str, &str)] = &[
    ("Connection refused", "Connection refused - check host and port"),
    ("Auth fail", "Authentication failed - check username and password"),
    ("UnknownHostException", "Host not found - check hostname/IP"),
    ("timeout", "Connection timeout - check network connectivity"),
];

/// Every way an upload attempt can end early.
///
/// All variants are terminal for the attempt; nothing is retried.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("SFTP configuration is missing or invalid: {0}")]
    Config(String),

    #[error("Failed to connect to {target}: {reason}")]
    Connection { target: String, reason: String },

    #[error("Host key verification failed for {host}: {reason}")]
    HostVerification { host: String, reason: String },

    #[error("Auth failed for {user}: {reason}")]
    Auth { user: String, reason: String },

    #[error("Remote I/O error: {0}")]
    RemoteIo(String),

    #[error("Cannot read local file {path:?}: {source}")]
    LocalIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("'{0}' is not a valid file")]
    NotAFile(PathBuf),
}

impl UploadError {
    /// Short, safe message for the end user.
    pub fn user_message(&self) -> String {
        classify(Some(&self.to_string()))
    }
}

/// Translate a raw failure message into a short user-facing string.
///
/// Matching is case-sensitive and the first rule that matches wins. Unmatched
/// messages are cut to their first line so stack traces and other multi-line
/// detail never reach the user.
pub fn classify(raw: Option<&str>) -> String {
    let Some(message) = raw else {
        return UNKNOWN_ERROR.to_string();
    };

    for (needle, friendly) in CLASSIFICATION_RULES {
        if message.contains(needle) {
            return (*friendly).to_string();
        }
    }

    message.split('\n').next().unwrap_or_default().to_string()
}
