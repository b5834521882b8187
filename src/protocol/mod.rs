use async_trait::async_trait;

use crate::config::ConnectionConfig;
use crate::Result;

pub mod sftp;

pub use sftp::{SftpConnection, SftpConnector};

/// Directory the upload will land in after the existence check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryResolution {
    /// Directory to upload into
    pub effective: String,
    /// Why the requested directory was abandoned, if it was
    pub fallback_reason: Option<String>,
}

/// Opens one remote session per upload.
#[async_trait]
pub trait Connector: Send + Sync {
    type Session: RemoteSession;

    /// Establish the transport to `config.host:config.port`, verifying the
    /// server identity unless the config says to skip it.
    async fn open(&self, config: &ConnectionConfig) -> Result<Self::Session>;
}

/// A connected remote file system holding at most one open write handle.
#[async_trait]
pub trait RemoteSession: Send {
    async fn authenticate(&mut self, username: &str, password: &str) -> Result<()>;

    /// Start the file-transfer channel on the authenticated transport.
    async fn open_channel(&mut self) -> Result<()>;

    /// Fails if `path` does not exist or is not a directory.
    async fn stat_directory(&mut self, path: &str) -> Result<()>;

    /// Open `path` for writing, creating it or truncating existing content.
    async fn open_write(&mut self, path: &str) -> Result<()>;

    /// Append `chunk` to the open write handle.
    async fn write(&mut self, chunk: &[u8]) -> Result<()>;

    /// Flush and close the open write handle.
    async fn finish_write(&mut self) -> Result<()>;

    /// Release the write handle, the channel and the transport, in that order.
    ///
    /// Safe to call more than once. Failures are logged and swallowed since
    /// this also runs while another error is being reported.
    async fn close(&mut self);

    /// Check the target directory, falling back to `.` when the check fails.
    async fn resolve_remote_directory(&mut self, path: &str) -> DirectoryResolution {
        if path == "." {
            return DirectoryResolution {
                effective: ".".to_string(),
                fallback_reason: None,
            };
        }

        match self.stat_directory(path).await {
            Ok(()) => DirectoryResolution {
                effective: path.to_string(),
                fallback_reason: None,
            },
            Err(e) => DirectoryResolution {
                effective: ".".to_string(),
                fallback_reason: Some(e.to_string()),
            },
        }
    }
}
