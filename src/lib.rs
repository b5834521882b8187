//! fastupload - Asynchronous SFTP upload engine
//!
//! Moves one local file to a remote server over SFTP on a background task and
//! reports every step, progress threshold and the final outcome as
//! [`UploadEvent`]s.
//!
//! # Example
//!
//! ```rust,no_run
//! use fastupload::{start_upload, ConnectionConfig, UploadEvent};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ConnectionConfig::new("files.example.com", "deploy", "secret")
//!         .with_remote_dir("/srv/uploads");
//!
//!     let handle = start_upload("world.zip", config, |event: UploadEvent| {
//!         println!("{:?}", event);
//!     });
//!     let _ = handle.await;
//! }
//! ```

pub mod config;
pub mod error;
pub mod notify;
pub mod progress;
pub mod protocol;
pub mod upload;

pub use config::ConnectionConfig;
pub use error::{classify, UploadError};
pub use notify::{ChannelNotifier, Notifier, UploadEvent};
pub use progress::{format_size, format_speed, ProgressReporter, ProgressUpdate, UploadSummary};
pub use protocol::{Connector, DirectoryResolution, RemoteSession, SftpConnector};
pub use upload::{start_upload, TransferRequest, Uploader};

pub type Result<T> = std::result::Result<T, UploadError>;
