//! Upload orchestration: connect, authenticate, copy in chunks, tear down

use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinHandle;

use crate::config::ConnectionConfig;
use crate::error::UploadError;
use crate::notify::{Notifier, UploadEvent};
use crate::progress::{format_size, ProgressReporter, UploadSummary};
use crate::protocol::{Connector, RemoteSession, SftpConnector};
use crate::Result;

/// Default read size for the copy loop.
pub const DEFAULT_CHUNK_SIZE: usize = 32 * 1024;

/// A local file checked and measured before upload.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    path: PathBuf,
    file_name: String,
    size: u64,
}

impl TransferRequest {
    /// Check that `path` is an existing regular file and record its size.
    ///
    /// The file must not change while the upload runs.
    pub async fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|source| UploadError::LocalIo {
                path: path.clone(),
                source,
            })?;

        if !metadata.is_file() {
            return Err(UploadError::NotAFile(path));
        }

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| UploadError::NotAFile(path.clone()))?;

        Ok(Self {
            path,
            file_name,
            size: metadata.len(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Where the file lands inside `remote_dir`.
    pub fn remote_path(&self, remote_dir: &str) -> String {
        if remote_dir == "." {
            self.file_name.clone()
        } else {
            format!("{}/{}", remote_dir.trim_end_matches('/'), self.file_name)
        }
    }
}

/// Runs uploads through a [`Connector`].
#[derive(Debug, Clone)]
pub struct Uploader<C> {
    connector: C,
    chunk_size: usize,
}

impl Uploader<SftpConnector> {
    /// Uploader over a real SFTP connection.
    pub fn sftp() -> Self {
        Self::new(SftpConnector::new())
    }
}

impl<C: Connector> Uploader<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Change the copy loop's read size. Zero is treated as one byte.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Upload one file, reporting every step to `notifier`.
    ///
    /// Ends with exactly one [`UploadEvent::Completed`] or
    /// [`UploadEvent::Failed`]; the same outcome is returned.
    pub async fn upload(
        &self,
        request: &TransferRequest,
        config: &ConnectionConfig,
        notifier: &dyn Notifier,
    ) -> Result<UploadSummary> {
        let outcome = self.connect_and_transfer(request, config, notifier).await;

        match &outcome {
            Ok(summary) => {
                tracing::info!(
                    file = %request.path().display(),
                    remote = %summary.remote_path,
                    bytes = summary.bytes_transferred,
                    speed = %summary.throughput_human(),
                    "Upload completed"
                );
                notifier.notify(UploadEvent::Completed);
            }
            Err(e) => report_failure(request.path(), e, notifier),
        }

        outcome
    }

    /// Validate inputs and run the upload on a background task.
    ///
    /// Returns at once; the outcome arrives through `notifier` and the handle.
    pub fn spawn<N: Notifier>(
        self,
        local_path: impl Into<PathBuf>,
        config: ConnectionConfig,
        notifier: N,
    ) -> JoinHandle<Result<UploadSummary>>
    where
        C: 'static,
    {
        let local_path = local_path.into();
        tokio::spawn(async move {
            let prepared = match config.validate() {
                Ok(()) => TransferRequest::new(&local_path).await,
                Err(e) => Err(e),
            };
            let request = match prepared {
                Ok(request) => request,
                Err(e) => {
                    report_failure(&local_path, &e, &notifier);
                    return Err(e);
                }
            };

            notifier.status(format!(
                "Starting upload of '{}' ({})...",
                request.file_name(),
                format_size(request.size())
            ));
            self.upload(&request, &config, &notifier).await
        })
    }

    async fn connect_and_transfer(
        &self,
        request: &TransferRequest,
        config: &ConnectionConfig,
        notifier: &dyn Notifier,
    ) -> Result<UploadSummary> {
        notifier.status(format!("Connecting to {}:{}...", config.host, config.port));
        let mut session = self.connector.open(config).await?;

        let outcome = self.transfer(&mut session, request, config, notifier).await;
        session.close().await;
        outcome
    }

    async fn transfer(
        &self,
        session: &mut C::Session,
        request: &TransferRequest,
        config: &ConnectionConfig,
        notifier: &dyn Notifier,
    ) -> Result<UploadSummary> {
        notifier.status(format!("Authenticating as {}...", config.username));
        session.authenticate(&config.username, &config.password).await?;

        notifier.status("Opening SFTP channel...".to_string());
        session.open_channel().await?;

        let directory = session.resolve_remote_directory(&config.remote_dir).await;
        if let Some(reason) = &directory.fallback_reason {
            tracing::warn!(remote_dir = %config.remote_dir, %reason, "Falling back to current remote directory");
            notifier.notify(UploadEvent::Warning(format!(
                "Remote directory '{}' might not exist, using current directory",
                config.remote_dir
            )));
        }
        let remote_path = request.remote_path(&directory.effective);

        notifier.status("Starting file transfer...".to_string());
        session.open_write(&remote_path).await?;

        let started = Instant::now();
        let mut local = tokio::fs::File::open(request.path())
            .await
            .map_err(|source| UploadError::LocalIo {
                path: request.path().to_path_buf(),
                source,
            })?;
        let mut reporter = ProgressReporter::new(request.size(), config.progress_interval_percent());

        let bytes_transferred = copy_chunks(
            &mut local,
            session,
            &mut reporter,
            self.chunk_size,
            request.path(),
            notifier,
        )
        .await?;
        session.finish_write().await?;

        Ok(UploadSummary {
            bytes_transferred,
            duration: started.elapsed(),
            remote_path,
        })
    }
}

/// Upload `local_path` over SFTP on a background task.
///
/// This is the engine's entry point: it never blocks and every outcome,
/// including a bad configuration or a missing file, is delivered as an event.
pub fn start_upload<N: Notifier>(
    local_path: impl Into<PathBuf>,
    config: ConnectionConfig,
    notifier: N,
) -> JoinHandle<Result<UploadSummary>> {
    Uploader::sftp().spawn(local_path, config, notifier)
}

/// Copy `local` into the session's open write handle until end of input.
async fn copy_chunks<R, S>(
    local: &mut R,
    session: &mut S,
    reporter: &mut ProgressReporter,
    chunk_size: usize,
    local_path: &Path,
    notifier: &dyn Notifier,
) -> Result<u64>
where
    R: AsyncRead + Unpin,
    S: RemoteSession + ?Sized,
{
    let mut buffer = vec![0u8; chunk_size];
    let mut transferred = 0u64;

    loop {
        let n = local.read(&mut buffer).await.map_err(|source| UploadError::LocalIo {
            path: local_path.to_path_buf(),
            source,
        })?;
        if n == 0 {
            break;
        }

        session.write(&buffer[..n]).await?;
        transferred += n as u64;

        if let Some(update) = reporter.record(transferred) {
            tracing::debug!(percent = update.percent, transferred, "Upload progress");
            notifier.notify(UploadEvent::Progress(update));
        }
    }

    Ok(transferred)
}

fn report_failure(local_path: &Path, error: &UploadError, notifier: &dyn Notifier) {
    tracing::error!(file = %local_path.display(), error = ?error, "Upload failed: {}", error);
    notifier.notify(UploadEvent::Failed(error.user_message()));
}
