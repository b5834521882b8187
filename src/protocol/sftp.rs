//! SFTP transport built on russh
//!
//! Password authentication only; the server key is either accepted blindly or
//! checked against a known-hosts file.

use async_trait::async_trait;
use russh::client::{self, AuthResult, Handler};
use russh::keys::PublicKey;
use russh::Disconnect;
use russh_sftp::client::fs::File;
use russh_sftp::client::SftpSession;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::lookup_host;

use super::{Connector, RemoteSession};
use crate::config::ConnectionConfig;
use crate::error::UploadError;
use crate::Result;

/// How the server's identity is established.
#[derive(Debug, Clone)]
enum HostKeyPolicy {
    AcceptAny,
    KnownHosts(PathBuf),
}

impl HostKeyPolicy {
    fn for_config(config: &ConnectionConfig) -> Result<Self> {
        if config.skip_host_verification {
            return Ok(Self::AcceptAny);
        }
        config
            .known_hosts_path()
            .map(Self::KnownHosts)
            .ok_or_else(|| UploadError::HostVerification {
                host: config.host.clone(),
                reason: "no known_hosts file configured and no home directory".to_string(),
            })
    }
}

/// SSH client handler (required by russh)
struct ClientHandler {
    host: String,
    port: u16,
    policy: HostKeyPolicy,
}

impl Handler for ClientHandler {
    type Error = anyhow::Error;

    async fn check_server_key(&mut self, server_public_key: &PublicKey) -> std::result::Result<bool, Self::Error> {
        let path = match &self.policy {
            HostKeyPolicy::AcceptAny => {
                tracing::warn!(host = %self.host, "Accepting server key without verification");
                return Ok(true);
            }
            HostKeyPolicy::KnownHosts(path) => path,
        };

        match russh::keys::check_known_hosts_path(&self.host, self.port, server_public_key, path) {
            Ok(true) => {
                tracing::debug!(host = %self.host, "Server key matches known_hosts");
                Ok(true)
            }
            Ok(false) => Err(UploadError::HostVerification {
                host: self.host.clone(),
                reason: "server key not present in known_hosts".to_string(),
            }
            .into()),
            Err(e) => Err(UploadError::HostVerification {
                host: self.host.clone(),
                reason: e.to_string(),
            }
            .into()),
        }
    }
}

/// Opens SFTP sessions with russh.
#[derive(Debug, Clone, Default)]
pub struct SftpConnector;

impl SftpConnector {
    pub fn new() -> Self {
        Self
    }

    async fn resolve_host(config: &ConnectionConfig) -> Result<SocketAddr> {
        let target = format!("{}:{}", config.host, config.port);
        let mut addrs = lookup_host((config.host.as_str(), config.port))
            .await
            .map_err(|e| UploadError::Connection {
                target: target.clone(),
                reason: format!("cannot resolve host: {}", e),
            })?;

        addrs.next().ok_or_else(|| UploadError::Connection {
            target,
            reason: "no address found for host".to_string(),
        })
    }
}

#[async_trait]
impl Connector for SftpConnector {
    type Session = SftpConnection;

    async fn open(&self, config: &ConnectionConfig) -> Result<SftpConnection> {
        let target = format!("{}:{}", config.host, config.port);
        let policy = HostKeyPolicy::for_config(config)?;
        let socket_addr = Self::resolve_host(config).await?;
        tracing::debug!(%target, %socket_addr, ?policy, "Starting SSH handshake");

        let handler = ClientHandler {
            host: config.host.clone(),
            port: config.port,
            policy,
        };

        let ssh_config = Arc::new(client::Config::default());
        let connect = client::connect(ssh_config, socket_addr, handler);
        let connected = match config.connect_timeout {
            Some(limit) => tokio::time::timeout(limit, connect)
                .await
                .map_err(|_| UploadError::Connection {
                    target: target.clone(),
                    reason: format!("connect timeout after {}s", limit.as_secs()),
                })?,
            None => connect.await,
        };

        let handle = connected.map_err(|e| handshake_error(&target, e))?;

        tracing::debug!(%target, "SSH handshake completed");
        Ok(SftpConnection {
            handle: Some(handle),
            sftp: None,
            writer: None,
        })
    }
}

/// Recover errors raised by [`ClientHandler`]; anything else failed the connection.
fn handshake_error(target: &str, e: anyhow::Error) -> UploadError {
    match e.downcast::<UploadError>() {
        Ok(err) => err,
        Err(e) => UploadError::Connection {
            target: target.to_string(),
            reason: format!("{:#}", e),
        },
    }
}

/// One SSH connection with its SFTP channel and write handle.
pub struct SftpConnection {
    handle: Option<client::Handle<ClientHandler>>,
    sftp: Option<SftpSession>,
    writer: Option<File>,
}

impl SftpConnection {
    fn handle(&mut self) -> Result<&mut client::Handle<ClientHandler>> {
        self.handle
            .as_mut()
            .ok_or_else(|| UploadError::RemoteIo("SSH connection already closed".to_string()))
    }

    fn sftp(&self) -> Result<&SftpSession> {
        self.sftp
            .as_ref()
            .ok_or_else(|| UploadError::RemoteIo("SFTP channel is not open".to_string()))
    }

    fn writer(&mut self) -> Result<&mut File> {
        self.writer
            .as_mut()
            .ok_or_else(|| UploadError::RemoteIo("no remote file open for writing".to_string()))
    }
}

#[async_trait]
impl RemoteSession for SftpConnection {
    async fn authenticate(&mut self, username: &str, password: &str) -> Result<()> {
        let auth_failed = |reason: String| UploadError::Auth {
            user: username.to_string(),
            reason,
        };

        match self.handle()?.authenticate_password(username, password).await {
            Ok(AuthResult::Success) => {
                tracing::info!(user = username, "Authenticated with password");
                Ok(())
            }
            Ok(AuthResult::Failure { remaining_methods, partial_success }) => Err(auth_failed(format!(
                "password rejected - partial_success: {}, remaining: {:?}",
                partial_success, remaining_methods
            ))),
            Err(e) => Err(auth_failed(e.to_string())),
        }
    }

    async fn open_channel(&mut self) -> Result<()> {
        let channel = self
            .handle()?
            .channel_open_session()
            .await
            .map_err(|e| UploadError::RemoteIo(format!("Failed to open SSH channel: {}", e)))?;

        channel
            .request_subsystem(true, "sftp")
            .await
            .map_err(|e| UploadError::RemoteIo(format!("Failed to start SFTP subsystem: {}", e)))?;

        let sftp = SftpSession::new(channel.into_stream())
            .await
            .map_err(|e| UploadError::RemoteIo(format!("Failed to create SFTP session: {}", e)))?;

        tracing::debug!("SFTP session established");
        self.sftp = Some(sftp);
        Ok(())
    }

    async fn stat_directory(&mut self, path: &str) -> Result<()> {
        let metadata = self
            .sftp()?
            .metadata(path)
            .await
            .map_err(|e| UploadError::RemoteIo(format!("Cannot stat '{}': {}", path, e)))?;

        if metadata.is_dir() {
            Ok(())
        } else {
            Err(UploadError::RemoteIo(format!("'{}' is not a directory", path)))
        }
    }

    async fn open_write(&mut self, path: &str) -> Result<()> {
        if self.writer.is_some() {
            return Err(UploadError::RemoteIo(
                "a remote file is already open for writing".to_string(),
            ));
        }

        // create() opens with CREATE | TRUNCATE | WRITE
        let file = self
            .sftp()?
            .create(path)
            .await
            .map_err(|e| UploadError::RemoteIo(format!("Failed to create remote file '{}': {}", path, e)))?;

        self.writer = Some(file);
        Ok(())
    }

    async fn write(&mut self, chunk: &[u8]) -> Result<()> {
        self.writer()?
            .write_all(chunk)
            .await
            .map_err(|e| UploadError::RemoteIo(format!("Failed to write to remote file: {}", e)))
    }

    async fn finish_write(&mut self) -> Result<()> {
        let mut file = self
            .writer
            .take()
            .ok_or_else(|| UploadError::RemoteIo("no remote file open for writing".to_string()))?;

        file.shutdown()
            .await
            .map_err(|e| UploadError::RemoteIo(format!("Failed to close remote file: {}", e)))
    }

    async fn close(&mut self) {
        if let Some(mut file) = self.writer.take() {
            if let Err(e) = file.shutdown().await {
                tracing::warn!(error = %e, "Error closing remote file");
            }
        }

        if let Some(sftp) = self.sftp.take() {
            if let Err(e) = sftp.close().await {
                tracing::warn!(error = %e, "Error closing SFTP session");
            }
        }

        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.disconnect(Disconnect::ByApplication, "", "en").await {
                tracing::warn!(error = %e, "Error disconnecting SSH client");
            }
        }
    }
}
