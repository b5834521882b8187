//! Connection settings and the TOML configuration file

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::UploadError;
use crate::progress::DEFAULT_INTERVAL_PERCENT;
use crate::Result;

/// Values shipped in the sample configuration that were never edited.
const PLACEHOLDER_HOST: &str = "your-vps-ip";
const PLACEHOLDER_USERNAME: &str = "your-username";
const PLACEHOLDER_PASSWORD: &str = "your-password";

/// Everything the engine needs to reach and log into the remote server.
#[derive(Clone)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Target directory on the server, `.` for the login directory
    pub remote_dir: String,
    /// Accept any server key. Insecure, but matches the common default.
    pub skip_host_verification: bool,
    /// Known-hosts file used when verification is on
    pub known_hosts: Option<PathBuf>,
    /// Limit on establishing the SSH connection
    pub connect_timeout: Option<Duration>,
    progress_interval_percent: u8,
}

impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("remote_dir", &self.remote_dir)
            .field("skip_host_verification", &self.skip_host_verification)
            .field("known_hosts", &self.known_hosts)
            .field("connect_timeout", &self.connect_timeout)
            .field("progress_interval_percent", &self.progress_interval_percent)
            .finish()
    }
}

impl ConnectionConfig {
    /// Create a config with default port, directory and reporting interval.
    pub fn new(host: impl Into<String>, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 22,
            username: username.into(),
            password: password.into(),
            remote_dir: ".".to_string(),
            skip_host_verification: true,
            known_hosts: None,
            connect_timeout: None,
            progress_interval_percent: DEFAULT_INTERVAL_PERCENT,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_remote_dir(mut self, remote_dir: impl Into<String>) -> Self {
        self.remote_dir = remote_dir.into();
        self
    }

    /// Verify the server key against `known_hosts` (or `~/.ssh/known_hosts`).
    pub fn with_host_verification(mut self, known_hosts: Option<PathBuf>) -> Self {
        self.skip_host_verification = false;
        self.known_hosts = known_hosts;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set the reporting step. Clamped to 1..=100 so it can never divide by zero.
    pub fn with_progress_interval(mut self, percent: u32) -> Self {
        self.progress_interval_percent = clamp_interval(percent);
        self
    }

    pub fn progress_interval_percent(&self) -> u8 {
        self.progress_interval_percent
    }

    /// Known-hosts file to check against, falling back to `~/.ssh/known_hosts`.
    pub fn known_hosts_path(&self) -> Option<PathBuf> {
        self.known_hosts
            .clone()
            .or_else(|| dirs::home_dir().map(|home| home.join(".ssh").join("known_hosts")))
    }

    /// True when a required field is empty or still holds a sample value.
    pub fn is_incomplete(&self) -> bool {
        self.host.is_empty()
            || self.username.is_empty()
            || self.password.is_empty()
            || self.host == PLACEHOLDER_HOST
            || self.username == PLACEHOLDER_USERNAME
            || self.password == PLACEHOLDER_PASSWORD
    }

    /// Refuse to start with an incomplete configuration.
    pub fn validate(&self) -> Result<()> {
        let missing: Vec<&str> = [
            ("host", self.host.as_str(), PLACEHOLDER_HOST),
            ("username", self.username.as_str(), PLACEHOLDER_USERNAME),
            ("password", self.password.as_str(), PLACEHOLDER_PASSWORD),
        ]
        .into_iter()
        .filter(|(_, value, placeholder)| value.is_empty() || value == placeholder)
        .map(|(name, _, _)| name)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(UploadError::Config(format!("set sftp {}", missing.join(", "))))
        }
    }

    /// Parse the TOML configuration format.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let file: ConfigFile =
            toml::from_str(input).map_err(|e| UploadError::Config(e.to_string()))?;
        Ok(file.into())
    }

    /// Load a TOML configuration file from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| UploadError::LocalIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }
}

/// Per-user configuration file location, e.g. `~/.config/fastupload/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("fastupload").join("config.toml"))
}

fn clamp_interval(percent: u32) -> u8 {
    percent.clamp(1, 100) as u8
}

/// On-disk layout of the configuration file.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
struct ConfigFile {
    sftp: SftpSection,
    progress: ProgressSection,
}

#[derive(Debug, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
struct SftpSection {
    host: String,
    port: u16,
    username: String,
    password: String,
    remote_dir: String,
    ignore_host_key: bool,
    known_hosts: Option<PathBuf>,
    connect_timeout_secs: Option<u64>,
}

impl Default for SftpSection {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 22,
            username: String::new(),
            password: String::new(),
            remote_dir: ".".to_string(),
            ignore_host_key: true,
            known_hosts: None,
            connect_timeout_secs: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
struct ProgressSection {
    interval_percent: u32,
}

impl Default for ProgressSection {
    fn default() -> Self {
        Self {
            interval_percent: u32::from(DEFAULT_INTERVAL_PERCENT),
        }
    }
}

impl From<ConfigFile> for ConnectionConfig {
    fn from(file: ConfigFile) -> Self {
        let sftp = file.sftp;
        Self {
            host: sftp.host,
            port: sftp.port,
            username: sftp.username,
            password: sftp.password,
            remote_dir: sftp.remote_dir,
            skip_host_verification: sftp.ignore_host_key,
            known_hosts: sftp.known_hosts,
            connect_timeout: sftp.connect_timeout_secs.map(Duration::from_secs),
            progress_interval_percent: clamp_interval(file.progress.interval_percent),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_file() {
        let config = ConnectionConfig::from_toml_str(
            r#"
            [sftp]
            host = "files.example.com"
            port = 2222
            username = "deploy"
            password = "hunter2"
            remote-dir = "/srv/uploads"
            ignore-host-key = false
            known-hosts = "/etc/ssh/ssh_known_hosts"
            connect-timeout-secs = 15

            [progress]
            interval-percent = 25
            "#,
        )
        .unwrap();

        assert_eq!(config.host, "files.example.com");
        assert_eq!(config.port, 2222);
        assert_eq!(config.username, "deploy");
        assert_eq!(config.password, "hunter2");
        assert_eq!(config.remote_dir, "/srv/uploads");
        assert!(!config.skip_host_verification);
        assert_eq!(config.known_hosts_path(), Some(PathBuf::from("/etc/ssh/ssh_known_hosts")));
        assert_eq!(config.connect_timeout, Some(Duration::from_secs(15)));
        assert_eq!(config.progress_interval_percent(), 25);
    }

    #[test]
    fn test_defaults_when_keys_missing() {
        let config = ConnectionConfig::from_toml_str("[sftp]\nhost = \"h\"\n").unwrap();
        assert_eq!(config.port, 22);
        assert_eq!(config.remote_dir, ".");
        assert!(config.skip_host_verification);
        assert_eq!(config.connect_timeout, None);
        assert_eq!(config.progress_interval_percent(), 10);
    }

    #[test]
    fn test_interval_clamped() {
        let config = ConnectionConfig::from_toml_str("[progress]\ninterval-percent = 0\n").unwrap();
        assert_eq!(config.progress_interval_percent(), 1);

        let config = ConnectionConfig::new("h", "u", "p").with_progress_interval(250);
        assert_eq!(config.progress_interval_percent(), 100);
    }

    #[test]
    fn test_placeholders_are_incomplete() {
        let config = ConnectionConfig::new("your-vps-ip", "deploy", "secret");
        assert!(config.is_incomplete());
        let config = ConnectionConfig::new("host", "your-username", "secret");
        assert!(config.is_incomplete());
        let config = ConnectionConfig::new("host", "deploy", "your-password");
        assert!(config.is_incomplete());
        let config = ConnectionConfig::new("host", "deploy", "");
        assert!(config.is_incomplete());

        let config = ConnectionConfig::new("host", "deploy", "secret");
        assert!(!config.is_incomplete());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_names_missing_fields() {
        let err = ConnectionConfig::new("", "your-username", "ok").validate().unwrap_err();
        assert!(matches!(err, UploadError::Config(_)));
        assert_eq!(
            err.to_string(),
            "SFTP configuration is missing or invalid: set sftp host, username"
        );
    }

    #[test]
    fn test_sample_file_needs_editing() {
        let config = ConnectionConfig::from_toml_str(include_str!("../fastupload.example.toml")).unwrap();
        assert!(config.is_incomplete());
        assert_eq!(config.progress_interval_percent(), 10);
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let err = ConnectionConfig::from_toml_str("[sftp\nhost=").unwrap_err();
        assert!(matches!(err, UploadError::Config(_)));
    }

    #[test]
    fn test_known_hosts_defaults_to_ssh_dir() {
        let config = ConnectionConfig::new("h", "u", "p").with_host_verification(None);
        assert_eq!(
            config.known_hosts_path(),
            dirs::home_dir().map(|home| home.join(".ssh").join("known_hosts"))
        );
    }

    #[test]
    fn test_debug_hides_password() {
        let config = ConnectionConfig::new("h", "u", "topsecret");
        assert!(!format!("{config:?}").contains("topsecret"));
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fastupload.toml");
        std::fs::write(&path, "[sftp]\nhost = \"h\"\nusername = \"u\"\npassword = \"p\"\n").unwrap();

        let config = ConnectionConfig::load(&path).unwrap();
        assert!(!config.is_incomplete());
    }
}
