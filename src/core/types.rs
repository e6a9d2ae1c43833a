use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncRead;

use super::error::{Error, Result};

/// How frames are pulled off the connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FramingMode {
    /// One read per frame, bytes past the terminator are dropped
    #[default]
    SingleRead,
    /// Append-and-scan buffer that keeps leftovers between reads
    Incremental,
}

impl FramingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FramingMode::SingleRead => "single-read",
            FramingMode::Incremental => "incremental",
        }
    }
}

impl fmt::Display for FramingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FramingMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "single-read" => Ok(FramingMode::SingleRead),
            "incremental" => Ok(FramingMode::Incremental),
            other => Err(Error::config(format!("unknown framing mode {:?}", other))),
        }
    }
}

/// Configuration for a single transfer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Host name or IP address of the machine-control service
    pub host: String,
    /// Service port
    pub port: u16,
    /// Frame reading strategy
    pub framing: FramingMode,
    /// Read buffer capacity; a frame must end before it fills
    pub max_message_size: usize,
    /// Deadline for establishing the connection
    #[serde(serialize_with = "super::serde::serialize_opt_duration")]
    #[serde(deserialize_with = "super::serde::deserialize_opt_duration")]
    pub connect_timeout: Option<Duration>,
    /// Deadline for each framed read
    #[serde(serialize_with = "super::serde::serialize_opt_duration")]
    #[serde(deserialize_with = "super::serde::deserialize_opt_duration")]
    pub read_timeout: Option<Duration>,
    /// Deadline for each individual write and for the final flush
    #[serde(serialize_with = "super::serde::serialize_opt_duration")]
    #[serde(deserialize_with = "super::serde::deserialize_opt_duration")]
    pub write_timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: "127.0.0.1".to_string(),
            port: super::DEFAULT_PORT,
            framing: FramingMode::default(),
            max_message_size: super::MESSAGE_BUFFER_SIZE,
            connect_timeout: None,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

impl Config {
    /// Loads a configuration from a JSON file; missing fields take defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| {
            Error::config(format!("could not read config file {}: {}", path.display(), e))
        })?;
        Self::from_json(&raw)
    }

    /// Parses and validates a JSON configuration document
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(raw)
            .map_err(|e| Error::config(format!("invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the values a transfer cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::config("host must not be empty"));
        }
        if self.port == 0 {
            return Err(Error::config("port must not be 0"));
        }
        if self.max_message_size == 0 {
            return Err(Error::config("max_message_size must be at least 1 byte"));
        }
        Ok(())
    }

    /// Applies one deadline to connect, read and write
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self.read_timeout = Some(timeout);
        self.write_timeout = Some(timeout);
        self
    }
}

/// The file being transferred: announced name, declared size and byte source
pub struct Payload<R> {
    /// Name sent in the transfer header, usually the path as given
    pub name: String,
    /// Byte length announced in the header
    pub len: u64,
    /// Source of the payload bytes
    pub reader: R,
}

impl<R: AsyncRead + Unpin> Payload<R> {
    pub fn new(name: impl Into<String>, len: u64, reader: R) -> Self {
        Payload {
            name: name.into(),
            len,
            reader,
        }
    }
}

impl<R> fmt::Debug for Payload<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Payload")
            .field("name", &self.name)
            .field("len", &self.len)
            .finish_non_exhaustive()
    }
}
