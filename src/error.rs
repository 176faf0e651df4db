//! Error types for captime.

use thiserror::Error;

/// Configuration problems. All of these are fatal and are reported before
/// the first packet is read.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("unknown output format `{0}'")]
    InvalidFormat(String),

    #[error("no stream address was specified")]
    MissingStream,

    #[error("invalid layer depth {0}, expected 1-4")]
    InvalidLayer(u8),

    #[error("invalid date style `{0}', expected none, utc or local")]
    InvalidDateStyle(String),

    #[error("could not create filter: {0}")]
    Filter(String),
}

/// Failures opening a packet stream.
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("failed to open stream `{address}': {source}")]
    Open {
        address: String,
        #[source]
        source: pcap::Error,
    },

    #[error("no capture device: {0}")]
    NoDevice(String),
}

/// Outcome of a failed stream read.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReadError {
    #[error("end of stream")]
    EndOfStream,

    #[error("operation would block")]
    WouldBlock,

    #[error("interrupted")]
    Interrupted,

    #[error("{0}")]
    Other(String),
}

impl ReadError {
    /// Would-block and interrupted reads are retried without being counted.
    pub fn is_transient(&self) -> bool {
        matches!(self, ReadError::WouldBlock | ReadError::Interrupted)
    }
}

impl From<pcap::Error> for ReadError {
    fn from(e: pcap::Error) -> Self {
        match e {
            pcap::Error::NoMorePackets => ReadError::EndOfStream,
            pcap::Error::TimeoutExpired => ReadError::WouldBlock,
            pcap::Error::IoError(std::io::ErrorKind::Interrupted) => ReadError::Interrupted,
            pcap::Error::IoError(std::io::ErrorKind::WouldBlock) => ReadError::WouldBlock,
            other => ReadError::Other(other.to_string()),
        }
    }
}

/// Fatal session failures.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("stream_read() failed: {0}")]
    InitialRead(ReadError),

    #[error("output error: {0}")]
    Output(#[from] std::io::Error),
}
