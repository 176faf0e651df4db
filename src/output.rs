//! Timing record formatters.
//!
//! A formatter writes the display time and inter-arrival delta of one packet.
//! Records are not newline terminated; whatever renders the packet next (or
//! the session loop, when packet display is off) ends the line.

use crate::error::ConfigError;
use crate::timestamp::Timestamp;
use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;

/// Column names written before the first CSV record.
pub const CSV_HEADER: &str = "\"timestamp\";\"interarrivaltime\"";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// `<time> <delta> `
    #[default]
    Plain,
    /// `<time>;<delta>;`
    Csv,
}

impl OutputFormat {
    pub fn render<W: Write + ?Sized>(
        &self,
        out: &mut W,
        time: Timestamp,
        delta: Timestamp,
    ) -> io::Result<()> {
        match self {
            OutputFormat::Plain => write!(out, "{} {} ", time, delta),
            OutputFormat::Csv => write!(out, "{};{};", time, delta),
        }
    }

    /// Write the column header line, if this format has one.
    pub fn write_header<W: Write + ?Sized>(&self, out: &mut W) -> io::Result<()> {
        match self {
            OutputFormat::Plain => Ok(()),
            OutputFormat::Csv => writeln!(out, "{}", CSV_HEADER),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "default" | "plain" => Ok(OutputFormat::Plain),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(ConfigError::InvalidFormat(s.to_string())),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Plain => write!(f, "default"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}
