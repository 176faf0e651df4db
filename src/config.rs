//! Configuration file support and resolution of the effective settings.
//!
//! Every setting can come from an optional TOML file; command line flags
//! override the file. The result is an immutable [`RuntimeConfig`].

use crate::capture::{CaptureSettings, StreamAddress};
use crate::cli::Cli;
use crate::display::{DateStyle, FormatConfig, MAX_LAYER, MIN_LAYER};
use crate::error::ConfigError;
use crate::output::OutputFormat;
use crate::session::SessionConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub stream: StreamConfig,
    pub run: RunConfig,
    pub output: OutputConfig,
    pub render: RenderConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub address: Option<String>,
    pub iface: Option<String>,
    pub promiscuous: bool,
    pub snaplen: i32,
    pub timeout_ms: i32,
    pub filter: Vec<String>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        StreamConfig {
            address: None,
            iface: None,
            promiscuous: true,
            snaplen: 65535,
            timeout_ms: 100,
            filter: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Stop after this many matched packets (0 = no limit).
    pub pkts: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: String,
    pub header: bool,
    pub offset: bool,
    pub display_packet: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            format: "default".into(),
            header: true,
            offset: true,
            display_packet: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub layer: u8,
    pub headers: bool,
    pub hexdump: bool,
    pub date: String,
    pub relative: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        RenderConfig {
            layer: MAX_LAYER,
            headers: false,
            hexdump: false,
            date: "none".into(),
            relative: true,
        }
    }
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub address: String,
    pub iface: Option<String>,
    pub capture: CaptureSettings,
    pub filter: Vec<String>,
    pub session: SessionConfig,
    pub format: FormatConfig,
}

impl RuntimeConfig {
    pub fn stream_address(&self) -> StreamAddress {
        StreamAddress::parse(&self.address)
    }
}

pub fn load_config(args: &Cli) -> Result<RuntimeConfig, ConfigError> {
    let base = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    resolve(base, args)
}

fn resolve(base: Config, args: &Cli) -> Result<RuntimeConfig, ConfigError> {
    let Config {
        stream,
        run,
        mut output,
        mut render,
    } = base;

    if let Some(value) = &args.format {
        output.format = value.clone();
    }
    let output_format = if args.csv {
        OutputFormat::Csv
    } else {
        output.format.parse()?
    };

    if args.no_header {
        output.header = false;
    }
    if args.no_offset {
        output.offset = false;
    }
    if args.display_packet {
        output.display_packet = true;
    }

    if let Some(layer) = args.layer() {
        render.layer = layer;
    }
    if !(MIN_LAYER..=MAX_LAYER).contains(&render.layer) {
        return Err(ConfigError::InvalidLayer(render.layer));
    }
    if args.headers {
        render.headers = true;
    }
    if args.hexdump {
        render.hexdump = true;
    }
    let mut date: DateStyle = render.date.parse()?;
    if args.calendar {
        date = DateStyle::Utc;
    }
    if args.localtime {
        date = DateStyle::Local;
    }
    if args.absolute {
        render.relative = false;
    }
    if args.relative {
        render.relative = true;
    }

    let address = args
        .stream
        .clone()
        .or(stream.address)
        .ok_or(ConfigError::MissingStream)?;

    let mut filter = stream.filter;
    filter.extend(args.filter.iter().cloned());

    Ok(RuntimeConfig {
        address,
        iface: args.iface.clone().or(stream.iface),
        capture: CaptureSettings {
            promiscuous: stream.promiscuous,
            snaplen: stream.snaplen,
            timeout_ms: stream.timeout_ms,
        },
        filter,
        session: SessionConfig {
            max_packets: args.pkts.unwrap_or(run.pkts),
            format: output_format,
            header: output.header,
            no_offset: !output.offset,
            display_packet: output.display_packet,
        },
        format: FormatConfig {
            layer: render.layer,
            headers: render.headers,
            hexdump: render.hexdump,
            date,
            relative: render.relative,
        },
    })
}
