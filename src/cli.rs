use clap::{ArgAction, Parser};
use std::path::PathBuf;

/// captime: packet arrival times and inter-arrival times in picoseconds
#[derive(Parser, Debug)]
#[command(
    name = "captime",
    version,
    about,
    after_help = "Recommended conserver usage:\n  captime -c STREAM | conserver -j1 -n NAME"
)]
pub struct Cli {
    /// Stream to read: a capture file, or `iface:NAME` for a live interface
    /// (`iface:` alone uses --iface or the default device)
    #[arg(value_name = "STREAM")]
    pub stream: Option<String>,

    /// Number of packets to show (0 = all)
    #[arg(short, long = "pkts", value_name = "INT")]
    pub pkts: Option<u64>,

    /// Use ethernet interface IFACE for live streams
    #[arg(short, long)]
    pub iface: Option<String>,

    /// Output format: default or csv
    #[arg(short, long)]
    pub format: Option<String>,

    /// Short for --format=csv
    #[arg(short = 'c')]
    pub csv: bool,

    /// Don't write the format header
    #[arg(long)]
    pub no_header: bool,

    /// Don't use a time offset
    #[arg(short = 'x', long)]
    pub no_offset: bool,

    /// Show packet information after the timing fields
    #[arg(short = 'S', long)]
    pub display_packet: bool,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Path to a TOML configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// BPF filter expression; repeat to require several
    #[arg(long = "filter", value_name = "EXPR")]
    pub filter: Vec<String>,

    /// Show only capture information
    #[arg(short = '1', overrides_with_all = ["layer2", "layer3", "layer4"], help_heading = "Formatting")]
    pub layer1: bool,

    /// .. include link layer
    #[arg(short = '2', overrides_with_all = ["layer1", "layer3", "layer4"], help_heading = "Formatting")]
    pub layer2: bool,

    /// .. include network and transport layers
    #[arg(short = '3', overrides_with_all = ["layer1", "layer2", "layer4"], help_heading = "Formatting")]
    pub layer3: bool,

    /// .. include application layer [default]
    #[arg(short = '4', overrides_with_all = ["layer1", "layer2", "layer3"], help_heading = "Formatting")]
    pub layer4: bool,

    /// Show layer headers
    #[arg(short = 'H', long, help_heading = "Formatting")]
    pub headers: bool,

    /// Write full packet content as hexdump
    #[arg(long, help_heading = "Formatting")]
    pub hexdump: bool,

    /// Show timestamps in human-readable format (UTC)
    #[arg(short = 'd', long, visible_alias = "calender", overrides_with = "localtime", help_heading = "Formatting")]
    pub calendar: bool,

    /// Show timestamps in human-readable format (local time)
    #[arg(short = 'D', long, overrides_with = "calendar", help_heading = "Formatting")]
    pub localtime: bool,

    /// Show absolute timestamps
    #[arg(short = 'a', long, overrides_with = "relative", help_heading = "Formatting")]
    pub absolute: bool,

    /// Show timestamps relative to first packet [default]
    #[arg(short = 'r', long, overrides_with = "absolute", help_heading = "Formatting")]
    pub relative: bool,
}

impl Cli {
    /// Layer depth selected with -1 .. -4, if any.
    pub fn layer(&self) -> Option<u8> {
        [self.layer1, self.layer2, self.layer3, self.layer4]
            .iter()
            .position(|&set| set)
            .map(|i| i as u8 + 1)
    }
}
