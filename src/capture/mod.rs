//! Packet sources and filters.
//!
//! Streams are libpcap handles over capture files or live interfaces; filters
//! are BPF programs compiled by libpcap. The session loop only sees the
//! [`PacketStream`] and [`PacketFilter`] traits.

pub mod filter;
pub mod stream;

pub use filter::{BpfFilter, MatchAll, PacketFilter};
pub use stream::{
    iface_name, iface_tag, CaptureSettings, CapturedPacket, IfaceTag, PacketStream, PcapStream,
    StreamAddress, StreamStat,
};
