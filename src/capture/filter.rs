//! Packet filters.

use super::stream::CapturedPacket;
use crate::error::ConfigError;
use pcap::{BpfProgram, Capture, Linktype};

pub trait PacketFilter {
    fn matches(&self, packet: &CapturedPacket<'_>) -> bool;
}

/// Accepts every packet; used when no filter expression is given.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchAll;

impl PacketFilter for MatchAll {
    fn matches(&self, _packet: &CapturedPacket<'_>) -> bool {
        true
    }
}

/// A BPF program compiled by libpcap, evaluated in userspace.
pub struct BpfFilter {
    program: BpfProgram,
}

impl PacketFilter for BpfFilter {
    fn matches(&self, packet: &CapturedPacket<'_>) -> bool {
        self.program.filter(packet.data)
    }
}

/// Compile filter expressions for streams of the given link type.
/// Multiple expressions must all match.
pub fn compile(
    expressions: &[String],
    linktype: Linktype,
) -> Result<Box<dyn PacketFilter>, ConfigError> {
    let parts: Vec<&str> = expressions
        .iter()
        .map(|e| e.trim())
        .filter(|e| !e.is_empty())
        .collect();
    if parts.is_empty() {
        return Ok(Box::new(MatchAll));
    }

    let expression = if parts.len() == 1 {
        parts[0].to_string()
    } else {
        parts
            .iter()
            .map(|p| format!("({})", p))
            .collect::<Vec<_>>()
            .join(" and ")
    };

    let dead = Capture::dead(linktype).map_err(|e| ConfigError::Filter(e.to_string()))?;
    let program = dead
        .compile(&expression, true)
        .map_err(|e| ConfigError::Filter(format!("`{}': {}", expression, e)))?;

    tracing::debug!(filter = %expression, "filter compiled");
    Ok(Box::new(BpfFilter { program }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timestamp::Timestamp;

    fn packet(data: &[u8]) -> CapturedPacket<'_> {
        CapturedPacket {
            ts: Timestamp::ZERO,
            len: data.len() as u32,
            caplen: data.len() as u32,
            data,
            iface: [0; 8],
        }
    }

    fn ethernet(ether_type: u16) -> Vec<u8> {
        let mut f = vec![0u8; 60];
        f[12..14].copy_from_slice(&ether_type.to_be_bytes());
        f
    }

    #[test]
    fn empty_expressions_match_everything() {
        let filter = compile(&[], Linktype::ETHERNET).unwrap();
        assert!(filter.matches(&packet(&ethernet(0x0806))));
        let filter = compile(&["  ".to_string()], Linktype::ETHERNET).unwrap();
        assert!(filter.matches(&packet(&[])));
    }

    #[test]
    fn bpf_matches_ethertype() {
        let filter = compile(&["arp".to_string()], Linktype::ETHERNET).unwrap();
        assert!(filter.matches(&packet(&ethernet(0x0806))));
        assert!(!filter.matches(&packet(&ethernet(0x86dd))));
    }

    #[test]
    fn multiple_expressions_are_and_ed() {
        let filter = compile(
            &["arp or ip6".to_string(), "not arp".to_string()],
            Linktype::ETHERNET,
        )
        .unwrap();
        assert!(filter.matches(&packet(&ethernet(0x86dd))));
        assert!(!filter.matches(&packet(&ethernet(0x0806))));
    }

    #[test]
    fn bad_expression_is_config_error() {
        let result = compile(&["tcp port banana".to_string()], Linktype::ETHERNET);
        assert!(matches!(result, Err(ConfigError::Filter(_))));
    }
}
