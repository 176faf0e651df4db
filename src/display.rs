//! Packet rendering for `--display-packet`.
//!
//! Each matched packet becomes one summary line that descends as far into the
//! protocol stack as the configured layer depth allows, optionally followed by
//! a per-layer header block and a hex dump. Packets rejected by the filter get
//! a short marker line instead.

use crate::capture::{iface_name, CapturedPacket};
use crate::error::ConfigError;
use crate::timestamp::Timestamp;
use etherparse::{Ethernet2HeaderSlice, Ipv4HeaderSlice, Ipv6HeaderSlice, TcpHeaderSlice, UdpHeaderSlice};
use std::io::{self, Write};
use std::str::FromStr;

pub const MIN_LAYER: u8 = 1;
pub const MAX_LAYER: u8 = 4;

/// How packet timestamps are printed by the renderer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DateStyle {
    /// Seconds and picoseconds.
    #[default]
    None,
    /// Calendar date in UTC.
    Utc,
    /// Calendar date in the local time zone.
    Local,
}

impl FromStr for DateStyle {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "" => Ok(DateStyle::None),
            "utc" => Ok(DateStyle::Utc),
            "local" | "localtime" => Ok(DateStyle::Local),
            _ => Err(ConfigError::InvalidDateStyle(s.to_string())),
        }
    }
}

/// Rendering options, fixed before the session starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatConfig {
    /// 1 = capture header only, 2 = link, 3 = network and transport, 4 = application.
    pub layer: u8,
    pub headers: bool,
    pub hexdump: bool,
    pub date: DateStyle,
    /// Timestamps relative to the first rendered packet.
    pub relative: bool,
}

impl Default for FormatConfig {
    fn default() -> Self {
        FormatConfig {
            layer: MAX_LAYER,
            headers: false,
            hexdump: false,
            date: DateStyle::None,
            relative: true,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct VlanTag {
    priority: u8,
    dei: bool,
    vlan_id: u16,
}

enum Network<'a> {
    Ipv4(Ipv4HeaderSlice<'a>),
    Ipv6(Ipv6HeaderSlice<'a>),
}

enum Transport<'a> {
    Tcp(TcpHeaderSlice<'a>),
    Udp(UdpHeaderSlice<'a>),
    Icmp { v6: bool, kind: u8, code: u8 },
}

/// Layers found in a frame. Decoding stops at the first layer that does not parse.
struct Decoded<'a> {
    ethernet: Option<Ethernet2HeaderSlice<'a>>,
    vlan: Option<VlanTag>,
    network: Option<Network<'a>>,
    transport: Option<Transport<'a>>,
    payload: &'a [u8],
}

fn decode(data: &[u8]) -> Decoded<'_> {
    let mut d = Decoded {
        ethernet: None,
        vlan: None,
        network: None,
        transport: None,
        payload: data,
    };

    let Ok(eth) = Ethernet2HeaderSlice::from_slice(data) else {
        return d;
    };
    let mut ether_type = eth.ether_type().0;
    let mut rest = &data[eth.slice().len()..];
    d.ethernet = Some(eth);

    // 802.1Q
    if ether_type == 0x8100 && rest.len() >= 4 {
        let tci = u16::from_be_bytes([rest[0], rest[1]]);
        d.vlan = Some(VlanTag {
            priority: (tci >> 13) as u8,
            dei: (tci >> 12) & 1 == 1,
            vlan_id: tci & 0x0FFF,
        });
        ether_type = u16::from_be_bytes([rest[2], rest[3]]);
        rest = &rest[4..];
    }
    d.payload = rest;

    let (l4, proto) = match ether_type {
        0x0800 => match Ipv4HeaderSlice::from_slice(rest) {
            Ok(ip) => {
                let hl = ip.slice().len();
                let end = (ip.total_len() as usize).clamp(hl, rest.len());
                let proto = ip.protocol().0;
                d.network = Some(Network::Ipv4(ip));
                (&rest[hl..end], proto)
            }
            Err(_) => return d,
        },
        0x86dd => match Ipv6HeaderSlice::from_slice(rest) {
            Ok(ip) => {
                let hl = ip.slice().len();
                let end = (hl + ip.payload_length() as usize).min(rest.len());
                let proto = ip.next_header().0;
                d.network = Some(Network::Ipv6(ip));
                (&rest[hl..end], proto)
            }
            Err(_) => return d,
        },
        _ => return d,
    };
    d.payload = l4;

    match proto {
        6 => {
            if let Ok(tcp) = TcpHeaderSlice::from_slice(l4) {
                d.payload = &l4[tcp.slice().len()..];
                d.transport = Some(Transport::Tcp(tcp));
            }
        }
        17 => {
            if let Ok(udp) = UdpHeaderSlice::from_slice(l4) {
                d.payload = &l4[udp.slice().len()..];
                d.transport = Some(Transport::Udp(udp));
            }
        }
        1 | 58 if l4.len() >= 8 => {
            d.transport = Some(Transport::Icmp {
                v6: proto == 58,
                kind: l4[0],
                code: l4[1],
            });
            d.payload = &l4[8..];
        }
        _ => {}
    }
    d
}

/// Format a MAC address as xx:xx:xx:xx:xx:xx
fn format_mac(mac: [u8; 6]) -> String {
    format!(
        "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
        mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
    )
}

fn ether_type_name(value: u16) -> String {
    match value {
        0x0800 => "IPv4".into(),
        0x86dd => "IPv6".into(),
        0x0806 => "ARP".into(),
        0x8100 => "802.1Q VLAN".into(),
        0x8847 => "MPLS".into(),
        0x88cc => "LLDP".into(),
        other => format!("0x{:04x}", other),
    }
}

fn tcp_flags(tcp: &TcpHeaderSlice<'_>) -> String {
    let mut flags = String::new();
    for (set, c) in [
        (tcp.syn(), 'S'),
        (tcp.ack(), 'A'),
        (tcp.fin(), 'F'),
        (tcp.rst(), 'R'),
        (tcp.psh(), 'P'),
        (tcp.urg(), 'U'),
    ] {
        if set {
            flags.push(c);
        }
    }
    if flags.is_empty() {
        flags.push('.');
    }
    flags
}

/// Renders packets to the output sink according to a [`FormatConfig`].
#[derive(Debug)]
pub struct PacketRenderer {
    config: FormatConfig,
    first: Option<Timestamp>,
}

impl PacketRenderer {
    pub fn new(config: FormatConfig) -> Self {
        PacketRenderer {
            config,
            first: None,
        }
    }

    /// Render a packet accepted by the filter.
    pub fn render_matched<W: Write + ?Sized>(
        &mut self,
        out: &mut W,
        packet: &CapturedPacket<'_>,
    ) -> io::Result<()> {
        let ts = self.format_time(packet.ts);
        let decoded = decode(packet.data);

        let mut line = format!(
            "{}:{}:LINK({}):CAPLEN({})",
            iface_name(&packet.iface),
            ts,
            packet.len,
            packet.caplen
        );
        if self.config.layer >= 2 {
            self.push_link_summary(&mut line, &decoded);
        }
        if self.config.layer >= 3 {
            self.push_network_summary(&mut line, &decoded);
        }
        if self.config.layer >= 4 && decoded.transport.is_some() && !decoded.payload.is_empty() {
            line.push_str(&format!(" | payload: {} bytes", decoded.payload.len()));
        }
        writeln!(out, "{}", line)?;

        if self.config.headers {
            self.write_headers(out, &decoded)?;
        }
        if self.config.hexdump {
            write_hex_dump(out, packet.data)?;
        }
        Ok(())
    }

    /// Render a packet rejected by the filter.
    pub fn render_ignored<W: Write + ?Sized>(
        &mut self,
        out: &mut W,
        packet: &CapturedPacket<'_>,
    ) -> io::Result<()> {
        let ts = self.format_time(packet.ts);
        writeln!(out, "{}:{}: [filtered]", iface_name(&packet.iface), ts)
    }

    fn format_time(&mut self, ts: Timestamp) -> String {
        match self.config.date {
            DateStyle::Utc => calendar(ts, false),
            DateStyle::Local => calendar(ts, true),
            DateStyle::None if self.config.relative => {
                let first = *self.first.get_or_insert(ts);
                (ts - first).to_string()
            }
            DateStyle::None => ts.to_string(),
        }
    }

    fn push_link_summary(&self, line: &mut String, d: &Decoded<'_>) {
        match &d.ethernet {
            Some(eth) => {
                line.push_str(&format!(
                    " | Eth: {} -> {} [{}]",
                    format_mac(eth.source()),
                    format_mac(eth.destination()),
                    ether_type_name(eth.ether_type().0)
                ));
            }
            None => line.push_str(" | [truncated frame]"),
        }
        if let Some(vlan) = &d.vlan {
            line.push_str(&format!(" VLAN:{}", vlan.vlan_id));
        }
    }

    fn push_network_summary(&self, line: &mut String, d: &Decoded<'_>) {
        match &d.network {
            Some(Network::Ipv4(ip)) => line.push_str(&format!(
                " | IPv4: {} -> {} ttl={} len={}",
                ip.source_addr(),
                ip.destination_addr(),
                ip.ttl(),
                ip.total_len()
            )),
            Some(Network::Ipv6(ip)) => line.push_str(&format!(
                " | IPv6: {} -> {} hlim={} plen={}",
                ip.source_addr(),
                ip.destination_addr(),
                ip.hop_limit(),
                ip.payload_length()
            )),
            None => return,
        }
        match &d.transport {
            Some(Transport::Tcp(tcp)) => line.push_str(&format!(
                " | TCP {} -> {} [{}] seq={} ack={} win={}",
                tcp.source_port(),
                tcp.destination_port(),
                tcp_flags(tcp),
                tcp.sequence_number(),
                tcp.acknowledgment_number(),
                tcp.window_size()
            )),
            Some(Transport::Udp(udp)) => line.push_str(&format!(
                " | UDP {} -> {} len={}",
                udp.source_port(),
                udp.destination_port(),
                udp.length()
            )),
            Some(Transport::Icmp { v6, kind, code }) => line.push_str(&format!(
                " | {} type={} code={}",
                if *v6 { "ICMPv6" } else { "ICMP" },
                kind,
                code
            )),
            None => {}
        }
    }

    fn write_headers<W: Write + ?Sized>(&self, out: &mut W, d: &Decoded<'_>) -> io::Result<()> {
        if self.config.layer >= 2 {
            if let Some(eth) = &d.ethernet {
                writeln!(out, "  Ethernet:")?;
                writeln!(out, "    Source:      {}", format_mac(eth.source()))?;
                writeln!(out, "    Destination: {}", format_mac(eth.destination()))?;
                writeln!(
                    out,
                    "    EtherType:   {} (0x{:04x})",
                    ether_type_name(eth.ether_type().0),
                    eth.ether_type().0
                )?;
            }
            if let Some(vlan) = &d.vlan {
                writeln!(out, "  VLAN:")?;
                writeln!(out, "    ID:       {}", vlan.vlan_id)?;
                writeln!(out, "    Priority: {}", vlan.priority)?;
                writeln!(out, "    DEI:      {}", vlan.dei)?;
            }
        }

        if self.config.layer >= 3 {
            match &d.network {
                Some(Network::Ipv4(ip)) => {
                    writeln!(out, "  IPv4:")?;
                    writeln!(out, "    Source:       {}", ip.source_addr())?;
                    writeln!(out, "    Destination:  {}", ip.destination_addr())?;
                    writeln!(out, "    Protocol:     {}", ip.protocol().0)?;
                    writeln!(out, "    TTL:          {}", ip.ttl())?;
                    writeln!(out, "    Total Length: {}", ip.total_len())?;
                    writeln!(out, "    ID:           0x{:04x}", ip.identification())?;
                    writeln!(
                        out,
                        "    Flags:        DF={} MF={}",
                        ip.dont_fragment(),
                        ip.more_fragments()
                    )?;
                    writeln!(out, "    Checksum:     0x{:04x}", ip.header_checksum())?;
                }
                Some(Network::Ipv6(ip)) => {
                    writeln!(out, "  IPv6:")?;
                    writeln!(out, "    Source:       {}", ip.source_addr())?;
                    writeln!(out, "    Destination:  {}", ip.destination_addr())?;
                    writeln!(out, "    Next Header:  {}", ip.next_header().0)?;
                    writeln!(out, "    Hop Limit:    {}", ip.hop_limit())?;
                    writeln!(out, "    Payload Len:  {}", ip.payload_length())?;
                    writeln!(out, "    Traffic Class:{}", ip.traffic_class())?;
                }
                None => {}
            }

            match &d.transport {
                Some(Transport::Tcp(tcp)) => {
                    writeln!(out, "  TCP:")?;
                    writeln!(out, "    Source Port:  {}", tcp.source_port())?;
                    writeln!(out, "    Dest Port:    {}", tcp.destination_port())?;
                    writeln!(out, "    Seq:          {}", tcp.sequence_number())?;
                    writeln!(out, "    Ack:          {}", tcp.acknowledgment_number())?;
                    writeln!(out, "    Flags:        {}", tcp_flags(tcp))?;
                    writeln!(out, "    Window:       {}", tcp.window_size())?;
                    writeln!(out, "    Checksum:     0x{:04x}", tcp.checksum())?;
                    writeln!(out, "    Header Len:   {}", tcp.slice().len())?;
                }
                Some(Transport::Udp(udp)) => {
                    writeln!(out, "  UDP:")?;
                    writeln!(out, "    Source Port:  {}", udp.source_port())?;
                    writeln!(out, "    Dest Port:    {}", udp.destination_port())?;
                    writeln!(out, "    Length:       {}", udp.length())?;
                    writeln!(out, "    Checksum:     0x{:04x}", udp.checksum())?;
                }
                Some(Transport::Icmp { v6, kind, code }) => {
                    writeln!(out, "  {}:", if *v6 { "ICMPv6" } else { "ICMP" })?;
                    writeln!(out, "    Type: {}", kind)?;
                    writeln!(out, "    Code: {}", code)?;
                }
                None => {}
            }
        }

        if self.config.layer >= 4 && d.transport.is_some() {
            writeln!(out, "  Payload: {} bytes", d.payload.len())?;
        }
        Ok(())
    }
}

fn calendar(ts: Timestamp, local: bool) -> String {
    let Some(utc) = chrono::DateTime::from_timestamp(ts.sec() as i64, 0) else {
        return ts.to_string();
    };
    let date = if local {
        utc.with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
    } else {
        utc.format("%Y-%m-%d %H:%M:%S").to_string()
    };
    format!("{}.{:012}", date, ts.psec())
}

/// Hex dump with offsets, hex values, and ASCII representation.
fn write_hex_dump<W: Write + ?Sized>(out: &mut W, data: &[u8]) -> io::Result<()> {
    for offset in (0..data.len()).step_by(16) {
        let end = (offset + 16).min(data.len());
        let chunk = &data[offset..end];

        let mut row = format!("    {:04x}  ", offset);
        for (i, byte) in chunk.iter().enumerate() {
            row.push_str(&format!("{:02x} ", byte));
            if i == 7 {
                row.push(' ');
            }
        }
        for i in chunk.len()..16 {
            row.push_str("   ");
            if i == 7 {
                row.push(' ');
            }
        }

        row.push_str(" |");
        for &byte in chunk {
            if byte.is_ascii_graphic() || byte == b' ' {
                row.push(byte as char);
            } else {
                row.push('.');
            }
        }
        row.push('|');
        writeln!(out, "{}", row)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::iface_tag;

    /// Ethernet + IPv4 + TCP SYN with an optional payload.
    fn tcp_packet(payload_len: usize) -> Vec<u8> {
        let mut pkt = vec![0u8; 54 + payload_len];
        pkt[0..6].copy_from_slice(&[0xff; 6]);
        pkt[6..12].copy_from_slice(&[0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
        pkt[12] = 0x08;
        pkt[13] = 0x00;

        let ip_total = (40 + payload_len) as u16;
        let ip = &mut pkt[14..34];
        ip[0] = 0x45;
        ip[2..4].copy_from_slice(&ip_total.to_be_bytes());
        ip[8] = 64;
        ip[9] = 6;
        ip[12..16].copy_from_slice(&[10, 0, 0, 1]);
        ip[16..20].copy_from_slice(&[10, 0, 0, 2]);

        let tcp = &mut pkt[34..54];
        tcp[0..2].copy_from_slice(&12345u16.to_be_bytes());
        tcp[2..4].copy_from_slice(&80u16.to_be_bytes());
        tcp[4..8].copy_from_slice(&1000u32.to_be_bytes());
        tcp[12] = 0x50;
        tcp[13] = 0x02;
        tcp[14..16].copy_from_slice(&65535u16.to_be_bytes());
        pkt
    }

    fn captured(data: &[u8], ts: Timestamp) -> CapturedPacket<'_> {
        CapturedPacket {
            ts,
            len: data.len() as u32,
            caplen: data.len() as u32,
            data,
            iface: iface_tag("eth0"),
        }
    }

    fn render(config: FormatConfig, data: &[u8]) -> String {
        let mut renderer = PacketRenderer::new(config);
        let mut out = Vec::new();
        renderer
            .render_matched(&mut out, &captured(data, Timestamp::new(7, 0)))
            .unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn layer_one_shows_capture_header_only() {
        let config = FormatConfig {
            layer: 1,
            ..FormatConfig::default()
        };
        assert_eq!(
            render(config, &tcp_packet(0)),
            "eth0:0.000000000000:LINK(54):CAPLEN(54)\n"
        );
    }

    #[test]
    fn layer_two_adds_ethernet() {
        let config = FormatConfig {
            layer: 2,
            ..FormatConfig::default()
        };
        let line = render(config, &tcp_packet(0));
        assert!(line.contains("Eth: 00:11:22:33:44:55 -> ff:ff:ff:ff:ff:ff [IPv4]"));
        assert!(!line.contains("TCP"));
    }

    #[test]
    fn layer_four_decodes_full_stack() {
        let line = render(FormatConfig::default(), &tcp_packet(10));
        assert!(line.contains("IPv4: 10.0.0.1 -> 10.0.0.2 ttl=64 len=50"));
        assert!(line.contains("TCP 12345 -> 80 [S] seq=1000"));
        assert!(line.contains("payload: 10 bytes"));
        assert!(line.ends_with('\n'));
        assert_eq!(line.lines().count(), 1);
    }

    #[test]
    fn headers_and_hexdump_add_blocks() {
        let config = FormatConfig {
            headers: true,
            hexdump: true,
            ..FormatConfig::default()
        };
        let text = render(config, &tcp_packet(0));
        assert!(text.contains("  IPv4:\n"));
        assert!(text.contains("    Dest Port:    80\n"));
        assert!(text.contains("    0000  ff ff ff ff ff ff 00 11  22 33 44 55 08 00 45 00"));
        // 54 bytes -> 4 hex rows
        assert_eq!(text.lines().filter(|l| l.contains("  |")).count(), 4);
    }

    #[test]
    fn relative_times_start_at_first_rendered_packet() {
        let data = tcp_packet(0);
        let mut renderer = PacketRenderer::new(FormatConfig {
            layer: 1,
            ..FormatConfig::default()
        });
        let mut out = Vec::new();
        renderer
            .render_matched(&mut out, &captured(&data, Timestamp::new(10, 0)))
            .unwrap();
        renderer
            .render_ignored(&mut out, &captured(&data, Timestamp::new(11, 5)))
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "eth0:0.000000000000:LINK(54):CAPLEN(54)\neth0:1.000000000005: [filtered]\n"
        );
    }

    #[test]
    fn absolute_and_calendar_times() {
        let data = tcp_packet(0);
        let absolute = FormatConfig {
            layer: 1,
            relative: false,
            ..FormatConfig::default()
        };
        let mut out = Vec::new();
        PacketRenderer::new(absolute)
            .render_matched(&mut out, &captured(&data, Timestamp::new(86_400, 1)))
            .unwrap();
        assert!(String::from_utf8(out).unwrap().starts_with("eth0:86400.000000000001:"));

        let utc = FormatConfig {
            layer: 1,
            date: DateStyle::Utc,
            ..FormatConfig::default()
        };
        let mut out = Vec::new();
        PacketRenderer::new(utc)
            .render_matched(&mut out, &captured(&data, Timestamp::new(86_400, 1)))
            .unwrap();
        assert!(String::from_utf8(out)
            .unwrap()
            .starts_with("eth0:1970-01-02 00:00:00.000000000001:"));
    }

    #[test]
    fn truncated_frame_is_still_rendered() {
        let config = FormatConfig {
            layer: 2,
            ..FormatConfig::default()
        };
        let line = render(config, &[0u8; 6]);
        assert!(line.contains("LINK(6)"));
        assert!(line.contains("[truncated frame]"));
    }

    #[test]
    fn date_style_names() {
        assert_eq!("UTC".parse::<DateStyle>().unwrap(), DateStyle::Utc);
        assert_eq!("local".parse::<DateStyle>().unwrap(), DateStyle::Local);
        assert!("mars".parse::<DateStyle>().is_err());
    }
}
