//! Packet streams: capture files and live interfaces behind one read API.

use super::filter::PacketFilter;
use crate::error::{ReadError, StreamError};
use crate::timestamp::Timestamp;
use pcap::{Activated, Capture, Device, Linktype, Precision};
use std::path::PathBuf;

/// Fixed-size interface tag, NUL padded.
pub type IfaceTag = [u8; 8];

/// Build an interface tag from a name, truncating to eight bytes.
pub fn iface_tag(name: &str) -> IfaceTag {
    let mut tag = [0u8; 8];
    let bytes = name.as_bytes();
    let n = bytes.len().min(tag.len());
    tag[..n].copy_from_slice(&bytes[..n]);
    tag
}

/// Printable form of an interface tag.
pub fn iface_name(tag: &IfaceTag) -> String {
    let end = tag.iter().position(|&b| b == 0).unwrap_or(tag.len());
    String::from_utf8_lossy(&tag[..end]).into_owned()
}

/// One packet as handed to the session loop. `data` borrows the stream's
/// buffer and is only valid until the next read.
#[derive(Debug, Clone, Copy)]
pub struct CapturedPacket<'a> {
    pub ts: Timestamp,
    /// Length on the wire.
    pub len: u32,
    /// Captured length, at most `len`.
    pub caplen: u32,
    pub data: &'a [u8],
    pub iface: IfaceTag,
}

/// Read counters kept by a stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStat {
    pub read: u64,
    pub matched: u64,
}

pub trait PacketStream {
    /// Read the next packet accepted by `filter`. Rejected packets count
    /// towards `read` but not `matched`.
    fn read<'a>(&'a mut self, filter: &dyn PacketFilter) -> Result<CapturedPacket<'a>, ReadError>;

    fn stat(&self) -> StreamStat;

    fn linktype(&self) -> Linktype;

    fn describe(&self) -> String;
}

/// Where packets come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamAddress {
    File(PathBuf),
    /// Live capture; `None` falls back to the interface hint or the default device.
    Interface(Option<String>),
}

impl StreamAddress {
    pub fn parse(address: &str) -> Self {
        match address.strip_prefix("iface:") {
            Some("") => StreamAddress::Interface(None),
            Some(name) => StreamAddress::Interface(Some(name.to_string())),
            None => StreamAddress::File(PathBuf::from(address)),
        }
    }
}

/// Options for live captures.
#[derive(Debug, Clone)]
pub struct CaptureSettings {
    pub promiscuous: bool,
    pub snaplen: i32,
    pub timeout_ms: i32,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        CaptureSettings {
            promiscuous: true,
            snaplen: 65535,
            timeout_ms: 100,
        }
    }
}

/// A libpcap-backed stream over a savefile or a live device.
pub struct PcapStream {
    cap: Capture<dyn Activated>,
    precision: Precision,
    iface: IfaceTag,
    label: String,
    buf: Vec<u8>,
    stat: StreamStat,
}

impl PcapStream {
    pub fn open(
        address: &StreamAddress,
        iface_hint: Option<&str>,
        settings: &CaptureSettings,
    ) -> Result<Self, StreamError> {
        match address {
            StreamAddress::File(path) => {
                if let Some(hint) = iface_hint {
                    tracing::debug!(iface = hint, "interface hint ignored for capture file");
                }
                let label = path.display().to_string();
                let cap = Capture::from_file_with_precision(path, Precision::Nano).map_err(|e| {
                    StreamError::Open {
                        address: label.clone(),
                        source: e,
                    }
                })?;
                let stem = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();
                Ok(Self::from_capture(cap.into(), Precision::Nano, iface_tag(&stem), label))
            }
            StreamAddress::Interface(name) => {
                let name = name.as_deref().or(iface_hint);
                let device = select_device(name)?;
                let label = device.name.clone();
                let open_err = |e| StreamError::Open {
                    address: label.clone(),
                    source: e,
                };
                let cap = Capture::from_device(device)
                    .map_err(open_err)?
                    .promisc(settings.promiscuous)
                    .snaplen(settings.snaplen)
                    .timeout(settings.timeout_ms)
                    .open()
                    .map_err(open_err)?;

                tracing::info!(
                    interface = %label,
                    promiscuous = settings.promiscuous,
                    snaplen = settings.snaplen,
                    "live capture started"
                );
                Ok(Self::from_capture(cap.into(), Precision::Micro, iface_tag(&label), label))
            }
        }
    }

    fn from_capture(
        cap: Capture<dyn Activated>,
        precision: Precision,
        iface: IfaceTag,
        label: String,
    ) -> Self {
        PcapStream {
            cap,
            precision,
            iface,
            label,
            buf: Vec::with_capacity(65536),
            stat: StreamStat::default(),
        }
    }
}

fn select_device(name: Option<&str>) -> Result<Device, StreamError> {
    let list_err = |e: pcap::Error| StreamError::NoDevice(e.to_string());
    match name {
        Some(name) => Device::list()
            .map_err(list_err)?
            .into_iter()
            .find(|d| d.name == name)
            .ok_or_else(|| StreamError::NoDevice(format!("interface '{}' not found", name))),
        None => Device::lookup()
            .map_err(list_err)?
            .ok_or_else(|| StreamError::NoDevice("no default device found".into())),
    }
}

fn packet_timestamp(header: &pcap::PacketHeader, precision: Precision) -> Timestamp {
    let sec = header.ts.tv_sec as i32;
    let frac = header.ts.tv_usec as u64;
    match precision {
        Precision::Nano => Timestamp::from_nanos(sec, frac),
        Precision::Micro => Timestamp::from_micros(sec, frac),
    }
}

impl PacketStream for PcapStream {
    fn read<'a>(&'a mut self, filter: &dyn PacketFilter) -> Result<CapturedPacket<'a>, ReadError> {
        let (ts, len, caplen) = loop {
            let packet = self.cap.next_packet()?;
            let ts = packet_timestamp(packet.header, self.precision);
            let (len, caplen) = (packet.header.len, packet.header.caplen);
            self.buf.clear();
            self.buf.extend_from_slice(packet.data);
            self.stat.read += 1;

            let candidate = CapturedPacket {
                ts,
                len,
                caplen,
                data: &self.buf,
                iface: self.iface,
            };
            if filter.matches(&candidate) {
                break (ts, len, caplen);
            }
            tracing::trace!(read = self.stat.read, "packet rejected by filter");
        };

        self.stat.matched += 1;
        Ok(CapturedPacket {
            ts,
            len,
            caplen,
            data: &self.buf,
            iface: self.iface,
        })
    }

    fn stat(&self) -> StreamStat {
        self.stat
    }

    fn linktype(&self) -> Linktype {
        self.cap.get_datalink()
    }

    fn describe(&self) -> String {
        let linktype = self.linktype();
        let link = linktype
            .get_name()
            .unwrap_or_else(|_| format!("DLT {}", linktype.0));
        let precision = match self.precision {
            Precision::Nano => "ns",
            Precision::Micro => "us",
        };
        format!("{} (link {}, {} timestamps)", self.label, link, precision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::filter::{self, MatchAll};
    use std::fs;
    use std::path::Path;

    const NANO_MAGIC: u32 = 0xa1b2_3c4d;

    /// Write a nanosecond-precision pcap file with Ethernet link type.
    fn write_pcap(path: &Path, packets: &[(u32, u32, Vec<u8>)]) {
        let mut out = Vec::new();
        out.extend_from_slice(&NANO_MAGIC.to_le_bytes());
        out.extend_from_slice(&2u16.to_le_bytes());
        out.extend_from_slice(&4u16.to_le_bytes());
        out.extend_from_slice(&0i32.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&65535u32.to_le_bytes());
        out.extend_from_slice(&1u32.to_le_bytes());
        for (sec, nsec, data) in packets {
            out.extend_from_slice(&sec.to_le_bytes());
            out.extend_from_slice(&nsec.to_le_bytes());
            out.extend_from_slice(&(data.len() as u32).to_le_bytes());
            out.extend_from_slice(&(data.len() as u32).to_le_bytes());
            out.extend_from_slice(data);
        }
        fs::write(path, out).unwrap();
    }

    fn frame(ether_type: u16, len: usize) -> Vec<u8> {
        let mut f = vec![0u8; len.max(14)];
        f[0..6].copy_from_slice(&[0xff; 6]);
        f[6..12].copy_from_slice(&[0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
        f[12..14].copy_from_slice(&ether_type.to_be_bytes());
        f
    }

    fn temp_pcap(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("captime-{}-{}.pcap", std::process::id(), name))
    }

    #[test]
    fn parse_addresses() {
        assert_eq!(
            StreamAddress::parse("trace.pcap"),
            StreamAddress::File(PathBuf::from("trace.pcap"))
        );
        assert_eq!(
            StreamAddress::parse("iface:eth0"),
            StreamAddress::Interface(Some("eth0".into()))
        );
        assert_eq!(StreamAddress::parse("iface:"), StreamAddress::Interface(None));
    }

    #[test]
    fn iface_tag_truncates_and_pads() {
        assert_eq!(&iface_tag("eth0"), b"eth0\0\0\0\0");
        assert_eq!(&iface_tag("enp0s31f6"), b"enp0s31f");
        assert_eq!(iface_name(&iface_tag("eth0")), "eth0");
    }

    #[test]
    fn reads_file_with_nanosecond_timestamps() {
        let path = temp_pcap("nanos");
        write_pcap(
            &path,
            &[
                (100, 1, frame(0x0800, 60)),
                (100, 500_000_000, frame(0x86dd, 80)),
            ],
        );

        let mut stream = PcapStream::open(
            &StreamAddress::File(path.clone()),
            None,
            &CaptureSettings::default(),
        )
        .unwrap();
        assert_eq!(stream.linktype(), Linktype::ETHERNET);

        let first = stream.read(&MatchAll).unwrap();
        assert_eq!(first.ts, Timestamp::new(100, 1_000));
        assert_eq!(first.len, 60);
        assert_eq!(first.data.len(), 60);

        let second = stream.read(&MatchAll).unwrap();
        assert_eq!(second.ts, Timestamp::new(100, 500_000_000_000));
        assert_eq!(second.caplen, 80);

        assert_eq!(stream.read(&MatchAll).unwrap_err(), ReadError::EndOfStream);
        assert_eq!(stream.stat(), StreamStat { read: 2, matched: 2 });

        fs::remove_file(path).ok();
    }

    #[test]
    fn rejected_packets_count_as_read_only() {
        let path = temp_pcap("filtered");
        write_pcap(
            &path,
            &[
                (1, 0, frame(0x0806, 60)),
                (2, 0, frame(0x86dd, 60)),
                (3, 0, frame(0x0806, 60)),
            ],
        );

        let mut stream = PcapStream::open(
            &StreamAddress::File(path.clone()),
            None,
            &CaptureSettings::default(),
        )
        .unwrap();
        let ip6 = filter::compile(&["ip6".to_string()], stream.linktype()).unwrap();

        let packet = stream.read(ip6.as_ref()).unwrap();
        assert_eq!(packet.ts.sec(), 2);
        assert_eq!(stream.read(ip6.as_ref()).unwrap_err(), ReadError::EndOfStream);
        assert_eq!(stream.stat(), StreamStat { read: 3, matched: 1 });

        fs::remove_file(path).ok();
    }

    #[test]
    fn missing_file_fails_to_open() {
        let result = PcapStream::open(
            &StreamAddress::File(temp_pcap("does-not-exist")),
            None,
            &CaptureSettings::default(),
        );
        assert!(matches!(result, Err(StreamError::Open { .. })));
    }
}
