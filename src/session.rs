//! The capture session loop.
//!
//! A session primes its reference frame with the first packet, then reads
//! until the stream ends, the packet limit is reached or shutdown is
//! requested. Every packet gets a timing record and, with packet display on,
//! a rendered view. The stream and filter are owned by the session and are
//! released when [`Session::run`] returns, whatever the outcome.

use crate::capture::{iface_name, CapturedPacket, IfaceTag, PacketFilter, PacketStream, StreamStat};
use crate::display::PacketRenderer;
use crate::error::{ReadError, SessionError};
use crate::output::OutputFormat;
use crate::shutdown::ShutdownToken;
use crate::timestamp::Timestamp;
use crate::timing::ReferenceFrame;
use std::io::{self, Write};

/// Settings that shape the loop, fixed before it starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Stop once the stream has matched this many packets (0 = no limit).
    pub max_packets: u64,
    pub format: OutputFormat,
    /// Write the format's column header.
    pub header: bool,
    /// Use a zero time origin so display times are absolute.
    pub no_offset: bool,
    pub display_packet: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            max_packets: 0,
            format: OutputFormat::Plain,
            header: true,
            no_offset: false,
            display_packet: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Init,
    Primed,
    Running,
    Draining,
    Stopped,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    EndOfStream,
    PacketLimit,
    Interrupted,
}

/// Mutable per-session state, owned by the loop.
#[derive(Debug, Clone)]
struct SessionState {
    frame: ReferenceFrame,
    packets: u64,
    volume: u64,
    phase: SessionPhase,
    last_iface: IfaceTag,
}

impl SessionState {
    fn prime(first: Timestamp, no_offset: bool) -> Self {
        let mut state = SessionState {
            frame: ReferenceFrame::prime(first, no_offset),
            packets: 0,
            volume: 0,
            phase: SessionPhase::Init,
            last_iface: [0; 8],
        };
        state.enter(SessionPhase::Primed);
        state
    }

    /// Count a packet and advance the reference frame; returns `(display, delta)`.
    fn record(&mut self, packet: &CapturedPacket<'_>) -> (Timestamp, Timestamp) {
        self.packets += 1;
        self.volume += u64::from(packet.len);
        self.last_iface = packet.iface;
        self.frame.advance(packet.ts)
    }

    fn enter(&mut self, phase: SessionPhase) {
        tracing::trace!(from = ?self.phase, to = ?phase, "session phase");
        self.phase = phase;
    }
}

/// Final counters of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    pub packets: u64,
    pub volume: u64,
    pub stat: StreamStat,
    pub read_errors: u64,
    pub stop: StopReason,
    /// Phase the loop left in: `Stopped` or `Draining`.
    pub end_phase: SessionPhase,
    pub last_iface: IfaceTag,
}

impl SessionSummary {
    /// Summary of a session interrupted before its first packet.
    fn interrupted_before_start(stat: StreamStat) -> Self {
        SessionSummary {
            packets: 0,
            volume: 0,
            stat,
            read_errors: 0,
            stop: StopReason::Interrupted,
            end_phase: SessionPhase::Draining,
            last_iface: [0; 8],
        }
    }

    pub fn write<W: Write + ?Sized>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "PACKETS:{}", self.packets)?;
        writeln!(out, "VOLUME:{}", self.volume)
    }
}

pub struct Session {
    config: SessionConfig,
    stream: Box<dyn PacketStream>,
    filter: Box<dyn PacketFilter>,
    renderer: PacketRenderer,
    shutdown: ShutdownToken,
}

impl Session {
    pub fn new(
        config: SessionConfig,
        stream: Box<dyn PacketStream>,
        filter: Box<dyn PacketFilter>,
        renderer: PacketRenderer,
        shutdown: ShutdownToken,
    ) -> Self {
        Session {
            config,
            stream,
            filter,
            renderer,
            shutdown,
        }
    }

    pub fn run<W: Write + ?Sized>(self, out: &mut W) -> Result<SessionSummary, SessionError> {
        let Session {
            config,
            mut stream,
            filter,
            mut renderer,
            shutdown,
        } = self;
        let filter = filter.as_ref();

        // Priming read. A quiet live interface times out here, so transient
        // failures retry like they do in the main loop.
        let mut state = loop {
            if !shutdown.is_running() {
                tracing::debug!("interrupted before the first packet");
                return Ok(SessionSummary::interrupted_before_start(stream.stat()));
            }
            match stream.read(filter) {
                Ok(first) => {
                    let mut state = SessionState::prime(first.ts, config.no_offset);
                    tracing::debug!(
                        origin = %state.frame.origin(),
                        no_offset = config.no_offset,
                        "time reference set"
                    );
                    if config.header {
                        config.format.write_header(out)?;
                    }
                    emit(&mut state, &config, &mut renderer, filter, out, &first)?;
                    break state;
                }
                Err(e) if e.is_transient() => continue,
                Err(e) => return Err(SessionError::InitialRead(e)),
            }
        };
        state.enter(SessionPhase::Running);

        let mut read_errors = 0u64;
        let stop = loop {
            if config.max_packets > 0 && stream.stat().matched >= config.max_packets {
                state.enter(SessionPhase::Stopped);
                break StopReason::PacketLimit;
            }
            if !shutdown.is_running() {
                state.enter(SessionPhase::Draining);
                break StopReason::Interrupted;
            }

            match stream.read(filter) {
                Ok(packet) => emit(&mut state, &config, &mut renderer, filter, out, &packet)?,
                Err(ReadError::EndOfStream) => {
                    state.enter(SessionPhase::Stopped);
                    break StopReason::EndOfStream;
                }
                Err(e) if e.is_transient() => continue,
                Err(e) => {
                    read_errors += 1;
                    tracing::error!(error = %e, "stream_read() failed");
                }
            }
        };

        out.flush()?;
        let stat = stream.stat();
        tracing::info!("There was a total of {} packets read.", stat.read);
        tracing::info!("There was a total of {} packets matching filter.", stat.matched);
        tracing::debug!(
            iface = %iface_name(&state.last_iface),
            reason = ?stop,
            "session closed"
        );
        let end_phase = state.phase;
        state.enter(SessionPhase::Closed);

        Ok(SessionSummary {
            packets: state.packets,
            volume: state.volume,
            stat,
            read_errors,
            stop,
            end_phase,
            last_iface: state.last_iface,
        })
    }
}

/// Write the timing record of one packet and finish its line.
fn emit<W: Write + ?Sized>(
    state: &mut SessionState,
    config: &SessionConfig,
    renderer: &mut PacketRenderer,
    filter: &dyn PacketFilter,
    out: &mut W,
    packet: &CapturedPacket<'_>,
) -> io::Result<()> {
    let (display, delta) = state.record(packet);
    config.format.render(out, display, delta)?;

    if !config.display_packet {
        return writeln!(out);
    }
    if filter.matches(packet) {
        renderer.render_matched(out, packet)
    } else {
        renderer.render_ignored(out, packet)
    }
}
