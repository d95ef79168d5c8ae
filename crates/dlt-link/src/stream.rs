//! A Link that carries packets over a byte stream.
//!
//! The loop alternates between two states. In `Idle` it polls the Device for
//! a packet and writes it to the stream. When responses are expected it then
//! enters `ResponsePending`, reads one packet back from the stream, and
//! submits it to the Device. A missing response is logged and the loop goes
//! back to `Idle`.

use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use dlt_frame::{Packet, PacketReader, PacketWriter};

use crate::config::{SendMode, Timeout};
use crate::error::{LinkError, Result};
use crate::interface::Link;
use crate::rendezvous::SendStatus;

/// Stream link behaviour.
#[derive(Debug, Clone)]
pub struct StreamLinkConfig {
    /// How long one Idle turn waits for the Device.
    pub poll_interval: Duration,
    /// Expect one response packet on the stream after every transmission.
    pub await_response: bool,
    /// How long `ResponsePending` waits for the peer.
    ///
    /// Applied as the stream read timeout by [`StreamLink::unix`]. Links
    /// built with [`StreamLink::new`] or [`StreamLink::from_parts`] ignore it
    /// and wait as long as their reader does.
    pub response_timeout: Duration,
}

impl Default for StreamLinkConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            await_response: true,
            response_timeout: Duration::from_millis(250),
        }
    }
}

/// Where the state machine currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Idle,
    ResponsePending,
}

/// What one [`StreamLink::step`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Nothing from the Device within the poll interval.
    Idle,
    /// A Device packet was written to the stream.
    Transmitted(Packet),
    /// A stream packet was handed to the Device.
    Relayed(SendStatus),
    /// The stream stayed silent past the response timeout.
    NoResponse,
}

/// Binds a [`Link`] handle to a packet stream.
pub struct StreamLink<R, W> {
    link: Link,
    reader: PacketReader<R>,
    writer: PacketWriter<W>,
    config: StreamLinkConfig,
    state: LinkState,
}

impl<R: Read, W: Write> StreamLink<R, W> {
    /// Build from raw stream halves.
    ///
    /// `config.response_timeout` is not applied here. The response wait ends
    /// only when `reader` returns, so a reader without its own timeout blocks
    /// in `ResponsePending` until the peer answers or closes, and [`run`]
    /// cannot observe `running` meanwhile. Use [`StreamLink::unix`], or pass a
    /// reader built with [`PacketReader::with_config_unix`] to
    /// [`StreamLink::from_parts`], to bound the wait.
    ///
    /// [`run`]: StreamLink::run
    pub fn new(link: Link, reader: R, writer: W, config: StreamLinkConfig) -> Self {
        Self::from_parts(
            link,
            PacketReader::new(reader),
            PacketWriter::new(writer),
            config,
        )
    }

    /// Build from an existing packet reader and writer.
    ///
    /// The response wait is bounded by the reader's timeout, not by
    /// `config.response_timeout`.
    pub fn from_parts(
        link: Link,
        reader: PacketReader<R>,
        writer: PacketWriter<W>,
        config: StreamLinkConfig,
    ) -> Self {
        Self {
            link,
            reader,
            writer,
            config,
            state: LinkState::Idle,
        }
    }

    /// Current state.
    pub fn state(&self) -> LinkState {
        self.state
    }

    /// The Link handle driving this stream.
    pub fn link(&self) -> &Link {
        &self.link
    }

    /// Run one turn of the state machine.
    pub fn step(&mut self) -> Result<Step> {
        match self.state {
            LinkState::Idle => {
                let timeout = Timeout::from(self.config.poll_interval);
                let Some(packet) = self.link.poll_packet(timeout)? else {
                    return Ok(Step::Idle);
                };
                tracing::info!(
                    endpoint = self.link.endpoint(),
                    len = packet.wire_size(),
                    "transmitting packet"
                );
                self.writer.write_packet(&packet)?;
                if self.config.await_response {
                    self.state = LinkState::ResponsePending;
                }
                Ok(Step::Transmitted(packet))
            }
            LinkState::ResponsePending => {
                self.state = LinkState::Idle;
                match self.reader.read_packet() {
                    Ok(packet) => {
                        tracing::info!(endpoint = self.link.endpoint(), "response received, submitting");
                        let status = self.link.submit_packet(packet, SendMode::Sync)?;
                        Ok(Step::Relayed(status))
                    }
                    Err(err) if err.is_timeout() => {
                        tracing::warn!(endpoint = self.link.endpoint(), "no response on stream");
                        Ok(Step::NoResponse)
                    }
                    Err(err) => Err(err.into()),
                }
            }
        }
    }

    /// Read one packet from the stream and hand it to the Device.
    ///
    /// For peers that send without being asked.
    pub fn forward_inbound(&mut self, mode: SendMode) -> Result<SendStatus> {
        let packet = self.reader.read_packet()?;
        self.link.submit_packet(packet, mode)
    }

    /// Step until `running` clears or the Device goes away.
    pub fn run(&mut self, running: &AtomicBool) -> Result<()> {
        while running.load(Ordering::SeqCst) {
            match self.step() {
                Ok(_) => {}
                Err(LinkError::Disconnected { .. }) => {
                    tracing::info!(endpoint = self.link.endpoint(), "device gone, stopping");
                    return Ok(());
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// Give back the Link handle and stream halves.
    pub fn into_parts(self) -> (Link, PacketReader<R>, PacketWriter<W>) {
        (self.link, self.reader, self.writer)
    }
}

#[cfg(unix)]
impl StreamLink<std::os::unix::net::UnixStream, std::os::unix::net::UnixStream> {
    /// Build over a Unix stream, bounding the response wait by `response_timeout`.
    pub fn unix(
        link: Link,
        stream: std::os::unix::net::UnixStream,
        config: StreamLinkConfig,
    ) -> Result<Self> {
        let frame_config = dlt_frame::FrameConfig {
            read_timeout: Some(config.response_timeout),
            write_timeout: None,
        };
        let reader_stream = stream
            .try_clone()
            .map_err(dlt_frame::EncodingError::from)?;
        let reader = PacketReader::with_config_unix(reader_stream, frame_config.clone())?;
        let writer = PacketWriter::with_config_unix(stream, frame_config)?;
        Ok(Self::from_parts(link, reader, writer, config))
    }
}
