use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dlt_frame::{decode_into, encode, MessageType, Packet};

use crate::config::{InterfaceConfig, SendMode, Timeout};
use crate::error::{ConfigurationError, LinkError, Result};
use crate::registry::Registry;
use crate::rendezvous::{Direction, Doorbell, Rendezvous, SendStatus};

struct EndpointChannels {
    to_link: Rendezvous,
    to_device: Rendezvous,
}

struct Shared {
    config: InterfaceConfig,
    registry: Registry,
    endpoints: Vec<EndpointChannels>,
    doorbell: Arc<Doorbell>,
}

impl Shared {
    fn channels(&self, endpoint: u8) -> Result<&EndpointChannels> {
        let index = self.registry.check_endpoint(endpoint)?;
        Ok(&self.endpoints[index])
    }
}

/// Routing interface shared by the Device and every Link.
///
/// Cheap to clone; all clones refer to the same endpoints.
#[derive(Clone)]
pub struct Interface {
    shared: Arc<Shared>,
}

impl Interface {
    /// Allocate the endpoints described by `config`.
    pub fn init(config: InterfaceConfig) -> std::result::Result<Self, ConfigurationError> {
        if let Err(err) = config.validate() {
            tracing::error!(error = %err, "interface init failed");
            return Err(err);
        }

        let doorbell = Arc::new(Doorbell::default());
        let endpoints = (0..config.num_endpoints)
            .map(|index| {
                let endpoint = index as u8;
                EndpointChannels {
                    to_link: Rendezvous::new(
                        endpoint,
                        Direction::ToLink,
                        config.async_backlog,
                        None,
                    ),
                    to_device: Rendezvous::new(
                        endpoint,
                        Direction::ToDevice,
                        config.async_backlog,
                        Some(Arc::clone(&doorbell)),
                    ),
                }
            })
            .collect();

        tracing::debug!(
            endpoints = config.num_endpoints,
            async_backlog = config.async_backlog,
            "interface initialised"
        );
        Ok(Self {
            shared: Arc::new(Shared {
                config,
                registry: Registry::new(config.num_endpoints),
                endpoints,
                doorbell,
            }),
        })
    }

    /// Initialise with `num_endpoints` endpoints and default limits.
    pub fn with_endpoints(num_endpoints: usize) -> std::result::Result<Self, ConfigurationError> {
        Self::init(InterfaceConfig::with_endpoints(num_endpoints))
    }

    /// The configuration the interface was built from.
    pub fn config(&self) -> &InterfaceConfig {
        &self.shared.config
    }

    /// Number of endpoints.
    pub fn num_endpoints(&self) -> usize {
        self.shared.endpoints.len()
    }

    /// Endpoint bindings.
    pub fn registry(&self) -> &Registry {
        &self.shared.registry
    }

    /// Packets waiting on `endpoint` as `(towards link, towards device)`.
    pub fn pending(&self, endpoint: u8) -> Result<(usize, usize)> {
        let channels = self.shared.channels(endpoint)?;
        Ok((channels.to_link.pending(), channels.to_device.pending()))
    }

    /// Claim the Device role for the calling thread.
    pub fn register_device(&self) -> Result<Device> {
        self.shared.registry.bind_device()?;
        Ok(Device {
            shared: Arc::clone(&self.shared),
            cursor: AtomicUsize::new(0),
        })
    }

    /// Claim the Link role on `endpoint` for the calling thread.
    pub fn register_link(&self, endpoint: u8) -> Result<Link> {
        self.shared.registry.bind_link(endpoint)?;
        Ok(Link {
            shared: Arc::clone(&self.shared),
            endpoint,
        })
    }
}

impl std::fmt::Debug for Interface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interface")
            .field("config", &self.shared.config)
            .field("registry", &self.shared.registry)
            .finish()
    }
}

/// A packet read by the Device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Received {
    /// Message type carried by the packet.
    pub message_type: MessageType,
    /// Payload bytes written into the caller's buffer.
    pub len: usize,
}

/// The application side of the interface.
///
/// Dropping the handle disconnects every Link: their pending sends fail and
/// their polls return `Disconnected` once drained.
pub struct Device {
    shared: Arc<Shared>,
    cursor: AtomicUsize,
}

impl Device {
    /// Frame `payload` as a request and send it to the Link on `endpoint`.
    pub fn request(&self, endpoint: u8, payload: &[u8], mode: SendMode) -> Result<SendStatus> {
        self.send(endpoint, MessageType::REQUEST, payload, mode)
    }

    /// Frame `payload` as a response and send it to the Link on `endpoint`.
    pub fn respond(&self, endpoint: u8, payload: &[u8], mode: SendMode) -> Result<SendStatus> {
        self.send(endpoint, MessageType::RESPONSE, payload, mode)
    }

    fn send(
        &self,
        endpoint: u8,
        message_type: MessageType,
        payload: &[u8],
        mode: SendMode,
    ) -> Result<SendStatus> {
        let channels = self.shared.channels(endpoint)?;
        let packet = encode(message_type, payload).inspect_err(|err| {
            tracing::error!(endpoint, error = %err, "payload rejected");
        })?;
        channels.to_link.send(packet, mode)
    }

    /// Read one packet from the Link on `endpoint`, copying its payload into `buf`.
    ///
    /// Returns `Ok(None)` when nothing arrived within `timeout`. A payload
    /// larger than `buf` is dropped and reported as `ReceiverBufferTooSmall`;
    /// `buf` is left untouched.
    pub fn read(&self, endpoint: u8, buf: &mut [u8], timeout: Timeout) -> Result<Option<Received>> {
        let channels = self.shared.channels(endpoint)?;
        channels.to_device.receive_with(timeout, |packet| {
            let header = decode_into(packet.as_bytes(), buf)?;
            Ok(Received {
                message_type: header.message_type,
                len: header.payload_len,
            })
        })
    }

    /// Read from whichever endpoint has a packet first.
    ///
    /// Endpoints are scanned round-robin starting after the last one served.
    /// Fails with `Disconnected` only when every Link is gone.
    pub fn read_any(&self, buf: &mut [u8], timeout: Timeout) -> Result<Option<(u8, Received)>> {
        let deadline = timeout.deadline();
        let count = self.shared.endpoints.len();

        loop {
            let seen = self.shared.doorbell.generation();
            let start = self.cursor.load(Ordering::Relaxed) % count;
            let mut disconnected = 0;

            for offset in 0..count {
                let endpoint = ((start + offset) % count) as u8;
                match self.read(endpoint, buf, Timeout::NoWait) {
                    Ok(Some(received)) => {
                        self.cursor.store(endpoint as usize + 1, Ordering::Relaxed);
                        return Ok(Some((endpoint, received)));
                    }
                    Ok(None) => {}
                    Err(LinkError::Disconnected { .. }) => disconnected += 1,
                    Err(err) => {
                        self.cursor.store(endpoint as usize + 1, Ordering::Relaxed);
                        return Err(err);
                    }
                }
            }

            if disconnected == count {
                return Err(LinkError::Disconnected {
                    endpoint: start as u8,
                    direction: Direction::ToDevice.as_str(),
                });
            }
            if !self.shared.doorbell.wait_past(seen, deadline) {
                return Ok(None);
            }
        }
    }

    /// Payload length of the packet waiting on `endpoint`, without consuming it.
    pub fn peek(&self, endpoint: u8, timeout: Timeout) -> Result<Option<usize>> {
        let channels = self.shared.channels(endpoint)?;
        Ok(channels
            .to_device
            .peek(timeout)?
            .map(|wire| wire - dlt_frame::HEADER_SIZE))
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        for channels in &self.shared.endpoints {
            channels.to_device.close_receiver();
            channels.to_link.close_sender();
        }
        tracing::debug!("device detached");
    }
}

/// The transport side of one endpoint.
///
/// Dropping the handle fails the Device's pending and future sends to this
/// endpoint with `Disconnected`.
pub struct Link {
    shared: Arc<Shared>,
    endpoint: u8,
}

impl Link {
    /// The endpoint this Link owns.
    pub fn endpoint(&self) -> u8 {
        self.endpoint
    }

    fn channels(&self) -> &EndpointChannels {
        &self.shared.endpoints[self.endpoint as usize]
    }

    /// Hand an already framed packet to the Device.
    ///
    /// The message type is taken from the packet's own header.
    pub fn submit(&self, packet: &[u8], mode: SendMode) -> Result<SendStatus> {
        let packet = Packet::from_bytes(packet).inspect_err(|err| {
            tracing::error!(endpoint = self.endpoint, error = %err, "packet rejected");
        })?;
        self.submit_packet(packet, mode)
    }

    /// Hand a decoded packet to the Device.
    pub fn submit_packet(&self, packet: Packet, mode: SendMode) -> Result<SendStatus> {
        self.channels().to_device.send(packet, mode)
    }

    /// Wait for a packet from the Device and copy its payload into `buf`.
    ///
    /// Returns the payload length, or `Ok(0)` when nothing arrived within
    /// `timeout`. A payload larger than `buf` is dropped and reported as
    /// `ReceiverBufferTooSmall`; `buf` is left untouched. Use
    /// [`Link::poll_packet`] to forward the framed bytes as they are.
    pub fn poll(&self, buf: &mut [u8], timeout: Timeout) -> Result<usize> {
        let received = self
            .channels()
            .to_link
            .receive_with(timeout, |packet| {
                decode_into(packet.as_bytes(), buf).map(|header| header.payload_len)
            })?;
        Ok(received.unwrap_or(0))
    }

    /// Wait for a packet from the Device and return it by value.
    pub fn poll_packet(&self, timeout: Timeout) -> Result<Option<Packet>> {
        self.channels()
            .to_link
            .receive_with(timeout, |packet| Ok(*packet))
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        let channels = self.channels();
        channels.to_link.close_receiver();
        channels.to_device.close_sender();
        tracing::debug!(endpoint = self.endpoint, "link detached");
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::{Duration, Instant};

    use dlt_frame::{EncodingError, MAX_PACKET_SIZE, MAX_PAYLOAD};

    use super::*;

    #[test]
    fn init_rejects_too_many_endpoints() {
        let err = Interface::with_endpoints(crate::config::MAX_ENDPOINTS + 1).unwrap_err();
        assert!(matches!(err, ConfigurationError::TooManyEndpoints { .. }));
    }

    #[test]
    fn init_rejects_zero_async_backlog() {
        let err = Interface::init(InterfaceConfig {
            num_endpoints: 1,
            async_backlog: 0,
        })
        .unwrap_err();
        assert_eq!(err, ConfigurationError::NoAsyncBacklog);
    }

    #[test]
    fn smallest_backlog_still_accepts_async_send() {
        let iface = Interface::init(InterfaceConfig {
            num_endpoints: 1,
            async_backlog: 1,
        })
        .unwrap();
        let device = iface.register_device().unwrap();

        assert_eq!(
            device.request(0, b"x", SendMode::Async).unwrap(),
            SendStatus::Queued
        );
        assert!(matches!(
            device.request(0, b"y", SendMode::Async),
            Err(LinkError::BacklogFull { capacity: 1, .. })
        ));
    }

    #[test]
    fn request_reaches_polling_link() {
        let iface = Interface::with_endpoints(2).unwrap();
        let device = iface.register_device().unwrap();

        let link = {
            let iface = iface.clone();
            thread::spawn(move || {
                let link = iface.register_link(0).unwrap();
                let mut buf = [0u8; MAX_PACKET_SIZE];
                let len = link.poll(&mut buf, Timeout::Forever).unwrap();
                buf[..len].to_vec()
            })
        };

        let status = device
            .request(0, &[0xAA, 0xBB, 0xCC], SendMode::Sync)
            .unwrap();
        assert_eq!(status, SendStatus::Delivered);
        assert_eq!(link.join().unwrap(), vec![0xAA, 0xBB, 0xCC]);
    }

    #[test]
    fn submit_keeps_header_type() {
        let iface = Interface::with_endpoints(1).unwrap();
        let device = iface.register_device().unwrap();
        let link = iface.register_link(0).unwrap();

        link.submit(&[0x77, 0x02, 0x02, 0x10, 0x20], SendMode::Async)
            .unwrap();

        let mut payload = [0u8; MAX_PAYLOAD];
        let received = device
            .read(0, &mut payload, Timeout::NoWait)
            .unwrap()
            .unwrap();
        assert_eq!(received.message_type, MessageType::RESPONSE);
        assert_eq!(&payload[..received.len], &[0x10, 0x20]);
    }

    #[test]
    fn submit_rejects_malformed_packet() {
        let iface = Interface::with_endpoints(1).unwrap();
        let link = iface.register_link(0).unwrap();

        let err = link.submit(&[0x00, 0x01, 0x00], SendMode::Async).unwrap_err();
        assert!(matches!(
            err,
            LinkError::Encoding(EncodingError::InvalidPreamble(0x00))
        ));
        assert_eq!(iface.pending(0).unwrap(), (0, 0));
    }

    #[test]
    fn oversize_payload_changes_nothing() {
        let iface = Interface::with_endpoints(1).unwrap();
        let device = iface.register_device().unwrap();

        let err = device
            .request(0, &[0u8; MAX_PAYLOAD + 1], SendMode::Async)
            .unwrap_err();
        assert!(matches!(
            err,
            LinkError::Encoding(EncodingError::PayloadTooLarge { size: 48, max: 47 })
        ));
        assert_eq!(iface.pending(0).unwrap(), (0, 0));
    }

    #[test]
    fn unknown_endpoint_rejected() {
        let iface = Interface::with_endpoints(1).unwrap();
        let device = iface.register_device().unwrap();
        assert!(matches!(
            device.request(3, b"x", SendMode::Async),
            Err(LinkError::UnknownEndpoint { endpoint: 3, .. })
        ));
        assert!(matches!(
            iface.register_link(1),
            Err(LinkError::UnknownEndpoint { .. })
        ));
    }

    #[test]
    fn second_device_rejected() {
        let iface = Interface::with_endpoints(1).unwrap();
        let _device = iface.register_device().unwrap();
        assert!(matches!(
            iface.register_device(),
            Err(LinkError::AlreadyRegistered(_))
        ));
    }

    #[test]
    fn read_rejects_small_buffer_without_writing() {
        let iface = Interface::with_endpoints(1).unwrap();
        let device = iface.register_device().unwrap();
        let link = iface.register_link(0).unwrap();

        link.submit_packet(
            Packet::new(MessageType::REQUEST, b"too long").unwrap(),
            SendMode::Async,
        )
        .unwrap();

        let mut small = [0xEEu8; 4];
        let err = device.read(0, &mut small, Timeout::NoWait).unwrap_err();
        assert!(err.is_buffer_too_small());
        assert_eq!(small, [0xEE; 4]);
        assert!(device.read(0, &mut small, Timeout::NoWait).unwrap().is_none());
    }

    #[test]
    fn poll_rejects_small_buffer() {
        let iface = Interface::with_endpoints(1).unwrap();
        let device = iface.register_device().unwrap();
        let link = iface.register_link(0).unwrap();

        device.request(0, b"abcdef", SendMode::Async).unwrap();

        let mut buf = [0u8; 5];
        let err = link.poll(&mut buf, Timeout::NoWait).unwrap_err();
        assert!(err.is_buffer_too_small());
        assert_eq!(buf, [0u8; 5]);

        // Only the payload has to fit, not the header.
        device.request(0, b"abcde", SendMode::Async).unwrap();
        assert_eq!(link.poll(&mut buf, Timeout::NoWait).unwrap(), 5);
        assert_eq!(&buf, b"abcde");
    }

    #[test]
    fn peek_reports_payload_length() {
        let iface = Interface::with_endpoints(1).unwrap();
        let device = iface.register_device().unwrap();
        let link = iface.register_link(0).unwrap();

        link.submit_packet(
            Packet::new(MessageType::RESPONSE, b"four").unwrap(),
            SendMode::Async,
        )
        .unwrap();

        assert_eq!(device.peek(0, Timeout::NoWait).unwrap(), Some(4));
        assert_eq!(iface.pending(0).unwrap(), (0, 1));
    }

    #[test]
    fn read_any_serves_ready_endpoint() {
        let iface = Interface::with_endpoints(3).unwrap();
        let device = iface.register_device().unwrap();
        let _l0 = iface.register_link(0).unwrap();
        let _l1 = iface.register_link(1).unwrap();

        let l2 = {
            let iface = iface.clone();
            thread::spawn(move || {
                let link = iface.register_link(2).unwrap();
                thread::sleep(Duration::from_millis(20));
                link.submit_packet(
                    Packet::new(MessageType::REQUEST, b"gps").unwrap(),
                    SendMode::Sync,
                )
                .unwrap()
            })
        };

        let mut buf = [0u8; MAX_PAYLOAD];
        let (endpoint, received) = device
            .read_any(&mut buf, Timeout::millis(2_000))
            .unwrap()
            .unwrap();

        assert_eq!(endpoint, 2);
        assert_eq!(&buf[..received.len], b"gps");
        assert_eq!(l2.join().unwrap(), SendStatus::Delivered);
    }

    #[test]
    fn read_any_round_robin() {
        let iface = Interface::with_endpoints(2).unwrap();
        let device = iface.register_device().unwrap();
        let l0 = iface.register_link(0).unwrap();
        let l1 = iface.register_link(1).unwrap();

        for _ in 0..2 {
            l0.submit_packet(Packet::new(MessageType::REQUEST, b"a").unwrap(), SendMode::Async)
                .unwrap();
            l1.submit_packet(Packet::new(MessageType::REQUEST, b"b").unwrap(), SendMode::Async)
                .unwrap();
        }

        let mut buf = [0u8; MAX_PAYLOAD];
        let order: Vec<u8> = (0..4)
            .map(|_| device.read_any(&mut buf, Timeout::NoWait).unwrap().unwrap().0)
            .collect();
        assert_eq!(order, vec![0, 1, 0, 1]);
    }

    #[test]
    fn read_any_times_out() {
        let iface = Interface::with_endpoints(2).unwrap();
        let device = iface.register_device().unwrap();
        let _l0 = iface.register_link(0).unwrap();

        let start = Instant::now();
        let mut buf = [0u8; MAX_PAYLOAD];
        assert!(device.read_any(&mut buf, Timeout::millis(10)).unwrap().is_none());
        assert!(start.elapsed() >= Duration::from_millis(10));
    }

    #[test]
    fn dropped_link_disconnects_device() {
        let iface = Interface::with_endpoints(1).unwrap();
        let device = iface.register_device().unwrap();
        let link = iface.register_link(0).unwrap();
        drop(link);

        assert!(matches!(
            device.request(0, b"x", SendMode::Sync),
            Err(LinkError::Disconnected { endpoint: 0, .. })
        ));
        let mut buf = [0u8; MAX_PAYLOAD];
        assert!(matches!(
            device.read_any(&mut buf, Timeout::Forever),
            Err(LinkError::Disconnected { .. })
        ));
    }

    #[test]
    fn dropped_device_ends_link_poll() {
        let iface = Interface::with_endpoints(1).unwrap();
        let device = iface.register_device().unwrap();
        let link = iface.register_link(0).unwrap();

        device.request(0, b"bye", SendMode::Async).unwrap();
        drop(device);

        let mut buf = [0u8; MAX_PACKET_SIZE];
        assert_eq!(link.poll(&mut buf, Timeout::Forever).unwrap(), 3);
        assert_eq!(&buf[..3], b"bye");
        assert!(matches!(
            link.poll(&mut buf, Timeout::Forever),
            Err(LinkError::Disconnected { .. })
        ));
    }
}
