use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use dlt_frame::{decode, encode, EncodingError, MessageType, MAX_PAYLOAD};
use dlt_link::{Interface, LinkError, SendMode, SendStatus, Timeout, MAX_PACKET_SIZE};

#[test]
fn two_endpoint_request_reaches_only_its_link() {
    let iface = Interface::with_endpoints(2).unwrap();

    let (ready_tx, ready_rx) = mpsc::channel();

    let link0 = {
        let iface = iface.clone();
        let ready = ready_tx.clone();
        thread::Builder::new()
            .name("link0".to_string())
            .spawn(move || {
                let link = iface.register_link(0).unwrap();
                ready.send(()).unwrap();
                let mut buf = [0u8; MAX_PACKET_SIZE];
                let n = link.poll(&mut buf, Timeout::millis(100)).unwrap();
                buf[..n].to_vec()
            })
            .unwrap()
    };
    let link1 = {
        let iface = iface.clone();
        thread::Builder::new()
            .name("link1".to_string())
            .spawn(move || {
                let link = iface.register_link(1).unwrap();
                ready_tx.send(()).unwrap();
                let mut buf = [0u8; MAX_PACKET_SIZE];
                link.poll(&mut buf, Timeout::millis(100)).unwrap()
            })
            .unwrap()
    };

    ready_rx.recv().unwrap();
    ready_rx.recv().unwrap();

    let device = iface.register_device().unwrap();
    let status = device
        .request(0, &[0xAA, 0xBB, 0xCC], SendMode::Sync)
        .unwrap();
    assert_eq!(status, SendStatus::Delivered);

    let payload = link0.join().unwrap();
    assert_eq!(payload.len(), 3);
    assert_eq!(&payload[0..3], &[0xAA, 0xBB, 0xCC]);

    assert_eq!(link1.join().unwrap(), 0);

    let names: Vec<_> = iface
        .registry()
        .snapshot()
        .into_iter()
        .map(|binding| binding.party.and_then(|party| party.name))
        .collect();
    assert_eq!(names[1].as_deref(), Some("link0"));
    assert_eq!(names[2].as_deref(), Some("link1"));
}

#[test]
fn every_payload_length_round_trips() {
    for len in 0..=MAX_PAYLOAD {
        let payload: Vec<u8> = (0..len as u8).collect();
        let packet = encode(MessageType::REQUEST, &payload).unwrap();
        let header = decode(packet.as_bytes()).unwrap();
        assert_eq!(header.message_type, MessageType::REQUEST);
        assert_eq!(header.payload_len, len);
        assert_eq!(packet.payload(), payload.as_slice());
    }
}

#[test]
fn oversize_request_leaves_channel_untouched() {
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
fn sync_request_returns_after_poll_takes_it() {
    let iface = Interface::with_endpoints(1).unwrap();
    let device = iface.register_device().unwrap();
    let link = iface.register_link(0).unwrap();

    let sender = thread::spawn(move || {
        let status = device.request(0, b"hello", SendMode::Sync).unwrap();
        (status, Instant::now())
    });

    thread::sleep(Duration::from_millis(50));
    assert!(!sender.is_finished());

    let mut buf = [0u8; MAX_PACKET_SIZE];
    let n = link.poll(&mut buf, Timeout::Forever).unwrap();
    let polled_at = Instant::now();
    assert_eq!(&buf[..n], b"hello");

    let (status, returned_at) = sender.join().unwrap();
    assert_eq!(status, SendStatus::Delivered);
    assert!(returned_at + Duration::from_millis(50) >= polled_at);
}

#[test]
fn small_receiver_buffer_is_left_untouched() {
    let iface = Interface::with_endpoints(1).unwrap();
    let device = iface.register_device().unwrap();
    let link = iface.register_link(0).unwrap();

    link.submit(
        encode(MessageType::RESPONSE, &[1, 2, 3, 4, 5]).unwrap().as_bytes(),
        SendMode::Async,
    )
    .unwrap();

    let mut buf = [0xEEu8; 4];
    let err = device.read(0, &mut buf, Timeout::NoWait).unwrap_err();
    assert!(err.is_buffer_too_small());
    assert_eq!(buf, [0xEE; 4]);

    // The offending packet is gone.
    assert_eq!(device.read(0, &mut buf, Timeout::NoWait).unwrap(), None);
}

#[test]
fn single_sender_order_is_preserved() {
    let iface = Interface::with_endpoints(1).unwrap();
    let device = iface.register_device().unwrap();
    let link = iface.register_link(0).unwrap();

    let sender = thread::spawn(move || {
        device.request(0, b"first", SendMode::Sync).unwrap();
        device.request(0, b"second", SendMode::Sync).unwrap();
    });

    let mut seen = Vec::new();
    let mut buf = [0u8; MAX_PACKET_SIZE];
    for _ in 0..2 {
        let n = link.poll(&mut buf, Timeout::Forever).unwrap();
        seen.push(buf[..n].to_vec());
    }
    sender.join().unwrap();

    assert_eq!(seen, vec![b"first".to_vec(), b"second".to_vec()]);
}

#[test]
fn async_request_does_not_wait_for_a_link() {
    let iface = Interface::with_endpoints(1).unwrap();
    let device = iface.register_device().unwrap();

    let started = Instant::now();
    let status = device.request(0, b"fire", SendMode::Async).unwrap();
    assert_eq!(status, SendStatus::Queued);
    assert!(started.elapsed() < Duration::from_millis(50));

    let link = iface.register_link(0).unwrap();
    let packet = link.poll_packet(Timeout::NoWait).unwrap().unwrap();
    assert_eq!(packet.payload(), b"fire");
}

#[test]
fn idle_poll_times_out_promptly() {
    let iface = Interface::with_endpoints(1).unwrap();
    let _device = iface.register_device().unwrap();
    let link = iface.register_link(0).unwrap();

    let mut buf = [0u8; MAX_PACKET_SIZE];
    let started = Instant::now();
    assert_eq!(link.poll(&mut buf, Timeout::millis(5)).unwrap(), 0);
    let waited = started.elapsed();
    assert!(waited >= Duration::from_millis(5));
    assert!(waited < Duration::from_millis(500));
}

#[test]
fn endpoints_are_isolated_both_ways() {
    let iface = Interface::with_endpoints(3).unwrap();
    let device = iface.register_device().unwrap();
    let link0 = iface.register_link(0).unwrap();
    let link2 = iface.register_link(2).unwrap();

    device.request(2, b"for two", SendMode::Async).unwrap();
    link0
        .submit(encode(MessageType::RESPONSE, b"from zero").unwrap().as_bytes(), SendMode::Async)
        .unwrap();

    assert!(link0.poll_packet(Timeout::NoWait).unwrap().is_none());
    assert_eq!(
        link2.poll_packet(Timeout::NoWait).unwrap().unwrap().payload(),
        b"for two"
    );

    let mut buf = [0u8; MAX_PAYLOAD];
    assert!(device.read(1, &mut buf, Timeout::NoWait).unwrap().is_none());
    assert!(device.read(2, &mut buf, Timeout::NoWait).unwrap().is_none());
    let received = device.read(0, &mut buf, Timeout::NoWait).unwrap().unwrap();
    assert_eq!(&buf[..received.len], b"from zero");
}

#[test]
fn request_response_round_trip_through_echo_link() {
    let iface = Interface::with_endpoints(1).unwrap();
    let device = iface.register_device().unwrap();

    let echo = {
        let iface = iface.clone();
        thread::spawn(move || {
            let link = iface.register_link(0).unwrap();
            let packet = link.poll_packet(Timeout::Forever).unwrap().unwrap();
            let reply = encode(MessageType::RESPONSE, packet.payload()).unwrap();
            link.submit_packet(reply, SendMode::Sync).unwrap()
        })
    };

    device.request(0, b"ping", SendMode::Async).unwrap();

    let mut buf = [0u8; MAX_PAYLOAD];
    let (endpoint, received) = device
        .read_any(&mut buf, Timeout::millis(1000))
        .unwrap()
        .unwrap();
    assert_eq!(endpoint, 0);
    assert_eq!(received.message_type, MessageType::RESPONSE);
    assert_eq!(&buf[..received.len], b"ping");
    assert_eq!(echo.join().unwrap(), SendStatus::Delivered);
}
