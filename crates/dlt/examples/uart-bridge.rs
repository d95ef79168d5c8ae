//! Bridge an endpoint onto a byte stream, standing in for a UART.
//!
//! The far end of the socket pair plays the remote board: it answers each
//! request with the payload upper-cased.
//!
//! Run with:
//!   cargo run --example uart-bridge

#[cfg(unix)]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    use std::os::unix::net::UnixStream;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;

    use dlt::frame::{MessageType, PacketReader, PacketWriter, MAX_PAYLOAD};
    use dlt::link::{Interface, SendMode, StreamLink, StreamLinkConfig, Timeout};

    let iface = Interface::with_endpoints(1)?;
    let (local, remote) = UnixStream::pair()?;
    let running = Arc::new(AtomicBool::new(true));

    let board = thread::spawn(move || -> dlt::frame::Result<()> {
        let mut reader = PacketReader::new(remote.try_clone()?);
        let mut writer = PacketWriter::new(remote);
        loop {
            let request = match reader.read_packet() {
                Ok(packet) => packet,
                Err(dlt::frame::EncodingError::ConnectionClosed) => return Ok(()),
                Err(err) => return Err(err),
            };
            writer.send(MessageType::RESPONSE, &request.payload().to_ascii_uppercase())?;
        }
    });

    let bridge = {
        let iface = iface.clone();
        let running = Arc::clone(&running);
        thread::Builder::new()
            .name("uart-link".to_string())
            .spawn(move || -> dlt::link::Result<()> {
                let link = iface.register_link(0)?;
                let mut stream_link = StreamLink::unix(link, local, StreamLinkConfig::default())?;
                stream_link.run(&running)
            })?
    };

    let device = iface.register_device()?;
    let mut buf = [0u8; MAX_PAYLOAD];
    for word in ["status", "reset", "ping"] {
        device.request(0, word.as_bytes(), SendMode::Async)?;
        if let Some(received) = device.read(0, &mut buf, Timeout::millis(1000))? {
            println!("{word} -> {}", String::from_utf8_lossy(&buf[..received.len]));
        }
    }

    running.store(false, Ordering::SeqCst);
    drop(device);
    if let Ok(Err(err)) = bridge.join() {
        eprintln!("bridge: {err}");
    }
    if let Ok(Err(err)) = board.join() {
        eprintln!("board: {err}");
    }
    Ok(())
}

#[cfg(not(unix))]
fn main() {
    eprintln!("uart-bridge needs Unix domain sockets");
}
