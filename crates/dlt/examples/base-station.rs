//! A Device serving two Links: a sensor that answers requests and a
//! telemetry link that only forwards whatever the Device sends it.
//!
//! Run with:
//!   cargo run --example base-station

use std::thread;
use std::time::Duration;

use dlt::frame::{encode, MessageType, MAX_PAYLOAD};
use dlt::link::{Interface, LinkError, SendMode, Timeout};

const SENSOR: u8 = 0;
const TELEMETRY: u8 = 1;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let iface = Interface::with_endpoints(2)?;

    let sensor = {
        let iface = iface.clone();
        thread::Builder::new()
            .name("sensor-link".to_string())
            .spawn(move || -> Result<(), LinkError> {
                let link = iface.register_link(SENSOR)?;
                let mut reading = 20u8;
                loop {
                    let Some(request) = link.poll_packet(Timeout::Forever)? else {
                        continue;
                    };
                    eprintln!("sensor: request {:?}", request.payload());
                    reading = reading.wrapping_add(1);
                    let reply = encode(MessageType::RESPONSE, &[reading])?;
                    link.submit_packet(reply, SendMode::Sync)?;
                }
            })?
    };

    let telemetry = {
        let iface = iface.clone();
        thread::Builder::new()
            .name("telemetry-link".to_string())
            .spawn(move || -> Result<(), LinkError> {
                let link = iface.register_link(TELEMETRY)?;
                while let Some(packet) = link.poll_packet(Timeout::Forever)? {
                    eprintln!("telemetry: uplink {:02x?}", packet.as_bytes());
                }
                Ok(())
            })?
    };

    let device = iface.register_device()?;
    let mut buf = [0u8; MAX_PAYLOAD];
    for round in 0..3u8 {
        device.request(SENSOR, b"temp?", SendMode::Sync)?;
        let Some(received) = device.read(SENSOR, &mut buf, Timeout::After(Duration::from_secs(1)))?
        else {
            eprintln!("device: sensor did not answer");
            continue;
        };
        let reading = &buf[..received.len];
        eprintln!("device: round {round} reading {reading:?}");
        device.respond(TELEMETRY, reading, SendMode::Async)?;
    }

    for binding in iface.registry().snapshot() {
        eprintln!("{binding:?}");
    }

    // Dropping the Device disconnects both Links.
    drop(device);
    for (name, handle) in [("sensor", sensor), ("telemetry", telemetry)] {
        match handle.join() {
            Ok(Ok(())) | Ok(Err(LinkError::Disconnected { .. })) => {}
            Ok(Err(err)) => eprintln!("{name}: {err}"),
            Err(_) => eprintln!("{name}: panicked"),
        }
    }
    Ok(())
}
