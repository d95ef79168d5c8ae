use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use dlt_frame::{encode, MessageType, MAX_PAYLOAD};
use dlt_link::{Interface, InterfaceConfig, LinkError, SendMode, Timeout};

use crate::cmd::{parse_duration, LoopbackArgs};
use crate::exit::{configuration_error, link_error, CliError, CliResult, INTERNAL, SUCCESS, TIMEOUT};
use crate::output::{print_bindings, print_round_trip, OutputFormat, RoundTrip};

const LINK_POLL_INTERVAL: Duration = Duration::from_millis(100);

pub fn run(args: LoopbackArgs, format: OutputFormat) -> CliResult<i32> {
    let response_timeout = parse_duration(&args.timeout)?;
    let mode = SendMode::from_async(args.async_send);

    let iface = Interface::init(InterfaceConfig {
        num_endpoints: args.endpoints,
        async_backlog: args.backlog,
    })
    .map_err(|err| configuration_error("init failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let device = iface
        .register_device()
        .map_err(|err| link_error("device registration failed", err))?;

    let mut links = Vec::with_capacity(iface.num_endpoints());
    for endpoint in 0..iface.num_endpoints() as u8 {
        links.push(spawn_echo_link(&iface, endpoint, running.clone())?);
    }

    let payload = args.data.as_bytes();
    let mut buf = [0u8; MAX_PAYLOAD];
    let mut seq = 0u64;
    let mut outcome = Ok(SUCCESS);

    while running.load(Ordering::SeqCst) && (args.count == 0 || seq < args.count) {
        let endpoint = (seq % iface.num_endpoints() as u64) as u8;
        let started = Instant::now();

        let status = match device.request(endpoint, payload, mode) {
            Ok(status) => status,
            Err(err) => {
                outcome = Err(link_error("request failed", err));
                break;
            }
        };
        let received = match device.read(endpoint, &mut buf, Timeout::from(response_timeout)) {
            Ok(Some(received)) => received,
            Ok(None) => {
                outcome = Err(CliError::new(
                    TIMEOUT,
                    format!("no response on endpoint {endpoint} within {response_timeout:?}"),
                ));
                break;
            }
            Err(err) => {
                outcome = Err(link_error("read failed", err));
                break;
            }
        };

        print_round_trip(
            &RoundTrip {
                seq,
                endpoint,
                mode: mode.as_str(),
                request_status: status,
                response_type: received.message_type,
                payload: &buf[..received.len],
                elapsed: started.elapsed(),
            },
            format,
        );
        seq += 1;
    }

    running.store(false, Ordering::SeqCst);
    let bindings = iface.registry().snapshot();
    drop(device);
    for handle in links {
        if handle.join().is_err() {
            tracing::error!("echo link thread panicked");
        }
    }

    print_bindings(&bindings, format);
    tracing::info!(round_trips = seq, "loopback finished");
    outcome
}

fn spawn_echo_link(
    iface: &Interface,
    endpoint: u8,
    running: Arc<AtomicBool>,
) -> CliResult<JoinHandle<()>> {
    let iface = iface.clone();
    thread::Builder::new()
        .name(format!("echo-link-{endpoint}"))
        .spawn(move || {
            if let Err(err) = echo(&iface, endpoint, &running) {
                tracing::error!(endpoint, error = %err, "echo link failed");
            }
        })
        .map_err(|err| CliError::new(INTERNAL, format!("spawn echo link failed: {err}")))
}

/// Answer every request with a response carrying the same payload.
fn echo(iface: &Interface, endpoint: u8, running: &AtomicBool) -> Result<(), LinkError> {
    let link = iface.register_link(endpoint)?;
    while running.load(Ordering::SeqCst) {
        let packet = match link.poll_packet(Timeout::After(LINK_POLL_INTERVAL)) {
            Ok(Some(packet)) => packet,
            Ok(None) => continue,
            Err(LinkError::Disconnected { .. }) => break,
            Err(err) => return Err(err),
        };
        let reply = encode(MessageType::RESPONSE, packet.payload())?;
        match link.submit_packet(reply, SendMode::Sync) {
            Ok(_) => {}
            Err(LinkError::Disconnected { .. }) => break,
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
