use std::io::{IsTerminal, Write};
use std::time::Duration;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use dlt_frame::{to_hex, MessageType, Packet, PacketHeader};
use dlt_link::{Binding, SendStatus};
use serde::Serialize;

const PACKET_SCHEMA: &str = "https://schemas.phaethon-telemetry.dev/dlt/cli/v1/packet.schema.json";
const ROUND_TRIP_SCHEMA: &str =
    "https://schemas.phaethon-telemetry.dev/dlt/cli/v1/round-trip.schema.json";

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct PacketOutput<'a> {
    schema_id: &'a str,
    message_type: u8,
    message_type_name: &'a str,
    payload_size: usize,
    wire_size: usize,
    payload: String,
    payload_hex: String,
    packet_hex: String,
}

/// Print a packet given its header and payload.
///
/// `packet` is the full wire form when known; `raw` output writes it as is,
/// or just the payload when only the payload is available.
pub fn print_packet(header: &PacketHeader, payload: &[u8], packet: Option<&Packet>, format: OutputFormat) {
    let packet_hex = packet.map(|p| to_hex(p.as_bytes())).unwrap_or_default();
    match format {
        OutputFormat::Json => {
            let out = PacketOutput {
                schema_id: PACKET_SCHEMA,
                message_type: header.message_type.as_u8(),
                message_type_name: header.message_type.name(),
                payload_size: payload.len(),
                wire_size: header.wire_size(),
                payload: payload_preview(payload),
                payload_hex: to_hex(payload),
                packet_hex,
            };
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["TYPE", "SIZE", "WIRE", "PAYLOAD", "PACKET"])
                .add_row(vec![
                    header.message_type.to_string(),
                    payload.len().to_string(),
                    header.wire_size().to_string(),
                    payload_preview(payload),
                    packet_hex,
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "type={} size={} wire={} payload={}",
                header.message_type,
                payload.len(),
                header.wire_size(),
                payload_preview(payload)
            );
            if !packet_hex.is_empty() {
                println!("packet={packet_hex}");
            }
        }
        OutputFormat::Raw => match packet {
            Some(packet) => print_raw(packet.as_bytes()),
            None => print_raw(payload),
        },
    }
}

#[derive(Serialize)]
struct RoundTripOutput<'a> {
    schema_id: &'a str,
    seq: u64,
    endpoint: u8,
    mode: &'a str,
    request_status: &'a str,
    response_type: u8,
    response_type_name: &'a str,
    payload_size: usize,
    payload: String,
    elapsed_us: u128,
}

/// One request/response exchange observed by the loopback Device.
pub struct RoundTrip<'a> {
    pub seq: u64,
    pub endpoint: u8,
    pub mode: &'a str,
    pub request_status: SendStatus,
    pub response_type: MessageType,
    pub payload: &'a [u8],
    pub elapsed: Duration,
}

pub fn print_round_trip(trip: &RoundTrip<'_>, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = RoundTripOutput {
                schema_id: ROUND_TRIP_SCHEMA,
                seq: trip.seq,
                endpoint: trip.endpoint,
                mode: trip.mode,
                request_status: status_name(trip.request_status),
                response_type: trip.response_type.as_u8(),
                response_type_name: trip.response_type.name(),
                payload_size: trip.payload.len(),
                payload: payload_preview(trip.payload),
                elapsed_us: trip.elapsed.as_micros(),
            };
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["SEQ", "ENDPOINT", "MODE", "STATUS", "RESPONSE", "PAYLOAD", "ELAPSED"])
                .add_row(vec![
                    trip.seq.to_string(),
                    trip.endpoint.to_string(),
                    trip.mode.to_string(),
                    status_name(trip.request_status).to_string(),
                    trip.response_type.to_string(),
                    payload_preview(trip.payload),
                    format!("{}us", trip.elapsed.as_micros()),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "seq={} endpoint={} mode={} status={} response={} payload={} elapsed={}us",
                trip.seq,
                trip.endpoint,
                trip.mode,
                status_name(trip.request_status),
                trip.response_type,
                payload_preview(trip.payload),
                trip.elapsed.as_micros()
            );
        }
        OutputFormat::Raw => print_raw(trip.payload),
    }
}

/// Registration table printed when a loopback run ends.
pub fn print_bindings(bindings: &[Binding], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["ROLE", "THREAD"]);
            for binding in bindings {
                table.add_row(vec![
                    binding.role.to_string(),
                    binding
                        .party
                        .as_ref()
                        .map(ToString::to_string)
                        .unwrap_or_else(|| "-".to_string()),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for binding in bindings {
                match &binding.party {
                    Some(party) => println!("{} bound to {party}", binding.role),
                    None => println!("{} unbound", binding.role),
                }
            }
        }
        // Machine-readable output stays one record per round trip.
        OutputFormat::Json | OutputFormat::Raw => {}
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

pub fn status_name(status: SendStatus) -> &'static str {
    match status {
        SendStatus::Delivered => "delivered",
        SendStatus::Dropped => "dropped",
        SendStatus::Queued => "queued",
    }
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) if !text.chars().any(char::is_control) => text.to_string(),
        _ => format!("<binary {} bytes>", payload.len()),
    }
}
