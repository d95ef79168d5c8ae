use std::time::Duration;

use clap::{Args, Subcommand};
use dlt_frame::MessageType;

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod decode;
pub mod encode;
pub mod loopback;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Frame a payload into a packet.
    Encode(EncodeArgs),
    /// Parse a packet given as hex.
    Decode(DecodeArgs),
    /// Run an in-process Device against echoing Links.
    Loopback(LoopbackArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Encode(args) => encode::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Loopback(args) => loopback::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Message type: request, response, or a tag byte (e.g. 7, 0x7f).
    #[arg(long = "type", short = 't', default_value = "request")]
    pub message_type: String,
    /// Payload as text.
    #[arg(long, conflicts_with = "hex", required_unless_present = "hex")]
    pub data: Option<String>,
    /// Payload as hex bytes.
    #[arg(long, conflicts_with = "data")]
    pub hex: Option<String>,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Packet bytes as hex, header included.
    pub packet: String,
    /// Receive buffer size in bytes; smaller than the payload is an error.
    #[arg(long, default_value_t = dlt_frame::MAX_PAYLOAD)]
    pub capacity: usize,
}

#[derive(Args, Debug)]
pub struct LoopbackArgs {
    /// Number of endpoints, each served by an echo Link.
    #[arg(long, default_value_t = 2)]
    pub endpoints: usize,
    /// Round trips to run; 0 runs until interrupted.
    #[arg(long, default_value_t = 1)]
    pub count: u64,
    /// Request payload.
    #[arg(long, default_value = "ping")]
    pub data: String,
    /// Queue requests instead of waiting for the Link to take them.
    #[arg(long = "async")]
    pub async_send: bool,
    /// Asynchronous packets allowed to wait per direction.
    #[arg(long, default_value_t = dlt_link::DEFAULT_ASYNC_BACKLOG)]
    pub backlog: usize,
    /// Maximum wait for each response (e.g. 1s, 250ms).
    #[arg(long, default_value = "1s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

/// Parse hex bytes, ignoring whitespace, `:` separators and a leading `0x`.
pub(crate) fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let trimmed = input.trim();
    let trimmed = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let digits: Vec<u8> = trimmed
        .bytes()
        .filter(|b| !b.is_ascii_whitespace() && *b != b':')
        .collect();
    if digits.len() % 2 != 0 {
        return Err(CliError::new(USAGE, format!("odd number of hex digits: {input}")));
    }

    digits
        .chunks(2)
        .map(|pair| {
            std::str::from_utf8(pair)
                .ok()
                .and_then(|s| u8::from_str_radix(s, 16).ok())
                .ok_or_else(|| CliError::new(USAGE, format!("invalid hex: {input}")))
        })
        .collect()
}

pub(crate) fn parse_message_type(input: &str) -> CliResult<MessageType> {
    let input = input.trim();
    match input.to_ascii_lowercase().as_str() {
        "request" | "req" => return Ok(MessageType::REQUEST),
        "response" | "resp" => return Ok(MessageType::RESPONSE),
        _ => {}
    }

    let parsed = match input.strip_prefix("0x").or_else(|| input.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => input.parse::<u8>(),
    };
    parsed
        .map(MessageType::from)
        .map_err(|_| CliError::new(USAGE, format!("invalid message type: {input}")))
}
