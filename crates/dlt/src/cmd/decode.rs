use dlt_frame::{decode_into, log_packet, Packet};

use crate::cmd::{parse_hex, DecodeArgs};
use crate::exit::{encoding_error, CliResult, SUCCESS};
use crate::output::{print_packet, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let bytes = parse_hex(&args.packet)?;
    let packet = Packet::from_bytes(&bytes).map_err(|err| encoding_error("decode failed", err))?;
    log_packet("decode", &packet);

    let mut buf = vec![0u8; args.capacity];
    let header = decode_into(packet.as_bytes(), &mut buf)
        .map_err(|err| encoding_error("decode failed", err))?;

    print_packet(&header, &buf[..header.payload_len], Some(&packet), format);
    Ok(SUCCESS)
}
