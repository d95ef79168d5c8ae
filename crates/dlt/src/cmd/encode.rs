use dlt_frame::{encode, log_packet};

use crate::cmd::{parse_hex, parse_message_type, EncodeArgs};
use crate::exit::{encoding_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_packet, OutputFormat};

pub fn run(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    let message_type = parse_message_type(&args.message_type)?;
    let payload = match (args.data, args.hex) {
        (Some(data), None) => data.into_bytes(),
        (None, Some(hex)) => parse_hex(&hex)?,
        _ => return Err(CliError::new(USAGE, "one of --data or --hex is required")),
    };

    let packet = encode(message_type, &payload).map_err(|err| encoding_error("encode failed", err))?;
    log_packet("encode", &packet);

    print_packet(&packet.header(), packet.payload(), Some(&packet), format);
    Ok(SUCCESS)
}
