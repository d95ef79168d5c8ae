use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("dlt {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: dlt");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!("target: {}", option_env!("DLT_BUILD_TARGET").unwrap_or("unknown"));
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "rustc: {}",
        option_env!("RUSTC_VERSION").unwrap_or("unknown")
    );
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!(
        "limits: max_endpoints={}, max_payload={}, max_packet={}",
        dlt_link::MAX_ENDPOINTS,
        dlt_frame::MAX_PAYLOAD,
        dlt_frame::MAX_PACKET_SIZE
    );

    Ok(SUCCESS)
}
