use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("flowd {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: flowd");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "build_target: {}",
        option_env!("FLOWD_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("transports: tcp, tcp4, tcp6{}", if cfg!(unix) { ", unix" } else { "" });
    println!(
        "frame_limits: header={} body={}",
        flowd_frame::DEFAULT_MAX_HEADER,
        flowd_frame::DEFAULT_MAX_BODY
    );

    Ok(SUCCESS)
}
