use std::io::{Read, Write};

use flowd_frame::{FrameError, FrameReader, FrameWriter};
use tracing::{debug, info};

use crate::cmd::CopyArgs;
use crate::exit::{frame_error, CliError, CliResult, DATA_INVALID, SUCCESS};

/// Port of the initial packet that lists output ports.
const CONF_PORT: &str = "CONF";

pub fn run(args: CopyArgs) -> CliResult<i32> {
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let mut reader = FrameReader::new(stdin.lock());
    let mut writer = FrameWriter::new(stdout.lock());

    let ports = if args.ports.is_empty() {
        read_conf(&mut reader)?
    } else {
        args.ports
    };
    let copied = copy_frames(&mut reader, &mut writer, &ports)?;
    info!(frames = copied, "input closed");
    Ok(SUCCESS)
}

/// Read the `CONF` initial packet: a comma-separated list of output ports.
fn read_conf<R: Read>(reader: &mut FrameReader<R>) -> CliResult<Vec<String>> {
    let frame = match reader.read_frame() {
        Ok(frame) => frame,
        Err(FrameError::ConnectionClosed) => {
            return Err(CliError::new(
                DATA_INVALID,
                "input closed before the CONF initial packet",
            ))
        }
        Err(err) => return Err(frame_error("reading CONF initial packet", err)),
    };
    if !frame.is_iip() || frame.port != CONF_PORT {
        return Err(CliError::new(
            DATA_INVALID,
            format!(
                "expected an initial packet on port {CONF_PORT}, got {}.{} on port {}",
                frame.kind, frame.subtype, frame.port
            ),
        ));
    }

    let body = std::str::from_utf8(&frame.body)
        .map_err(|err| CliError::new(DATA_INVALID, format!("CONF is not UTF-8: {err}")))?;
    let ports: Vec<String> = body
        .split(',')
        .map(str::trim)
        .filter(|port| !port.is_empty())
        .map(str::to_string)
        .collect();
    if ports.is_empty() {
        return Err(CliError::new(DATA_INVALID, "CONF names no output ports"));
    }
    debug!(ports = %ports.join(","), "output ports configured");
    Ok(ports)
}

/// Re-emit every frame on each port until clean end of input.
fn copy_frames<R: Read, W: Write>(
    reader: &mut FrameReader<R>,
    writer: &mut FrameWriter<W>,
    ports: &[String],
) -> CliResult<usize> {
    let mut copied = 0usize;
    loop {
        let frame = match reader.read_frame() {
            Ok(frame) => frame,
            Err(FrameError::ConnectionClosed) => return Ok(copied),
            Err(err) => return Err(frame_error("reading frame", err)),
        };
        debug!(port = %frame.port, bytes = frame.body.len(), "frame received");
        for port in ports {
            let mut out = frame.clone();
            out.port.clone_from(port);
            writer
                .write_frame(&out)
                .map_err(|err| frame_error("writing frame", err))?;
        }
        copied += 1;
    }
}
