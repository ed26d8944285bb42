use clap::ValueEnum;
use flowd_adapter::BoundInput;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Serialize)]
struct BoundOutput<'a> {
    port: &'a str,
    transport: &'static str,
    address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tcp_port: Option<u16>,
}

/// One line for a bound input endpoint.
pub fn bound_line(input: &BoundInput, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format!("{} {}", input.port, input.address),
        OutputFormat::Json => {
            let out = BoundOutput {
                port: &input.port,
                transport: input.address.transport_name(),
                address: input.address.to_string(),
                tcp_port: input.address.port(),
            };
            serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
        }
    }
}

/// Announce every bound input on stdout so ephemeral ports are discoverable.
pub fn announce_bound(inputs: &[BoundInput], format: OutputFormat) {
    for input in inputs {
        println!("{}", bound_line(input, format));
    }
}
