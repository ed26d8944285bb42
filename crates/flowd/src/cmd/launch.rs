use flowd_adapter::{Adapter, AdapterConfig, RetryPolicy};
use tracing::{info, warn};

use crate::cmd::LaunchArgs;
use crate::exit::{adapter_error, io_error, CliResult, INTERRUPTED, SUCCESS};
use crate::output::{announce_bound, OutputFormat};

pub fn run(args: LaunchArgs, format: OutputFormat) -> CliResult<i32> {
    let config = adapter_config(args);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| io_error("runtime setup failed", err))?;

    runtime.block_on(async move {
        let wiring = Adapter::new(config)
            .start()
            .await
            .map_err(|err| adapter_error("startup failed", err))?;
        announce_bound(wiring.bound_inputs(), format);

        tokio::select! {
            outcome = wiring.run() => {
                let outcome = outcome.map_err(|err| adapter_error("adapter failed", err))?;
                match outcome.code() {
                    Some(code) => info!(code, "component exited"),
                    None => warn!(status = %outcome.status, "component terminated by signal"),
                }
                Ok(SUCCESS)
            }
            signal = tokio::signal::ctrl_c() => {
                signal.map_err(|err| io_error("signal handler setup failed", err))?;
                info!("interrupted, stopping component");
                Ok(INTERRUPTED)
            }
        }
    })
}

fn adapter_config(args: LaunchArgs) -> AdapterConfig {
    AdapterConfig {
        inputs: args.inputs,
        outputs: args.outputs,
        iips: args.iips,
        in_framing: args.in_framing,
        out_framing: args.out_framing,
        retry: RetryPolicy {
            max_attempts: args.dial_attempts,
            delay: args.dial_delay,
            warn_after: args.dial_warn_after,
        },
        dial_timeout: args.dial_timeout,
        ready_timeout: args.ready_timeout,
        drain_grace: args.drain_grace,
        command: args.command,
    }
}
