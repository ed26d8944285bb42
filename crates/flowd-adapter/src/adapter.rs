use std::process::ExitStatus;

use flowd_transport::BoundAddr;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, warn};

use crate::barrier::wait_ready;
use crate::config::AdapterConfig;
use crate::demux::run_input;
use crate::error::{AdapterError, Result};
use crate::establish::{spawn_accept, spawn_dial, Established, Readiness};
use crate::inject::inject_initial_packets;
use crate::mux::OutputMux;
use crate::process::{Subprocess, SubprocessInput};
use crate::raw::{run_raw_input, RawOutputs};
use crate::registry::{EndpointRegistry, InitialPacket};

/// An input endpoint's concrete listening address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundInput {
    pub port: String,
    pub address: BoundAddr,
}

/// How a run ended when the adapter itself did not fail.
#[derive(Debug, Clone, Copy)]
pub struct RunOutcome {
    pub status: ExitStatus,
}

impl RunOutcome {
    /// Subprocess exit code; `None` when it was killed by a signal.
    pub fn code(&self) -> Option<i32> {
        self.status.code()
    }
}

/// Bridges one subprocess's stdio to its network endpoints.
///
/// ```no_run
/// # async fn demo() -> flowd_adapter::Result<()> {
/// use flowd_adapter::{Adapter, AdapterConfig};
///
/// let config = AdapterConfig::new(["cat"])
///     .with_input("tcp://127.0.0.1:0#IN")
///     .with_output("tcp://127.0.0.1:7001#IN>IN");
/// let wiring = Adapter::new(config).start().await?;
/// for input in wiring.bound_inputs() {
///     println!("{} {}", input.port, input.address);
/// }
/// let outcome = wiring.run().await?;
/// println!("component exited with {:?}", outcome.code());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Adapter {
    config: AdapterConfig,
}

impl Adapter {
    pub fn new(config: AdapterConfig) -> Self {
        Self { config }
    }

    /// Parse the endpoints, bind every input and start establishing.
    ///
    /// Configuration and bind errors surface here, before any subprocess
    /// exists.
    pub async fn start(self) -> Result<Wiring> {
        if self.config.command.is_empty() {
            return Err(AdapterError::Config(
                "no subprocess command given".to_string(),
            ));
        }
        let registry = EndpointRegistry::from_config(&self.config)?;
        let (inputs, outputs, iips) = registry.into_parts();

        let mut bound = Vec::with_capacity(inputs.len());
        let mut pending = Vec::with_capacity(inputs.len() + outputs.len());
        for (port, mut endpoint) in inputs {
            let address = endpoint.listen().await?.clone();
            bound.push(BoundInput { port, address });
            pending.push(spawn_accept(endpoint));
        }
        for endpoint in outputs.into_values() {
            pending.push(spawn_dial(
                endpoint,
                self.config.retry,
                self.config.dial_timeout,
            ));
        }

        Ok(Wiring {
            config: self.config,
            bound,
            pending,
            iips,
        })
    }

    /// [`start`](Self::start) followed by [`Wiring::run`].
    pub async fn run(self) -> Result<RunOutcome> {
        self.start().await?.run().await
    }
}

/// Endpoints bound and establishing; the subprocess is not running yet.
#[derive(Debug)]
pub struct Wiring {
    config: AdapterConfig,
    bound: Vec<BoundInput>,
    pending: Vec<Readiness>,
    iips: Vec<InitialPacket>,
}

impl Wiring {
    /// Bound addresses of the input endpoints, ordered by port name.
    pub fn bound_inputs(&self) -> &[BoundInput] {
        &self.bound
    }

    /// Wait for every endpoint, run the subprocess and forward traffic
    /// until it exits.
    pub async fn run(self) -> Result<RunOutcome> {
        let Wiring {
            config,
            pending,
            iips,
            ..
        } = self;

        let mut inputs = Vec::new();
        let mut outputs = Vec::new();
        for endpoint in wait_ready(pending, config.ready_timeout).await? {
            match endpoint {
                Established::Input(input) => inputs.push(input),
                Established::Output(output) => outputs.push(output),
            }
        }

        let (mut child, stdin, stdout) = Subprocess::spawn(&config.command)?;
        let input = SubprocessInput::new(stdin);

        // Stdout must be read before any IIP is written.
        let mut output_task = if config.out_framing {
            tokio::spawn(OutputMux::from_endpoints(outputs)?.run(stdout))
        } else {
            tokio::spawn(RawOutputs::from_endpoints(outputs).run(stdout))
        };
        if let Err(err) = inject_initial_packets(&input, &iips).await {
            output_task.abort();
            return Err(err);
        }

        // Aborted when dropped, on every return path.
        let mut input_tasks = JoinSet::new();
        for endpoint in inputs {
            let input = input.clone();
            if config.in_framing {
                input_tasks.spawn(run_input(endpoint, input));
            } else {
                input_tasks.spawn(run_raw_input(endpoint, input));
            }
        }
        // The subprocess sees EOF on stdin once the last input task ends.
        drop(input);

        info!(
            inputs = input_tasks.len(),
            iips = iips.len(),
            "forwarding started"
        );

        let status = tokio::select! {
            status = child.wait() => {
                let status = status?;
                match tokio::time::timeout(config.drain_grace, &mut output_task).await {
                    Ok(joined) => output_result(joined)?,
                    Err(_) => {
                        warn!(
                            grace = ?config.drain_grace,
                            "output not drained in time, dropping it"
                        );
                        output_task.abort();
                    }
                }
                status
            }
            joined = &mut output_task => {
                if let Err(err) = output_result(joined) {
                    child.kill().await;
                    return Err(err);
                }
                debug!("subprocess output ended, waiting for exit");
                child.wait().await?
            }
        };

        input_tasks.abort_all();
        info!(%status, "adapter stopped");
        Ok(RunOutcome { status })
    }
}

fn output_result(joined: std::result::Result<Result<()>, JoinError>) -> Result<()> {
    match joined {
        Ok(result) => result,
        Err(err) => Err(AdapterError::Task(format!("output task: {err}"))),
    }
}
