use std::time::Duration;

use flowd_transport::DEFAULT_DIAL_TIMEOUT;

/// Default time the output side gets to drain after the subprocess exits.
pub const DEFAULT_DRAIN_GRACE: Duration = Duration::from_secs(2);

/// How output endpoints retry a failed dial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total dial attempts before giving up. Default: 10.
    pub max_attempts: u32,
    /// Fixed pause between attempts. Default: 1 second.
    pub delay: Duration,
    /// Failures up to this count are logged at debug, later ones at warn. Default: 5.
    pub warn_after: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            delay: Duration::from_secs(1),
            warn_after: 5,
        }
    }
}

/// Everything the adapter needs to know, read once at startup.
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    /// Input locators, `scheme://addr#local`.
    pub inputs: Vec<String>,
    /// Output locators, `scheme://addr#local>remote`.
    pub outputs: Vec<String>,
    /// Initial information packets, `port:payload`, in delivery order.
    pub iips: Vec<String>,
    /// Decode frames on input connections. Default: true.
    pub in_framing: bool,
    /// Decode frames on subprocess stdout. Default: true.
    pub out_framing: bool,
    pub retry: RetryPolicy,
    /// Bound on a single dial attempt. Default: 10 seconds.
    pub dial_timeout: Duration,
    /// Give up when endpoints are not all connected in time. Default: wait forever.
    pub ready_timeout: Option<Duration>,
    /// Default: 2 seconds.
    pub drain_grace: Duration,
    /// Program followed by its arguments.
    pub command: Vec<String>,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            inputs: Vec::new(),
            outputs: Vec::new(),
            iips: Vec::new(),
            in_framing: true,
            out_framing: true,
            retry: RetryPolicy::default(),
            dial_timeout: DEFAULT_DIAL_TIMEOUT,
            ready_timeout: None,
            drain_grace: DEFAULT_DRAIN_GRACE,
            command: Vec::new(),
        }
    }
}

impl AdapterConfig {
    /// Configuration running `command` with no endpoints yet.
    pub fn new<I, S>(command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            command: command.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_input(mut self, locator: impl Into<String>) -> Self {
        self.inputs.push(locator.into());
        self
    }

    pub fn with_output(mut self, locator: impl Into<String>) -> Self {
        self.outputs.push(locator.into());
        self
    }

    pub fn with_iip(mut self, declaration: impl Into<String>) -> Self {
        self.iips.push(declaration.into());
        self
    }
}
