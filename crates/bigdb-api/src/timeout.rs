// Request timeouts
//
// `Timeout` is a concrete deadline; `TimeoutSpec` is what a caller passes
// per request and may defer to the client's configured default.

use std::time::Duration;

/// A concrete request deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Timeout {
    /// Wait until the server answers.
    #[default]
    Forever,
    /// Deadline for the whole request.
    After(Duration),
    /// Separate connect and read budgets.
    Split { connect: Duration, read: Duration },
}

impl Timeout {
    /// Deadline from fractional seconds.
    pub fn secs(secs: f64) -> Self {
        Self::After(Duration::from_secs_f64(secs))
    }

    /// Bound only the connection phase; reads may take as long as they need.
    pub fn connect_only(connect: Duration) -> Self {
        Self::Split {
            connect,
            read: Duration::MAX,
        }
    }

    /// The total budget handed to the HTTP layer; `None` waits forever.
    ///
    /// reqwest has no per-request connect timeout, so a split budget is
    /// enforced as the sum of both halves. A sum that does not fit in a
    /// `Duration` means no overall deadline.
    pub fn total(&self) -> Option<Duration> {
        match self {
            Self::Forever => None,
            Self::After(d) => Some(*d),
            Self::Split { connect, read } => connect.checked_add(*read),
        }
    }

    pub(crate) fn apply(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.total() {
            Some(d) => builder.timeout(d),
            None => builder,
        }
    }
}

impl From<Duration> for Timeout {
    fn from(value: Duration) -> Self {
        Self::After(value)
    }
}

/// Per-request timeout selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeoutSpec {
    /// Use whatever the client was configured with.
    #[default]
    ClientDefault,
    /// Override the client default for this request.
    Explicit(Timeout),
}

impl TimeoutSpec {
    /// Wait forever for this request, whatever the client default says.
    pub const FOREVER: Self = Self::Explicit(Timeout::Forever);

    /// Resolve against the client default.
    pub fn resolve(self, default: Timeout) -> Timeout {
        match self {
            Self::ClientDefault => default,
            Self::Explicit(timeout) => timeout,
        }
    }
}

impl From<Timeout> for TimeoutSpec {
    fn from(value: Timeout) -> Self {
        Self::Explicit(value)
    }
}

impl From<Duration> for TimeoutSpec {
    fn from(value: Duration) -> Self {
        Self::Explicit(Timeout::After(value))
    }
}

/// `None` means wait forever, not "use the default".
impl From<Option<Duration>> for TimeoutSpec {
    fn from(value: Option<Duration>) -> Self {
        Self::Explicit(value.map_or(Timeout::Forever, Timeout::After))
    }
}
