//! Hooks invoked around every terminal operation
//!
//! Interceptors are attached to a [`Connection`](crate::Connection) when it
//! is built and run synchronously, in registration order, before and after
//! each terminal call. They observe; they cannot alter the request.

use crate::error::Error;
use crate::query::QuerySpec;
use std::fmt;
use std::time::Duration;

/// Terminal operation being run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Fetch,
    FetchOne,
    FetchFirst,
    Count,
    Cursor,
    Insert,
    Update,
    Remove,
    Save,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Fetch => "fetch",
            Operation::FetchOne => "fetch_one",
            Operation::FetchFirst => "fetch_first",
            Operation::Count => "count",
            Operation::Cursor => "cursor",
            Operation::Insert => "insert",
            Operation::Update => "update",
            Operation::Remove => "remove",
            Operation::Save => "save",
        }
    }

    /// Whether the operation writes
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Operation::Insert | Operation::Update | Operation::Remove | Operation::Save
        )
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an interceptor sees of a terminal call
#[derive(Debug, Clone, Copy)]
pub struct QueryEvent<'a> {
    /// Engine name, e.g. `sqlite` or `mongodb`
    pub backend: &'static str,
    pub container: &'a str,
    pub operation: Operation,
    /// `None` for inserts
    pub spec: Option<&'a QuerySpec>,
}

/// Result summary handed to [`QueryInterceptor::after`]
#[derive(Debug)]
pub enum QueryOutcome<'a> {
    /// Rows returned by a read
    Rows(usize),
    /// Records touched by a write
    Affected(u64),
    /// A cached result was served without calling the backend
    Cached,
    Failed(&'a Error),
}

impl QueryOutcome<'_> {
    pub fn is_failure(&self) -> bool {
        matches!(self, QueryOutcome::Failed(_))
    }
}

impl fmt::Display for QueryOutcome<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryOutcome::Rows(n) => write!(f, "{} row(s)", n),
            QueryOutcome::Affected(n) => write!(f, "{} affected", n),
            QueryOutcome::Cached => f.write_str("cached"),
            QueryOutcome::Failed(e) => write!(f, "failed: {}", e),
        }
    }
}

/// Observer of terminal operations
pub trait QueryInterceptor: Send + Sync {
    fn name(&self) -> &'static str {
        "unnamed"
    }

    fn before(&self, _event: &QueryEvent<'_>) {}

    fn after(&self, _event: &QueryEvent<'_>, _outcome: &QueryOutcome<'_>, _elapsed: Duration) {}
}

/// Logs one line per terminal operation through the `log` facade
#[derive(Debug, Clone)]
pub struct LogInterceptor {
    level: log::Level,
}

impl LogInterceptor {
    pub fn new() -> Self {
        Self {
            level: log::Level::Debug,
        }
    }

    /// Log successful operations at `level`; failures always go to `warn`
    pub fn with_level(level: log::Level) -> Self {
        Self { level }
    }
}

impl Default for LogInterceptor {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryInterceptor for LogInterceptor {
    fn name(&self) -> &'static str {
        "log"
    }

    fn before(&self, event: &QueryEvent<'_>) {
        if log::log_enabled!(log::Level::Trace) {
            log::trace!(
                "→ {} {} on {}: {:?}",
                event.backend,
                event.operation,
                event.container,
                event.spec
            );
        }
    }

    fn after(&self, event: &QueryEvent<'_>, outcome: &QueryOutcome<'_>, elapsed: Duration) {
        if outcome.is_failure() {
            log::warn!(
                "← {} {} on {} {} in {:?}",
                event.backend,
                event.operation,
                event.container,
                outcome,
                elapsed
            );
        } else {
            log::log!(
                self.level,
                "← {} {} on {} {} in {:?}",
                event.backend,
                event.operation,
                event.container,
                outcome,
                elapsed
            );
        }
    }
}
