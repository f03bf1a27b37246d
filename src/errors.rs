//! Error taxonomy and classification.
//!
//! # Responsibilities
//! - Define the classified error kinds the failover loop dispatches on
//! - Map raw connector/operation failures into those kinds
//! - Expose the retry-ability predicates used by the execution loop
//!
//! # Design Decisions
//! - Classification is a pure, idempotent function over a tagged enum;
//!   the failover loop pattern-matches, it never downcasts
//! - Host-health failures (Transport, TimedOut, PoolExhausted) are kept
//!   distinct from caller errors (InvalidRequest) and cluster-side
//!   errors (Unavailable) because only the former drive host remediation

use thiserror::Error;

/// A raw failure surfaced by the connector or by an operation body,
/// before classification.
///
/// The transport layer underneath the raw-connection abstraction is
/// opaque to this crate; these variants are the failure modes it is
/// expected to report.
#[derive(Debug)]
pub enum RawError {
    /// I/O-level failure on the connection or while dialing.
    Io(std::io::Error),
    /// Client-side deadline elapsed while waiting on the server.
    Timeout(String),
    /// Server-side operation timeout.
    ServerTimeout(String),
    /// The cluster cannot satisfy the request right now.
    Unavailable(String),
    /// The server rejected the request as malformed, with its reason.
    InvalidRequest { why: String },
    /// Protocol-level violation between client and server.
    Protocol(String),
    /// An error that has already been classified; passes through
    /// unchanged.
    Classified(ClassifiedError),
    /// Anything else the transport reported.
    Other(String),
}

/// Classified error kinds, inspected by the failover loop and returned
/// to callers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClassifiedError {
    /// Connection-level failure; candidate for mark-down and failover.
    #[error("transport error: {0}")]
    Transport(String),

    /// The operation exceeded a client or server deadline.
    #[error("operation timed out: {0}")]
    TimedOut(String),

    /// Cluster-side inability to serve, including nodes mid-bootstrap.
    #[error("host unavailable: {0}")]
    Unavailable(String),

    /// Caller error; never retried, never marks a host down.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The pool could not satisfy a borrow within its wait policy.
    #[error("connection pool exhausted: {0}")]
    PoolExhausted(String),

    /// Usage error: the pool was shut down, or shut down twice.
    #[error("pool is not active: {0}")]
    PoolInactive(String),

    /// Unexpected or unclassifiable failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ClassifiedError {
    /// True for errors the failover loop must surface immediately
    /// rather than retry on another host.
    pub fn is_unrecoverable(&self) -> bool {
        matches!(
            self,
            ClassifiedError::Unavailable(_)
                | ClassifiedError::InvalidRequest(_)
                | ClassifiedError::Internal(_)
        )
    }

    /// True when the operation exceeded a deadline.
    pub fn has_timed_out(&self) -> bool {
        matches!(self, ClassifiedError::TimedOut(_))
    }

    /// True for pool capacity and pool lifecycle failures.
    pub fn is_pool_exhausted(&self) -> bool {
        matches!(
            self,
            ClassifiedError::PoolExhausted(_) | ClassifiedError::PoolInactive(_)
        )
    }

    /// True for connection-level failures.
    pub fn is_transport_error(&self) -> bool {
        matches!(self, ClassifiedError::Transport(_))
    }
}

/// Map a raw failure to its classified kind.
///
/// An `InvalidRequest` whose server-supplied reason mentions a
/// bootstrapping node is normalized to `Unavailable`: the request was
/// fine, the node just cannot serve it yet.
pub fn classify(raw: RawError) -> ClassifiedError {
    match raw {
        RawError::Classified(e) => e,
        RawError::Io(e) => ClassifiedError::Transport(e.to_string()),
        RawError::Timeout(msg) | RawError::ServerTimeout(msg) => ClassifiedError::TimedOut(msg),
        RawError::Unavailable(msg) => ClassifiedError::Unavailable(msg),
        RawError::InvalidRequest { why } => {
            if why.contains("bootstrap") {
                ClassifiedError::Unavailable(why)
            } else {
                ClassifiedError::InvalidRequest(why)
            }
        }
        RawError::Protocol(msg) => ClassifiedError::InvalidRequest(msg),
        RawError::Other(msg) => ClassifiedError::Internal(msg),
    }
}

impl From<RawError> for ClassifiedError {
    fn from(raw: RawError) -> Self {
        classify(raw)
    }
}
