//! Operation descriptors.
//!
//! # Responsibilities
//! - Package one unit of caller work: the async body run against a
//!   borrowed connection plus its routing data (keyspace, consistency,
//!   credentials) and per-call failover policy
//! - Carry the result back with the host that served it and how long
//!   execution took
//!
//! # Design Decisions
//! - Consistency level is plain data consumed by the transport layer;
//!   no policy logic lives here

use std::time::Duration;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::connection::host::{Credentials, Host};
use crate::errors::RawError;
use crate::manager::failover::FailoverPolicy;

/// Read/write classification, used for metrics labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationType {
    Read,
    Write,
    Meta,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Read => "read",
            OperationType::Write => "write",
            OperationType::Meta => "meta",
        }
    }
}

/// Consistency level requested for an operation. Data only; the
/// transport layer interprets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsistencyLevel {
    Any,
    #[default]
    One,
    Quorum,
    LocalQuorum,
    EachQuorum,
    All,
}

/// The body signature: borrows the connection for the duration of one
/// attempt.
pub type OperationBody<T, Conn> =
    Box<dyn for<'c> FnMut(&'c mut Conn) -> BoxFuture<'c, Result<T, RawError>> + Send>;

/// One unit of caller work, created per call and discarded after
/// execution.
pub struct Operation<T, Conn> {
    pub op_type: OperationType,
    pub keyspace: Option<String>,
    pub consistency: ConsistencyLevel,
    pub credentials: Option<Credentials>,
    pub failover: FailoverPolicy,
    body: OperationBody<T, Conn>,
}

impl<T, Conn> Operation<T, Conn> {
    pub fn new<F>(op_type: OperationType, body: F) -> Self
    where
        F: for<'c> FnMut(&'c mut Conn) -> BoxFuture<'c, Result<T, RawError>> + Send + 'static,
    {
        Self {
            op_type,
            keyspace: None,
            consistency: ConsistencyLevel::default(),
            credentials: None,
            failover: FailoverPolicy::default(),
            body: Box::new(body),
        }
    }

    pub fn read<F>(body: F) -> Self
    where
        F: for<'c> FnMut(&'c mut Conn) -> BoxFuture<'c, Result<T, RawError>> + Send + 'static,
    {
        Self::new(OperationType::Read, body)
    }

    pub fn write<F>(body: F) -> Self
    where
        F: for<'c> FnMut(&'c mut Conn) -> BoxFuture<'c, Result<T, RawError>> + Send + 'static,
    {
        Self::new(OperationType::Write, body)
    }

    pub fn with_keyspace(mut self, keyspace: impl Into<String>) -> Self {
        self.keyspace = Some(keyspace.into());
        self
    }

    pub fn with_consistency(mut self, consistency: ConsistencyLevel) -> Self {
        self.consistency = consistency;
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_failover(mut self, failover: FailoverPolicy) -> Self {
        self.failover = failover;
        self
    }

    /// Run one attempt against a borrowed connection.
    pub(crate) async fn run(&mut self, conn: &mut Conn) -> Result<T, RawError> {
        (self.body)(conn).await
    }
}

/// A successful operation's value plus where and how fast it ran.
#[derive(Debug)]
pub struct ExecutionResult<T> {
    pub value: T,
    pub exec_time: Duration,
    pub host: Host,
}
