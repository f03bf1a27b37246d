//! Raw connection abstraction.
//!
//! # Responsibilities
//! - Define the seam between this crate and the transport underneath it
//!
//! # Design Decisions
//! - The crate never sees a wire format; it only opens, health-checks
//!   and closes opaque connections
//! - `Connector` is the single fallible, side-effecting factory; the
//!   pool pays the dial cost on the borrowing caller's task

use async_trait::async_trait;

use crate::connection::host::Host;
use crate::errors::RawError;

/// An open connection to one host.
///
/// A connection is not safe for concurrent use by two callers; the pool
/// hands out exclusive ownership and takes it back on release.
pub trait RawConnection: Send + 'static {
    /// Whether the connection is still usable. A `false` here makes the
    /// pool close it and dial a replacement on release.
    fn is_healthy(&self) -> bool;

    /// Close the underlying transport. Must be idempotent.
    fn close(&mut self);
}

/// Opens raw connections to cluster hosts.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Conn: RawConnection;

    /// Dial a new connection. Errors surface as classifiable
    /// [`RawError`]s, typically `Io`.
    async fn open(&self, host: &Host) -> Result<Self::Conn, RawError>;
}

#[async_trait]
impl<C: Connector> Connector for std::sync::Arc<C> {
    type Conn = C::Conn;

    async fn open(&self, host: &Host) -> Result<Self::Conn, RawError> {
        (**self).open(host).await
    }
}
