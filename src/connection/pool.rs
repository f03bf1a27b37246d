//! Bounded per-host connection pool.
//!
//! # Responsibilities
//! - Own every connection to one host, split into an available queue
//!   and a checked-out count
//! - Borrow with grow-then-wait semantics bounded by `max_active`
//! - Release with replacement of broken connections
//! - Controlled shutdown draining the available queue
//!
//! # Design Decisions
//! - Two-tier borrow: while under capacity a caller dials a fresh
//!   connection instead of waiting, so burst load grows the pool before
//!   anyone blocks
//! - The reservation counter may briefly overshoot `max_active` by the
//!   number of concurrent borrowers; the real active count never does
//! - Waiting is sliced into 100ms polls so a waiting borrower observes
//!   pool shutdown promptly instead of sleeping out its full timeout
//! - The queue mutex is `std::sync::Mutex`, never held across an await

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::connection::host::Host;
use crate::connection::raw::{Connector, RawConnection};
use crate::errors::{classify, ClassifiedError};

/// How long a waiter sleeps between polls of the available queue.
const POLL_SLICE: Duration = Duration::from_millis(100);

/// Fraction of `max_active` dialed eagerly at pool construction.
const PREWARM_DIVISOR: usize = 3;

/// A borrowed connection plus its checked-out timestamp.
///
/// The timestamp lets the latency-aware decorator compute per-operation
/// elapsed time on release without touching the connection itself.
pub struct Lease<T> {
    conn: T,
    checked_out: Instant,
}

impl<T> std::fmt::Debug for Lease<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lease")
            .field("checked_out", &self.checked_out)
            .finish_non_exhaustive()
    }
}

impl<T> Lease<T> {
    fn new(conn: T) -> Self {
        Self {
            conn,
            checked_out: Instant::now(),
        }
    }

    /// Time since this lease was handed out.
    pub fn elapsed(&self) -> Duration {
        self.checked_out.elapsed()
    }

    pub fn conn(&mut self) -> &mut T {
        &mut self.conn
    }

    fn into_conn(self) -> T {
        self.conn
    }
}

/// Capability interface over a per-host pool.
///
/// The base [`HostPool`] and the latency-sampling decorator both
/// implement this, so balancing policies and the manager compose them
/// without caring which they hold.
#[async_trait]
pub trait ConnectionPool<T: RawConnection>: Send + Sync {
    fn host(&self) -> &Host;

    async fn borrow(&self) -> Result<Lease<T>, ClassifiedError>;

    async fn release(&self, lease: Lease<T>);

    fn shutdown(&self) -> Result<(), ClassifiedError>;

    /// Connections queued and ready to borrow.
    fn num_idle(&self) -> usize;

    /// Connections currently checked out.
    fn num_active(&self) -> usize;

    /// Callers currently waiting on an exhausted pool.
    fn num_blocked(&self) -> usize;

    fn max_active(&self) -> usize;

    fn is_active(&self) -> bool;

    /// Borrows left before the pool is exhausted.
    fn num_before_exhausted(&self) -> usize {
        self.max_active().saturating_sub(self.num_active())
    }

    fn is_exhausted(&self) -> bool {
        self.num_before_exhausted() == 0
    }

    /// Rolling latency score, if this pool samples latencies.
    fn latency_score(&self) -> Option<f64> {
        None
    }

    fn status_string(&self) -> String {
        format!(
            "<HostPool>:{{{}}}; IsActive?: {}; Active: {}; Blocked: {}; Idle: {}; BeforeExhausted: {}",
            self.host().name(),
            self.is_active(),
            self.num_active(),
            self.num_blocked(),
            self.num_idle(),
            self.num_before_exhausted(),
        )
    }
}

/// Bounded pool of raw connections for one host.
pub struct HostPool<C: Connector> {
    host: Host,
    connector: C,
    available: Mutex<VecDeque<C::Conn>>,
    available_notify: Notify,
    /// Reservation counter; offset by up to the number of concurrent
    /// borrowers.
    reserved_count: AtomicUsize,
    /// Connections actually checked out.
    active_count: AtomicUsize,
    /// Callers waiting in `wait_for_connection`.
    blocked_count: AtomicUsize,
    active: AtomicBool,
    max_wait: Duration,
}

/// Decrements a counter on drop unless defused; keeps counts honest
/// when a borrow errors out or is cancelled mid-wait.
struct CountGuard<'a> {
    counter: &'a AtomicUsize,
    armed: bool,
}

impl<'a> CountGuard<'a> {
    fn increment(counter: &'a AtomicUsize) -> (Self, usize) {
        let value = counter.fetch_add(1, Ordering::SeqCst) + 1;
        (
            Self {
                counter,
                armed: true,
            },
            value,
        )
    }

    fn defuse(mut self) {
        self.armed = false;
    }
}

impl Drop for CountGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.counter.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl<C: Connector> HostPool<C> {
    /// Build a pool and eagerly dial a third of `max_active`
    /// connections. A dial failure here fails construction; the caller
    /// decides whether the host goes to the downed queue instead.
    pub async fn new(host: Host, connector: C) -> Result<Self, ClassifiedError> {
        let pool = Self {
            available: Mutex::new(VecDeque::with_capacity(host.max_active)),
            available_notify: Notify::new(),
            reserved_count: AtomicUsize::new(0),
            active_count: AtomicUsize::new(0),
            blocked_count: AtomicUsize::new(0),
            active: AtomicBool::new(true),
            max_wait: host.max_wait_when_exhausted,
            host,
            connector,
        };

        for _ in 0..pool.host.max_active / PREWARM_DIVISOR {
            let conn = pool.dial().await?;
            pool.available.lock().expect("pool queue poisoned").push_back(conn);
        }

        tracing::debug!(
            host = %pool.host,
            idle = pool.idle_len(),
            max_active = pool.host.max_active,
            max_wait = ?pool.max_wait,
            "host pool started"
        );
        Ok(pool)
    }

    fn name(&self) -> String {
        format!("<HostPool>:{{{}}}", self.host.name())
    }

    fn idle_len(&self) -> usize {
        self.available.lock().expect("pool queue poisoned").len()
    }

    fn pop_available(&self) -> Option<C::Conn> {
        self.available.lock().expect("pool queue poisoned").pop_front()
    }

    async fn dial(&self) -> Result<C::Conn, ClassifiedError> {
        self.connector.open(&self.host).await.map_err(|e| {
            tracing::debug!(host = %self.host, "unable to open transport");
            classify(e)
        })
    }

    /// Wait for a connection to come back to the queue. Zero `max_wait`
    /// waits forever in shutdown-observing slices.
    async fn wait_for_connection(&self) -> Result<C::Conn, ClassifiedError> {
        let (_blocked, blocked_now) = CountGuard::increment(&self.blocked_count);
        tracing::debug!(host = %self.host, blocked = blocked_now, "borrow blocking on exhausted pool");

        let deadline = if self.max_wait.is_zero() {
            None
        } else {
            Some(Instant::now() + self.max_wait)
        };

        loop {
            if let Some(conn) = self.pop_available() {
                return Ok(conn);
            }
            if !self.active.load(Ordering::SeqCst) {
                return Err(ClassifiedError::PoolInactive(format!(
                    "{} shut down while waiting for a connection",
                    self.name()
                )));
            }
            let slice = match deadline {
                None => POLL_SLICE,
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(ClassifiedError::PoolExhausted(format!(
                            "max wait of {:?} exceeded on host {}",
                            self.max_wait, self.host
                        )));
                    }
                    POLL_SLICE.min(deadline - now)
                }
            };
            // Missed notifications are bounded by the slice length.
            let _ = tokio::time::timeout(slice, self.available_notify.notified()).await;
        }
    }

    /// Requeue a connection, closing it instead if a concurrent release
    /// already refilled the queue to capacity.
    fn requeue_gently(&self, mut conn: C::Conn) {
        let mut queue = self.available.lock().expect("pool queue poisoned");
        if queue.len() >= self.host.max_active {
            drop(queue);
            tracing::error!(host = %self.host, "capacity hit requeueing connection, closing extra");
            conn.close();
            return;
        }
        queue.push_back(conn);
        drop(queue);
        self.available_notify.notify_one();
    }
}

#[async_trait]
impl<C: Connector> ConnectionPool<C::Conn> for HostPool<C> {
    fn host(&self) -> &Host {
        &self.host
    }

    async fn borrow(&self) -> Result<Lease<C::Conn>, ClassifiedError> {
        if !self.active.load(Ordering::SeqCst) {
            return Err(ClassifiedError::PoolInactive(format!(
                "attempt to borrow on inactive pool {}",
                self.name()
            )));
        }

        let (reservation, reserved_now) = CountGuard::increment(&self.reserved_count);

        let conn = match self.pop_available() {
            Some(conn) => conn,
            None if reserved_now <= self.host.max_active => self.dial().await?,
            None => self.wait_for_connection().await?,
        };

        reservation.defuse();
        self.active_count.fetch_add(1, Ordering::SeqCst);
        Ok(Lease::new(conn))
    }

    async fn release(&self, lease: Lease<C::Conn>) {
        let mut conn = lease.into_conn();
        let open = conn.is_healthy();

        if open {
            if self.active.load(Ordering::SeqCst) {
                self.requeue_gently(conn);
            } else {
                tracing::info!(host = %self.host, "open connection released to inactive pool, closing");
                conn.close();
            }
        } else {
            conn.close();
            if self.active.load(Ordering::SeqCst) {
                // Best effort: a failed replacement shrinks the pool by one.
                match self.dial().await {
                    Ok(fresh) => self.requeue_gently(fresh),
                    Err(e) => {
                        tracing::info!(host = %self.host, error = %e, "unable to reopen replacement connection");
                    }
                }
            }
        }

        self.active_count.fetch_sub(1, Ordering::SeqCst);
        self.reserved_count.fetch_sub(1, Ordering::SeqCst);
        tracing::debug!(host = %self.host, healthy = open, "connection released");
    }

    fn shutdown(&self) -> Result<(), ClassifiedError> {
        if self
            .active
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ClassifiedError::PoolInactive(format!(
                "shutdown() called on inactive pool {}",
                self.name()
            )));
        }
        tracing::info!(host = %self.host, "shutdown triggered on pool");

        let drained: Vec<C::Conn> = {
            let mut queue = self.available.lock().expect("pool queue poisoned");
            queue.drain(..).collect()
        };
        for mut conn in drained {
            conn.close();
        }
        // Wake waiters so in-flight borrows fail fast.
        self.available_notify.notify_waiters();

        tracing::info!(host = %self.host, "shutdown complete on pool");
        Ok(())
    }

    fn num_idle(&self) -> usize {
        self.idle_len()
    }

    fn num_active(&self) -> usize {
        self.active_count.load(Ordering::SeqCst)
    }

    fn num_blocked(&self) -> usize {
        self.blocked_count.load(Ordering::SeqCst)
    }

    fn max_active(&self) -> usize {
        self.host.max_active
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}
