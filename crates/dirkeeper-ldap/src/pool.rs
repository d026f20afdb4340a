//! Connection pool for directory connections.
//!
//! Connections are leased to exactly one caller at a time and handed back
//! with [`ConnectionPool::release`]. Stale idle connections (older than the
//! configured lifetime, or no longer bound) are dropped lazily on the next
//! lease. When the pool is saturated a lease waits for a bounded time and
//! then opens one overflow connection outside the pool accounting instead
//! of failing the caller.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use dirkeeper_directory::config::ConnectionSettings;
use dirkeeper_directory::error::DirectoryResult;

/// Total time a lease waits for an idle connection when the pool is full.
pub const LEASE_WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Interval between idle-set checks while waiting.
pub const LEASE_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Opens, checks and closes the connections a pool manages.
#[async_trait]
pub trait ConnectionFactory: Send + Sync + 'static {
    /// The protocol connection type.
    type Connection: Send + 'static;

    /// Open and bind a new connection.
    async fn open(&self) -> DirectoryResult<Self::Connection>;

    /// Check that a connection is still bound and usable.
    fn is_alive(&self, connection: &mut Self::Connection) -> bool;

    /// Unbind and drop a connection.
    async fn close(&self, connection: Self::Connection);
}

struct IdleConnection<C> {
    connection: C,
    id: u64,
    stamped_at: Instant,
}

struct PoolState<C> {
    idle: VecDeque<IdleConnection<C>>,
    outstanding: usize,
    overflow_active: usize,
    overflow_opened: u64,
    next_id: u64,
}

impl<C> PoolState<C> {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

type SharedState<C> = Arc<Mutex<PoolState<C>>>;

// The lock is never held across an await point.
fn lock<C>(state: &Mutex<PoolState<C>>) -> MutexGuard<'_, PoolState<C>> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Claim on one pool slot, handed back on drop unless disarmed.
struct SlotGuard<C> {
    state: SharedState<C>,
    overflow: bool,
    armed: bool,
}

impl<C> SlotGuard<C> {
    fn new(state: &SharedState<C>, overflow: bool) -> Self {
        Self {
            state: Arc::clone(state),
            overflow,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl<C> Drop for SlotGuard<C> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = lock(&self.state);
        if self.overflow {
            state.overflow_active -= 1;
        } else {
            state.outstanding -= 1;
        }
        debug!(overflow = self.overflow, "Connection slot returned without release");
    }
}

/// A connection leased from the pool.
///
/// Derefs to the underlying protocol connection. Dropping it without
/// [`ConnectionPool::release`] or [`ConnectionPool::discard`] drops the
/// connection and frees its slot.
pub struct PooledConnection<C> {
    connection: C,
    id: u64,
    stamped_at: Instant,
    overflow: bool,
    slot: SlotGuard<C>,
}

impl<C> PooledConnection<C> {
    /// Pool-unique identifier of this connection.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether this connection was opened outside the pool accounting.
    pub fn is_overflow(&self) -> bool {
        self.overflow
    }

    /// Time since the connection was opened or last returned to the pool.
    pub fn age(&self) -> Duration {
        self.stamped_at.elapsed()
    }
}

impl<C> Deref for PooledConnection<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.connection
    }
}

impl<C> DerefMut for PooledConnection<C> {
    fn deref_mut(&mut self) -> &mut C {
        &mut self.connection
    }
}

impl<C> std::fmt::Debug for PooledConnection<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("id", &self.id)
            .field("overflow", &self.overflow)
            .finish_non_exhaustive()
    }
}

/// Snapshot of pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
    /// Configured maximum number of pooled connections.
    pub capacity: usize,
    /// Connections waiting in the idle set.
    pub idle: usize,
    /// Pooled connections in existence (idle plus leased).
    pub outstanding: usize,
    /// Overflow connections currently leased.
    pub overflow_active: usize,
    /// Overflow connections opened since the pool was created.
    pub overflow_opened: u64,
}

impl PoolStatus {
    /// Connections currently held by callers.
    pub fn leased(&self) -> usize {
        self.outstanding - self.idle + self.overflow_active
    }
}

enum LeaseStep<C> {
    Reuse(IdleConnection<C>),
    Open(u64),
    Wait,
}

/// Bounded pool of directory connections.
pub struct ConnectionPool<F: ConnectionFactory> {
    factory: F,
    capacity: usize,
    max_lifetime: Duration,
    state: SharedState<F::Connection>,
}

impl<F: ConnectionFactory> ConnectionPool<F> {
    /// Create an empty pool. Connections are opened on demand.
    pub fn new(factory: F, settings: &ConnectionSettings) -> Self {
        Self {
            factory,
            capacity: settings.pool_size.max(1),
            max_lifetime: settings.max_lifetime(),
            state: Arc::new(Mutex::new(PoolState {
                idle: VecDeque::new(),
                outstanding: 0,
                overflow_active: 0,
                overflow_opened: 0,
                next_id: 0,
            })),
        }
    }

    /// The factory behind this pool.
    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Lease a connection.
    ///
    /// Reuses an idle connection when one survives the stale check, opens a
    /// new one while below capacity, otherwise waits up to
    /// [`LEASE_WAIT_TIMEOUT`] and finally opens an overflow connection.
    pub async fn lease(&self) -> DirectoryResult<PooledConnection<F::Connection>> {
        let deadline = Instant::now() + LEASE_WAIT_TIMEOUT;

        loop {
            let (stale, step) = {
                let mut state = lock(&self.state);
                let stale = self.evict_stale(&mut state);

                let step = if let Some(idle) = state.idle.pop_front() {
                    LeaseStep::Reuse(idle)
                } else if state.outstanding < self.capacity {
                    state.outstanding += 1;
                    LeaseStep::Open(state.allocate_id())
                } else {
                    LeaseStep::Wait
                };
                (stale, step)
            };

            for idle in stale {
                debug!(connection_id = idle.id, "Closing stale pooled connection");
                self.factory.close(idle.connection).await;
            }

            match step {
                LeaseStep::Reuse(idle) => {
                    debug!(connection_id = idle.id, "Reusing pooled connection");
                    return Ok(PooledConnection {
                        connection: idle.connection,
                        id: idle.id,
                        stamped_at: idle.stamped_at,
                        overflow: false,
                        slot: SlotGuard::new(&self.state, false),
                    });
                }
                LeaseStep::Open(id) => {
                    // Held across the open so a failed or cancelled open frees the slot.
                    let slot = SlotGuard::new(&self.state, false);
                    let connection = self.factory.open().await?;
                    debug!(connection_id = id, "Opened pooled connection");
                    return Ok(PooledConnection {
                        connection,
                        id,
                        stamped_at: Instant::now(),
                        overflow: false,
                        slot,
                    });
                }
                LeaseStep::Wait => {
                    if Instant::now() >= deadline {
                        break;
                    }
                    tokio::time::sleep(LEASE_POLL_INTERVAL).await;
                }
            }
        }

        self.open_overflow().await
    }

    async fn open_overflow(&self) -> DirectoryResult<PooledConnection<F::Connection>> {
        let id = lock(&self.state).allocate_id();
        warn!(
            capacity = self.capacity,
            wait_ms = LEASE_WAIT_TIMEOUT.as_millis() as u64,
            "Connection pool exhausted, opening overflow connection"
        );

        let connection = self.factory.open().await?;

        {
            let mut state = lock(&self.state);
            state.overflow_active += 1;
            state.overflow_opened += 1;
        }

        Ok(PooledConnection {
            connection,
            id,
            stamped_at: Instant::now(),
            overflow: true,
            slot: SlotGuard::new(&self.state, true),
        })
    }

    /// Return a connection after use.
    ///
    /// A bound connection goes back to the idle set with a fresh timestamp
    /// when there is room; anything else is unbound and discarded. Overflow
    /// connections are always discarded.
    pub async fn release(&self, conn: PooledConnection<F::Connection>) {
        let PooledConnection {
            mut connection,
            id,
            overflow,
            mut slot,
            ..
        } = conn;
        slot.disarm();

        if overflow {
            lock(&self.state).overflow_active -= 1;
            debug!(connection_id = id, "Closing overflow connection");
            self.factory.close(connection).await;
            return;
        }

        let alive = self.factory.is_alive(&mut connection);
        let connection = {
            let mut state = lock(&self.state);
            if alive && state.idle.len() < self.capacity {
                state.idle.push_back(IdleConnection {
                    connection,
                    id,
                    stamped_at: Instant::now(),
                });
                return;
            }
            state.outstanding -= 1;
            connection
        };

        debug!(connection_id = id, alive, "Discarding released connection");
        self.factory.close(connection).await;
    }

    /// Discard a connection known to be broken instead of returning it.
    pub async fn discard(&self, conn: PooledConnection<F::Connection>) {
        let PooledConnection {
            connection,
            id,
            slot,
            ..
        } = conn;
        // The armed slot gives back the pool or overflow count as it drops.
        drop(slot);
        debug!(connection_id = id, "Discarding broken connection");
        self.factory.close(connection).await;
    }

    /// Close every idle connection. Leased connections are unaffected.
    pub async fn close_idle(&self) {
        let drained: Vec<_> = {
            let mut state = lock(&self.state);
            let drained: Vec<_> = state.idle.drain(..).collect();
            state.outstanding -= drained.len();
            drained
        };
        for idle in drained {
            self.factory.close(idle.connection).await;
        }
    }

    /// Snapshot of the pool counters.
    pub async fn status(&self) -> PoolStatus {
        let state = lock(&self.state);
        PoolStatus {
            capacity: self.capacity,
            idle: state.idle.len(),
            outstanding: state.outstanding,
            overflow_active: state.overflow_active,
            overflow_opened: state.overflow_opened,
        }
    }

    fn evict_stale(
        &self,
        state: &mut PoolState<F::Connection>,
    ) -> Vec<IdleConnection<F::Connection>> {
        let mut stale = Vec::new();
        let mut kept = VecDeque::with_capacity(state.idle.len());

        for mut idle in state.idle.drain(..) {
            if idle.stamped_at.elapsed() > self.max_lifetime
                || !self.factory.is_alive(&mut idle.connection)
            {
                stale.push(idle);
            } else {
                kept.push_back(idle);
            }
        }

        state.outstanding -= stale.len();
        state.idle = kept;
        stale
    }
}

impl<F: ConnectionFactory> std::fmt::Debug for ConnectionPool<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("capacity", &self.capacity)
            .field("max_lifetime", &self.max_lifetime)
            .finish_non_exhaustive()
    }
}
