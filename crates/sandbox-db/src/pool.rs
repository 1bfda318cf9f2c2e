use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use sandbox_error::RuntimeError;
use tokio::sync::{Mutex, Semaphore};

use crate::connector::Connector;
use crate::descriptor::ConnectionDescriptor;

struct Slot<C> {
    conn: Option<C>,
}

/// Bookkeeping shared between `ConnectionPool` and every `PooledConnection`
/// guard. `slots` and the `available`/`in_use` partition are mutated only
/// while holding `bookkeeping` — never across connector I/O (§5: "guarded
/// by a short-lived mutex held only for size bookkeeping, not across I/O").
struct Bookkeeping<C> {
    slots: Vec<Slot<C>>,
    available: VecDeque<usize>,
    in_use: HashSet<usize>,
    closing: bool,
}

impl<C> Bookkeeping<C> {
    fn size(&self) -> usize {
        self.available.len() + self.in_use.len()
    }
}

/// A bounded, keyed cache of live connections for a single descriptor
/// (§4.2). Realized as the Design Note's "arena+index": connections live
/// in a `Vec<Slot>` and callers are handed an index wrapped in a guard,
/// not an owned connection — avoiding the cyclic pool-owns/caller-holds
/// ownership the spec calls out.
pub struct ConnectionPool<T: Connector> {
    connector: Arc<T>,
    descriptor: ConnectionDescriptor,
    min: usize,
    max: usize,
    acquire_timeout: Duration,
    book: Mutex<Bookkeeping<T::Connection>>,
    permits: Semaphore,
}

impl<T: Connector + 'static> ConnectionPool<T> {
    /// Opens `descriptor.pool_min` connections eagerly, per §4.2.
    pub async fn new(connector: Arc<T>, descriptor: ConnectionDescriptor) -> Result<Self, RuntimeError> {
        let min = descriptor.pool_min;
        let max = descriptor.pool_max.max(min).max(1);
        let acquire_timeout = descriptor.connect_timeout;

        let mut slots = Vec::with_capacity(max);
        let mut available = VecDeque::with_capacity(max);
        for _ in 0..min {
            let conn = tokio::time::timeout(descriptor.connect_timeout, connector.open(&descriptor))
                .await
                .map_err(|_| RuntimeError::ConnectionFailed { reason: "connect timeout".to_string() })??;
            let index = slots.len();
            slots.push(Slot { conn: Some(conn) });
            available.push_back(index);
        }

        Ok(Self {
            connector,
            descriptor,
            min,
            max,
            acquire_timeout,
            book: Mutex::new(Bookkeeping { slots, available, in_use: HashSet::new(), closing: false }),
            permits: Semaphore::new(max),
        })
    }

    #[must_use]
    pub fn descriptor(&self) -> &ConnectionDescriptor {
        &self.descriptor
    }

    /// Observable `(available, in_use)` sizes, for tests asserting the
    /// `|available| + |in-use| ≤ max` invariant.
    pub async fn sizes(&self) -> (usize, usize) {
        let book = self.book.lock().await;
        (book.available.len(), book.in_use.len())
    }

    /// Acquire policy (§4.2): dequeue an idle slot, else open a new one
    /// under `max`, else wait up to `acquire_timeout`. The yielded
    /// connection is probed before handoff; an unhealthy connection is
    /// discarded and acquisition retried, bounded to avoid an infinite loop.
    pub async fn acquire(self: &Arc<Self>) -> Result<PooledConnection<T>, RuntimeError> {
        const MAX_PROBE_RETRIES: usize = 3;
        for _ in 0..MAX_PROBE_RETRIES {
            let index = self.acquire_slot().await?;
            let mut conn = self.checkout(index).await;
            let healthy = self.connector.probe(&mut conn).await;
            self.checkin(index, conn).await;
            if healthy {
                return Ok(PooledConnection { pool: Arc::clone(self), index: Some(index) });
            }
            self.discard_slot(index).await;
        }
        Err(RuntimeError::PoolExhausted)
    }

    /// `self.permits` always holds exactly `max - |in-use|` permits: one is
    /// consumed the instant a slot becomes `in_use` (below, whether it came
    /// from the idle queue or was just opened) and returned the instant it
    /// leaves `in_use` (`release`/`discard_slot`). That invariant is what
    /// makes a genuinely saturated pool (`available` empty, `size == max`,
    /// so permits == 0) actually block a caller up to `acquire_timeout`
    /// instead of failing immediately (§4.2 step 3) — when `available` is
    /// non-empty, permits are always >= its length, so the acquire below
    /// resolves without waiting.
    async fn acquire_slot(self: &Arc<Self>) -> Result<usize, RuntimeError> {
        let permit = tokio::time::timeout(self.acquire_timeout, self.permits.acquire())
            .await
            .map_err(|_| RuntimeError::PoolExhausted)?
            .map_err(|_| RuntimeError::PoolExhausted)?;
        permit.forget();

        {
            let mut book = self.book.lock().await;
            if book.closing {
                drop(book);
                self.permits.add_permits(1);
                return Err(RuntimeError::PoolExhausted);
            }
            if let Some(index) = book.available.pop_front() {
                book.in_use.insert(index);
                return Ok(index);
            }
        }

        // No idle slot: the permit we hold guarantees size < max, so it's
        // safe to open a new physical connection here.
        match tokio::time::timeout(self.descriptor.connect_timeout, self.connector.open(&self.descriptor)).await {
            Ok(Ok(conn)) => {
                let mut book = self.book.lock().await;
                let index = book.slots.len();
                book.slots.push(Slot { conn: Some(conn) });
                book.in_use.insert(index);
                Ok(index)
            }
            Ok(Err(e)) => {
                self.permits.add_permits(1);
                Err(e)
            }
            Err(_) => {
                self.permits.add_permits(1);
                Err(RuntimeError::ConnectionFailed { reason: "connect timeout".to_string() })
            }
        }
    }

    /// Temporarily takes ownership of a slot's connection so the caller
    /// can run connector I/O without holding `book` — the lock is only
    /// ever held across `Vec`/queue mutation (§5). Panics if the slot has
    /// no connection, which would indicate a reentrant checkout bug.
    async fn checkout(&self, index: usize) -> T::Connection {
        let mut book = self.book.lock().await;
        book.slots[index].conn.take().expect("slot checked out twice")
    }

    async fn checkin(&self, index: usize, conn: T::Connection) {
        let mut book = self.book.lock().await;
        book.slots[index].conn = Some(conn);
    }

    /// Re-enqueues a released slot, or discards it if the pool is closing
    /// or the available queue has reached `max` (§4.2 "release").
    async fn release(&self, index: usize) {
        let mut book = self.book.lock().await;
        book.in_use.remove(&index);
        if book.closing || book.available.len() >= self.max {
            let conn = book.slots[index].conn.take();
            drop(book);
            if let Some(conn) = conn {
                let _ = self.connector.close(conn).await;
            }
            self.permits.add_permits(1);
            return;
        }
        book.available.push_back(index);
        drop(book);
        self.permits.add_permits(1);
    }

    async fn discard_slot(&self, index: usize) {
        let mut book = self.book.lock().await;
        book.in_use.remove(&index);
        let conn = book.slots[index].conn.take();
        drop(book);
        if let Some(conn) = conn {
            let _ = self.connector.close(conn).await;
        }
        self.permits.add_permits(1);
    }

    /// Drains `available`, marks the pool closing so no new acquisition
    /// succeeds, then closes whatever remains `in_use` as each is
    /// eventually released (§4.2 "close").
    pub async fn close(&self) {
        let idle: Vec<usize> = {
            let mut book = self.book.lock().await;
            book.closing = true;
            let idle = book.available.drain(..).collect::<Vec<_>>();
            idle
        };
        for index in idle {
            self.discard_slot(index).await;
        }
    }

    #[must_use]
    pub fn min(&self) -> usize {
        self.min
    }
    #[must_use]
    pub fn max(&self) -> usize {
        self.max
    }
}

/// A scoped handle to one connection. Dropping it releases the slot back
/// to the pool (or discards it, per `release` policy) without requiring
/// an explicit async call from the caller — accomplished by spawning the
/// release as a detached task from `Drop`, since `Drop` cannot be async.
pub struct PooledConnection<T: Connector + 'static> {
    pool: Arc<ConnectionPool<T>>,
    index: Option<usize>,
}

impl<T: Connector + 'static> PooledConnection<T> {
    pub async fn execute(
        &self,
        statement: &str,
        bindings: &std::collections::HashMap<String, crate::types::Value>,
        row_limit: Option<u64>,
    ) -> Result<crate::connector::RawQueryResult, RuntimeError> {
        let index = self.index.expect("connection not yet released");
        let mut conn = self.pool.checkout(index).await;
        let result = self.pool.connector.execute(&mut conn, statement, bindings, row_limit).await;
        self.pool.checkin(index, conn).await;
        result
    }

    pub async fn stream(
        &self,
        statement: &str,
        bindings: &std::collections::HashMap<String, crate::types::Value>,
        batch_size: usize,
        row_limit: Option<u64>,
    ) -> Result<crate::connector::RowStream, RuntimeError> {
        let index = self.index.expect("connection not yet released");
        let mut conn = self.pool.checkout(index).await;
        let result = self.pool.connector.stream(&mut conn, statement, bindings, batch_size, row_limit).await;
        self.pool.checkin(index, conn).await;
        result
    }

    pub async fn list_tables(&self, schema: Option<&str>) -> Result<Vec<crate::connector::TableSummary>, RuntimeError> {
        let index = self.index.expect("connection not yet released");
        let mut conn = self.pool.checkout(index).await;
        let result = self.pool.connector.list_tables(&mut conn, schema).await;
        self.pool.checkin(index, conn).await;
        result
    }

    pub async fn describe_table(
        &self,
        table: &str,
        schema: Option<&str>,
    ) -> Result<Vec<crate::connector::ColumnDescription>, RuntimeError> {
        let index = self.index.expect("connection not yet released");
        let mut conn = self.pool.checkout(index).await;
        let result = self.pool.connector.describe_table(&mut conn, table, schema).await;
        self.pool.checkin(index, conn).await;
        result
    }

    /// Explicit async release, preferred over relying on `Drop` when the
    /// caller wants to await the release completing (e.g. tests asserting
    /// pool sizes immediately after).
    pub async fn release(mut self) {
        if let Some(index) = self.index.take() {
            self.pool.release(index).await;
        }
    }
}

impl<T: Connector + 'static> Drop for PooledConnection<T> {
    fn drop(&mut self) {
        if let Some(index) = self.index.take() {
            let pool = Arc::clone(&self.pool);
            tokio::spawn(async move {
                pool.release(index).await;
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::{ColumnDescription, RawQueryResult, RowStream, TableSummary};
    use async_trait::async_trait;
    use sandbox_config::VendorTag;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Debug)]
    struct FakeConnector {
        opens: AtomicUsize,
        healthy: AtomicBool,
    }

    #[derive(Debug)]
    struct FakeConn(usize);

    #[async_trait]
    impl Connector for FakeConnector {
        type Connection = FakeConn;

        async fn open(&self, _descriptor: &ConnectionDescriptor) -> Result<Self::Connection, RuntimeError> {
            Ok(FakeConn(self.opens.fetch_add(1, Ordering::SeqCst)))
        }

        async fn close(&self, _conn: Self::Connection) -> Result<(), RuntimeError> {
            Ok(())
        }

        async fn probe(&self, _conn: &mut Self::Connection) -> bool {
            self.healthy.load(Ordering::SeqCst)
        }

        async fn execute(
            &self,
            _conn: &mut Self::Connection,
            _statement: &str,
            _bindings: &HashMap<String, crate::types::Value>,
            _row_limit: Option<u64>,
        ) -> Result<RawQueryResult, RuntimeError> {
            Ok(RawQueryResult { columns: vec![], rows: vec![] })
        }

        async fn stream(
            &self,
            _conn: &mut Self::Connection,
            _statement: &str,
            _bindings: &HashMap<String, crate::types::Value>,
            _batch_size: usize,
            _row_limit: Option<u64>,
        ) -> Result<RowStream, RuntimeError> {
            Ok(Box::pin(futures::stream::empty()))
        }

        async fn list_tables(&self, _conn: &mut Self::Connection, _schema: Option<&str>) -> Result<Vec<TableSummary>, RuntimeError> {
            Ok(vec![])
        }

        async fn describe_table(
            &self,
            _conn: &mut Self::Connection,
            _table: &str,
            _schema: Option<&str>,
        ) -> Result<Vec<ColumnDescription>, RuntimeError> {
            Ok(vec![])
        }
    }

    fn descriptor() -> ConnectionDescriptor {
        ConnectionDescriptor {
            id: "pg1".to_string(),
            display_name: "pg1".to_string(),
            vendor: VendorTag::Postgres,
            host: "localhost".to_string(),
            port: 5432,
            database: "db".to_string(),
            schema: None,
            role: None,
            warehouse: None,
            catalog: None,
            username: "user".to_string(),
            secrets: Default::default(),
            ssl_mode: sandbox_config::SslMode::Disable,
            ssl_ca_path: None,
            connect_timeout: Duration::from_secs(2),
            statement_timeout: Duration::from_secs(5),
            pool_min: 1,
            pool_max: 2,
            idle_eviction: Duration::from_secs(60),
        }
    }

    #[tokio::test]
    async fn eagerly_opens_min_connections() {
        let connector = Arc::new(FakeConnector { opens: AtomicUsize::new(0), healthy: AtomicBool::new(true) });
        let pool = ConnectionPool::new(connector, descriptor()).await.unwrap();
        let (available, in_use) = pool.sizes().await;
        assert_eq!(available, 1);
        assert_eq!(in_use, 0);
    }

    #[tokio::test]
    async fn acquire_and_release_round_trips_sizes() {
        let connector = Arc::new(FakeConnector { opens: AtomicUsize::new(0), healthy: AtomicBool::new(true) });
        let pool = Arc::new(ConnectionPool::new(connector, descriptor()).await.unwrap());

        let conn = pool.acquire().await.unwrap();
        let (available, in_use) = pool.sizes().await;
        assert_eq!(available, 0);
        assert_eq!(in_use, 1);

        conn.release().await;
        let (available, in_use) = pool.sizes().await;
        assert_eq!(available, 1);
        assert_eq!(in_use, 0);
    }

    #[tokio::test]
    async fn size_never_exceeds_max() {
        let connector = Arc::new(FakeConnector { opens: AtomicUsize::new(0), healthy: AtomicBool::new(true) });
        let pool = Arc::new(ConnectionPool::new(connector, descriptor()).await.unwrap());

        let c1 = pool.acquire().await.unwrap();
        let c2 = pool.acquire().await.unwrap();
        let (available, in_use) = pool.sizes().await;
        assert!(available + in_use <= pool.max());
        assert_eq!(in_use, 2);

        drop(c1);
        drop(c2);
    }

    #[tokio::test]
    async fn acquire_waits_for_release_when_saturated_instead_of_failing_fast() {
        let connector = Arc::new(FakeConnector { opens: AtomicUsize::new(0), healthy: AtomicBool::new(true) });
        let pool = Arc::new(ConnectionPool::new(connector, descriptor()).await.unwrap());

        let c1 = pool.acquire().await.unwrap();
        let c2 = pool.acquire().await.unwrap();
        let (available, in_use) = pool.sizes().await;
        assert_eq!(available, 0);
        assert_eq!(in_use, 2);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            c1.release().await;
        });

        // `acquire_timeout` (descriptor's `connect_timeout`) is 2s; bounding
        // the wait at 1s here proves the caller unblocked because of the
        // release above, not because it happened to still be within its
        // own much longer timeout window.
        let waited = tokio::time::timeout(Duration::from_secs(1), pool.acquire()).await;
        assert!(waited.is_ok(), "acquire should have waited for the release rather than failing immediately");
        assert!(waited.unwrap().is_ok());

        drop(c2);
    }

    #[tokio::test]
    async fn unhealthy_connection_is_discarded_not_handed_out() {
        let connector = Arc::new(FakeConnector { opens: AtomicUsize::new(0), healthy: AtomicBool::new(false) });
        let pool = Arc::new(ConnectionPool::new(connector, descriptor()).await.unwrap());
        let result = pool.acquire().await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn close_drains_available_and_blocks_new_acquires() {
        let connector = Arc::new(FakeConnector { opens: AtomicUsize::new(0), healthy: AtomicBool::new(true) });
        let pool = Arc::new(ConnectionPool::new(connector, descriptor()).await.unwrap());
        pool.close().await;
        let (available, _) = pool.sizes().await;
        assert_eq!(available, 0);
        assert!(pool.acquire().await.is_err());
    }
}
