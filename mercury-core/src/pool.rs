use crate::{
    Connection, Context, Driver, ErrorKind, Executor, ProxyCursor, Result, ResultSet, Statement,
    unpoison,
};
use std::{
    any::Any,
    cell::RefCell,
    collections::HashMap,
    marker::PhantomData,
    panic,
    sync::{
        Arc, Mutex, OnceLock, Weak,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    thread::{self, ThreadId},
};

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(0);

thread_local! {
    /// Thread scoped handles of every pool used by this thread, by pool id.
    /// Dropped by the thread local destructor when the thread terminates, on
    /// the thread itself.
    static LOCAL_HANDLES: RefCell<HashMap<u64, Box<dyn LocalHandle>>> =
        RefCell::new(HashMap::new());
}

trait LocalHandle {
    fn as_any(&self) -> &dyn Any;
    fn is_stale(&self) -> bool;
}

#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Maximum number of simultaneously open connections, unbounded when `None`.
    pub max_connections: Option<usize>,
}

impl PoolConfig {
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = Some(max);
        self
    }
}

/// Outcome of [`ConnectionPool::close_all`].
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct CloseReport {
    /// Connections that were still open and got closed.
    pub closed: usize,
    /// Connections closed by a thread other than the one that opened them.
    pub hazards: Vec<ErrorKind>,
}

/// One physical connection of a pool together with the thread that opened it.
///
/// The connection is taken out when closing, so it is closed at most once no
/// matter how many paths race to close it.
#[derive(Debug)]
pub struct PoolEntry<C> {
    id: u64,
    owner: ThreadId,
    closed: AtomicBool,
    foreign_closer: OnceLock<ThreadId>,
    connection: Mutex<Option<C>>,
}

impl<C: Connection> PoolEntry<C> {
    fn new(id: u64, connection: C) -> Self {
        Self {
            id,
            owner: thread::current().id(),
            closed: AtomicBool::new(false),
            foreign_closer: OnceLock::new(),
            connection: Mutex::new(Some(connection)),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Thread that opened the connection.
    pub fn owner(&self) -> ThreadId {
        self.owner
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Thread other than the owner that closed the connection during a teardown.
    pub fn foreign_closer(&self) -> Option<ThreadId> {
        self.foreign_closer.get().copied()
    }

    fn with<R>(&self, f: impl FnOnce(&mut C) -> Result<R>) -> Result<R> {
        let mut connection = unpoison(self.connection.lock());
        let connection = connection
            .as_mut()
            .ok_or(ErrorKind::EntryClosed(self.id))?;
        f(connection)
    }

    /// Returns `false` when the connection was already closed.
    fn close(&self) -> bool {
        let connection = unpoison(self.connection.lock()).take();
        let Some(connection) = connection else {
            return false;
        };
        self.closed.store(true, Ordering::Release);
        if let Err(e) = connection
            .close()
            .with_context(|| format!("While closing pool connection {}", self.id))
        {
            log::error!("{:#}", e);
        }
        log::debug!("Pool connection {} closed", self.id);
        true
    }

    /// Close from a teardown path, recording it when the caller is not the owner.
    fn force_close(&self, closer: ThreadId, report: &mut CloseReport) {
        if !self.close() {
            return;
        }
        report.closed += 1;
        if closer != self.owner {
            let _ = self.foreign_closer.set(closer);
            let hazard = ErrorKind::ThreadLifecycleHazard {
                entry: self.id,
                owner: self.owner,
                closer,
            };
            log::warn!("{}", hazard);
            report.hazards.push(hazard);
        }
    }
}

struct PoolShared<D: Driver> {
    id: u64,
    driver: D,
    url: String,
    config: PoolConfig,
    entries: Mutex<HashMap<u64, Arc<PoolEntry<D::Connection>>>>,
    next_entry: AtomicU64,
}

impl<D: Driver> Drop for PoolShared<D> {
    fn drop(&mut self) {
        let entries: Vec<_> = unpoison(self.entries.get_mut())
            .drain()
            .map(|(_, entry)| entry)
            .collect();
        if entries.is_empty() {
            return;
        }
        // The last clone can go away inside a thread local destructor, where
        // the identity of the current thread may be unavailable.
        let closer = panic::catch_unwind(|| thread::current().id()).ok();
        let mut report = CloseReport::default();
        for entry in entries {
            match closer {
                Some(closer) => entry.force_close(closer, &mut report),
                None => {
                    if entry.close() {
                        log::warn!(
                            "Pool connection {} closed by a terminating thread",
                            entry.id
                        );
                        report.closed += 1;
                    }
                }
            }
        }
        if report.closed > 0 {
            log::error!("{}", ErrorKind::TeardownWithLiveEntries(report.closed));
        }
    }
}

/// Pool of connections where each caller thread gets its own connection.
///
/// Connections are opened lazily, the first time a thread asks for one, and
/// are then used only by that thread. Nothing is shared between two entries, so
/// threads never wait on each other to run statements. The connection must be
/// `Send` because teardown may have to close it from another thread.
///
/// Clones share the same entries.
pub struct ConnectionPool<D: Driver> {
    shared: Arc<PoolShared<D>>,
}

impl<D: Driver> Clone for ConnectionPool<D> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<D: Driver> ConnectionPool<D>
where
    D::Connection: Send,
{
    /// Create the pool, no connection is opened until needed.
    pub fn new(driver: D, url: impl Into<String>, config: PoolConfig) -> Self {
        Self {
            shared: Arc::new(PoolShared {
                id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
                driver,
                url: url.into(),
                config,
                entries: Default::default(),
                next_entry: AtomicU64::new(0),
            }),
        }
    }

    pub fn driver(&self) -> &D {
        &self.shared.driver
    }

    pub fn url(&self) -> &str {
        &self.shared.url
    }

    pub fn config(&self) -> &PoolConfig {
        &self.shared.config
    }

    /// Number of open connections.
    pub fn len(&self) -> usize {
        unpoison(self.shared.entries.lock()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_capacity(&self, entries: usize) -> Result<()> {
        match self.shared.config.max_connections {
            Some(max) if entries >= max => Err(ErrorKind::PoolExhausted(max).into()),
            _ => Ok(()),
        }
    }

    /// Open a new connection owned by the returned handle. Dropping the handle
    /// closes the connection, on the thread that opened it since the handle
    /// cannot leave it.
    pub fn acquire(&self) -> Result<PoolHandle<D>> {
        self.check_capacity(self.len())?;
        let connection = self
            .shared
            .driver
            .connect(&self.shared.url)
            .with_context(|| format!("While opening a pool connection to `{}`", self.shared.url))?;
        let id = self.shared.next_entry.fetch_add(1, Ordering::Relaxed);
        let entry = Arc::new(PoolEntry::new(id, connection));
        {
            let mut entries = unpoison(self.shared.entries.lock());
            if let Err(e) = self.check_capacity(entries.len()) {
                drop(entries);
                entry.close();
                return Err(e);
            }
            entries.insert(id, entry.clone());
        }
        log::debug!(
            "Pool connection {} opened by thread {:?}",
            id,
            entry.owner()
        );
        Ok(PoolHandle {
            pool: Arc::downgrade(&self.shared),
            entry,
            driver: self.shared.driver.clone(),
            _thread: PhantomData,
        })
    }

    fn local_ref(&self) -> Result<Option<PoolRef<D>>> {
        LOCAL_HANDLES
            .try_with(|handles| {
                let mut handles = handles.borrow_mut();
                handles.retain(|_, handle| !handle.is_stale());
                handles
                    .get(&self.shared.id)
                    .and_then(|handle| handle.as_any().downcast_ref::<PoolHandle<D>>())
                    .map(PoolHandle::to_ref)
            })
            .context("The thread local storage of this thread was already destroyed")
    }

    /// The connection of the calling thread, opened on the first call.
    ///
    /// The connection stays open until [`ConnectionPool::release`] is called on
    /// this thread or the thread terminates.
    pub fn get_ref(&self) -> Result<PoolRef<D>> {
        if let Some(found) = self.local_ref()? {
            return Ok(found);
        }
        let handle = self.acquire()?;
        let result = handle.to_ref();
        LOCAL_HANDLES
            .try_with(move |handles| {
                handles
                    .borrow_mut()
                    .insert(self.shared.id, Box::new(handle))
            })
            .context("The thread local storage of this thread was already destroyed")?;
        Ok(result)
    }

    /// A cursor over the connection of the calling thread.
    pub fn get_cursor(&self) -> Result<ProxyCursor<PoolRef<D>>> {
        Ok(ProxyCursor::new(self.get_ref()?))
    }

    /// Run `f` with exclusive access to the connection of the calling thread.
    pub fn get_connection<R>(&self, f: impl FnOnce(&mut D::Connection) -> Result<R>) -> Result<R> {
        self.get_ref()?.entry.with(f)
    }

    /// Commit the connection of the calling thread, connections of other
    /// threads are not touched.
    pub fn commit(&self) -> Result<()> {
        match self.local_ref()? {
            Some(mut found) => found.commit(),
            None => Ok(()),
        }
    }

    /// Close the connection of the calling thread now instead of at thread exit.
    /// Returns whether there was one.
    pub fn release(&self) -> Result<bool> {
        let handle = LOCAL_HANDLES
            .try_with(|handles| handles.borrow_mut().remove(&self.shared.id))
            .context("The thread local storage of this thread was already destroyed")?;
        Ok(handle.is_some())
    }

    /// Close and remove every connection, including the ones of threads that
    /// are still alive. Their next use fails with [`ErrorKind::EntryClosed`],
    /// except through [`ConnectionPool::get_ref`] which opens a new one.
    pub fn close_all(&self) -> CloseReport {
        let entries: Vec<_> = unpoison(self.shared.entries.lock())
            .drain()
            .map(|(_, entry)| entry)
            .collect();
        let closer = thread::current().id();
        let mut report = CloseReport::default();
        for entry in entries {
            entry.force_close(closer, &mut report);
        }
        log::debug!("Pool closed {} connection(s)", report.closed);
        report
    }

    /// Destroy the pool. Connections still open at this point are closed and
    /// reported with [`ErrorKind::TeardownWithLiveEntries`].
    pub fn shutdown(self) -> Result<CloseReport> {
        let report = self.close_all();
        if report.closed > 0 {
            let error = ErrorKind::TeardownWithLiveEntries(report.closed);
            log::error!("{}", error);
            return Err(error.into());
        }
        Ok(report)
    }
}

/// Owner of one pool connection.
///
/// Not `Send`: the connection is used and, when the handle drops, closed on the
/// thread that opened it.
pub struct PoolHandle<D: Driver> {
    pool: Weak<PoolShared<D>>,
    entry: Arc<PoolEntry<D::Connection>>,
    driver: D,
    _thread: PhantomData<*const ()>,
}

impl<D: Driver> PoolHandle<D> {
    pub fn entry(&self) -> &PoolEntry<D::Connection> {
        &self.entry
    }

    /// A non owning view of the same connection.
    pub fn to_ref(&self) -> PoolRef<D> {
        PoolRef {
            entry: self.entry.clone(),
            driver: self.driver.clone(),
            _thread: PhantomData,
        }
    }
}

impl<D: Driver> Drop for PoolHandle<D> {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.upgrade() {
            unpoison(pool.entries.lock()).remove(&self.entry.id);
        }
        self.entry.close();
    }
}

impl<D: Driver> LocalHandle for PoolHandle<D> {
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn is_stale(&self) -> bool {
        self.pool.strong_count() == 0 || self.entry.is_closed()
    }
}

impl<D: Driver> Executor for PoolHandle<D> {
    type Driver = D;

    fn driver(&self) -> &D {
        &self.driver
    }

    fn run(&mut self, statement: Statement) -> Result<ResultSet> {
        self.entry.with(|connection| connection.run(statement))
    }

    fn commit(&mut self) -> Result<()> {
        self.entry.with(|connection| connection.commit())
    }
}

/// View of the connection the calling thread holds in a pool, see
/// [`ConnectionPool::get_ref`]. Does not keep the connection open.
pub struct PoolRef<D: Driver> {
    entry: Arc<PoolEntry<D::Connection>>,
    driver: D,
    _thread: PhantomData<*const ()>,
}

impl<D: Driver> PoolRef<D> {
    pub fn entry(&self) -> &PoolEntry<D::Connection> {
        &self.entry
    }
}

impl<D: Driver> Executor for PoolRef<D> {
    type Driver = D;

    fn driver(&self) -> &D {
        &self.driver
    }

    fn run(&mut self, statement: Statement) -> Result<ResultSet> {
        self.entry.with(|connection| connection.run(statement))
    }

    fn commit(&mut self) -> Result<()> {
        self.entry.with(|connection| connection.commit())
    }
}
