use crate::{
    Connection, Context, Driver, ErrorKind, Executor, ProxyCursor, Responder, ResponseSink,
    Result, ResultSet, Statement, panic_message, truncate_long, unpoison,
};
use flume::{Receiver, Sender};
use std::{
    panic::{self, AssertUnwindSafe},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    thread::{self, JoinHandle, ThreadId},
    time::Duration,
};

/// When the worker makes the changes durable.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitPolicy {
    /// Commit after every command that left a transaction open.
    #[default]
    PerCommand,
    /// Run statements inside a transaction opened lazily by the worker, commit
    /// only on an explicit commit command or when the dispatcher stops.
    Deferred,
}

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub thread_name: String,
    pub commit: CommitPolicy,
    /// Upper bound for the waits done through the [`Executor`] implementation.
    pub wait_timeout: Option<Duration>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            thread_name: "mercury-dispatcher".into(),
            commit: CommitPolicy::default(),
            wait_timeout: None,
        }
    }
}

impl DispatcherConfig {
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }
    pub fn with_commit(mut self, commit: CommitPolicy) -> Self {
        self.commit = commit;
        self
    }
    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = Some(timeout);
        self
    }
}

#[derive(Debug)]
enum CommandKind {
    Execute(Statement),
    Commit,
}

#[derive(Debug)]
struct Command {
    sequence: u64,
    kind: CommandKind,
    responder: Responder,
}

struct Intake {
    sender: Option<Sender<Command>>,
    next: u64,
}

struct DispatcherShared {
    intake: Mutex<Intake>,
    discard: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_thread: ThreadId,
    executed: Arc<AtomicU64>,
}

impl DispatcherShared {
    fn shutdown(&self, discard: bool) -> Result<()> {
        if discard {
            self.discard.store(true, Ordering::Release);
        }
        // Dropping the only sender closes the queue, the worker exits once it
        // received everything already accepted.
        let sender = unpoison(self.intake.lock()).sender.take();
        drop(sender);
        if self.worker_thread == thread::current().id() {
            return Ok(());
        }
        // The join happens under the lock, concurrent callers return only
        // after the worker finished.
        let mut worker = unpoison(self.worker.lock());
        if let Some(handle) = worker.take() {
            handle
                .join()
                .map_err(|payload| ErrorKind::WorkerPanic(panic_message(payload.as_ref())))?;
        }
        Ok(())
    }
}

impl Drop for DispatcherShared {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown(false) {
            log::error!("{:#}", e);
        }
    }
}

/// Sole owner of one physical connection, turning any number of concurrent
/// callers into a single FIFO stream of commands.
///
/// The connection is opened, used and closed on a dedicated worker thread, so
/// drivers whose connections must never change thread are supported. Callers
/// `submit` statements and block on the returned [`ResponseSink`]. The order of
/// execution is the order of submission across all callers, and
/// [`ResponseSink::sequence`] exposes it.
///
/// Clones share the same worker. Dropping the last clone stops it the way
/// [`Dispatcher::stop`] does.
pub struct Dispatcher<D: Driver> {
    shared: Arc<DispatcherShared>,
    driver: D,
    config: DispatcherConfig,
}

impl<D: Driver> Clone for Dispatcher<D> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            driver: self.driver.clone(),
            config: self.config.clone(),
        }
    }
}

impl<D: Driver> Dispatcher<D> {
    /// Start the worker and open its connection to `url`. Returns once the
    /// connection is established, or with the error the driver raised.
    pub fn spawn(driver: D, url: impl Into<String>, config: DispatcherConfig) -> Result<Self> {
        let url = url.into();
        let (sender, receiver) = flume::unbounded::<Command>();
        let (ready_tx, ready_rx) = flume::bounded::<Result<()>>(1);
        let discard = Arc::new(AtomicBool::new(false));
        let executed = Arc::new(AtomicU64::new(0));
        let worker = {
            let driver = driver.clone();
            let commit = config.commit;
            let discard = discard.clone();
            let executed = executed.clone();
            thread::Builder::new()
                .name(config.thread_name.clone())
                .spawn(move || {
                    let connection = match driver.connect(&url) {
                        Ok(connection) => connection,
                        Err(e) => {
                            let _ = ready_tx.send(Err(
                                e.context(format!("While connecting the dispatcher to `{}`", url))
                            ));
                            return;
                        }
                    };
                    let _ = ready_tx.send(Ok(()));
                    log::debug!("Dispatcher worker connected to `{}`", url);
                    Worker {
                        connection,
                        commit,
                        discard,
                        executed,
                    }
                    .run(receiver);
                })
                .context("Could not spawn the dispatcher worker thread")?
        };
        let connected = ready_rx
            .recv()
            .unwrap_or_else(|_| Err(ErrorKind::WorkerGone.into()));
        if let Err(e) = connected {
            let _ = worker.join();
            log::error!("{:#}", e);
            return Err(e);
        }
        Ok(Self {
            shared: Arc::new(DispatcherShared {
                intake: Mutex::new(Intake {
                    sender: Some(sender),
                    next: 0,
                }),
                discard,
                worker_thread: worker.thread().id(),
                worker: Mutex::new(Some(worker)),
                executed,
            }),
            driver,
            config,
        })
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Queue a statement and return immediately.
    ///
    /// Fails with [`ErrorKind::DispatcherClosed`] once the dispatcher was stopped.
    pub fn submit(&self, statement: impl Into<Statement>) -> Result<ResponseSink> {
        self.enqueue(CommandKind::Execute(statement.into()))
    }

    /// Queue a commit of the worker's connection, ordered with the statements.
    pub fn commit(&self) -> Result<ResponseSink> {
        self.enqueue(CommandKind::Commit)
    }

    fn enqueue(&self, kind: CommandKind) -> Result<ResponseSink> {
        // Numbering and enqueueing under the same lock makes the sequence
        // number equal to the position in the queue.
        let mut intake = unpoison(self.shared.intake.lock());
        let sequence = intake.next;
        let Some(sender) = intake.sender.as_ref() else {
            return Err(ErrorKind::DispatcherClosed.into());
        };
        let (responder, sink) = ResponseSink::channel(sequence);
        sender
            .send(Command {
                sequence,
                kind,
                responder,
            })
            .map_err(|_| ErrorKind::DispatcherClosed)?;
        intake.next += 1;
        Ok(sink)
    }

    /// Number of commands accepted but not yet taken by the worker.
    pub fn pending(&self) -> usize {
        unpoison(self.shared.intake.lock())
            .sender
            .as_ref()
            .map_or(0, Sender::len)
    }

    /// Number of commands the worker finished, successfully or not.
    pub fn executed(&self) -> u64 {
        self.shared.executed.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        unpoison(self.shared.intake.lock()).sender.is_none()
    }

    /// Stop accepting commands, execute every command already accepted, commit
    /// a deferred transaction, close the connection and join the worker.
    pub fn stop(&self) -> Result<()> {
        self.shared.shutdown(false)
    }

    /// Stop accepting commands and resolve every command not yet started with
    /// [`ErrorKind::DispatcherClosed`], then close the connection and join the
    /// worker. The command running at the time of the call completes normally.
    pub fn abort(&self) -> Result<()> {
        self.shared.shutdown(true)
    }

    /// A cursor submitting through this dispatcher.
    pub fn get_cursor(&self) -> ProxyCursor<Dispatcher<D>> {
        ProxyCursor::new(self.clone())
    }

    fn wait(&self, sink: ResponseSink) -> Result<ResultSet> {
        match self.config.wait_timeout {
            Some(timeout) => sink.wait_timeout(timeout),
            None => sink.wait(),
        }
    }
}

impl<D: Driver> Executor for Dispatcher<D> {
    type Driver = D;

    fn driver(&self) -> &D {
        &self.driver
    }

    fn run(&mut self, statement: Statement) -> Result<ResultSet> {
        let sink = self.submit(statement)?;
        self.wait(sink)
    }

    fn commit(&mut self) -> Result<()> {
        let sink = Dispatcher::commit(self)?;
        self.wait(sink).map(|_| ())
    }
}

struct Worker<C: Connection> {
    connection: C,
    commit: CommitPolicy,
    discard: Arc<AtomicBool>,
    executed: Arc<AtomicU64>,
}

impl<C: Connection> Worker<C> {
    fn run(mut self, receiver: Receiver<Command>) {
        // Ends when every sender is gone and the queue is empty
        while let Ok(command) = receiver.recv() {
            let Command {
                sequence,
                kind,
                responder,
            } = command;
            if self.discard.load(Ordering::Acquire) {
                log::trace!("Discarding command #{}", sequence);
                responder.set(Err(ErrorKind::DispatcherClosed.into()));
                continue;
            }
            log::trace!("Executing command #{}", sequence);
            let result = panic::catch_unwind(AssertUnwindSafe(|| self.handle(kind)))
                .unwrap_or_else(|payload| {
                    Err(ErrorKind::WorkerPanic(panic_message(payload.as_ref())).into())
                });
            if let Err(e) = &result {
                log::error!("Command #{} failed: {:#}", sequence, e);
            }
            self.executed.fetch_add(1, Ordering::AcqRel);
            responder.set(result);
        }
        self.finish();
    }

    fn handle(&mut self, kind: CommandKind) -> Result<ResultSet> {
        match kind {
            CommandKind::Execute(statement) => {
                if self.commit == CommitPolicy::Deferred && !self.connection.in_transaction() {
                    self.connection.begin()?;
                }
                let context = ErrorKind::Execution(truncate_long!(statement.sql).to_string());
                let result = self.connection.run(statement).context(context)?;
                if self.commit == CommitPolicy::PerCommand && self.connection.in_transaction() {
                    self.connection.commit()?;
                }
                Ok(result)
            }
            CommandKind::Commit => {
                self.connection.commit()?;
                Ok(ResultSet::default())
            }
        }
    }

    fn finish(mut self) {
        if self.commit == CommitPolicy::Deferred && self.connection.in_transaction() {
            if let Err(e) = self.connection.commit() {
                log::error!("{:#}", e.context("While committing before the worker stops"));
            }
        }
        if let Err(e) = self.connection.close() {
            log::error!("{:#}", e.context("While closing the dispatcher connection"));
        }
        log::debug!("Dispatcher worker stopped");
    }
}
