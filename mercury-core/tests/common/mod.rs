#![allow(dead_code)]

use log::LevelFilter;
use mercury_core::{
    Connection, Driver, Error, Executor, Result, ResultSet, RowLabeled, RowNames, RowsAffected,
    SqlWriter, Statement, Value, unpoison,
};
use std::{
    collections::BTreeMap,
    env,
    marker::PhantomData,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    thread::{self, ThreadId},
    time::Duration,
};

pub fn init_logs() {
    let mut logger = env_logger::builder();
    logger
        .is_test(true)
        .format_file(true)
        .format_line_number(true);
    if env::var("RUST_LOG").is_err() {
        logger.filter_level(LevelFilter::Warn);
    }
    let _ = logger.try_init();
}

/// Observable state shared by every connection of a fake driver.
#[derive(Default, Debug)]
pub struct Store {
    pub rows: Mutex<BTreeMap<i64, String>>,
    /// Statements in execution order.
    pub log: Mutex<Vec<String>>,
    pub active: AtomicUsize,
    pub max_active: AtomicUsize,
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
    pub commits: AtomicUsize,
    pub open_threads: Mutex<Vec<(ThreadId, Option<String>)>>,
    pub close_threads: Mutex<Vec<(ThreadId, Option<String>)>>,
}

impl Store {
    pub fn rows(&self) -> BTreeMap<i64, String> {
        unpoison(self.rows.lock()).clone()
    }
    pub fn log(&self) -> Vec<String> {
        unpoison(self.log.lock()).clone()
    }
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
    pub fn close_threads(&self) -> Vec<(ThreadId, Option<String>)> {
        unpoison(self.close_threads.lock()).clone()
    }
    pub fn open_threads(&self) -> Vec<(ThreadId, Option<String>)> {
        unpoison(self.open_threads.lock()).clone()
    }
}

fn current_thread() -> (ThreadId, Option<String>) {
    let current = thread::current();
    (current.id(), current.name().map(str::to_owned))
}

pub trait FakeDriver: Driver {
    /// Decides whether the connection is `Send`.
    type Marker;
    fn store(&self) -> &Arc<Store>;
}

#[derive(Default, Debug, Clone)]
pub struct FakeWriter;

impl SqlWriter for FakeWriter {}

/// Driver whose connections can move between threads.
#[derive(Default, Debug, Clone)]
pub struct MemoryDriver {
    pub store: Arc<Store>,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Default::default()
    }
}

impl Driver for MemoryDriver {
    type Connection = FakeConnection<MemoryDriver>;
    type SqlWriter = FakeWriter;
    const NAME: &'static str = "memory";

    fn connect(&self, url: &str) -> Result<Self::Connection> {
        FakeConnection::open(self.clone(), url)
    }

    fn sql_writer(&self) -> Self::SqlWriter {
        FakeWriter
    }
}

impl FakeDriver for MemoryDriver {
    type Marker = ();
    fn store(&self) -> &Arc<Store> {
        &self.store
    }
}

/// Driver whose connections must stay on the thread that opened them.
#[derive(Default, Debug, Clone)]
pub struct LocalDriver {
    pub store: Arc<Store>,
}

impl LocalDriver {
    pub fn new() -> Self {
        Default::default()
    }
}

impl Driver for LocalDriver {
    type Connection = FakeConnection<LocalDriver>;
    type SqlWriter = FakeWriter;
    const NAME: &'static str = "local";

    fn connect(&self, url: &str) -> Result<Self::Connection> {
        FakeConnection::open(self.clone(), url)
    }

    fn sql_writer(&self) -> Self::SqlWriter {
        FakeWriter
    }
}

impl FakeDriver for LocalDriver {
    type Marker = *const ();
    fn store(&self) -> &Arc<Store> {
        &self.store
    }
}

/// Connection interpreting a tiny scripted language, one command per statement:
/// - `insert <id> <name>` or `insert` with the two values bound as parameters
/// - `select` returns every committed row plus the ones of the open transaction
/// - `begin` opens a transaction
/// - `sleep <ms>`
/// - `fail` and `panic`
/// - anything else is only recorded
pub struct FakeConnection<D: FakeDriver> {
    driver: D,
    in_transaction: bool,
    pending: Vec<(i64, String)>,
    _marker: PhantomData<D::Marker>,
}

impl<D: FakeDriver> FakeConnection<D> {
    fn open(driver: D, url: &str) -> Result<Self> {
        if url == "fail" {
            return Err(Error::msg("Scripted connection failure"));
        }
        let store = driver.store();
        store.opened.fetch_add(1, Ordering::SeqCst);
        unpoison(store.open_threads.lock()).push(current_thread());
        Ok(Self {
            driver,
            in_transaction: false,
            pending: Vec::new(),
            _marker: PhantomData,
        })
    }

    fn insert(&mut self, statement: &Statement, words: &[&str]) -> Result<ResultSet> {
        let (id, name) = match (words, statement.params()) {
            ([id, name], _) => (id.parse::<i64>()?, (*name).to_owned()),
            ([], [Value::Int64(Some(id)), Value::Varchar(Some(name))]) => (*id, name.clone()),
            _ => return Err(Error::msg("Malformed insert")),
        };
        if self.in_transaction {
            self.pending.push((id, name));
        } else {
            unpoison(self.driver.store().rows.lock()).insert(id, name);
        }
        Ok(ResultSet::affected(RowsAffected {
            rows_affected: 1,
            last_affected_id: Some(id),
        }))
    }

    fn select(&self) -> ResultSet {
        let mut rows = self.driver.store().rows();
        rows.extend(self.pending.iter().cloned());
        let labels: RowNames = ["id".to_string(), "name".to_string()].into();
        let rows = rows
            .into_iter()
            .map(|(id, name)| {
                RowLabeled::new(
                    labels.clone(),
                    [Value::Int64(Some(id)), Value::Varchar(Some(name))].into(),
                )
            })
            .collect();
        ResultSet::new(labels, rows, Default::default())
    }
}

impl<D: FakeDriver> Executor for FakeConnection<D> {
    type Driver = D;

    fn driver(&self) -> &D {
        &self.driver
    }

    fn run(&mut self, statement: Statement) -> Result<ResultSet> {
        let store = self.driver.store().clone();
        let active = store.active.fetch_add(1, Ordering::SeqCst) + 1;
        store.max_active.fetch_max(active, Ordering::SeqCst);
        unpoison(store.log.lock()).push(statement.sql().to_owned());
        let words: Vec<&str> = statement.sql().split_whitespace().collect();
        thread::sleep(Duration::from_micros(200));
        let result = match words.as_slice() {
            ["insert", rest @ ..] => self.insert(&statement, rest),
            ["select"] => Ok(self.select()),
            ["begin"] => {
                self.in_transaction = true;
                Ok(ResultSet::default())
            }
            ["sleep", ms] => {
                thread::sleep(Duration::from_millis(ms.parse()?));
                Ok(ResultSet::default())
            }
            ["fail", ..] => Err(Error::msg("Scripted failure")),
            ["panic", ..] => {
                store.active.fetch_sub(1, Ordering::SeqCst);
                panic!("Scripted panic");
            }
            _ => Ok(ResultSet::default()),
        };
        store.active.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn commit(&mut self) -> Result<()> {
        if !self.in_transaction {
            return Ok(());
        }
        unpoison(self.driver.store().rows.lock()).extend(self.pending.drain(..));
        self.in_transaction = false;
        self.driver.store().commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl<D: FakeDriver> Connection for FakeConnection<D> {
    fn begin(&mut self) -> Result<()> {
        self.in_transaction = true;
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.pending.clear();
        self.in_transaction = false;
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    fn close(self) -> Result<()> {
        let store = self.driver.store();
        store.closed.fetch_add(1, Ordering::SeqCst);
        unpoison(store.close_threads.lock()).push(current_thread());
        Ok(())
    }
}
