#[cfg(test)]
mod tests {
    use mercury_core::{
        CommitPolicy, ConnectionPool, Dispatcher, DispatcherConfig, Driver, ErrorKind, Executor,
        PoolConfig, SqlWriter, Statement,
    };
    use mercury_sqlite::SqliteDriver;
    use mercury_tests::init_logs;
    use std::{
        fs,
        path::PathBuf,
        sync::{Arc, Barrier},
        thread,
    };

    const CREATE_PERSON: &str = "CREATE TABLE person (id INTEGER PRIMARY KEY, name TEXT);";

    fn db_url(name: &str) -> String {
        let path = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join(name);
        if path.exists() {
            fs::remove_file(&path).expect(
                format!("Failed to remove test database file {}", path.display()).as_str(),
            );
        }
        format!("sqlite://{}?mode=rwc", path.display())
    }

    #[test]
    fn concurrent_upserts_through_the_dispatcher() {
        init_logs();
        let driver = SqliteDriver::new();
        let mut dispatcher = Dispatcher::spawn(
            driver,
            db_url("scenario_dispatcher.sqlite"),
            DispatcherConfig::default(),
        )
        .expect("Could not spawn the dispatcher");
        dispatcher.execute(CREATE_PERSON).unwrap();
        let barrier = Arc::new(Barrier::new(3));
        let callers: Vec<_> = ["test", "test2", "test3"]
            .into_iter()
            .map(|name| {
                let dispatcher = dispatcher.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    let statement = driver.sql_writer().insert(
                        "person",
                        [("id", 1.into()), ("name", name.into())],
                        Some("id"),
                    );
                    barrier.wait();
                    let sink = dispatcher.submit(statement).unwrap();
                    let sequence = sink.sequence();
                    let affected = sink.wait().expect("The upsert should succeed");
                    assert_eq!(affected.affected.rows_affected, 1);
                    (sequence, name)
                })
            })
            .collect();
        let mut results: Vec<_> = callers.into_iter().map(|c| c.join().unwrap()).collect();
        results.sort();
        let rows = dispatcher.fetch("SELECT * FROM person;").unwrap();
        assert_eq!(rows.len(), 1, "Every caller wrote the same key");
        assert_eq!(
            rows[0].get::<String>("name").unwrap(),
            results[2].1,
            "The surviving row is the one submitted last"
        );
        dispatcher.stop().unwrap();
        let error = dispatcher
            .submit("SELECT * FROM person;")
            .expect_err("A stopped dispatcher rejects commands");
        assert_eq!(ErrorKind::of(&error), Some(&ErrorKind::DispatcherClosed));
    }

    #[test]
    fn per_thread_inserts_through_the_pool() {
        init_logs();
        let pool = ConnectionPool::new(
            SqliteDriver::new(),
            db_url("scenario_pool.sqlite"),
            PoolConfig::default(),
        );
        pool.get_ref().unwrap().execute(CREATE_PERSON).unwrap();
        let barrier = Arc::new(Barrier::new(2));
        let workers: Vec<_> = [(1, "test"), (2, "test2")]
            .into_iter()
            .map(|(id, name)| {
                let pool = pool.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    let mut connection = pool.get_ref().unwrap();
                    barrier.wait();
                    let statement = Statement::new("INSERT INTO person VALUES (?1, ?2);")
                        .bind(id)
                        .bind(name);
                    connection.execute(statement).unwrap();
                    pool.commit().unwrap();
                    (thread::current().id(), connection.entry().owner())
                })
            })
            .collect();
        for worker in workers {
            let (thread, owner) = worker.join().unwrap();
            assert_eq!(thread, owner, "Each thread used the connection it opened");
        }
        // Entries of terminated threads are reclaimed, only this thread's remains
        assert_eq!(pool.len(), 1);
        let rows = pool
            .get_ref()
            .unwrap()
            .fetch("SELECT * FROM person ORDER BY id;")
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get::<String>("name").unwrap(), "test");
        assert_eq!(rows[1].get::<String>("name").unwrap(), "test2");
        let report = pool.close_all();
        assert_eq!(report.closed, 1);
        assert!(report.hazards.is_empty());
        assert_eq!(pool.shutdown().unwrap().closed, 0);
    }

    #[test]
    fn dispatcher_round_trip_equals_direct_execution() {
        init_logs();
        let url = db_url("scenario_round_trip.sqlite");
        let driver = SqliteDriver::new();
        let mut direct = driver.connect(&url).unwrap();
        direct.execute(CREATE_PERSON).unwrap();
        for (id, name) in [(1, "alpha"), (2, "bravo"), (3, "charlie")] {
            direct
                .execute(Statement::new("INSERT INTO person VALUES (?1, ?2);").bind(id).bind(name))
                .unwrap();
        }
        let query = "SELECT id, name FROM person ORDER BY name DESC;";
        let expected = direct.fetch(query).unwrap();
        let mut dispatcher = Dispatcher::spawn(driver, url.as_str(), Default::default()).unwrap();
        assert_eq!(dispatcher.fetch(query).unwrap(), expected);
        let mut cursor = dispatcher.get_cursor();
        cursor.execute(query).unwrap();
        assert_eq!(cursor.fetchall(), expected.as_slice());
    }

    #[test]
    fn deferred_changes_become_visible_on_commit() {
        init_logs();
        let url = db_url("scenario_deferred.sqlite");
        let driver = SqliteDriver::new();
        let mut reader = driver.connect(&url).unwrap();
        reader.execute(CREATE_PERSON).unwrap();
        let dispatcher = Dispatcher::spawn(
            driver,
            url.as_str(),
            DispatcherConfig::default().with_commit(CommitPolicy::Deferred),
        )
        .unwrap();
        dispatcher
            .submit(Statement::new("INSERT INTO person VALUES (?1, ?2);").bind(1).bind("late"))
            .unwrap()
            .wait()
            .unwrap();
        assert!(reader.fetch("SELECT * FROM person;").unwrap().is_empty());
        dispatcher.commit().unwrap().wait().unwrap();
        assert_eq!(reader.fetch("SELECT * FROM person;").unwrap().len(), 1);
        dispatcher
            .submit(Statement::new("INSERT INTO person VALUES (?1, ?2);").bind(2).bind("stop"))
            .unwrap();
        dispatcher.stop().unwrap();
        assert_eq!(reader.fetch("SELECT * FROM person;").unwrap().len(), 2);
    }
}
