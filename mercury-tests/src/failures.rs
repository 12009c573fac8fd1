use crate::silent_logs;
use mercury::{Driver, ErrorKind, Executor, SqlWriter, Statement};

pub fn failures<E: Executor>(executor: &mut E) {
    let writer = executor.driver().sql_writer();
    silent_logs! {
        let error = executor
            .execute("SELECT * FROM this_table_does_not_exist;")
            .expect_err("Querying a missing table must fail");
        assert!(
            format!("{:#}", error).contains("this_table_does_not_exist"),
            "The error should name the missing table: {:#}",
            error
        );
        if let Some(kind) = ErrorKind::of(&error) {
            assert!(matches!(kind, ErrorKind::Execution(..)), "Unexpected {:?}", kind);
        }

        assert!(
            executor.execute("SELEC 1;").is_err(),
            "Invalid syntax must fail"
        );

        let mut sql = String::from("SELECT ");
        writer.write_placeholder(&mut sql, 0);
        sql.push_str(" AS value;");
        assert!(
            executor.fetch(Statement::new(sql.clone())).is_err(),
            "Missing parameters must be rejected"
        );
        assert!(
            executor
                .fetch(Statement::new(sql.clone()).bind(1).bind(2))
                .is_err(),
            "Extra parameters must be rejected"
        );
    }

    // Still usable after the failures
    let mut sql = String::from("SELECT ");
    writer.write_placeholder(&mut sql, 0);
    sql.push_str(" AS value;");
    let rows = executor
        .fetch(Statement::new(sql).bind(42))
        .expect("The executor must survive failed statements");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get::<i64>("value").unwrap(), 42);
}
