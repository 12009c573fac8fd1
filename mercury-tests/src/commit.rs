use mercury::{ColumnDef, Driver, Executor, SqlWriter, Value};

pub fn commit<E: Executor>(executor: &mut E) {
    let writer = executor.driver().sql_writer();
    let mut sql = String::new();
    writer.write_drop_table(&mut sql, "committed_rows", true);
    executor
        .execute(sql)
        .expect("Failed to drop committed_rows table");
    let mut sql = String::new();
    writer.write_create_table(
        &mut sql,
        "committed_rows",
        &[ColumnDef::new("id", Value::Int64(None)).primary_key()],
        false,
    );
    executor
        .execute(sql)
        .expect("Failed to create committed_rows table");
    executor
        .commit()
        .expect("Committing the schema change must succeed");
    for id in 0..3 {
        executor
            .execute(writer.insert("committed_rows", [("id", id.into())], None))
            .expect("Failed to insert into committed_rows");
    }
    executor.commit().expect("Failed to commit");
    // Nothing open anymore, committing again is a no-op
    executor.commit().expect("A second commit must be harmless");
    let rows = executor
        .fetch(writer.select("committed_rows", &[], &["id"]))
        .expect("Failed to query committed_rows");
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[2].get::<i64>("id").unwrap(), 2);
}
