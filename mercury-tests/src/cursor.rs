use mercury::{ColumnDef, Driver, Executor, SqlWriter, Value};

pub fn cursor<E: Executor>(executor: &mut E) {
    let writer = executor.driver().sql_writer();
    let mut sql = String::new();
    writer.write_create_table(
        &mut sql,
        "cursor_rows",
        &[
            ColumnDef::new("position", Value::Int64(None)).primary_key(),
            ColumnDef::new("name", Value::Varchar(None)),
        ],
        true,
    );
    executor
        .execute(sql)
        .expect("Failed to create cursor_rows table");
    executor
        .execute("DELETE FROM cursor_rows;")
        .expect("Failed to clear cursor_rows");
    for i in 0..7 {
        executor
            .execute(writer.insert(
                "cursor_rows",
                [("position", i.into()), ("name", format!("row {}", i).into())],
                None,
            ))
            .expect("Failed to insert into cursor_rows");
    }
    let select = writer.select("cursor_rows", &["position", "name"], &["position"]);

    // Round trip through the cursor equals direct execution
    let direct = executor
        .fetch(select.clone())
        .expect("Failed to query cursor_rows");
    let mut cursor = executor.cursor();
    assert!(cursor.fetchone().is_none(), "Nothing executed yet");
    cursor
        .execute(select.clone())
        .expect("Failed to execute through the cursor");
    assert_eq!(
        cursor.labels().map(|v| v.to_vec()),
        Some(vec!["position".to_string(), "name".to_string()])
    );
    assert_eq!(cursor.fetchall(), direct.as_slice());

    // Position only moves with fetchone and fetchmany
    let first = cursor.fetchone().expect("There are rows to fetch");
    assert_eq!(first.get::<i64>("position").unwrap(), 0);
    let next = cursor.fetchmany(4);
    assert_eq!(next.len(), 4);
    assert_eq!(next[0].get::<String>("name").unwrap(), "row 1");
    assert_eq!(next[3].get::<String>("name").unwrap(), "row 4");
    assert_eq!(cursor.fetchmany(4).len(), 2);
    assert!(cursor.fetchone().is_none());

    // Idempotent
    let all = cursor.fetchall().to_vec();
    assert_eq!(all.len(), 7);
    assert_eq!(cursor.fetchall(), all.as_slice());
    assert_eq!(all, direct);

    // A statement without rows
    cursor
        .execute("DELETE FROM cursor_rows;")
        .expect("Failed to clear cursor_rows");
    assert_eq!(cursor.rows_affected().rows_affected, 7);
    assert!(cursor.fetchall().is_empty());
    cursor.commit().expect("Failed to commit through the cursor");
}
