use mercury::{ColumnDef, Driver, Executor, SqlWriter, Statement, Value};

pub fn simple<E: Executor>(executor: &mut E) {
    let writer = executor.driver().sql_writer();

    // Setup
    let mut sql = String::new();
    writer.write_drop_table(&mut sql, "simple_fields", true);
    executor
        .execute(sql)
        .expect("Failed to drop simple_fields table");
    let mut sql = String::new();
    writer.write_create_table(
        &mut sql,
        "simple_fields",
        &[
            ColumnDef::new("id", Value::Int64(None)).primary_key(),
            ColumnDef::new("flag", Value::Boolean(None)),
            ColumnDef::new("ratio", Value::Float64(None)),
            ColumnDef::new("label", Value::Varchar(None)).not_null(),
            ColumnDef::new("payload", Value::Blob(None)),
        ],
        false,
    );
    executor
        .execute(sql)
        .expect("Failed to create simple_fields table");

    // Full row
    let affected = executor
        .execute(writer.insert(
            "simple_fields",
            [
                ("id", 1.into()),
                ("flag", true.into()),
                ("ratio", 0.25.into()),
                ("label", "Hello world!".into()),
                ("payload", vec![0xCAu8, 0xFE].into()),
            ],
            None,
        ))
        .expect("Failed to insert simple 1");
    assert_eq!(affected.rows_affected, 1);
    assert_eq!(affected.last_affected_id, Some(1));

    // Nullable columns left empty
    let affected = executor
        .execute(writer.insert(
            "simple_fields",
            [
                ("id", 2.into()),
                ("flag", None::<bool>.into()),
                ("ratio", None::<f64>.into()),
                ("label", "".into()),
                ("payload", None::<Vec<u8>>.into()),
            ],
            None,
        ))
        .expect("Failed to insert simple 2");
    assert_eq!(affected.rows_affected, 1);

    let rows = executor
        .fetch(writer.select("simple_fields", &[], &["id"]))
        .expect("Failed to query simple_fields");
    assert_eq!(rows.len(), 2);
    assert_eq!(
        rows[0].names(),
        ["id", "flag", "ratio", "label", "payload"].map(String::from)
    );
    assert_eq!(rows[0].get::<i64>("id").unwrap(), 1);
    assert_eq!(rows[0].get::<bool>("flag").unwrap(), true);
    assert_eq!(rows[0].get::<f64>("ratio").unwrap(), 0.25);
    assert_eq!(rows[0].get::<String>("label").unwrap(), "Hello world!");
    assert_eq!(rows[0].get::<Vec<u8>>("payload").unwrap(), vec![0xCA, 0xFE]);
    assert_eq!(rows[1].get::<i64>("id").unwrap(), 2);
    assert_eq!(rows[1].get::<Option<bool>>("flag").unwrap(), None);
    assert_eq!(rows[1].get::<Option<f64>>("ratio").unwrap(), None);
    assert_eq!(rows[1].get::<String>("label").unwrap(), "");
    assert!(rows[1].get_column("payload").unwrap().is_null());

    // Overwrite on conflict
    let affected = executor
        .execute(writer.insert(
            "simple_fields",
            [("id", 2.into()), ("label", "replaced".into())],
            Some("id"),
        ))
        .expect("Failed to upsert simple 2");
    assert_eq!(affected.rows_affected, 1);
    let mut sql = String::from("SELECT label FROM simple_fields WHERE id = ");
    writer.write_placeholder(&mut sql, 0);
    sql.push(';');
    let rows = executor
        .fetch(Statement::new(sql).bind(2))
        .expect("Failed to query the upserted row");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get::<String>("label").unwrap(), "replaced");

    // Modify count
    let affected = executor
        .execute("DELETE FROM simple_fields;")
        .expect("Failed to clear simple_fields");
    assert_eq!(affected.rows_affected, 2);
    let rows = executor
        .fetch(writer.select("simple_fields", &["id"], &[]))
        .expect("Failed to query simple_fields");
    assert!(rows.is_empty());
}
