use reservation_core::db::schema::ensure_schema;
use reservation_core::db::statements::{Statement, StatementCache};
use reservation_core::{DbError, Session, SessionConfig};
use rusqlite::Connection;

#[test]
fn prepare_all_compiles_every_template_against_created_schema() {
    let mut conn = attached_memory_connection("reservation");
    ensure_schema(&mut conn, "reservation").unwrap();

    let cache = StatementCache::new("reservation").unwrap();
    cache.prepare_all(&conn).unwrap();

    for statement in Statement::ALL {
        let stmt = conn.prepare_cached(cache.sql(statement)).unwrap();
        assert!(
            stmt.readonly() == cache.sql(statement).trim_start().starts_with("SELECT"),
            "unexpected statement kind for {}",
            statement.name()
        );
    }
}

#[test]
fn prepare_all_without_schema_is_a_fatal_named_error() {
    let conn = attached_memory_connection("reservation");
    let cache = StatementCache::new("reservation").unwrap();

    let err = cache.prepare_all(&conn).unwrap_err();
    match err {
        DbError::StatementPrepare { statement, .. } => {
            assert_eq!(statement, Statement::ALL[0].name());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn in_memory_session_uses_one_connection_and_file_session_uses_pool() {
    let memory = Session::open(&SessionConfig {
        pool_size: 8,
        ..SessionConfig::in_memory("reservation")
    })
    .unwrap();
    assert_eq!(memory.pool_size(), 1);
    assert_eq!(memory.keyspace(), "reservation");

    let dir = tempfile::tempdir().unwrap();
    let file = Session::open(&SessionConfig {
        pool_size: 3,
        ..SessionConfig::file_backed(dir.path(), "reservation")
    })
    .unwrap();
    assert_eq!(file.pool_size(), 3);

    memory.close().unwrap();
    file.close().unwrap();
}

#[test]
fn session_exposes_keyspace_qualified_templates() {
    let session = Session::open_in_memory("front_desk").unwrap();
    let sql = session.statements().sql(Statement::FindByHotelDate);
    assert!(sql.contains("front_desk.reservations_by_hotel_date"));
    assert!(sql.contains("hotel_id = ?1 AND start_date = ?2"));
}

fn attached_memory_connection(keyspace: &str) -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute(&format!("ATTACH DATABASE ':memory:' AS {keyspace};"), [])
        .unwrap();
    conn
}
