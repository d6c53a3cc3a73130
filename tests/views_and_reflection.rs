//! View and Reflection Tests
//!
//! Views read like tables and reject every mutation before the engine is
//! contacted. Reflection hydrates tables and views from catalog metadata
//! into the cache, where lookup is synchronous and misses are a distinct
//! not-cached signal.

use std::sync::Arc;

use serde_json::{json, Value};
use tablekit::errors::SchemaKind;
use tablekit::{
    Database, DbError, FieldKind, MemoryEngine, Record, SelectQuery, TableDescriptor,
};

fn rec(value: Value) -> Record {
    Record::try_from(value).unwrap()
}

async fn seeded_db() -> Database<MemoryEngine> {
    let db = Database::new(MemoryEngine::new());
    db.create_table(
        &TableDescriptor::new("users")
            .field("id", FieldKind::Integer)
            .field("name", FieldKind::Text)
            .field("email", FieldKind::Text),
    )
    .await
    .unwrap();
    let users = db.table("users").unwrap();
    users
        .insert(&rec(json!({"name": "Alice", "email": "a@x.com"})))
        .await
        .unwrap();
    users
        .insert(&rec(json!({"name": "Bob", "email": "b@x.com"})))
        .await
        .unwrap();
    db
}

// =============================================================================
// Views
// =============================================================================

#[tokio::test]
async fn test_view_reads_like_a_table() {
    let db = seeded_db().await;
    let view = db
        .create_view("alices", SelectQuery::all("users").filter("name", json!("Alice")))
        .await
        .unwrap();

    let rows = view.select(None).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("email"), Some(&json!("a@x.com")));

    let found = view.lookup(&[("email", json!("a@x.com"))]).await.unwrap();
    assert_eq!(found.get("name"), Some(&json!("Alice")));

    // pseudo-key: first declared column stands in for the missing key
    assert_eq!(view.pk_columns(), ["id"]);
    let by_key = view.get(1).await.unwrap();
    assert_eq!(by_key.get("name"), Some(&json!("Alice")));
}

#[tokio::test]
async fn test_view_rejects_mutations_without_touching_the_engine() {
    let db = seeded_db().await;
    let view = db
        .create_view("everyone", SelectQuery::all("users"))
        .await
        .unwrap();

    let calls_before = db.engine().call_count();

    let payload = rec(json!({"name": "Mallory", "email": "m@x.com"}));
    for (operation, err) in [
        ("insert", view.insert(&payload).await.unwrap_err()),
        ("update", view.update(&rec(json!({"id": 1, "name": "x"}))).await.unwrap_err()),
        ("upsert", view.upsert(&payload).await.unwrap_err()),
        ("delete", view.delete(1).await.unwrap_err()),
    ] {
        match err {
            DbError::InvalidOperation {
                operation: rejected,
                target,
            } => {
                assert_eq!(rejected, operation);
                assert_eq!(target, "everyone");
            }
            other => panic!("unexpected error for {operation}: {other}"),
        }
    }

    assert_eq!(db.engine().call_count(), calls_before);
}

#[tokio::test]
async fn test_view_supports_scoping_and_binding() {
    let db = seeded_db().await;
    let view = db
        .create_view("everyone", SelectQuery::all("users"))
        .await
        .unwrap();

    view.bind_type();
    let bobs = view.xtra(&[("name", json!("Bob"))]).unwrap();
    let rows = bobs.select(None).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert!(rows[0].is_structured());
}

#[tokio::test]
async fn test_view_follows_base_table_writes() {
    let db = seeded_db().await;
    let view = db
        .create_view("everyone", SelectQuery::all("users"))
        .await
        .unwrap();
    assert_eq!(view.select(None).await.unwrap().len(), 2);

    let users = db.table("users").unwrap();
    users
        .insert(&rec(json!({"name": "Carol", "email": "c@x.com"})))
        .await
        .unwrap();
    assert_eq!(view.select(None).await.unwrap().len(), 3);
}

// =============================================================================
// Reflection
// =============================================================================

#[tokio::test]
async fn test_reflection_hydrates_foreign_relations() {
    let engine = Arc::new(MemoryEngine::new());
    let origin = Database::<MemoryEngine>::new(Arc::clone(&engine));
    origin
        .create_table(
            &TableDescriptor::new("users")
                .field("id", FieldKind::Integer)
                .field("name", FieldKind::Text)
                .field("email", FieldKind::Text),
        )
        .await
        .unwrap();
    origin
        .table("users")
        .unwrap()
        .insert(&rec(json!({"name": "Alice", "email": "a@x.com"})))
        .await
        .unwrap();

    // a second session over the same backend starts cold
    let session = Database::<MemoryEngine>::new(Arc::clone(&engine));
    assert!(matches!(
        session.table("users").unwrap_err(),
        DbError::NotCached { .. }
    ));

    let users = session.reflect_table("users").await.unwrap();
    assert_eq!(users.pk_columns(), ["id"]);
    assert_eq!(users.column_names(), ["id", "name", "email"]);
    let alice = users.get(1).await.unwrap();
    assert_eq!(alice.get("name"), Some(&json!("Alice")));
}

#[tokio::test]
async fn test_reflection_preserves_composite_key_order() {
    let engine = Arc::new(MemoryEngine::new());
    let origin = Database::<MemoryEngine>::new(Arc::clone(&engine));
    origin
        .create_table(
            &TableDescriptor::new("memberships")
                .field("user", FieldKind::Text)
                .field("org", FieldKind::Text)
                .field("role", FieldKind::Text)
                .composite_primary_key(["org", "user"]),
        )
        .await
        .unwrap();

    let session = Database::<MemoryEngine>::new(engine);
    let memberships = session.reflect_table("memberships").await.unwrap();
    assert_eq!(memberships.pk_columns(), ["org", "user"]);
}

#[tokio::test]
async fn test_bulk_reflection_populates_both_namespaces() {
    let engine = Arc::new(MemoryEngine::new());
    let origin = Database::<MemoryEngine>::new(Arc::clone(&engine));
    origin
        .create_table(
            &TableDescriptor::new("users")
                .field("id", FieldKind::Integer)
                .field("name", FieldKind::Text),
        )
        .await
        .unwrap();
    origin
        .create_view("everyone", SelectQuery::all("users"))
        .await
        .unwrap();

    let session = Database::<MemoryEngine>::new(engine);
    session.reflect_all().await.unwrap();

    assert_eq!(session.table_names(), ["users"]);
    assert_eq!(session.view_names(), ["everyone"]);
    assert!(session.table("users").is_ok());
    assert!(session.view("everyone").is_ok());
    // namespaces stay independent
    assert!(session.table("everyone").is_err());
    assert!(session.view("users").is_err());
}

#[tokio::test]
async fn test_re_reflection_replaces_the_cached_entry() {
    let db = seeded_db().await;
    let first = db.reflect_table("users").await.unwrap();
    let second = db.reflect_table("users").await.unwrap();

    assert!(!Arc::ptr_eq(&first, &second));
    assert!(Arc::ptr_eq(&db.table("users").unwrap(), &second));
}

#[tokio::test]
async fn test_reflecting_the_wrong_relation_kind_is_rejected() {
    let db = seeded_db().await;
    db.create_view("everyone", SelectQuery::all("users"))
        .await
        .unwrap();

    assert!(matches!(
        db.reflect_table("everyone").await.unwrap_err(),
        DbError::InvalidOperation { .. }
    ));
    assert!(matches!(
        db.reflect_view("users").await.unwrap_err(),
        DbError::InvalidOperation { .. }
    ));
}

#[tokio::test]
async fn test_reflecting_a_missing_relation_is_a_schema_error() {
    let db = seeded_db().await;
    match db.reflect_table("phantom").await.unwrap_err() {
        DbError::Schema { table, kind } => {
            assert_eq!(table, "phantom");
            assert_eq!(kind, SchemaKind::RelationNotFound);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_drop_view_evicts_the_cache_entry() {
    let db = seeded_db().await;
    db.create_view("everyone", SelectQuery::all("users"))
        .await
        .unwrap();
    db.drop_view("everyone").await.unwrap();

    assert!(matches!(
        db.view("everyone").unwrap_err(),
        DbError::NotCached { .. }
    ));
    // the backing relation is gone too
    assert!(db.reflect_view("everyone").await.is_err());
}
