//! Table CRUD Tests
//!
//! End-to-end behavior of the CRUD contract over the in-memory engine:
//! - insert re-reads generated keys and defaulted columns
//! - point reads normalize scalar and composite keys
//! - zero-row mutations surface as not-found, constraint hits as integrity

use serde_json::{json, Value};
use tablekit::errors::{ConstraintKind, ValidationKind};
use tablekit::{Database, DbError, FieldKind, MemoryEngine, Record, TableDescriptor};

// =============================================================================
// Helper Functions
// =============================================================================

fn rec(value: Value) -> Record {
    Record::try_from(value).unwrap()
}

async fn users_db() -> Database<MemoryEngine> {
    let db = Database::new(MemoryEngine::new());
    db.create_table(
        &TableDescriptor::new("users")
            .field("id", FieldKind::Integer)
            .field("name", FieldKind::Text)
            .field("email", FieldKind::Text),
    )
    .await
    .unwrap();
    db
}

async fn memberships_db() -> Database<MemoryEngine> {
    let db = Database::new(MemoryEngine::new());
    db.create_table(
        &TableDescriptor::new("memberships")
            .field("org", FieldKind::Text)
            .field("user", FieldKind::Text)
            .field("role", FieldKind::Text)
            .composite_primary_key(["org", "user"]),
    )
    .await
    .unwrap();
    db
}

// =============================================================================
// Insert / Get
// =============================================================================

#[tokio::test]
async fn test_insert_assigns_key_and_get_round_trips() {
    let db = users_db().await;
    let users = db.table("users").unwrap();

    let inserted = users
        .insert(&rec(json!({"name": "Alice", "email": "a@x.com"})))
        .await
        .unwrap();
    assert_eq!(inserted.get("id"), Some(&json!(1)));
    assert_eq!(inserted.get("name"), Some(&json!("Alice")));
    assert_eq!(inserted.get("email"), Some(&json!("a@x.com")));

    let fetched = users.get(1).await.unwrap();
    assert_eq!(fetched, inserted);
}

#[tokio::test]
async fn test_insert_hydrates_defaulted_columns() {
    let db = users_db().await;
    db.create_table(
        &TableDescriptor::new("events")
            .field("id", FieldKind::Integer)
            .field("kind", FieldKind::Text)
            .field("created_at", FieldKind::Timestamp),
    )
    .await
    .unwrap();

    let events = db.table("events").unwrap();
    let inserted = events.insert(&rec(json!({"kind": "signup"}))).await.unwrap();
    assert!(inserted.get("created_at").unwrap().is_string());
}

#[tokio::test]
async fn test_get_unknown_key_is_not_found() {
    let db = users_db().await;
    let users = db.table("users").unwrap();
    let err = users.get(99).await.unwrap_err();
    match err {
        DbError::NotFound { table, filters } => {
            assert_eq!(table, "users");
            assert_eq!(filters.0, vec![("id".to_string(), json!(99))]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_duplicate_key_is_integrity_error() {
    let db = users_db().await;
    let users = db.table("users").unwrap();
    users
        .insert(&rec(json!({"id": 7, "name": "a", "email": "a@x.com"})))
        .await
        .unwrap();

    let err = users
        .insert(&rec(json!({"id": 7, "name": "b", "email": "b@x.com"})))
        .await
        .unwrap_err();
    match err {
        DbError::Integrity { table, kind, .. } => {
            assert_eq!(table, "users");
            assert_eq!(kind, ConstraintKind::PrimaryKey);
        }
        other => panic!("unexpected error: {other}"),
    }
}

// =============================================================================
// Lookup
// =============================================================================

#[tokio::test]
async fn test_lookup_by_criteria() {
    let db = users_db().await;
    let users = db.table("users").unwrap();
    users
        .insert(&rec(json!({"name": "Alice", "email": "a@x.com"})))
        .await
        .unwrap();

    let found = users
        .lookup(&[("email", json!("a@x.com"))])
        .await
        .unwrap();
    assert_eq!(found.get("name"), Some(&json!("Alice")));

    let err = users
        .lookup(&[("email", json!("nobody@x.com"))])
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::NotFound { .. }));
}

#[tokio::test]
async fn test_lookup_without_criteria_is_rejected() {
    let db = users_db().await;
    let users = db.table("users").unwrap();
    let err = users.lookup(&[]).await.unwrap_err();
    assert!(matches!(
        err,
        DbError::Validation {
            kind: ValidationKind::EmptyLookup,
            ..
        }
    ));
}

#[tokio::test]
async fn test_lookup_unknown_column_is_schema_error() {
    let db = users_db().await;
    let users = db.table("users").unwrap();
    let err = users.lookup(&[("shoe_size", json!(42))]).await.unwrap_err();
    match err {
        DbError::Schema { table, kind } => {
            assert_eq!(table, "users");
            assert_eq!(kind.to_string(), "no column 'shoe_size'");
        }
        other => panic!("unexpected error: {other}"),
    }
}

// =============================================================================
// Select
// =============================================================================

#[tokio::test]
async fn test_select_returns_all_rows_and_respects_limit() {
    let db = users_db().await;
    let users = db.table("users").unwrap();
    for name in ["a", "b", "c"] {
        users
            .insert(&rec(json!({"name": name, "email": format!("{name}@x.com")})))
            .await
            .unwrap();
    }

    assert_eq!(users.select(None).await.unwrap().len(), 3);
    assert_eq!(users.select(Some(2)).await.unwrap().len(), 2);

    let keyed = users.select_with_pk(None).await.unwrap();
    assert_eq!(keyed.len(), 3);
    assert_eq!(keyed[0].0, tablekit::PkValue::Scalar(json!(1)));
}

#[tokio::test]
async fn test_default_select_cap_bounds_unlimited_reads() {
    let db = tablekit::Database::with_options(
        MemoryEngine::new(),
        tablekit::DatabaseOptions {
            select_cap: Some(2),
        },
    );
    db.create_table(
        &TableDescriptor::new("users")
            .field("id", FieldKind::Integer)
            .field("name", FieldKind::Text)
            .field("email", FieldKind::Text),
    )
    .await
    .unwrap();
    let users = db.table("users").unwrap();
    for name in ["a", "b", "c"] {
        users
            .insert(&rec(json!({"name": name, "email": format!("{name}@x.com")})))
            .await
            .unwrap();
    }

    assert_eq!(users.select(None).await.unwrap().len(), 2);
    assert_eq!(users.select(Some(3)).await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_select_on_empty_table_is_ok() {
    let db = users_db().await;
    let users = db.table("users").unwrap();
    assert!(users.select(None).await.unwrap().is_empty());
}

// =============================================================================
// Update / Upsert
// =============================================================================

#[tokio::test]
async fn test_update_rewrites_and_re_reads() {
    let db = users_db().await;
    let users = db.table("users").unwrap();
    let mut alice = users
        .insert(&rec(json!({"name": "Alice", "email": "a@x.com"})))
        .await
        .unwrap();

    alice.set("email", json!("alice@x.com"));
    let updated = users.update(&alice).await.unwrap();
    assert_eq!(updated.get("email"), Some(&json!("alice@x.com")));
    assert_eq!(updated.get("name"), Some(&json!("Alice")));
}

#[tokio::test]
async fn test_update_without_key_is_rejected() {
    let db = users_db().await;
    let users = db.table("users").unwrap();
    let err = users
        .update(&rec(json!({"name": "nobody"})))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DbError::Validation {
            kind: ValidationKind::MissingPk { .. },
            ..
        }
    ));
}

#[tokio::test]
async fn test_update_of_absent_row_is_not_found() {
    let db = users_db().await;
    let users = db.table("users").unwrap();
    let err = users
        .update(&rec(json!({"id": 5, "name": "ghost"})))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::NotFound { .. }));
}

#[tokio::test]
async fn test_upsert_inserts_then_updates() {
    let db = users_db().await;
    let users = db.table("users").unwrap();

    let first = users
        .upsert(&rec(json!({"id": 1, "name": "a", "email": "a@x.com"})))
        .await
        .unwrap();
    assert_eq!(first.get("name"), Some(&json!("a")));

    let second = users
        .upsert(&rec(json!({"id": 1, "name": "a2", "email": "a@x.com"})))
        .await
        .unwrap();
    assert_eq!(second.get("name"), Some(&json!("a2")));
    assert_eq!(users.select(None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_upsert_without_key_inserts() {
    let db = users_db().await;
    let users = db.table("users").unwrap();
    let created = users
        .upsert(&rec(json!({"name": "fresh", "email": "f@x.com"})))
        .await
        .unwrap();
    assert_eq!(created.get("id"), Some(&json!(1)));
}

// =============================================================================
// Delete
// =============================================================================

#[tokio::test]
async fn test_delete_then_get_and_delete_again_are_not_found() {
    let db = users_db().await;
    let users = db.table("users").unwrap();
    users
        .insert(&rec(json!({"name": "Alice", "email": "a@x.com"})))
        .await
        .unwrap();

    users.delete(1).await.unwrap();
    assert!(matches!(
        users.get(1).await.unwrap_err(),
        DbError::NotFound { .. }
    ));
    assert!(matches!(
        users.delete(1).await.unwrap_err(),
        DbError::NotFound { .. }
    ));
}

// =============================================================================
// Composite Keys
// =============================================================================

#[tokio::test]
async fn test_composite_key_addressing() {
    let db = memberships_db().await;
    let memberships = db.table("memberships").unwrap();
    memberships
        .insert(&rec(json!({"org": "acme", "user": "alice", "role": "admin"})))
        .await
        .unwrap();

    let found = memberships.get(("acme", "alice")).await.unwrap();
    assert_eq!(found.get("role"), Some(&json!("admin")));

    memberships.delete(("acme", "alice")).await.unwrap();
    assert!(matches!(
        memberships.get(("acme", "alice")).await.unwrap_err(),
        DbError::NotFound { .. }
    ));
}

#[tokio::test]
async fn test_scalar_key_against_composite_key_is_bad_shape() {
    let db = memberships_db().await;
    let memberships = db.table("memberships").unwrap();
    let err = memberships.get("acme").await.unwrap_err();
    assert!(matches!(
        err,
        DbError::Validation {
            kind: ValidationKind::BadPkShape {
                expected: 2,
                got: 1
            },
            ..
        }
    ));
}

// =============================================================================
// Backend Failures
// =============================================================================

#[tokio::test]
async fn test_unreachable_backend_is_connection_error() {
    let db = users_db().await;
    let users = db.table("users").unwrap();
    db.engine().set_unreachable(true);
    assert!(matches!(
        users.select(None).await.unwrap_err(),
        DbError::Connection(_)
    ));
}

#[tokio::test]
async fn test_dropped_table_goes_inert() {
    let db = users_db().await;
    let users = db.table("users").unwrap();
    db.drop_table("users").await.unwrap();

    // cache entry is gone
    assert!(matches!(
        db.table("users").unwrap_err(),
        DbError::NotCached { .. }
    ));
    // the held instance now surfaces backend errors
    assert!(matches!(
        users.select(None).await.unwrap_err(),
        DbError::Backend { .. }
    ));
}
