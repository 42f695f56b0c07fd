//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p docstore --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use docstore::{
    DocRef, DocStoreError, DocumentStore, DocumentStoreExt, PostgresDocumentStore, Transaction,
    TransactionError, Version, WriteBatch, WriteOp, run_transaction,
};
use serde_json::json;
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            // Create a temporary pool just for migrations
            let temp_pool = PgPool::connect(&connection_string).await.unwrap();

            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_documents_table.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();

            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresDocumentStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE documents")
        .execute(&pool)
        .await
        .unwrap();

    PostgresDocumentStore::new(pool)
}

fn product(id: &str) -> DocRef {
    DocRef::new("products", id)
}

#[tokio::test]
#[serial_test::serial]
async fn set_get_delete_roundtrip() {
    let store = get_test_store().await;

    store
        .set(&product("p1"), json!({"name": "Widget", "stock": 10}))
        .await
        .unwrap();

    let found = store.get(&product("p1")).await.unwrap().unwrap();
    assert_eq!(found.version, Version::first());
    assert_eq!(found.data["stock"], 10);

    store
        .set(&product("p1"), json!({"name": "Widget", "stock": 9}))
        .await
        .unwrap();
    let found = store.get(&product("p1")).await.unwrap().unwrap();
    assert_eq!(found.version, Version::first().next());

    store.delete(&product("p1")).await.unwrap();
    assert!(store.get(&product("p1")).await.unwrap().is_none());

    // Idempotent delete
    store.delete(&product("p1")).await.unwrap();
}

#[tokio::test]
#[serial_test::serial]
async fn get_many_preserves_order_and_gaps() {
    let store = get_test_store().await;

    store.set(&product("a"), json!({"n": 1})).await.unwrap();
    store.set(&product("c"), json!({"n": 3})).await.unwrap();

    let found = store
        .get_many(&[product("a"), product("b"), product("c")])
        .await
        .unwrap();

    assert_eq!(found.len(), 3);
    assert_eq!(found[0].as_ref().unwrap().data["n"], 1);
    assert!(found[1].is_none());
    assert_eq!(found[2].as_ref().unwrap().data["n"], 3);
}

#[tokio::test]
#[serial_test::serial]
async fn apply_rejects_stale_read() {
    let store = get_test_store().await;
    store.set(&product("p1"), json!({"stock": 5})).await.unwrap();

    let read_version = store.get(&product("p1")).await.unwrap().unwrap().version;

    // External write bumps the version.
    store.set(&product("p1"), json!({"stock": 4})).await.unwrap();

    let batch = WriteBatch {
        reads: vec![(product("p1"), Some(read_version))],
        writes: vec![WriteOp::Set {
            doc: product("p1"),
            data: json!({"stock": 3}),
        }],
    };

    let result = store.apply(batch).await;
    assert!(matches!(result, Err(DocStoreError::Conflict { .. })));

    let found = store.get(&product("p1")).await.unwrap().unwrap();
    assert_eq!(found.data["stock"], 4);
}

#[tokio::test]
#[serial_test::serial]
async fn apply_merges_update_fields() {
    let store = get_test_store().await;
    store
        .set(&product("p1"), json!({"name": "Widget", "stock": 10, "sold": 2}))
        .await
        .unwrap();

    let mut fields = serde_json::Map::new();
    fields.insert("stock".to_string(), json!(8));
    fields.insert("sold".to_string(), json!(4));

    store
        .apply(WriteBatch {
            reads: vec![],
            writes: vec![WriteOp::Update {
                doc: product("p1"),
                fields,
            }],
        })
        .await
        .unwrap();

    let found = store.get(&product("p1")).await.unwrap().unwrap();
    assert_eq!(found.data, json!({"name": "Widget", "stock": 8, "sold": 4}));
}

#[tokio::test]
#[serial_test::serial]
async fn apply_update_missing_document_rolls_back() {
    let store = get_test_store().await;
    store.set(&product("p1"), json!({"stock": 10})).await.unwrap();

    let mut fields = serde_json::Map::new();
    fields.insert("stock".to_string(), json!(0));

    let result = store
        .apply(WriteBatch {
            reads: vec![],
            writes: vec![
                WriteOp::Set {
                    doc: product("p1"),
                    data: json!({"stock": 99}),
                },
                WriteOp::Update {
                    doc: product("missing"),
                    fields,
                },
            ],
        })
        .await;

    assert!(matches!(result, Err(DocStoreError::NotFound(_))));

    // The SQL transaction rolled back, so the Set never landed.
    let found = store.get(&product("p1")).await.unwrap().unwrap();
    assert_eq!(found.data["stock"], 10);
}

#[tokio::test]
#[serial_test::serial]
async fn transaction_retries_on_contention() {
    let store = get_test_store().await;
    let counter = DocRef::new("counters", "c1");
    store.set(&counter, json!({"n": 0})).await.unwrap();

    // Two transactional increments racing; both must land.
    let store_a = store.clone();
    let store_b = store.clone();
    let counter_a = counter.clone();
    let counter_b = counter.clone();

    let increment = async |store: PostgresDocumentStore, counter: DocRef| {
        run_transaction(&store, async |tx: &mut Transaction<'_, _>| {
            let doc: Option<serde_json::Value> = tx.get(&counter).await?;
            let n = doc.and_then(|d| d["n"].as_i64()).unwrap_or(0);
            tx.update(&counter, json!({"n": n + 1}))?;
            Ok::<_, DocStoreError>(())
        })
        .await
    };

    let (a, b) = tokio::join!(
        increment(store_a, counter_a),
        increment(store_b, counter_b)
    );
    assert!(a.is_ok(), "{a:?}");
    assert!(b.is_ok(), "{b:?}");

    let found: serde_json::Value = store.get_as(&counter).await.unwrap().unwrap();
    assert_eq!(found["n"], 2);
}

#[tokio::test]
#[serial_test::serial]
async fn transaction_abort_applies_nothing() {
    let store = get_test_store().await;
    store.set(&product("p1"), json!({"stock": 1})).await.unwrap();

    let result: Result<(), TransactionError<String>> =
        run_transaction(&store, async |tx: &mut Transaction<'_, _>| {
            tx.update(&product("p1"), json!({"stock": 0}))
                .map_err(|e| e.to_string())?;
            Err("oversold".to_string())
        })
        .await;

    assert!(matches!(result, Err(TransactionError::Aborted(_))));

    let found = store.get(&product("p1")).await.unwrap().unwrap();
    assert_eq!(found.data["stock"], 1);
}
