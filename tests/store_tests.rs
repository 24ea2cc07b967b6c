use postsync::Post;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::fs;

fn temp_db(tag: &str) -> (std::path::PathBuf, String) {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before UNIX_EPOCH")
        .as_nanos();
    let mut path = std::env::temp_dir();
    path.push(format!(
        "postsync-store-{tag}-{}-{}.sqlite",
        std::process::id(),
        nanos
    ));
    let database_url = format!("sqlite:{}", path.display());
    (path, database_url)
}

async fn cleanup(path: &std::path::Path) {
    let wal_path = std::path::PathBuf::from(format!("{}-wal", path.to_string_lossy()));
    let shm_path = std::path::PathBuf::from(format!("{}-shm", path.to_string_lossy()));
    let _ = fs::remove_file(&wal_path).await;
    let _ = fs::remove_file(&shm_path).await;
    let _ = fs::remove_file(path).await;
}

fn sample(ids: std::ops::RangeInclusive<i64>) -> Vec<Post> {
    ids.map(|id| Post::new(id, format!("title {id}"))).collect()
}

#[tokio::test]
async fn fresh_store_reads_empty_without_creating_table() {
    let (path, database_url) = temp_db("fresh");
    let store = postsync::db::spawn(&database_url).await.unwrap();

    assert!(store.read_all().await.unwrap().is_empty());

    let pool = sqlx::SqlitePool::connect(&database_url).await.unwrap();
    let tables: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'posts'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(tables, 0, "read on a fresh store must not create the table");

    store.ensure_schema().await.unwrap();
    store.ensure_schema().await.unwrap();
    assert!(store.read_all().await.unwrap().is_empty());

    pool.close().await;
    store.stop();
    cleanup(&path).await;
}

#[tokio::test]
async fn upsert_all_writes_rows_in_id_order() {
    let (path, database_url) = temp_db("order");
    let store = postsync::db::spawn(&database_url).await.unwrap();

    let posts = vec![Post::new(3, "C"), Post::new(1, "A"), Post::new(2, "B")];
    store.upsert_all(&posts, Duration::ZERO, |_, _| true).await.unwrap();

    let rows = store.read_all().await.unwrap();
    assert_eq!(
        rows,
        vec![Post::new(1, "A"), Post::new(2, "B"), Post::new(3, "C")]
    );

    store.stop();
    cleanup(&path).await;
}

#[tokio::test]
async fn upsert_all_twice_is_idempotent() {
    let (path, database_url) = temp_db("idempotent");
    let store = postsync::db::spawn(&database_url).await.unwrap();
    let posts = sample(1..=10);

    store.upsert_all(&posts, Duration::ZERO, |_, _| true).await.unwrap();
    let once = store.read_all().await.unwrap();

    store.upsert_all(&posts, Duration::ZERO, |_, _| true).await.unwrap();
    let twice = store.read_all().await.unwrap();

    assert_eq!(once, twice);
    assert_eq!(twice.len(), 10);

    store.stop();
    cleanup(&path).await;
}

#[tokio::test]
async fn same_id_overwrites_title() {
    let (path, database_url) = temp_db("lww");
    let store = postsync::db::spawn(&database_url).await.unwrap();

    store
        .upsert_all(&[Post::new(1, "old"), Post::new(2, "keep")], Duration::ZERO, |_, _| true)
        .await
        .unwrap();
    store.upsert_all(&[Post::new(1, "new")], Duration::ZERO, |_, _| true).await.unwrap();

    let rows = store.read_all().await.unwrap();
    assert_eq!(rows, vec![Post::new(1, "new"), Post::new(2, "keep")]);

    store.stop();
    cleanup(&path).await;
}

#[tokio::test]
async fn failed_write_keeps_earlier_rows_and_skips_later_ones() {
    let (path, database_url) = temp_db("partial");
    let store = postsync::db::spawn(&database_url).await.unwrap();

    // Pre-existing row outside the batch.
    store.upsert(Post::new(100, "existing")).await.unwrap();

    // Reject id 5, the 5th write of a 10-record batch.
    let pool = sqlx::SqlitePool::connect(&database_url).await.unwrap();
    sqlx::query(
        "CREATE TRIGGER reject_post_5 BEFORE INSERT ON posts WHEN NEW.id = 5 \
         BEGIN SELECT RAISE(ABORT, 'rejected'); END",
    )
    .execute(&pool)
    .await
    .unwrap();

    let batch = sample(1..=10);
    let err = store.upsert_all(&batch, Duration::ZERO, |_, _| true).await.unwrap_err();
    assert!(
        matches!(err, postsync::error::StoreError::DatabaseError(_)),
        "unexpected error: {err:?}"
    );

    let ids: Vec<i64> = store
        .read_all()
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.id)
        .collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 100]);

    pool.close().await;
    store.stop();
    cleanup(&path).await;
}

#[tokio::test]
async fn rows_survive_store_restart() {
    let (path, database_url) = temp_db("restart");

    let store = postsync::db::spawn(&database_url).await.unwrap();
    store.upsert_all(&sample(1..=3), Duration::ZERO, |_, _| true).await.unwrap();
    store.stop();

    let reopened = postsync::db::spawn(&database_url).await.unwrap();
    assert_eq!(reopened.read_all().await.unwrap(), sample(1..=3));

    reopened.stop();
    cleanup(&path).await;
}

#[tokio::test]
async fn upsert_all_stops_where_the_hook_says_and_paces_each_write() {
    let (path, database_url) = temp_db("hook");
    let store = postsync::db::spawn(&database_url).await.unwrap();
    let batch = sample(1..=6);

    let mut seen = Vec::new();
    let started = Instant::now();
    let written = store
        .upsert_all(&batch, Duration::from_millis(30), |written, next| {
            seen.push((written, next.id));
            written < 3
        })
        .await
        .unwrap();

    assert_eq!(written, 3);
    assert_eq!(seen, vec![(0, 1), (1, 2), (2, 3), (3, 4)]);
    assert!(
        started.elapsed() >= Duration::from_millis(90),
        "3 writes at 30ms pacing finished in {:?}",
        started.elapsed()
    );
    assert_eq!(store.read_all().await.unwrap(), sample(1..=3));

    store.stop();
    cleanup(&path).await;
}
