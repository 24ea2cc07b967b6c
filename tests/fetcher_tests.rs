use axum::{Router, http::StatusCode, routing::get};
use postsync::Post;
use postsync::config::IngestConfig;
use postsync::error::{ErrorKind, FetchError};
use postsync::ingest::{Fetch, HttpFetcher};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use url::Url;

async fn spawn_test_server(app: Router) -> Url {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    let base = Url::parse(&format!("http://{}", addr)).expect("valid base url");

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server run");
    });

    base
}

fn make_cfg(endpoint: Url) -> IngestConfig {
    IngestConfig {
        endpoint,
        progress_tick_ms: 20,
        request_timeout_secs: 5,
        ..IngestConfig::default()
    }
}

async fn fetch_with_progress(fetcher: &HttpFetcher) -> (Result<Vec<Post>, FetchError>, Vec<u8>) {
    let seen = Mutex::new(Vec::new());
    let sink = |value: u8| seen.lock().unwrap().push(value);
    let res = fetcher.fetch(&sink).await;
    (res, seen.into_inner().unwrap())
}

#[tokio::test]
async fn decodes_posts_and_reports_five_ticks() {
    let app = Router::new().route(
        "/posts",
        get(|| async {
            (
                StatusCode::OK,
                r#"[{"userId":1,"id":1,"title":"A","body":"x"},{"userId":1,"id":2,"title":"B","body":"y"}]"#,
            )
        }),
    );
    let base = spawn_test_server(app).await;
    let fetcher = HttpFetcher::new(&make_cfg(base.join("/posts").unwrap())).unwrap();

    let started = Instant::now();
    let (res, progress) = fetch_with_progress(&fetcher).await;

    assert_eq!(res.unwrap(), vec![Post::new(1, "A"), Post::new(2, "B")]);
    assert_eq!(progress, vec![20, 40, 60, 80, 100]);
    assert!(
        started.elapsed() >= Duration::from_millis(100),
        "five 20ms ticks should take at least 100ms, took {:?}",
        started.elapsed()
    );
}

#[tokio::test]
async fn malformed_body_is_a_decode_error_after_progress() {
    let app = Router::new().route("/posts", get(|| async { "<html>not json</html>" }));
    let base = spawn_test_server(app).await;
    let fetcher = HttpFetcher::new(&make_cfg(base.join("/posts").unwrap())).unwrap();

    let (res, progress) = fetch_with_progress(&fetcher).await;

    let err = res.unwrap_err();
    assert!(matches!(err, FetchError::Decode(_)), "unexpected error: {err:?}");
    assert_eq!(err.kind(), ErrorKind::Decode);
    assert_eq!(progress, vec![20, 40, 60, 80, 100]);
}

#[tokio::test]
async fn schema_mismatch_is_a_decode_error() {
    let app = Router::new().route(
        "/posts",
        get(|| async { r#"[{"id":"one","title":"A"}]"# }),
    );
    let base = spawn_test_server(app).await;
    let fetcher = HttpFetcher::new(&make_cfg(base.join("/posts").unwrap())).unwrap();

    let (res, _) = fetch_with_progress(&fetcher).await;
    assert_eq!(res.unwrap_err().kind(), ErrorKind::Decode);
}

#[tokio::test]
async fn non_success_status_is_a_transport_error_without_progress() {
    let app = Router::new().route(
        "/posts",
        get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "down") }),
    );
    let base = spawn_test_server(app).await;
    let fetcher = HttpFetcher::new(&make_cfg(base.join("/posts").unwrap())).unwrap();

    let (res, progress) = fetch_with_progress(&fetcher).await;

    let err = res.unwrap_err();
    assert!(
        matches!(err, FetchError::UpstreamStatus(StatusCode::SERVICE_UNAVAILABLE)),
        "unexpected error: {err:?}"
    );
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert!(progress.is_empty());
}

#[tokio::test]
async fn connection_refused_is_a_transport_error() {
    // Grab a free port, then close it so nothing is listening.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let endpoint = Url::parse(&format!("http://{}/posts", addr)).unwrap();
    let fetcher = HttpFetcher::new(&make_cfg(endpoint)).unwrap();

    let (res, progress) = fetch_with_progress(&fetcher).await;

    let err = res.unwrap_err();
    assert!(matches!(err, FetchError::Transport(_)), "unexpected error: {err:?}");
    assert!(progress.is_empty());
}

#[tokio::test]
async fn progress_sink_can_be_shared_across_tasks() {
    let app = Router::new().route("/posts", get(|| async { "[]" }));
    let base = spawn_test_server(app).await;
    let fetcher = Arc::new(HttpFetcher::new(&make_cfg(base.join("/posts").unwrap())).unwrap());

    let handle = tokio::spawn({
        let fetcher = fetcher.clone();
        async move { fetch_with_progress(&fetcher).await }
    });
    let (res, progress) = handle.await.unwrap();

    assert!(res.unwrap().is_empty());
    assert_eq!(progress.last(), Some(&100));
}
