use mimalloc::MiMalloc;
use postsync::ingest::{CycleEvent, HttpFetcher, IngestionController, trigger};
use std::{net::SocketAddr, sync::Arc};
use tokio::{net::TcpListener, signal, sync::broadcast::error::RecvError};
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cfg = &postsync::config::CONFIG;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cfg.basic.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_level(true)
                .with_target(false),
        )
        .init();

    info!(
        database_url = %cfg.basic.database_url,
        endpoint = %cfg.ingest.endpoint,
        proxy = %cfg.ingest.proxy.as_ref().map(|u| u.as_str()).unwrap_or("<none>"),
        loglevel = %cfg.basic.loglevel,
        trigger_interval_secs = cfg.ingest.trigger_interval_secs,
        save_pacing_ms = cfg.ingest.save_pacing_ms,
        listen_addr = %cfg.basic.listen_addr,
        listen_port = cfg.basic.listen_port,
        "postsync starting"
    );

    let store = postsync::db::spawn(&cfg.basic.database_url).await?;
    let fetcher = Arc::new(HttpFetcher::new(&cfg.ingest)?);
    let controller = IngestionController::new(fetcher, store.clone(), &cfg.ingest);

    tokio::spawn(render_events(controller.clone()));

    // Initial load, then the periodic trigger takes over.
    if let Err(busy) = controller.start_cycle() {
        debug!(phase = %busy.phase, "Initial load skipped");
    }
    let trigger = trigger::spawn(controller.clone(), cfg.ingest.trigger_interval());

    let state = postsync::server::PostsyncState::new(controller.clone());
    let app = postsync::server::postsync_router(state);

    let addr = SocketAddr::from((cfg.basic.listen_addr, cfg.basic.listen_port));
    let listener = TcpListener::bind(addr).await?;
    info!("Control API listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    trigger.stop().await;
    controller.join().await;
    store.stop();
    info!("postsync has shut down gracefully.");
    Ok(())
}

/// Log what a GUI would render: status line, progress, and the stored rows after each cycle.
async fn render_events(controller: IngestionController) {
    let mut events = controller.subscribe();
    loop {
        match events.recv().await {
            Ok(CycleEvent::PhaseChanged(phase)) => {
                info!(phase = %phase, "Status: {}", phase.status_text());
            }
            Ok(CycleEvent::ProgressChanged(value)) => {
                debug!(progress = value, "Progress");
            }
            Ok(CycleEvent::CycleCompleted(posts)) => {
                info!(fetched = posts.len(), "Cycle completed, reloading stored posts");
                match controller.store().read_all().await {
                    Ok(rows) => rows.iter().for_each(|row| info!("{row}")),
                    Err(e) => warn!(error = %e, "Failed to read stored posts"),
                }
            }
            Ok(CycleEvent::CycleFailed(failure)) => {
                warn!(kind = ?failure.kind, "Cycle failed: {}", failure.message);
            }
            Ok(CycleEvent::Deferred(phase)) => {
                debug!(phase = %phase, "Trigger tick deferred");
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Event renderer lagged behind");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
