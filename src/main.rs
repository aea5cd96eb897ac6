// HTTP handlers, grouped per area
mod routes_highlights; // Daily highlight planning, review and reflection
mod routes_sync; // Sync state, export / import / reset
mod routes_tasks; // Bucket tasks, settings and bucket names

use std::sync::Arc;

use anyhow::Context;
use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use highlight_planner::clock::{Clock, SystemClock};
use highlight_planner::config::Config;
use highlight_planner::planner::Planner;
use highlight_planner::remote::{FsRemote, RemoteStore};
use highlight_planner::store::LocalStore;
use highlight_planner::sync::{SyncEngine, SyncOptions};

pub struct AppState {
    pub planner: Planner,
}

pub type SharedState = Arc<AppState>;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("highlight_planner=info,tower_http=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn router(state: SharedState) -> Router {
    let api = Router::new()
        // tasks
        .route("/tasks", get(routes_tasks::get_tasks).post(routes_tasks::create_task))
        .route("/tasks/:id", put(routes_tasks::update_task).delete(routes_tasks::delete_task))
        .route("/tasks/:id/archive", post(routes_tasks::archive_task))
        // settings & bucket names
        .route("/settings", get(routes_tasks::get_settings).put(routes_tasks::put_settings))
        .route("/bucket-names", get(routes_tasks::get_bucket_names))
        .route("/bucket-names/:bucket", put(routes_tasks::put_bucket_name))
        // highlights
        .route(
            "/highlights",
            get(routes_highlights::get_highlights)
                .put(routes_highlights::upsert_highlight)
                .post(routes_highlights::create_highlight),
        )
        .route("/highlights/active", get(routes_highlights::get_active))
        .route("/highlights/overdue", get(routes_highlights::get_overdue))
        .route("/highlights/by-date/:date", get(routes_highlights::get_by_date))
        .route(
            "/highlights/:id",
            put(routes_highlights::update_highlight).delete(routes_highlights::delete_highlight),
        )
        .route("/highlights/:id/completion", post(routes_highlights::set_completion))
        .route("/highlights/:id/not-done", post(routes_highlights::mark_not_done))
        .route("/highlights/:id/keep", post(routes_highlights::keep_for_tomorrow))
        .route(
            "/highlights/:id/review",
            post(routes_highlights::mark_reviewed).delete(routes_highlights::unmark_reviewed),
        )
        .route("/reflect", get(routes_highlights::get_reflection))
        // sync & data
        .route("/sync", get(routes_sync::get_sync).post(routes_sync::force_resync))
        .route("/export", get(routes_sync::export_all))
        .route("/import", post(routes_sync::import_all))
        .route("/reset", post(routes_sync::reset_all))
        .with_state(state);

    Router::new().nest("/api", api).layer(TraceLayer::new_for_http())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "could not listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = Config::load().context("failed to load configuration")?;
    let store = Arc::new(
        LocalStore::open(&config.data_dir)
            .with_context(|| format!("failed to open data dir {}", config.data_dir.display()))?,
    );
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let remote: Option<Arc<dyn RemoteStore>> = match config.sync.remote_dir() {
        Some(dir) => {
            let session = config.data_dir.join("session.json");
            let remote = FsRemote::open(dir, session, config.sync.provision_bucket_names)
                .await
                .with_context(|| format!("failed to open remote dir {}", dir.display()))?;
            Some(Arc::new(remote) as Arc<dyn RemoteStore>)
        }
        None => None,
    };

    let sync = Arc::new(SyncEngine::new(
        Arc::clone(&store),
        remote,
        SyncOptions { shared_mode: config.sync.shared_mode },
        Arc::clone(&clock),
    ));

    // bootstrap once, then re-sync periodically
    if sync.is_configured() {
        let engine = Arc::clone(&sync);
        let interval = config.sync.resync_interval();
        tokio::spawn(async move {
            engine.initialize(false).await;
            let Some(period) = interval else {
                return;
            };
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                engine.force_resync().await;
            }
        });
    }

    let state = Arc::new(AppState {
        planner: Planner::new(store, Arc::clone(&sync), clock),
    });
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;

    tracing::info!(addr = %config.bind, data_dir = %config.data_dir.display(), "server running");
    tracing::info!("API base: http://{}/api", config.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    sync.flush().await;
    tracing::info!("pending remote writes flushed, bye");
    Ok(())
}
