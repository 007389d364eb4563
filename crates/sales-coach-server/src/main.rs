use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

use sales_coach_server::config::{Settings, StorageBackendKind};
use sales_coach_server::logging::init_logger;
use sales_coach_server::router::build_router;
use sales_coach_server::services::session::{DbPool, MemoryBackend, PostgresBackend};
use sales_coach_server::services::{
    ChatService, FinalizeWorkflow, LlmService, SessionStore, StateBackend, WorkflowRunner,
};
use sales_coach_server::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load()?;
    let _log_guard = init_logger(&settings.logging)?;

    info!("🚀 Starting Sales Coach Server...");
    info!("✅ Configuration loaded");

    let mut db_pool = None;
    let backend: Arc<dyn StateBackend> = match settings.storage.backend {
        StorageBackendKind::Memory => {
            info!("Using in-memory session storage");
            Arc::new(MemoryBackend::new())
        }
        StorageBackendKind::Postgres => {
            let pool = DbPool::new(&settings.storage).await?;
            info!("✅ Database connection established");

            let backend = PostgresBackend::new(pool.clone());
            backend.migrate().await?;
            db_pool = Some(pool);
            Arc::new(backend)
        }
    };

    let store = Arc::new(SessionStore::new(backend));

    let llm_service = Arc::new(LlmService::new(settings.llm.clone())?);
    info!("✅ LLM client ready: model={}", llm_service.model());

    let chat_service = Arc::new(ChatService::new(
        store.clone(),
        llm_service.clone(),
        settings.chat.clone(),
    ));

    let workflow = Arc::new(FinalizeWorkflow::new(store.clone(), llm_service));
    let workflow_runner = Arc::new(WorkflowRunner::start(workflow, &settings.workflow));

    let app = build_router(AppState {
        store,
        chat_service,
        workflow_runner: workflow_runner.clone(),
    });

    let addr = SocketAddr::from((
        settings.server.host.parse::<std::net::IpAddr>()?,
        settings.server.port,
    ));

    info!("🎯 Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped, draining finalization queue...");

    workflow_runner.shutdown().await;

    if let Some(pool) = db_pool {
        pool.close().await;
    }

    info!("👋 Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
