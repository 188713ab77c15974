use std::sync::Arc;

use murmur_chat::app_state::AppState;
use murmur_chat::config::AppConfig;
use murmur_chat::database::init::init_store;
use murmur_chat::repositories::message_store::MessageStore;
use murmur_chat::routes::app_routes::create_router;
use murmur_chat::services::completion_service::CompletionClient;
use murmur_chat::services::message_service::MessageService;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

// The main entry point for the application using the tokio runtime.
#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return;
        }
    };

    let store = match init_store(&config.store).await {
        Ok(store) => store,
        Err(e) => {
            error!("Error initializing the message store: {}", e);
            return;
        }
    };

    if config.completion.api_key.is_none() {
        warn!("No completion API key configured; AI replies will fail");
    }
    let completer = Arc::new(CompletionClient::new(
        config.completion.clone(),
        config.bot_sender.clone(),
    ));

    let service = MessageService::new(
        store.clone(),
        completer,
        config.bot_sender.clone(),
        config.page_size,
        config.max_history,
    );
    let app = create_router(AppState::new(service));

    info!("Server running on http://{}", config.bind_addr);

    let served = axum::Server::bind(&config.bind_addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await;

    if let Err(e) = served {
        error!("Server error: {}", e);
    }

    store.close().await;
    info!("Message store closed");
}

// Resolves on Ctrl+C or SIGTERM so the server can drain in-flight requests.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Signal received, starting graceful shutdown");
}
