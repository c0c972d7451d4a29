use daybook::components::backend::{AuthBackend, Backend, BackendClient};
use daybook::components::events::RemoteEventStore;
use daybook::components::session::Session;
use daybook::components::ComponentManager;
use daybook::config::Config;
use daybook::error::{component_error, Error};
use daybook::web::auth::{AuthConfig, AuthService};
use daybook::web::{self, AppState, WebSettings};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, RwLock};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::shutdown;

/// Initialize logging with environment-based configuration
pub fn init_logging() -> miette::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| Error::Other(format!("Failed to set up logging: {}", e)))?;

    Ok(())
}

/// Load and initialize the application config
pub async fn load_config() -> miette::Result<Arc<RwLock<Config>>> {
    match Config::load() {
        Ok(config) => Ok(Arc::new(RwLock::new(config))),
        Err(e) => {
            error!("Failed to load configuration: {:?}", e);
            Err(e.into())
        }
    }
}

/// Start the components and serve the web interface until a shutdown signal arrives
pub async fn start_server(config: Arc<RwLock<Config>>) -> miette::Result<()> {
    let (backend_client, settings, auth_config, bind, open_browser) = {
        let config_read = config.read().await;
        info!(
            "Using backend {} with month loading {:?}",
            config_read.backend_url, config_read.month_fetch
        );
        (
            BackendClient::new(&config_read)?,
            WebSettings::from_config(&config_read),
            AuthConfig::from_config(&config_read),
            format!("{}:{}", config_read.bind_address, config_read.port),
            config_read.open_browser,
        )
    };

    // Initialize component manager
    let mut component_manager = ComponentManager::new(Arc::clone(&config));

    // Register the token refresher, then the session actor that listens to it
    component_manager.register(Backend::new(backend_client.clone()));
    let auth: Arc<dyn AuthBackend> = backend_client.auth.clone();
    component_manager.register(Session::new(auth));

    component_manager.init_all().await?;

    let session = component_manager
        .get::<Session>("session")
        .ok_or_else(|| component_error("Session component is not registered"))?
        .require_handle()
        .await?;

    let state = AppState {
        session,
        events: Arc::new(RemoteEventStore::new(backend_client)),
        auth_service: Arc::new(AuthService::new(auth_config)),
        settings,
    };
    let app = web::router(state);

    let listener = TcpListener::bind(&bind).await.map_err(Error::from)?;
    let local_addr = listener.local_addr().map_err(Error::from)?;
    let url = format!("http://{}", local_addr);
    info!("Listening on {}", url);

    if open_browser {
        if let Err(e) = webbrowser::open(&url) {
            warn!("Could not open a browser: {}", e);
        }
    }

    // Create shutdown channel
    let (shutdown_send, shutdown_recv) = oneshot::channel();

    // Spawn signal handler task
    let shutdown_components = Arc::new(component_manager);
    tokio::spawn(async move {
        shutdown::handle_signals(shutdown_send, shutdown_components).await;
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = shutdown_recv.await;
            info!("Received shutdown signal, stopping web server...");
        })
        .await
        .map_err(Error::from)?;

    info!("Web server stopped");
    Ok(())
}
