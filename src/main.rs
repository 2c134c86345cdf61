use std::{process::ExitCode, sync::Arc};

use recipe_api::{
    actions::users::{create_superuser, normalize_email},
    config::Config,
    error::{Error, ErrorKind},
    memory::MemoryStore,
    postgres::PgStore,
    routes::routes,
    store::Store,
};
use tokio::signal;

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Environment misconfigured: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = match config.database_url.as_deref() {
        Some(url) => {
            log::info!("Connecting to database...");
            match PgStore::connect(url, config.db_max_connections, config.db_connect_attempts).await
            {
                Ok(store) => match store.migrate().await {
                    Ok(()) => serve(Arc::new(store), &config).await,
                    Err(e) => Err(e),
                },
                Err(e) => Err(e),
            }
        }
        None => {
            log::warn!("DATABASE_URL not set, data lives in memory only");
            serve(Arc::new(MemoryStore::new()), &config).await
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("Server stopped: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn serve<S: Store>(store: Arc<S>, config: &Config) -> Result<(), Error> {
    if let Some((email, password)) = &config.superuser {
        bootstrap_superuser(&*store, email, password).await?;
    }

    let address = config.address();
    let (address, server) = warp::serve(routes(store))
        .try_bind_with_graceful_shutdown(address, shutdown_signal())
        .map_err(|e| ErrorKind::Internal.new(&format!("Failed to bind {address}: {e}")))?;

    log::info!("Server running on {address}");
    server.await;
    log::info!("Server shut down");

    Ok(())
}

async fn bootstrap_superuser<S: Store>(
    store: &S,
    email: &str,
    password: &str,
) -> Result<(), Error> {
    if store.get_user(&normalize_email(email)).await?.is_some() {
        log::debug!("Superuser {email} already exists");
        return Ok(());
    }

    let user = create_superuser(store, email, password).await?;
    log::info!("Created superuser {}", user.id);
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
        log::info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                log::info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                log::error!("Failed to install signal handler: {e}");
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
}
