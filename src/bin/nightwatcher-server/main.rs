mod args;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use args::Args;
use clap::Parser as _;
use nightwatcher::{
    auth::CredentialHandle,
    config::{build_authenticator, reload_credentials},
    db::{PgReadingStore, new_pool},
    http::{AppState, router},
    store::ReadingStore as _,
};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run().await {
        eprintln!("{e:#}");
        return ExitCode::from(1);
    }

    ExitCode::from(0)
}

async fn run() -> Result<()> {
    let args = Args::parse();

    let pool = new_pool(&args.database_url, args.db_max_connections).await?;

    let store = PgReadingStore::new(pool.clone());
    store
        .ensure_schema()
        .await
        .context("failed to ensure reading schema")?;

    let auth = build_authenticator(&args.auth_config(), &pool).await?;

    if let (Some(handle), Some(path)) = (auth.credentials.clone(), args.credentials_file.clone()) {
        spawn_credential_reloader(handle, path)?;
    }

    let app = router(AppState {
        store: Arc::new(store),
        authenticator: auth.authenticator,
    });

    let listener = bind_listener(args.listen).await?;
    tracing::info!(addr = %args.listen, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server failed")?;

    pool.close().await;
    Ok(())
}

async fn bind_listener(addr: SocketAddr) -> Result<TcpListener> {
    match TcpListener::bind(addr).await {
        Ok(listener) => Ok(listener),
        Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
            anyhow::bail!(
                "failed to bind {addr}: port already in use. Stop the other service or pass --listen with another address."
            );
        }
        Err(err) => Err(err).with_context(|| format!("failed to bind {addr}")),
    }
}

#[cfg(unix)]
fn spawn_credential_reloader(handle: CredentialHandle, path: PathBuf) -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangups = signal(SignalKind::hangup()).context("failed to install SIGHUP handler")?;

    tokio::spawn(async move {
        while hangups.recv().await.is_some() {
            match reload_credentials(&handle, &path) {
                Ok(()) => tracing::info!(
                    path = %path.display(),
                    username = %handle.username(),
                    "reloaded credentials"
                ),
                Err(err) => tracing::warn!(
                    path = %path.display(),
                    "failed to reload credentials; keeping previous pair: {err:#}"
                ),
            }
        }
    });

    Ok(())
}

#[cfg(not(unix))]
fn spawn_credential_reloader(_handle: CredentialHandle, path: PathBuf) -> Result<()> {
    tracing::warn!(path = %path.display(), "credential reload on SIGHUP is not supported on this platform");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for ctrl-c: {err}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
