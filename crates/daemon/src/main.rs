// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Shuttlecraft Contributors

// Shuttlecraft - Daemon
// Supervises one sshuttle process per host and serves the control API

mod api;
mod config;
mod notifications;
#[cfg(unix)]
mod permissions;
mod pidfile;
mod process;
mod supervisor;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api::{create_router, AppState};
use config::{DaemonConfig, ListenerMode};
use supervisor::{Supervisor, SupervisorHandle};

/// How long shutdown waits for sshuttle to restore the firewall and exit
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shuttlecraftd=debug,shuttlecraft_common=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Shuttlecraft daemon starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let _pid_guard = pidfile::PidFileGuard::create()
        .context("Failed to create PID file - another daemon may already be running")?;

    let daemon_config = DaemonConfig::load()?;
    info!("Listener mode: {:?}", daemon_config.listener_mode);
    info!("sshuttle: {}", daemon_config.sshuttle_path.display());
    if !daemon_config.launcher.is_empty() {
        info!("Launcher: {}", daemon_config.launcher.join(" "));
    }

    let hosts_dir = shuttlecraft_common::hosts_dir()?;
    let hosts = shuttlecraft_common::load_all_hosts_from(&hosts_dir)?;
    info!("Loaded {} host(s) from {}", hosts.len(), hosts_dir.display());

    let supervisor = Supervisor::spawn(daemon_config.supervisor_config(), hosts);

    tokio::spawn(notifications::watch_events(
        supervisor.subscribe(),
        daemon_config.desktop_notifications,
    ));

    // Closes SSE streams on shutdown
    let (shutdown_tx, _) = tokio::sync::broadcast::channel(1);

    let state = Arc::new(AppState {
        supervisor: supervisor.clone(),
        hosts_dir,
        shutdown_tx: shutdown_tx.clone(),
    });
    let app = create_router(state).layer(TraceLayer::new_for_http());

    match daemon_config.listener_mode {
        ListenerMode::UnixSocket => {
            serve_unix_socket(app, &daemon_config, supervisor, shutdown_tx).await?;
        }
        ListenerMode::TcpHttp => {
            serve_tcp_http(app, &daemon_config.bind_address, supervisor, shutdown_tx).await?;
        }
    }

    info!("Daemon shut down");
    Ok(())
}

/// Serve on a Unix domain socket (local-only)
#[cfg(unix)]
async fn serve_unix_socket(
    app: axum::Router,
    daemon_config: &DaemonConfig,
    supervisor: SupervisorHandle,
    shutdown_tx: tokio::sync::broadcast::Sender<()>,
) -> Result<()> {
    use hyper_util::rt::TokioIo;
    use tokio::net::UnixListener;
    use tower::Service;
    use tracing::{debug, error};

    let socket_path = daemon_config.socket_path()?;

    if socket_path.exists() {
        std::fs::remove_file(&socket_path).context("Failed to remove existing socket file")?;
    }

    if let Some(parent) = socket_path.parent() {
        permissions::ensure_private_directory(parent)?;
    }

    let listener = UnixListener::bind(&socket_path).context(format!(
        "Failed to bind to socket: {}",
        socket_path.display()
    ))?;

    permissions::set_socket_permissions(&socket_path)?;

    info!("Daemon listening on Unix socket: {}", socket_path.display());
    info!("Daemon started successfully");

    let (shutdown_signal_tx, mut shutdown_rx) = tokio::sync::mpsc::channel::<()>(1);
    tokio::spawn(async move {
        shutdown_signal(supervisor, shutdown_tx).await;
        let _ = shutdown_signal_tx.send(()).await;
    });

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                info!("Shutting down server...");
                break;
            }

            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, _addr)) => {
                        let app = app.clone();

                        tokio::spawn(async move {
                            let stream = TokioIo::new(stream);

                            let hyper_service = hyper::service::service_fn(move |request: hyper::Request<hyper::body::Incoming>| {
                                let mut app = app.clone();
                                async move {
                                    app.call(request).await
                                }
                            });

                            if let Err(err) = hyper_util::server::conn::auto::Builder::new(hyper_util::rt::TokioExecutor::new())
                                .serve_connection_with_upgrades(stream, hyper_service)
                                .await
                            {
                                // `shuttle watch` interrupted with Ctrl+C lands here
                                let err_msg = err.to_string();
                                if err_msg.contains("connection closed") || err_msg.contains("Broken pipe") {
                                    debug!("Client disconnected: {}", err);
                                } else {
                                    error!("Error serving connection: {}", err);
                                }
                            }
                        });
                    }
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                    }
                }
            }
        }
    }

    if socket_path.exists() {
        let _ = std::fs::remove_file(&socket_path);
    }

    Ok(())
}

#[cfg(not(unix))]
async fn serve_unix_socket(
    _app: axum::Router,
    _daemon_config: &DaemonConfig,
    _supervisor: SupervisorHandle,
    _shutdown_tx: tokio::sync::broadcast::Sender<()>,
) -> Result<()> {
    anyhow::bail!("Unix socket mode is not supported on this platform; use tcp-http")
}

/// Serve plain HTTP on a loopback address
async fn serve_tcp_http(
    app: axum::Router,
    bind_address: &str,
    supervisor: SupervisorHandle,
    shutdown_tx: tokio::sync::broadcast::Sender<()>,
) -> Result<()> {
    info!("Daemon listening on TCP (HTTP): {}", bind_address);
    info!("Daemon started successfully");

    let listener = tokio::net::TcpListener::bind(bind_address)
        .await
        .context(format!("Failed to bind to {}", bind_address))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(supervisor, shutdown_tx))
        .await
        .context("TCP HTTP server error")?;

    Ok(())
}

/// Wait for a shutdown signal, stop every tunnel, then close the SSE streams
async fn shutdown_signal(
    supervisor: SupervisorHandle,
    shutdown_tx: tokio::sync::broadcast::Sender<()>,
) {
    wait_for_signal().await;

    if let Err(e) = supervisor.shutdown_all(SHUTDOWN_GRACE).await {
        tracing::warn!("Failed to stop tunnels: {}", e);
    }
    info!("All tunnels stopped");

    let _ = shutdown_tx.send(());
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("Received Ctrl+C, shutting down"),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                }
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
                info!("Received Ctrl+C, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("Received Ctrl+C, shutting down");
    }
}
