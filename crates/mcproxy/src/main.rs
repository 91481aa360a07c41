//! `mcproxyd`: the MCP smart proxy daemon.

mod bootstrap;
mod cli;

use clap::Parser;

use bootstrap::ExitCode;
use cli::Cli;

fn exit_code_for(err: &anyhow::Error) -> ExitCode {
    if let Some(domain_err) = err.downcast_ref::<mcproxy_domain::Error>() {
        return match domain_err {
            mcproxy_domain::Error::StoreLocked => ExitCode::DatabaseLocked,
            mcproxy_domain::Error::Config { .. } => ExitCode::ConfigError,
            _ => ExitCode::General,
        };
    }
    if let Some(io_err) = err.downcast_ref::<std::io::Error>() {
        return match io_err.kind() {
            std::io::ErrorKind::AddrInUse => ExitCode::PortConflict,
            std::io::ErrorKind::PermissionDenied => ExitCode::PermissionDenied,
            _ => ExitCode::General,
        };
    }
    ExitCode::General
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let daemon = match bootstrap::build(&cli).await {
        Ok(daemon) => daemon,
        Err(err) => {
            eprintln!("mcproxyd: failed to start: {err:#}");
            std::process::exit(exit_code_for(&err) as i32);
        }
    };

    let socket_path = daemon.state.config.current().socket_path();
    let unix_listener = match mcproxy_server::bind_unix_socket(&socket_path) {
        Ok(listener) => listener,
        Err(err) => {
            eprintln!("mcproxyd: failed to bind control socket at {}: {err}", socket_path.display());
            let code = if err.kind() == std::io::ErrorKind::PermissionDenied {
                ExitCode::PermissionDenied
            } else {
                ExitCode::General
            };
            std::process::exit(code as i32);
        }
    };
    tracing::info!(path = %socket_path.display(), "control socket bound");

    let tcp_listener = if let Some(addr) = &daemon.listen {
        match tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => Some(listener),
            Err(err) => {
                eprintln!("mcproxyd: failed to bind TCP listener on {addr}: {err}");
                let code = if err.kind() == std::io::ErrorKind::AddrInUse {
                    ExitCode::PortConflict
                } else {
                    ExitCode::General
                };
                std::process::exit(code as i32);
            }
        }
    } else {
        None
    };
    if let Some(listener) = &tcp_listener {
        tracing::info!(addr = %listener.local_addr().map(|a| a.to_string()).unwrap_or_default(), "tcp listener bound");
    }

    let router = daemon.router;
    let unix_router = router.clone();
    let unix_task = tokio::spawn(async move {
        if let Err(err) = mcproxy_server::serve_unix(unix_listener, unix_router).await {
            tracing::error!(error = %err, "unix control socket server stopped");
        }
    });

    let tcp_task = tcp_listener.map(|listener| {
        tokio::spawn(async move {
            if let Err(err) = mcproxy_server::serve_tcp(listener, router).await {
                tracing::error!(error = %err, "tcp server stopped");
            }
        })
    });

    tracing::info!(data_dir = %daemon.data_dir.display(), "mcproxyd ready");

    let shutdown_bus = daemon.state.bus.clone();
    let shutdown_version = daemon.state.version.clone();
    let shutdown_task = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("received shutdown signal");
            bootstrap::publish_system_activity(shutdown_bus.as_ref(), mcproxy_domain::entities::ActivityType::SystemStop, &shutdown_version)
                .await;
        }
        std::process::exit(0);
    });

    if let Some(tcp_task) = tcp_task {
        let _ = tokio::join!(unix_task, tcp_task, shutdown_task);
    } else {
        let _ = tokio::join!(unix_task, shutdown_task);
    }
}
