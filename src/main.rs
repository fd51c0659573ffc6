use docsearch::{api, config, logging, processing::DocumentService};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() {
    let _log_guard = logging::init_tracing();
    let config = match config::init_config() {
        Ok(config) => config,
        Err(error) => {
            tracing::error!(error = %error, "Invalid configuration");
            std::process::exit(1);
        }
    };

    let service = match DocumentService::from_config(config) {
        Ok(service) => Arc::new(service),
        Err(error) => {
            tracing::error!(error = %error, "Failed to initialize document service");
            std::process::exit(1);
        }
    };
    let app = api::create_router(service, config.upload_body_limit);

    let (listener, port) = match bind_listener(config.server_port).await {
        Ok(bound) => bound,
        Err(error) => {
            tracing::error!(error = %error, "Failed to bind listener");
            std::process::exit(1);
        }
    };
    tracing::info!("Listening on http://0.0.0.0:{}", port);
    if let Err(error) = axum::serve(listener, app).await {
        tracing::error!(error = %error, "Server terminated");
        std::process::exit(1);
    }
}

async fn bind_listener(server_port: Option<u16>) -> Result<(TcpListener, u16), std::io::Error> {
    use std::net::Ipv4Addr;

    if let Some(port) = server_port {
        return TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
            .await
            .map(|listener| (listener, port));
    }

    const PORT_RANGE: std::ops::RangeInclusive<u16> = 8000..=8099;
    for port in PORT_RANGE {
        match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await {
            Ok(listener) => {
                tracing::debug!(port, "Bound server port");
                return Ok((listener, port));
            }
            Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
                tracing::debug!(port, "Port already in use; trying next");
                continue;
            }
            Err(err) => return Err(err),
        }
    }

    Err(std::io::Error::new(
        std::io::ErrorKind::AddrNotAvailable,
        "No available port found in range 8000-8099",
    ))
}
