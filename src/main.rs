use std::net::Ipv4Addr;
use std::sync::Arc;
use studymentor::{api, config, logging, processing::RagService};
use tokio::net::TcpListener;

/// Ports scanned when `SERVER_PORT` is not set.
const FALLBACK_PORTS: std::ops::RangeInclusive<u16> = 8000..=8099;

#[tokio::main]
async fn main() {
    config::init_config();
    logging::init_tracing();

    let service = Arc::new(RagService::new().await);
    let app = api::create_router(service);

    let (listener, port) = bind_listener().await.expect("Failed to bind listener");
    tracing::info!(port, "Study mentor backend listening");
    axum::serve(listener, app).await.unwrap();
}

async fn bind_listener() -> Result<(TcpListener, u16), std::io::Error> {
    if let Some(port) = config::get_config().server_port {
        let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await?;
        return Ok((listener, port));
    }

    for port in FALLBACK_PORTS {
        match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await {
            Ok(listener) => {
                tracing::debug!(port, "Bound server port");
                return Ok((listener, port));
            }
            Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => continue,
            Err(err) => return Err(err),
        }
    }

    Err(std::io::Error::new(
        std::io::ErrorKind::AddrNotAvailable,
        format!(
            "no available port in {}-{}",
            FALLBACK_PORTS.start(),
            FALLBACK_PORTS.end()
        ),
    ))
}
