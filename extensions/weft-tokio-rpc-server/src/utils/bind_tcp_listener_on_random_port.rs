use std::io::Result;
use tokio::net::TcpListener;

/// Creates a `TcpListener` bound to a random available port on the local
/// loopback address (`127.0.0.1`).
///
/// Useful for tests and tools that need a guaranteed-free port without
/// manual configuration.
pub async fn bind_tcp_listener_on_random_port() -> Result<(TcpListener, u16)> {
    // Bind to port 0; the OS replaces it with an available ephemeral port.
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();

    Ok((listener, port))
}
