//! TCP socket tuning for the game port.
//!
//! Game traffic is many small frames, so every accepted stream gets
//! TCP_NODELAY plus keepalive probes to reap silently dead links before the
//! protocol-level ping does. The listener itself is built through `socket2`
//! for `SO_REUSEADDR` and dual-stack IPv6.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use socket2::{SockRef, TcpKeepalive};
use tokio::net::{TcpListener, TcpStream};

/// Socket options applied to the listener and every accepted stream.
#[derive(Debug, Clone)]
pub struct SocketConfig {
    /// Disable Nagle's algorithm. Default: true.
    pub tcp_nodelay: bool,
    /// Enable TCP keepalive. Default: true.
    pub keepalive_enabled: bool,
    /// Idle time before the first keepalive probe. Default: 60s.
    pub keepalive_idle: Duration,
    /// Interval between keepalive probes. Default: 10s.
    pub keepalive_interval: Duration,
    /// Probes before the connection is declared dead. Default: 3.
    pub keepalive_retries: u32,
    /// Set `SO_REUSEADDR` on the listener. Default: true except on Windows.
    pub reuse_addr: bool,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            tcp_nodelay: true,
            keepalive_enabled: true,
            keepalive_idle: Duration::from_secs(60),
            keepalive_interval: Duration::from_secs(10),
            keepalive_retries: 3,
            reuse_addr: !cfg!(target_os = "windows"),
        }
    }
}

/// Apply the per-connection options to an accepted [`TcpStream`].
pub fn configure_stream(stream: &TcpStream, config: &SocketConfig) -> std::io::Result<()> {
    stream.set_nodelay(config.tcp_nodelay)?;

    if config.keepalive_enabled {
        let sock_ref = SockRef::from(stream);
        let keepalive = TcpKeepalive::new()
            .with_time(config.keepalive_idle)
            .with_interval(config.keepalive_interval);

        // Retry count is settable on Linux and Windows but not macOS.
        #[cfg(any(target_os = "linux", target_os = "windows"))]
        let keepalive = keepalive.with_retries(config.keepalive_retries);

        sock_ref.set_tcp_keepalive(&keepalive)?;
    }

    Ok(())
}

/// Build the game listener with `SO_REUSEADDR`, dual-stack IPv6 when the
/// address is IPv6, and non-blocking mode set before the bind.
pub async fn create_listener(
    addr: SocketAddr,
    config: &SocketConfig,
) -> std::io::Result<TcpListener> {
    let domain = if addr.is_ipv6() {
        socket2::Domain::IPV6
    } else {
        socket2::Domain::IPV4
    };
    let socket = socket2::Socket::new(
        domain,
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    if config.reuse_addr {
        socket.set_reuse_address(true)?;
    }

    // An IPv6 listener also takes IPv4 clients unless IPV6_ONLY is on.
    if addr.is_ipv6() {
        socket.set_only_v6(false)?;
    }

    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(128)?;

    let std_listener: std::net::TcpListener = socket.into();
    TcpListener::from_std(std_listener)
}

/// Combine the configured bind address string with the game port.
///
/// Accepts a bare IP, IPv4 or IPv6, as the config stores it.
pub fn resolve_bind_address(address: &str, port: u16) -> std::io::Result<SocketAddr> {
    let ip: IpAddr = address.parse().map_err(|_| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("bad bind address {address:?}"),
        )
    })?;
    Ok(SocketAddr::new(ip, port))
}
