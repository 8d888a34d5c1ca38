//! Reusable broadcast UDP sockets.
//!
//! The scan socket and the command socket both bind the discovery port, so
//! SO_REUSEADDR (and SO_REUSEPORT on unix) must be set before binding.

use socket2::{Domain, Protocol, Socket, Type};
use std::net::{Ipv4Addr, SocketAddr};

/// Create a non-blocking, broadcast-enabled UDP socket bound to
/// `0.0.0.0:port`.
pub fn create_reusable_socket(
    port: u16,
    recv_buffer_size: Option<usize>,
) -> Result<std::net::UdpSocket, std::io::Error> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;

    socket.set_reuse_address(true)?;

    #[cfg(unix)]
    socket.set_reuse_port(true)?;

    socket.set_broadcast(true)?;

    if let Some(size) = recv_buffer_size {
        // Best effort: the OS may clamp or refuse the request.
        if let Err(e) = socket.set_recv_buffer_size(size) {
            tracing::debug!("Could not set receive buffer to {} bytes: {}", size, e);
        }
    }

    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    socket.bind(&addr.into())?;

    socket.set_nonblocking(true)?;

    Ok(socket.into())
}
