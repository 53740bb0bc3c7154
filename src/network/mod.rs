use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tracing::info;

/// Larger receive buffer so bursts of TS datagrams survive a slow poll
const RECV_BUFFER_SIZE: usize = 4 * 1024 * 1024;

/// Binds a UDP socket for TS reception, joining the group when `addr`
/// is multicast, and hands it to tokio
pub fn create_udp_socket(addr: SocketAddr) -> anyhow::Result<UdpSocket> {
    let ip = match addr.ip() {
        IpAddr::V4(v4) => v4,
        _ => anyhow::bail!("only IPv4 is supported"),
    };

    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.set_recv_buffer_size(RECV_BUFFER_SIZE)?;
    socket.bind(&addr.into())?;

    if ip.is_multicast() {
        socket.join_multicast_v4(&ip, &Ipv4Addr::UNSPECIFIED)?;
        info!(group = %ip, port = addr.port(), "joined multicast group");
    } else {
        info!(%addr, "listening for TS datagrams");
    }

    socket.set_nonblocking(true)?;
    Ok(UdpSocket::from_std(socket.into())?)
}
