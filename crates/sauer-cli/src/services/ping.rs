// services/ping.rs — server-info ping + LAN broadcast info (§6 "Server-info
// ping"/"LAN info"). Converted from: the teacher's `socket2`-configured
// broadcast UdpSocket setup in `myq2-sys::net_udp`, reused here for a
// dedicated info-reply socket on `port+1` instead of the game channel.

use std::net::UdpSocket;

use socket2::{Domain, Socket, Type};

/// Effective mastermode as surfaced to pinging clients (§6: "promoted to
/// Password or Auth pseudo-values as appropriate").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectiveMastermode {
    Open,
    Veto,
    Locked,
    Private,
    Password,
    Auth,
}

pub struct ServerInfo<'a> {
    pub num_clients: usize,
    pub protocol_version: i32,
    pub mode: &'a str,
    pub minutes_remaining: i32,
    pub max_clients: usize,
    pub mastermode: EffectiveMastermode,
    pub map_name: &'a str,
    pub description: &'a str,
}

/// Builds the space-delimited reply payload sent back to an info ping.
pub fn build_reply(info: &ServerInfo) -> String {
    format!(
        "{} {} {} {} {} {} {} {}",
        info.num_clients,
        info.protocol_version,
        info.mode,
        info.minutes_remaining,
        info.max_clients,
        info.mastermode as u8 as i32,
        info.map_name,
        info.description
    )
}

pub fn bind_info_socket(bind_addr: std::net::SocketAddr) -> std::io::Result<UdpSocket> {
    let socket = Socket::new(Domain::for_address(bind_addr), Type::DGRAM, None)?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&bind_addr.into())?;
    Ok(socket.into())
}

pub fn bind_lan_broadcast_socket(port: u16) -> std::io::Result<UdpSocket> {
    let addr: std::net::SocketAddr = ([0, 0, 0, 0], port).into();
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, None)?;
    socket.set_reuse_address(true)?;
    socket.set_broadcast(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    Ok(socket.into())
}
