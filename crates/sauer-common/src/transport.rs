// transport.rs — reliable/unreliable channeled datagram transport
// Converted from: myq2-original/qcommon/net_chan.c (see myq2_common::net_chan
// for the single-reliable-stream ancestor this generalizes from).
//
// spec.md §4.2 asks for three independent channels (0 unreliable positions,
// 1 reliable messages, 2 bulk file transfers) instead of Quake2's one
// reliable + one unreliable stream, so each channel gets its own sequence
// counter and retransmit buffer — the teacher's netchan_need_reliable /
// netchan_transmit / netchan_process triad, run three times over.

use std::collections::HashMap;
use std::io;
use std::net::{SocketAddr, UdpSocket};

use socket2::{Domain, Socket, Type};

/// The three wire channels a peer negotiates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Position = 0,
    Message = 1,
    File = 2,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Position, Channel::Message, Channel::File];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Why a peer was disconnected. Surfaced to the peer (best-effort, via an
/// out-of-band print) and to the server log / IRC bridge (spec.md §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    EndOfPacket,
    BadClientNum,
    Kicked,
    BadTag,
    Banned,
    Private,
    Full,
    Timeout,
}

impl DisconnectReason {
    pub fn message(self) -> &'static str {
        match self {
            DisconnectReason::EndOfPacket => "end of packet",
            DisconnectReason::BadClientNum => "bad client number",
            DisconnectReason::Kicked => "kicked",
            DisconnectReason::BadTag => "bad tag",
            DisconnectReason::Banned => "banned",
            DisconnectReason::Private => "server is private",
            DisconnectReason::Full => "server full",
            DisconnectReason::Timeout => "timed out",
        }
    }
}

/// Per-channel sequence/ack/retransmit state for one peer, one channel.
/// Mirrors a single `NetChan`'s reliable bookkeeping.
#[derive(Debug, Clone, Default)]
struct ChannelState {
    outgoing_sequence: u32,
    incoming_sequence: u32,
    incoming_acknowledged: u32,

    reliable_sequence: bool,
    incoming_reliable_sequence: bool,
    incoming_reliable_acknowledged: bool,
    last_reliable_sequence: u32,

    reliable_buf: Vec<u8>,
    pending_unreliable: Vec<u8>,
}

impl ChannelState {
    fn need_reliable(&self) -> bool {
        if self.incoming_acknowledged > self.last_reliable_sequence
            && self.incoming_reliable_acknowledged != self.reliable_sequence
        {
            return true;
        }
        false
    }
}

/// Full channel state for one connected peer — embedded in the game-level
/// `Client` the way `myq2_common::qcommon::NetChan` is embedded in `client_t`.
pub struct PeerChannels {
    pub remote: SocketAddr,
    channels: [ChannelState; 3],
    pub last_received_millis: i64,
}

/// One fully-framed datagram ready to decode, or a control event.
pub enum Received {
    /// Payload bytes on a channel, already de-duplicated/reassembled.
    Payload { channel: Channel, bytes: Vec<u8> },
    /// A stale/duplicate/out-of-order packet; caller should ignore it.
    Stale,
}

const HEADER_LEN: usize = 1 + 1 + 4 + 4; // channel, flags, sequence, ack
const FLAG_RELIABLE: u8 = 0x01;
const FLAG_RELIABLE_ACK: u8 = 0x02;

impl PeerChannels {
    pub fn new(remote: SocketAddr, now_millis: i64) -> Self {
        Self {
            remote,
            channels: Default::default(),
            last_received_millis: now_millis,
        }
    }

    /// Build an outgoing packet for `channel`. If `reliable`, the bytes are
    /// queued for retransmission until acknowledged (mirrors
    /// `netchan_transmit`'s reliable-buffer handoff); unreliable bytes are
    /// sent once and dropped if they don't fit.
    pub fn build_packet(&mut self, channel: Channel, bytes: &[u8], reliable: bool) -> Vec<u8> {
        let idx = channel.index();
        if reliable && self.channels[idx].reliable_buf.is_empty() {
            self.channels[idx].reliable_buf = bytes.to_vec();
            self.channels[idx].reliable_sequence = !self.channels[idx].reliable_sequence;
        } else if reliable {
            // Previous reliable payload still unacked: append is not valid
            // for a stream-like reliable channel, so we coalesce by
            // overwriting — the caller is expected to wait for an ack
            // before sending the next reliable message on this channel
            // (spec.md §4.2's single outstanding reliable message per
            // channel, matching the teacher's one-reliable-message netchan).
            self.channels[idx].reliable_buf = bytes.to_vec();
        } else {
            self.channels[idx].pending_unreliable = bytes.to_vec();
        }

        let send_reliable = self.channels[idx].need_reliable() || reliable;
        let state = &mut self.channels[idx];

        state.outgoing_sequence += 1;
        let seq = state.outgoing_sequence;
        let ack = state.incoming_sequence;

        let mut flags = 0u8;
        if send_reliable {
            flags |= FLAG_RELIABLE;
        }
        if state.incoming_reliable_sequence {
            flags |= FLAG_RELIABLE_ACK;
        }

        let mut packet = Vec::with_capacity(HEADER_LEN + bytes.len());
        packet.push(idx as u8);
        packet.push(flags);
        packet.extend_from_slice(&seq.to_le_bytes());
        packet.extend_from_slice(&ack.to_le_bytes());

        if send_reliable {
            packet.extend_from_slice(&state.reliable_buf);
            state.last_reliable_sequence = seq;
        } else {
            packet.extend_from_slice(&state.pending_unreliable);
        }
        packet
    }

    /// Parse an inbound datagram, updating sequence/ack state. Returns the
    /// payload if this packet advances the stream, or `Stale` for a
    /// duplicate/out-of-order/short packet (discarded per spec.md §4.2).
    pub fn process_incoming(&mut self, raw: &[u8], now_millis: i64) -> Received {
        if raw.len() < HEADER_LEN {
            return Received::Stale;
        }
        let channel_tag = raw[0];
        if channel_tag as usize >= Channel::ALL.len() {
            return Received::Stale;
        }
        let channel = Channel::ALL[channel_tag as usize];
        let flags = raw[1];
        let sequence = u32::from_le_bytes([raw[2], raw[3], raw[4], raw[5]]);
        let ack = u32::from_le_bytes([raw[6], raw[7], raw[8], raw[9]]);

        let idx = channel.index();
        let state = &mut self.channels[idx];

        if sequence <= state.incoming_sequence && state.incoming_sequence != 0 {
            return Received::Stale;
        }

        let reliable_message = flags & FLAG_RELIABLE != 0;
        let reliable_ack = flags & FLAG_RELIABLE_ACK != 0;

        if reliable_ack == state.reliable_sequence {
            state.reliable_buf.clear();
        }

        state.incoming_sequence = sequence;
        state.incoming_acknowledged = ack;
        state.incoming_reliable_acknowledged = reliable_ack;
        if reliable_message {
            state.incoming_reliable_sequence = !state.incoming_reliable_sequence;
        }

        self.last_received_millis = now_millis;
        Received::Payload {
            channel,
            bytes: raw[HEADER_LEN..].to_vec(),
        }
    }
}

/// A non-blocking UDP socket wrapper, built via socket2 so broadcast/reuse
/// flags can be set the way `myq2-sys::net_udp` configures its sockets.
pub struct GameSocket {
    socket: UdpSocket,
}

impl GameSocket {
    pub fn bind(addr: SocketAddr, allow_broadcast: bool) -> io::Result<Self> {
        let domain = if addr.is_ipv6() { Domain::IPV6 } else { Domain::IPV4 };
        let sock = Socket::new(domain, Type::DGRAM, None)?;
        sock.set_reuse_address(true)?;
        sock.set_nonblocking(true)?;
        if allow_broadcast {
            sock.set_broadcast(true)?;
        }
        sock.bind(&addr.into())?;
        let socket: UdpSocket = sock.into();
        Ok(Self { socket })
    }

    /// Drain all currently-available datagrams without blocking.
    pub fn poll(&self) -> Vec<(SocketAddr, Vec<u8>)> {
        let mut out = Vec::new();
        let mut buf = [0u8; 8192];
        loop {
            match self.socket.recv_from(&mut buf) {
                Ok((n, from)) => out.push((from, buf[..n].to_vec())),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(_) => break,
            }
        }
        out
    }

    pub fn send_to(&self, bytes: &[u8], addr: SocketAddr) {
        let _ = self.socket.send_to(bytes, addr);
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

/// Registry mapping remote addresses to their per-peer channel state, for
/// the connectionless phase before a peer is promoted into the full client
/// registry (mirrors `svs.challenges` bookkeeping before `CONNECT`).
#[derive(Default)]
pub struct PeerRegistry {
    peers: HashMap<SocketAddr, PeerChannels>,
}

impl PeerRegistry {
    pub fn get_or_create(&mut self, addr: SocketAddr, now_millis: i64) -> &mut PeerChannels {
        self.peers.entry(addr).or_insert_with(|| PeerChannels::new(addr, now_millis))
    }

    pub fn remove(&mut self, addr: &SocketAddr) {
        self.peers.remove(addr);
    }

    pub fn get_mut(&mut self, addr: &SocketAddr) -> Option<&mut PeerChannels> {
        self.peers.get_mut(addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> SocketAddr {
        "127.0.0.1:28000".parse().unwrap()
    }

    #[test]
    fn unreliable_roundtrip() {
        let mut a = PeerChannels::new(addr(), 0);
        let mut b = PeerChannels::new(addr(), 0);

        let packet = a.build_packet(Channel::Position, b"pos-bytes", false);
        match b.process_incoming(&packet, 10) {
            Received::Payload { channel, bytes } => {
                assert_eq!(channel, Channel::Position);
                assert_eq!(bytes, b"pos-bytes");
            }
            Received::Stale => panic!("expected payload"),
        }
    }

    #[test]
    fn stale_duplicate_is_discarded() {
        let mut a = PeerChannels::new(addr(), 0);
        let mut b = PeerChannels::new(addr(), 0);

        let p1 = a.build_packet(Channel::Message, b"one", false);
        assert!(matches!(b.process_incoming(&p1, 0), Received::Payload { .. }));
        // Replay the same packet: sequence has not advanced, must be stale.
        assert!(matches!(b.process_incoming(&p1, 1), Received::Stale));
    }

    #[test]
    fn reliable_clears_after_ack() {
        let mut a = PeerChannels::new(addr(), 0);
        let mut b = PeerChannels::new(addr(), 0);

        let p1 = a.build_packet(Channel::Message, b"hello", true);
        assert!(a.channels[Channel::Message.index()].reliable_buf == b"hello");
        let _ = b.process_incoming(&p1, 0);

        // b's ack packet carries incoming_reliable_sequence back to a.
        let ack_packet = b.build_packet(Channel::Message, b"", false);
        let _ = a.process_incoming(&ack_packet, 1);
        assert!(a.channels[Channel::Message.index()].reliable_buf.is_empty());
    }
}
