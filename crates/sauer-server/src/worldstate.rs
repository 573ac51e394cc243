// worldstate.rs — per-tick batching builder, ≈30 Hz (§4.7).
// Converted from: the teacher's SV_SendClientMessages broadcast loop in
// sv_send.rs (per-client "everyone but me" framing), generalized from
// Quake2's per-client delta snapshot into position/message byte-range
// batching with bot-buffer merging and a demo-recording tee.

use std::rc::Rc;

use crate::types::Client;

pub const TICK_MILLIS: i64 = 33;

/// Byte range into a shared worldstate buffer (§4.7 step 2 `(offset,len)`).
#[derive(Debug, Clone, Copy)]
pub struct Range {
    pub offset: usize,
    pub len: usize,
}

/// A single tick's accumulated batch, shared (ref-counted) until every
/// outbound packet built from it is sent (§4.7 step 1).
pub struct Worldstate {
    pub positions: Vec<u8>,
    pub messages: Vec<u8>,
    pub position_ranges: Vec<(i32, Range)>,
    pub message_ranges: Vec<(i32, Range)>,
}

impl Worldstate {
    fn new() -> Self {
        Self { positions: Vec::new(), messages: Vec::new(), position_ranges: Vec::new(), message_ranges: Vec::new() }
    }
}

/// Builds one tick's worldstate from the clients' accumulated per-tick
/// buffers (§4.7 steps 1-3). Bots' buffers are folded into their owner's
/// range rather than given a separate range, since bots have no peer to
/// excuse from the echo. Takes an iterator rather than `&mut [Client]`
/// since `ClientRegistry`'s backing store is a sparse slot `Vec`, not a
/// contiguous slice.
pub fn build_worldstate<'a>(clients: impl Iterator<Item = &'a mut Client>) -> Rc<Worldstate> {
    let mut ws = Worldstate::new();
    let mut clients: Vec<&mut Client> = clients.collect();

    // First pass: humans get their own ranges.
    for client in clients.iter_mut() {
        if client.is_bot() {
            continue;
        }
        if !client.position_buf.is_empty() {
            let offset = ws.positions.len();
            ws.positions.extend_from_slice(&client.position_buf);
            ws.position_ranges.push((client.cn, Range { offset, len: client.position_buf.len() }));
            client.position_buf.clear();
        }
        if !client.message_buf.is_empty() {
            let offset = ws.messages.len();
            // Framed by Client(cn) + length prefix (§4.7 step 2).
            ws.messages.extend_from_slice(&client.cn.to_le_bytes());
            ws.messages.extend_from_slice(&(client.message_buf.len() as u32).to_le_bytes());
            ws.messages.extend_from_slice(&client.message_buf);
            ws.message_ranges.push((client.cn, Range { offset, len: ws.messages.len() - offset }));
            client.message_buf.clear();
        }
    }

    // Second pass: bots' buffers merge into their owner's existing range by
    // simple append (§4.7 step 3) — appended after the owner's own data so
    // offsets for the owner's original range remain valid.
    let owners: Vec<(i32, Vec<u8>, Vec<u8>)> = clients
        .iter_mut()
        .filter(|c| c.is_bot())
        .map(|bot| {
            let pos = std::mem::take(&mut bot.position_buf);
            let msg = std::mem::take(&mut bot.message_buf);
            (bot.owner, pos, msg)
        })
        .collect();

    for (owner, pos, msg) in owners {
        if !pos.is_empty() {
            let offset = ws.positions.len();
            ws.positions.extend_from_slice(&pos);
            extend_or_insert(&mut ws.position_ranges, owner, offset, pos.len());
        }
        if !msg.is_empty() {
            let offset = ws.messages.len();
            ws.messages.extend_from_slice(&owner.to_le_bytes());
            ws.messages.extend_from_slice(&(msg.len() as u32).to_le_bytes());
            ws.messages.extend_from_slice(&msg);
            extend_or_insert(&mut ws.message_ranges, owner, offset, ws.messages.len() - offset);
        }
    }

    Rc::new(ws)
}

fn extend_or_insert(ranges: &mut Vec<(i32, Range)>, owner: i32, new_offset: usize, new_len: usize) {
    if let Some((_, range)) = ranges.iter_mut().find(|(cn, _)| *cn == owner) {
        range.len = new_offset + new_len - range.offset;
    } else {
        ranges.push((owner, Range { offset: new_offset, len: new_len }));
    }
}

/// §4.7 step 6: the complement of `exclude_cn`'s own range — every other
/// client's positions/messages bytes for the tick.
pub fn complement_for(ws: &Worldstate, exclude_cn: i32, ranges: &[(i32, Range)], buf: &[u8]) -> Vec<u8> {
    let _ = ws;
    let mut out = Vec::new();
    for (cn, range) in ranges {
        if *cn == exclude_cn {
            continue;
        }
        out.extend_from_slice(&buf[range.offset..range.offset + range.len]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::IpAddr;

    fn client(cn: i32, owner: i32) -> Client {
        let mut c = Client::new(cn, IpAddr::from([0, 0, 0, 0]), 0, 0);
        c.owner = owner;
        c
    }

    #[test]
    fn human_buffers_get_their_own_range() {
        let mut clients = vec![client(0, 0), client(1, 1)];
        clients[0].position_buf = vec![1, 2, 3];
        clients[1].position_buf = vec![4, 5];
        let ws = build_worldstate(clients.iter_mut());
        assert_eq!(ws.positions, vec![1, 2, 3, 4, 5]);
        assert!(clients[0].position_buf.is_empty());
    }

    #[test]
    fn bot_buffer_merges_into_owner_range() {
        let mut clients = vec![client(0, 0), client(130, 0)];
        clients[0].position_buf = vec![9];
        clients[1].position_buf = vec![8];
        let ws = build_worldstate(clients.iter_mut());
        assert_eq!(ws.position_ranges.len(), 1);
        assert_eq!(ws.position_ranges[0].0, 0);
        assert_eq!(ws.positions, vec![9, 8]);
    }

    #[test]
    fn complement_excludes_self() {
        let mut clients = vec![client(0, 0), client(1, 1)];
        clients[0].position_buf = vec![1];
        clients[1].position_buf = vec![2];
        let ws = build_worldstate(clients.iter_mut());
        let comp = complement_for(&ws, 0, &ws.position_ranges, &ws.positions);
        assert_eq!(comp, vec![2]);
    }
}
