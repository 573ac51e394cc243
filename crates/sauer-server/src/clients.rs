// clients.rs — client registry: connect/auth, session-ID assignment,
// bot-handle namespace (§3, §4.9 Open Question #1).
// Converted from: the teacher's ServerStatic.clients slot array and
// Challenge table in server.rs, generalized from a fixed-size slot array
// with a parallel challenge table to a slot `Vec` plus a random 24-bit
// session token handed out at connect time — spec.md §9 explicitly asks
// that the legacy biased session-id formula not be reproduced.

use std::net::IpAddr;

use rand::Rng;

use sauer_common::types::MAXCLIENTS_BOT_OFFSET;

use crate::types::{Client, GameState, SavedScore};

/// Slots for human clients plus bot slots offset by `MAXCLIENTS` (§3:
/// "bot handles live in a separate namespace offset by MAXCLIENTS").
pub struct ClientRegistry {
    slots: Vec<Option<Client>>,
    saved_scores: Vec<SavedScore>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self { slots: Vec::new(), saved_scores: Vec::new() }
    }

    fn ensure_capacity(&mut self, cn: usize) {
        if self.slots.len() <= cn {
            self.slots.resize_with(cn + 1, || None);
        }
    }

    /// Picks the lowest free human slot in `0..MAXCLIENTS`, or `None` if full.
    fn next_free_human_slot(&self) -> Option<usize> {
        (0..crate::types::MAXCLIENTS).find(|&cn| matches!(self.slots.get(cn), None | Some(None)))
    }

    fn next_free_bot_slot(&self) -> usize {
        let mut cn = MAXCLIENTS_BOT_OFFSET as usize;
        while matches!(self.slots.get(cn), Some(Some(_))) {
            cn += 1;
        }
        cn
    }

    /// §4.3/§9: connection accept. Returns the new client's `cn`, or `None`
    /// if the human-slot pool is full.
    pub fn connect_human(&mut self, ip: IpAddr, connect_millis: i64) -> Option<i32> {
        let cn = self.next_free_human_slot()?;
        self.ensure_capacity(cn);
        let session_id = random_session_id();
        self.slots[cn] = Some(Client::new(cn as i32, ip, session_id, connect_millis));
        Some(cn as i32)
    }

    /// Bot connections (owner is assigned by the caller once the owning
    /// human's cn is known; `owner` defaults to its own cn until set).
    pub fn connect_bot(&mut self, owner: i32, connect_millis: i64) -> i32 {
        let cn = self.next_free_bot_slot();
        self.ensure_capacity(cn);
        let session_id = random_session_id();
        let mut client = Client::new(cn as i32, IpAddr::from([0, 0, 0, 0]), session_id, connect_millis);
        client.owner = owner;
        self.slots[cn] = Some(client);
        cn as i32
    }

    pub fn get(&self, cn: i32) -> Option<&Client> {
        self.slots.get(cn as usize)?.as_ref()
    }

    pub fn get_mut(&mut self, cn: i32) -> Option<&mut Client> {
        self.slots.get_mut(cn as usize)?.as_mut()
    }

    /// §3: disconnect destroys the slot after saving score (by `(ip, name)`).
    pub fn disconnect(&mut self, cn: i32) {
        if let Some(slot) = self.slots.get_mut(cn as usize) {
            if let Some(client) = slot.take() {
                self.save_score(&client);
            }
        }
    }

    fn save_score(&mut self, client: &Client) {
        let score = SavedScore {
            ip: client.ip,
            name: client.name.clone(),
            frags: client.game.frags,
            deaths: client.game.deaths,
            teamkills: client.game.teamkills,
            shotdamage: client.game.shotdamage,
            damage_received: client.game.damage_received,
        };
        self.saved_scores.retain(|s| !(s.ip == score.ip && s.name == score.name));
        self.saved_scores.push(score);
    }

    /// §42 "SavedScore": restored if the same `(ip, name)` reconnects within
    /// the match.
    pub fn take_saved_score(&mut self, ip: IpAddr, name: &str) -> Option<SavedScore> {
        let pos = self.saved_scores.iter().position(|s| s.ip == ip && s.name == name)?;
        Some(self.saved_scores.remove(pos))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Client> {
        self.slots.iter().filter_map(|s| s.as_ref())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Client> {
        self.slots.iter_mut().filter_map(|s| s.as_mut())
    }

    pub fn count_connected(&self) -> usize {
        self.iter().filter(|c| c.connected).count()
    }

    /// Two distinct clients' `GameState`s, borrowed disjointly so a death
    /// handler can mutate actor and target in the same call (§4.4). Panics
    /// if `cn_a == cn_b` or either slot is unoccupied — callers must check
    /// connectivity first.
    pub fn get_pair_mut(&mut self, cn_a: i32, cn_b: i32) -> (&mut GameState, &mut GameState) {
        assert_ne!(cn_a, cn_b, "get_pair_mut requires distinct client numbers");
        let (idx_a, idx_b) = (cn_a as usize, cn_b as usize);
        if idx_a < idx_b {
            let (left, right) = self.slots.split_at_mut(idx_b);
            let a = &mut left[idx_a].as_mut().expect("cn_a must be connected").game;
            let b = &mut right[0].as_mut().expect("cn_b must be connected").game;
            (a, b)
        } else {
            let (left, right) = self.slots.split_at_mut(idx_a);
            let b = &mut left[idx_b].as_mut().expect("cn_b must be connected").game;
            let a = &mut right[0].as_mut().expect("cn_a must be connected").game;
            (a, b)
        }
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn random_session_id() -> u32 {
    rand::thread_rng().gen_range(0..=0xFF_FFFFu32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_assigns_lowest_free_slot() {
        let mut reg = ClientRegistry::new();
        let a = reg.connect_human([127, 0, 0, 1].into(), 0).unwrap();
        let b = reg.connect_human([127, 0, 0, 2].into(), 0).unwrap();
        assert_eq!(a, 0);
        assert_eq!(b, 1);
        reg.disconnect(a);
        let c = reg.connect_human([127, 0, 0, 3].into(), 0).unwrap();
        assert_eq!(c, 0);
    }

    #[test]
    fn bot_slots_are_offset_from_humans() {
        let mut reg = ClientRegistry::new();
        let human = reg.connect_human([127, 0, 0, 1].into(), 0).unwrap();
        let bot = reg.connect_bot(human, 0);
        assert!(bot >= MAXCLIENTS_BOT_OFFSET);
        assert_eq!(reg.get(bot).unwrap().owner, human);
        assert!(reg.get(bot).unwrap().is_bot());
    }

    #[test]
    fn disconnect_saves_and_restores_score() {
        let mut reg = ClientRegistry::new();
        let ip = [10, 0, 0, 1].into();
        let cn = reg.connect_human(ip, 0).unwrap();
        reg.get_mut(cn).unwrap().name = "alice".to_string();
        reg.get_mut(cn).unwrap().game.frags = 7;
        reg.disconnect(cn);
        let restored = reg.take_saved_score(ip, "alice").unwrap();
        assert_eq!(restored.frags, 7);
        assert!(reg.take_saved_score(ip, "alice").is_none());
    }

    #[test]
    fn get_pair_mut_borrows_both_orders_disjointly() {
        let mut reg = ClientRegistry::new();
        let a = reg.connect_human([127, 0, 0, 1].into(), 0).unwrap();
        let b = reg.connect_human([127, 0, 0, 2].into(), 0).unwrap();
        {
            let (ga, gb) = reg.get_pair_mut(a, b);
            ga.frags = 1;
            gb.frags = 2;
        }
        {
            let (gb, ga) = reg.get_pair_mut(b, a);
            assert_eq!(gb.frags, 2);
            assert_eq!(ga.frags, 1);
        }
    }

    #[test]
    fn session_ids_are_bounded_24_bits() {
        for _ in 0..100 {
            assert!(random_session_id() <= 0xFF_FFFF);
        }
    }
}
