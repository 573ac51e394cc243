// items.rs — item/entity engine (§4.5).
// Converted from: the teacher's edict array iteration pattern in sv_ents.rs
// (dense slot vector indexed by entity number), generalized from Quake2's
// physics-driven respawn to the fixed-band countdown timer this game's item
// table uses instead.

use rand::Rng;

use crate::types::ServerEntity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Ammo,
    Health,
    Armour,
    Boost,
    Quad,
}

impl ItemKind {
    fn from_type(item_type: u8) -> Self {
        match item_type {
            0..=3 => ItemKind::Ammo,
            4 => ItemKind::Health,
            5 => ItemKind::Armour,
            6 => ItemKind::Boost,
            7 => ItemKind::Quad,
            _ => ItemKind::Ammo,
        }
    }
}

/// Player-count band (§4.5: "capped into bands: np≤2→2, 3→3, 4→4").
fn player_band(np: usize) -> i64 {
    match np {
        0..=2 => 2,
        3 => 3,
        _ => 4,
    }
}

/// §4.5 spawn-delay formula, in milliseconds.
pub fn spawn_delay_millis(item_type: u8, player_count: usize, rng: &mut impl Rng) -> i64 {
    let np = player_band(player_count);
    match ItemKind::from_type(item_type) {
        ItemKind::Ammo => 4 * np * 1000,
        ItemKind::Health => 5 * np * 1000,
        ItemKind::Armour => 20_000,
        ItemKind::Boost | ItemKind::Quad => 40_000 + rng.gen_range(0..40_000),
    }
}

pub struct ItemTable {
    entities: Vec<ServerEntity>,
    /// Tracks whether the sub-10s countdown announcement already fired for
    /// a boost/quad slot, so it's "once per countdown" (§4.5).
    announced: Vec<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemTick {
    None,
    Expired,
    Announce,
}

impl ItemTable {
    pub fn new(entities: Vec<ServerEntity>) -> Self {
        let len = entities.len();
        Self { entities, announced: vec![false; len] }
    }

    pub fn get(&self, idx: usize) -> Option<&ServerEntity> {
        self.entities.get(idx)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// §4.5 "First client to send a plausible ItemPickup wins": flips
    /// `spawned=false` and arms the respawn timer. Returns `false` if the
    /// slot was already despawned (a losing race).
    pub fn try_pickup(&mut self, idx: usize, player_count: usize, rng: &mut impl Rng) -> bool {
        let Some(entity) = self.entities.get_mut(idx) else { return false };
        if !entity.spawned {
            return false;
        }
        entity.spawned = false;
        entity.spawn_delay_millis = spawn_delay_millis(entity.item_type, player_count, rng);
        if let Some(flag) = self.announced.get_mut(idx) {
            *flag = false;
        }
        true
    }

    /// Advances one slot's countdown by `elapsed_millis`; returns whether it
    /// just respawned or crossed the 10s boost/quad announce threshold.
    pub fn tick(&mut self, idx: usize, elapsed_millis: i64) -> ItemTick {
        let Some(entity) = self.entities.get_mut(idx) else { return ItemTick::None };
        if entity.spawned {
            return ItemTick::None;
        }
        entity.spawn_delay_millis -= elapsed_millis;
        if entity.spawn_delay_millis <= 0 {
            entity.spawned = true;
            entity.spawn_delay_millis = 0;
            return ItemTick::Expired;
        }
        let is_countdown_item = matches!(ItemKind::from_type(entity.item_type), ItemKind::Boost | ItemKind::Quad);
        if is_countdown_item && entity.spawn_delay_millis < 10_000 {
            if let Some(flag) = self.announced.get_mut(idx) {
                if !*flag {
                    *flag = true;
                    return ItemTick::Announce;
                }
            }
        }
        ItemTick::None
    }

    pub fn reset_all(&mut self) {
        for (entity, flag) in self.entities.iter_mut().zip(self.announced.iter_mut()) {
            entity.spawned = true;
            entity.spawn_delay_millis = 0;
            *flag = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn table(item_type: u8) -> ItemTable {
        ItemTable::new(vec![ServerEntity { item_type, spawned: true, spawn_delay_millis: 0 }])
    }

    #[test]
    fn first_pickup_wins_second_fails() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut t = table(4);
        assert!(t.try_pickup(0, 4, &mut rng));
        assert!(!t.try_pickup(0, 4, &mut rng));
    }

    #[test]
    fn tick_respawns_after_delay_elapses() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut t = table(5); // armour, 20s
        t.try_pickup(0, 4, &mut rng);
        assert_eq!(t.tick(0, 19_999), ItemTick::None);
        assert!(!t.get(0).unwrap().spawned);
        assert_eq!(t.tick(0, 2), ItemTick::Expired);
        assert!(t.get(0).unwrap().spawned);
    }

    #[test]
    fn boost_announces_once_under_ten_seconds() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut t = table(6); // boost
        t.entities[0].spawned = false;
        t.entities[0].spawn_delay_millis = 11_000;
        assert_eq!(t.tick(0, 500), ItemTick::None);
        assert_eq!(t.tick(0, 600), ItemTick::Announce);
        assert_eq!(t.tick(0, 100), ItemTick::None);
    }

    #[test]
    fn player_band_caps_at_four() {
        assert_eq!(player_band(1), 2);
        assert_eq!(player_band(2), 2);
        assert_eq!(player_band(3), 3);
        assert_eq!(player_band(10), 4);
    }
}
