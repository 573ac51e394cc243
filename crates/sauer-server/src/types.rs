// types.rs — core data model: Client, GameState, Event, ServerEntity, bans.
// Converted from: myq2-original/server/server.h's client_t/edict_t layout
// (see myq2_common-ancestor server.rs for the `Client`/`ServerStatic`
// struct shapes this keeps) generalized from a Quake2 client-entity split
// into the single authoritative Client + per-life GameState §3 demands.

use std::net::IpAddr;

use sauer_common::types::{MAXEVENTS, PROJECTILE_RING_CAPACITY};

pub const MAXCLIENTS: usize = 128;

/// Privilege level a connected client currently holds (§4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Privilege {
    None,
    Master,
    Admin,
}

/// Per-life combat record (§3 `GameState`). Reset on every `sendspawn`.
#[derive(Debug, Clone)]
pub struct GameState {
    pub life_sequence: u8,
    pub state: LifeState,
    pub health: i32,
    pub max_health: i32,
    pub armour: i32,
    pub armour_type: u8,
    pub gun_select: u8,
    pub ammo: [i32; 8],
    pub pos: sauer_common::types::Vec3,
    pub last_death_millis: i64,
    pub last_spawn_millis: i64,
    pub last_shot_millis: i64,
    pub rockets: ProjectileRing,
    pub grenades: ProjectileRing,
    pub frags: i32,
    pub flags_scored: i32,
    pub deaths: i32,
    pub teamkills: i32,
    pub shotdamage: i64,
    pub damage_received: i64,
    pub time_played_millis: i64,
    pub quadmillis: i64,
    pub multifrags: i32,
    pub spreefrags: i32,
    pub last_frag_millis: i64,
    /// Accumulates `fragvalue * friends/max(enemies,1)` on every scoring
    /// kill (§4.4); `rank()` divides this by time played for autoteam.
    pub effectiveness: f32,
}

impl GameState {
    pub fn new() -> Self {
        Self {
            life_sequence: 0,
            state: LifeState::Spectator,
            health: 100,
            max_health: 100,
            armour: 0,
            armour_type: 0,
            gun_select: 0,
            ammo: [0; 8],
            pos: sauer_common::types::Vec3::ZERO,
            last_death_millis: 0,
            last_spawn_millis: 0,
            last_shot_millis: 0,
            rockets: ProjectileRing::new(),
            grenades: ProjectileRing::new(),
            frags: 0,
            flags_scored: 0,
            deaths: 0,
            teamkills: 0,
            shotdamage: 0,
            damage_received: 0,
            time_played_millis: 0,
            quadmillis: 0,
            multifrags: 0,
            spreefrags: 0,
            last_frag_millis: 0,
            effectiveness: 0.0,
        }
    }

    /// §3 `isAlive(now)`: alive, or dead within the 300ms grace window that
    /// resolves near-simultaneous hits.
    pub fn is_alive(&self, now: i64) -> bool {
        match self.state {
            LifeState::Alive => true,
            LifeState::Dead => now - self.last_death_millis <= sauer_common::types::DEATH_GRACE_MILLIS,
            _ => false,
        }
    }

    /// §4.4 autoteam rank: `effectiveness / max(timePlayed, 1)`.
    pub fn rank(&self) -> f32 {
        self.effectiveness / (self.time_played_millis as f32).max(1.0)
    }

    pub fn respawn(&mut self) {
        self.life_sequence = self.life_sequence.wrapping_add(1) % 128;
        self.state = LifeState::Alive;
        self.health = self.max_health;
        self.armour = 0;
        self.rockets.clear();
        self.grenades.clear();
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifeState {
    Alive,
    Dead,
    Spawning,
    Lagged,
    Editing,
    Spectator,
}

/// Bounded ring of in-flight projectile ids, overwriting oldest on overflow
/// (§3, §9 "Projectile in-flight set").
#[derive(Debug, Clone)]
pub struct ProjectileRing {
    ids: Vec<i32>,
}

impl ProjectileRing {
    pub fn new() -> Self {
        Self { ids: Vec::with_capacity(PROJECTILE_RING_CAPACITY) }
    }

    pub fn push(&mut self, id: i32) {
        if self.ids.len() == PROJECTILE_RING_CAPACITY {
            self.ids.remove(0);
        }
        self.ids.push(id);
    }

    /// Matches and removes `id` at explode time; returns whether it was found.
    pub fn take(&mut self, id: i32) -> bool {
        if let Some(pos) = self.ids.iter().position(|&x| x == id) {
            self.ids.remove(pos);
            true
        } else {
            false
        }
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }
}

impl Default for ProjectileRing {
    fn default() -> Self {
        Self::new()
    }
}

/// A client-submitted two-phase action (§3 `Event`).
#[derive(Debug, Clone)]
pub enum Event {
    Shot { id: i32, gun: u8, from: sauer_common::types::Vec3, to: sauer_common::types::Vec3, hits: Vec<HitInfo>, client_millis: i64 },
    Explode { id: i32, gun: u8, hits: Vec<HitInfo>, client_millis: i64 },
    Pickup { entity_index: usize },
    Suicide,
}

impl Event {
    /// `Explode` survives a death-triggered queue purge (§9 "keepable").
    pub fn is_keepable(&self) -> bool {
        matches!(self, Event::Explode { .. })
    }
}

#[derive(Debug, Clone)]
pub struct HitInfo {
    pub target_cn: i32,
    pub lifesequence: u8,
    pub distance: f32,
    pub push: Option<sauer_common::types::Vec3>,
}

/// A bounded FIFO event queue (§3, §9: capacity 100; excess dropped).
#[derive(Debug, Default)]
pub struct EventQueue {
    events: std::collections::VecDeque<Event>,
}

impl EventQueue {
    pub fn push(&mut self, event: Event) -> bool {
        if self.events.len() >= MAXEVENTS {
            return false;
        }
        self.events.push_back(event);
        true
    }

    pub fn pop(&mut self) -> Option<Event> {
        self.events.pop_front()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Drain non-keepable events on death (keepable Explode events survive).
    pub fn purge_on_death(&mut self) {
        self.events.retain(|e| e.is_keepable());
    }

    /// Drain everything on disconnect (§5 "Cancellation").
    pub fn clear(&mut self) {
        self.events.clear();
    }
}

/// A connected peer (§3 `Client`).
pub struct Client {
    pub cn: i32,
    pub owner: i32,
    pub session_id: u32,
    pub connect_millis: i64,
    pub name: String,
    pub team: String,
    pub player_model: i32,
    pub privilege: Privilege,
    pub connected: bool,
    pub local: bool,
    pub auth_req_id: Option<u32>,
    pub ping: i32,
    pub permissions: String,
    pub game: GameState,
    pub events: EventQueue,
    pub position_buf: Vec<u8>,
    pub message_buf: Vec<u8>,
    pub reliable_this_tick: bool,
    pub game_offset: i64,
    pub ip: IpAddr,
    pub host: Option<String>,
    pub spectator: bool,
    pub edit_mode: bool,
}

impl Client {
    pub fn new(cn: i32, ip: IpAddr, session_id: u32, connect_millis: i64) -> Self {
        Self {
            cn,
            owner: cn,
            session_id,
            connect_millis,
            name: String::new(),
            team: String::new(),
            player_model: 0,
            privilege: Privilege::None,
            connected: false,
            local: false,
            auth_req_id: None,
            ping: 0,
            permissions: String::new(),
            game: GameState::new(),
            events: EventQueue::default(),
            position_buf: Vec::new(),
            message_buf: Vec::new(),
            reliable_this_tick: false,
            game_offset: 0,
            ip,
            host: None,
            spectator: false,
            edit_mode: false,
        }
    }

    pub fn is_bot(&self) -> bool {
        self.owner != self.cn
    }

    /// `CHECK_PERM`-equivalent: admin privilege, or a login-account
    /// permission string granting `a` (admin) or `s` (scripting).
    pub fn has_admin_permission(&self) -> bool {
        self.privilege >= Privilege::Admin || self.permissions.contains('a') || self.permissions.contains('s')
    }
}

/// Static map entity slot (§3 `ServerEntity`, §4.5).
#[derive(Debug, Clone)]
pub struct ServerEntity {
    pub item_type: u8,
    pub spawned: bool,
    pub spawn_delay_millis: i64,
}

/// Snapshot of a departing player's stats (§3 `SavedScore`).
#[derive(Debug, Clone)]
pub struct SavedScore {
    pub ip: IpAddr,
    pub name: String,
    pub frags: i32,
    pub deaths: i32,
    pub teamkills: i32,
    pub shotdamage: i64,
    pub damage_received: i64,
}

/// Expiry resolving §9's Open Question #2: a sum type instead of the
/// sentinel-`-1`-means-permanent convention the original source used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    Permanent,
    At(i64),
}

impl Expiry {
    pub fn has_expired(&self, now_millis: i64) -> bool {
        match self {
            Expiry::Permanent => false,
            Expiry::At(t) => now_millis >= *t,
        }
    }
}

/// A ban/blacklist/whitelist pattern entry (§3 `Ban`).
#[derive(Debug, Clone)]
pub struct Notice {
    pub pattern: String,
    pub expiry: Expiry,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_alive_within_grace_window() {
        let mut gs = GameState::new();
        gs.state = LifeState::Dead;
        gs.last_death_millis = 1000;
        assert!(gs.is_alive(1200));
        assert!(!gs.is_alive(1400));
    }

    #[test]
    fn projectile_ring_overwrites_oldest() {
        let mut ring = ProjectileRing::new();
        for i in 0..10 {
            ring.push(i);
        }
        assert!(!ring.take(0));
        assert!(ring.take(9));
    }

    #[test]
    fn event_queue_caps_at_max() {
        let mut q = EventQueue::default();
        for _ in 0..MAXEVENTS + 10 {
            q.push(Event::Suicide);
        }
        assert_eq!(q.len(), MAXEVENTS);
    }

    #[test]
    fn event_queue_purge_keeps_explode() {
        let mut q = EventQueue::default();
        q.push(Event::Suicide);
        q.push(Event::Explode { id: 1, gun: 0, hits: vec![], client_millis: 0 });
        q.purge_on_death();
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn expiry_permanent_never_expires() {
        assert!(!Expiry::Permanent.has_expired(i64::MAX));
        assert!(Expiry::At(100).has_expired(100));
        assert!(!Expiry::At(100).has_expired(99));
    }
}
