// combat.rs — damage arbitration & death/killstreak bookkeeping (§4.4).
// Converted from: the teacher's PlayerNoise/damage math in the deleted
// sv_game.c bridge, generalized from Quake2's single `T_Damage` call into
// the explicit "re-derive every declared hit server-side" pipeline §4.4
// requires, since nothing here is trusted from the client beyond aim.

use crate::types::{Client, Event, GameState, HitInfo, LifeState};

pub const SGRAYS_CAP: u32 = 20;
pub const RL_DISTSCALE: f32 = 1.0;
pub const RL_DAMRAD: f32 = 40.0;
pub const RL_SELFDAMDIV: f32 = 2.0;

/// Per-gun base damage (§4.4 "base damage from the gun table"), indexed by
/// the wire gun id (§6's `GunSelect`/`Shoot` payloads).
pub fn base_damage(gun: u8) -> i32 {
    match gun {
        0 => 5,   // fist
        1 => 10,  // knife
        2 => 20,  // pistol
        3 => 7,   // shotgun (per ray)
        4 => 30,  // chaingun (per round)
        5 => 50,  // rocket launcher
        6 => 40,  // grenade launcher
        7 => 60,  // rifle
        _ => 0,
    }
}

fn is_shotgun(gun: u8) -> bool {
    gun == 3
}

fn is_splash(gun: u8) -> bool {
    matches!(gun, 5 | 6)
}

#[derive(Debug, Clone, Copy)]
pub struct DamageResult {
    pub target_cn: i32,
    pub damage: i32,
    pub push: Option<sauer_common::types::Vec3>,
}

/// §4.4 steps 1-5, minus the broadcast (the caller owns networking).
/// `hits` is the event's declared hit list; `ray_count` is `hits.len()` for
/// a shotgun blast, 1 otherwise — callers pass the true count so the
/// `SGRAYS_CAP` clamp can apply before per-target dedup.
pub fn resolve_damage(
    actor_cn: i32,
    gun: u8,
    quad_active: bool,
    ray_count: u32,
    hits: &[HitInfo],
    target_lookup: impl Fn(i32) -> Option<(LifeState, u8)>,
    dist_for: impl Fn(&HitInfo) -> f32,
) -> Vec<DamageResult> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    let effective_rays = ray_count.min(SGRAYS_CAP);

    for hit in hits {
        if !seen.insert(hit.target_cn) {
            continue; // step 3: dedup, one entry per target per explode
        }
        let Some((state, lifesequence)) = target_lookup(hit.target_cn) else {
            continue;
        };
        if state != LifeState::Alive || lifesequence != hit.lifesequence {
            continue; // step 4: target not alive or stale life
        }

        let mut dmg = base_damage(gun) as f32;
        if quad_active {
            dmg *= 4.0;
        }
        if is_shotgun(gun) {
            dmg *= effective_rays as f32;
        }
        if is_splash(gun) {
            let dist = dist_for(hit).max(0.0);
            let falloff = (1.0 - dist / (RL_DISTSCALE * RL_DAMRAD)).clamp(0.0, 1.0);
            dmg *= falloff;
            if hit.target_cn == actor_cn {
                dmg /= RL_SELFDAMDIV;
            }
        }

        out.push(DamageResult { target_cn: hit.target_cn, damage: dmg.round() as i32, push: hit.push });
    }
    out
}

/// §4.4 "On death": killstreak/spree bookkeeping. Returns the actor's new
/// frag delta and whether a spree-end / multi-kill announcement fires.
pub struct DeathOutcome {
    pub frag_delta: i32,
    pub multifrags: i32,
    pub spree_ended: Option<i32>, // the ended spree length, if any
    pub first_blood: bool,
}

/// Self-inflicted death (suicide / self-splash kill). `apply_death`'s two
/// distinct `&mut GameState` parameters can't both alias the same client,
/// so a literal self-kill runs this instead: deaths/frags update against
/// the one `GameState`, and it never counts toward killstreak bookkeeping
/// or first blood (§4.4 "self/teamkill never claims first blood").
pub fn apply_self_death(game: &mut GameState, now: i64, frag_value: i32) -> DeathOutcome {
    game.deaths += 1;
    game.frags += frag_value;
    game.spreefrags = 0;
    game.multifrags = 0;
    game.state = LifeState::Dead;
    game.last_death_millis = now;
    DeathOutcome { frag_delta: frag_value, multifrags: 0, spree_ended: None, first_blood: false }
}

/// `friends`/`enemies` are the team-mode split described in §4.4 ("friends
/// also includes the fragger"); in non-team modes callers pass `friends=1,
/// enemies=player_count-1`, matching the original's ffa fallback.
pub fn apply_death(
    actor: &mut GameState,
    target: &mut GameState,
    now: i64,
    frag_value: i32,
    friends: i32,
    enemies: i32,
    multifragmillis: i64,
    minspreefrags: i32,
    actor_is_target: bool,
    first_blood_claimed: &mut bool,
) -> DeathOutcome {
    target.deaths += 1;
    actor.frags += frag_value;
    if frag_value > 0 {
        actor.effectiveness += frag_value as f32 * friends as f32 / (enemies.max(1) as f32);
    }

    if now - actor.last_frag_millis < multifragmillis {
        actor.multifrags += 1;
    } else {
        actor.multifrags = 1;
    }
    actor.last_frag_millis = now;

    if !actor_is_target {
        actor.spreefrags += 1;
    }

    let spree_ended = if target.spreefrags >= minspreefrags { Some(target.spreefrags) } else { None };
    target.spreefrags = 0;
    target.multifrags = 0;

    target.state = LifeState::Dead;
    target.last_death_millis = now;

    let first_blood = !*first_blood_claimed && !actor_is_target;
    if first_blood {
        *first_blood_claimed = true;
    }

    DeathOutcome { frag_delta: frag_value, multifrags: actor.multifrags, spree_ended, first_blood }
}

/// §4.4 "Time reconciliation": recompute `gameOffset` on first event or
/// once the per-client event queue has drained.
pub fn reconcile_time(client: &mut Client, server_millis: i64, client_millis: i64) -> i64 {
    if client.events.is_empty() {
        client.game_offset = server_millis - client_millis;
    }
    client.game_offset + client_millis
}

/// §5 "Cancellation" / §3 disconnect: enqueues nothing, just frees pending
/// events and clears in-flight projectile rings so stale explodes can't
/// resolve after the client leaves.
pub fn cancel_pending(game: &mut GameState, events: &mut crate::types::EventQueue) {
    game.rockets.clear();
    game.grenades.clear();
    events.clear();
}

pub fn queue_suicide(client: &mut Client) -> bool {
    client.events.push(Event::Suicide)
}

/// §4.4 killstreak/multikill announcement text, ground-truthed on
/// `gameserver.cpp`'s `spreemsg`/`multikillmsg` vectors populated by the
/// `addspreemsg`/`addmultikillmsg` console commands.
#[derive(Debug, Clone)]
pub struct SpreeMsg {
    pub frags: i32,
    pub msg1: String,
    pub msg2: String,
}

#[derive(Debug, Clone)]
pub struct MultiKillMsg {
    pub frags: i32,
    pub msg: String,
}

pub struct KillMessageTable {
    spree: Vec<SpreeMsg>,
    multi: Vec<MultiKillMsg>,
    pub defmultikillmsg: String,
    pub minmultikill: i32,
}

impl KillMessageTable {
    pub fn new() -> Self {
        Self { spree: Vec::new(), multi: Vec::new(), defmultikillmsg: "MULTI KILL".to_string(), minmultikill: 2 }
    }

    /// `addspreemsg <frags> <msg1> <msg2>`.
    pub fn add_spree(&mut self, frags: i32, msg1: &str, msg2: &str) {
        self.spree.push(SpreeMsg { frags, msg1: msg1.to_string(), msg2: msg2.to_string() });
    }

    /// `addmultikillmsg <frags> <msg>`.
    pub fn add_multi(&mut self, frags: i32, msg: &str) {
        self.multi.push(MultiKillMsg { frags, msg: msg.to_string() });
    }

    /// Highest-frags entry at or below `spreefrags`, paired `(msg1, msg2)`
    /// for the self/other broadcast variants.
    pub fn spree_message(&self, spreefrags: i32) -> Option<(&str, &str)> {
        self.spree.iter().filter(|s| s.frags <= spreefrags).max_by_key(|s| s.frags).map(|s| (s.msg1.as_str(), s.msg2.as_str()))
    }

    /// Multi-kill text for `multifrags`, falling back to `defmultikillmsg`
    /// once `minmultikill` is reached with no closer custom entry.
    pub fn multikill_message(&self, multifrags: i32) -> Option<&str> {
        if multifrags < self.minmultikill {
            return None;
        }
        match self.multi.iter().filter(|m| m.frags <= multifrags).max_by_key(|m| m.frags) {
            Some(m) => Some(m.msg.as_str()),
            None => Some(self.defmultikillmsg.as_str()),
        }
    }
}

impl Default for KillMessageTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Privilege;

    fn hit(target_cn: i32, lifesequence: u8) -> HitInfo {
        HitInfo { target_cn, lifesequence, distance: 0.0, push: None }
    }

    #[test]
    fn shotgun_damage_scales_with_ray_count_and_caps() {
        let hits = vec![hit(1, 0)];
        let lookup = |_cn: i32| Some((LifeState::Alive, 0u8));
        let dist = |_h: &HitInfo| 0.0;
        let results = resolve_damage(0, 3, false, 100, &hits, lookup, dist);
        assert_eq!(results[0].damage, base_damage(3) * SGRAYS_CAP as i32);
    }

    #[test]
    fn self_rocket_damage_divided() {
        let hits = vec![hit(0, 0)];
        let lookup = |_cn: i32| Some((LifeState::Alive, 0u8));
        let dist = |_h: &HitInfo| 0.0;
        let results = resolve_damage(0, 5, false, 1, &hits, lookup, dist);
        assert_eq!(results[0].damage, (base_damage(5) as f32 / RL_SELFDAMDIV).round() as i32);
    }

    #[test]
    fn stale_lifesequence_is_discarded() {
        let hits = vec![hit(1, 5)];
        let lookup = |_cn: i32| Some((LifeState::Alive, 0u8));
        let dist = |_h: &HitInfo| 0.0;
        let results = resolve_damage(0, 2, false, 1, &hits, lookup, dist);
        assert!(results.is_empty());
    }

    #[test]
    fn dead_target_is_discarded() {
        let hits = vec![hit(1, 0)];
        let lookup = |_cn: i32| Some((LifeState::Dead, 0u8));
        let dist = |_h: &HitInfo| 0.0;
        let results = resolve_damage(0, 2, false, 1, &hits, lookup, dist);
        assert!(results.is_empty());
    }

    #[test]
    fn duplicate_hits_on_same_target_deduped() {
        let hits = vec![hit(1, 0), hit(1, 0)];
        let lookup = |_cn: i32| Some((LifeState::Alive, 0u8));
        let dist = |_h: &HitInfo| 0.0;
        let results = resolve_damage(0, 2, false, 1, &hits, lookup, dist);
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn multifrag_sequence_matches_spec_example() {
        let mut actor = GameState::new();
        let mut target = GameState::new();
        let mut first_blood = true;
        let o1 = apply_death(&mut actor, &mut target, 0, 1, 1, 1, 2000, 5, false, &mut first_blood);
        assert_eq!(o1.multifrags, 1);
        let o2 = apply_death(&mut actor, &mut target, 1500, 1, 1, 1, 2000, 5, false, &mut first_blood);
        assert_eq!(o2.multifrags, 2);
        let o3 = apply_death(&mut actor, &mut target, 3500, 1, 1, 1, 2000, 5, false, &mut first_blood);
        assert_eq!(o3.multifrags, 1);
    }

    #[test]
    fn first_blood_fires_once() {
        let mut actor = GameState::new();
        let mut target = GameState::new();
        let mut claimed = false;
        let o1 = apply_death(&mut actor, &mut target, 0, 1, 1, 1, 2000, 5, false, &mut claimed);
        assert!(o1.first_blood);
        let o2 = apply_death(&mut actor, &mut target, 10, 1, 1, 1, 2000, 5, false, &mut claimed);
        assert!(!o2.first_blood);
    }

    #[test]
    fn self_kill_never_counts_as_first_blood() {
        let mut actor = GameState::new();
        let mut target = GameState::new();
        let mut claimed = false;
        let o = apply_death(&mut actor, &mut target, 0, -1, 1, 1, 2000, 5, true, &mut claimed);
        assert!(!o.first_blood);
        assert!(!claimed);
    }

    #[test]
    fn time_reconciliation_anchors_on_empty_queue() {
        let mut client = Client::new(0, std::net::IpAddr::from([0, 0, 0, 0]), 1, 0);
        let anchored = reconcile_time(&mut client, 10_000, 500);
        assert_eq!(client.game_offset, 9_500);
        assert_eq!(anchored, 10_000);
    }

    #[test]
    fn privilege_ordering_supports_master_ge_check() {
        assert!(Privilege::Admin > Privilege::Master);
        assert!(Privilege::Master > Privilege::None);
    }

    #[test]
    fn multikill_message_falls_back_to_default_below_custom_entries() {
        let mut table = KillMessageTable::new();
        table.add_multi(5, "MEGA KILL");
        assert_eq!(table.multikill_message(1), None);
        assert_eq!(table.multikill_message(2), Some("MULTI KILL"));
        assert_eq!(table.multikill_message(5), Some("MEGA KILL"));
        assert_eq!(table.multikill_message(9), Some("MEGA KILL"));
    }

    #[test]
    fn self_death_never_sets_first_blood_or_multifrags() {
        let mut game = GameState::new();
        game.frags = 3;
        let outcome = apply_self_death(&mut game, 100, -1);
        assert_eq!(game.frags, 2);
        assert_eq!(game.deaths, 1);
        assert!(!outcome.first_blood);
        assert_eq!(outcome.multifrags, 0);
    }

    #[test]
    fn spree_message_picks_highest_matching_threshold() {
        let mut table = KillMessageTable::new();
        table.add_spree(5, "is on a rampage", "is on a rampage!");
        table.add_spree(10, "is unstoppable", "is unstoppable!");
        assert!(table.spree_message(4).is_none());
        let (m1, m2) = table.spree_message(7).unwrap();
        assert_eq!(m1, "is on a rampage");
        assert_eq!(m2, "is on a rampage!");
        let (m1, _) = table.spree_message(12).unwrap();
        assert_eq!(m1, "is unstoppable");
    }
}
