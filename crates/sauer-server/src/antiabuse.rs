// antiabuse.rs — the anti-abuse guard table (§4.8).
// Converted from: the teacher's rate-limiting shape in sv_user.c's
// `surpress_count`/message-rate bookkeeping, generalized from a single
// packet-rate counter into eight independently-configured
// (window_ms, threshold, warn_once) state machines keyed per client.

use std::collections::HashMap;

use sauer_common::types::Vec3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GuardKind {
    ChatSpam,
    Remip,
    Newmap,
    MassKick,
    BigSelection,
    FastScroll,
    TextureScroll,
    MapmodelScroll,
}

#[derive(Debug, Clone, Copy)]
pub enum WarnRoute {
    Off,
    Privileged,
    Broadcast,
}

impl WarnRoute {
    pub fn from_level(level: u8) -> Self {
        match level {
            1 => WarnRoute::Privileged,
            2 => WarnRoute::Broadcast,
            _ => WarnRoute::Off,
        }
    }
}

/// A sliding counter over `window_ms`, tripping once `threshold` hits land
/// inside the window, then suppressing repeat warnings until it resets
/// (§4.8: "once-per-window").
#[derive(Debug, Clone)]
struct RateGuard {
    window_ms: i64,
    threshold: u32,
    window_start: i64,
    count: u32,
    warned: bool,
}

impl RateGuard {
    fn new(window_ms: i64, threshold: u32) -> Self {
        Self { window_ms, threshold, window_start: 0, count: 0, warned: false }
    }

    /// Records one event; returns `true` if this event should be dropped
    /// (guard tripped) and whether a fresh warning should fire.
    fn record(&mut self, now: i64) -> (bool, bool) {
        if now - self.window_start > self.window_ms {
            self.window_start = now;
            self.count = 0;
            self.warned = false;
        }
        self.count += 1;
        let tripped = self.count >= self.threshold;
        let fresh_warning = tripped && !self.warned;
        if fresh_warning {
            self.warned = true;
        }
        (tripped, fresh_warning)
    }
}

pub struct AntiAbuse {
    guards: HashMap<(i32, GuardKind), RateGuard>,
    pub maxspam: u32,
    pub spammillis: i64,
    pub remipmillis: i64,
    pub newmapmillis: i64,
    pub kickmillis: i64,
    pub maxselspam: f32,
    pub maxscrollspam: f32,
    pub editscrollmillis: i64,
    pub maxtexturespam: u32,
    pub texturespammillis: i64,
    pub maxmapmodelspam: u32,
    pub mapmodelspammillis: i64,
    pub editspamwarn: u8,
    selection_bbox: HashMap<i32, (Vec3, Vec3, i64)>,
}

impl AntiAbuse {
    pub fn new() -> Self {
        Self {
            guards: HashMap::new(),
            maxspam: 5,
            spammillis: 5000,
            remipmillis: 1000,
            newmapmillis: 1000,
            kickmillis: 5000,
            maxselspam: 4096.0,
            maxscrollspam: 4096.0,
            editscrollmillis: 1000,
            maxtexturespam: 5,
            texturespammillis: 2000,
            maxmapmodelspam: 5,
            mapmodelspammillis: 2000,
            editspamwarn: 1,
            selection_bbox: HashMap::new(),
        }
    }

    fn guard_mut(&mut self, cn: i32, kind: GuardKind, window_ms: i64, threshold: u32) -> &mut RateGuard {
        self.guards.entry((cn, kind)).or_insert_with(|| RateGuard::new(window_ms, threshold))
    }

    /// Returns `(tripped, fresh_warning)`: `tripped` drops the message,
    /// `fresh_warning` fires once the first time the window trips (§8
    /// scenario 6: message 4 drops-and-warns, message 5 drops silently).
    pub fn check_chat_spam(&mut self, cn: i32, now: i64) -> (bool, Option<WarnRoute>) {
        let (window, threshold) = (self.spammillis, self.maxspam);
        let (tripped, fresh) = self.guard_mut(cn, GuardKind::ChatSpam, window, threshold).record(now);
        (tripped, fresh.then(|| WarnRoute::from_level(self.editspamwarn)))
    }

    pub fn check_remip(&mut self, cn: i32, now: i64) -> bool {
        let (window, threshold) = (self.remipmillis, 1);
        self.guard_mut(cn, GuardKind::Remip, window, threshold).record(now).0
    }

    pub fn check_newmap(&mut self, cn: i32, now: i64) -> bool {
        let (window, threshold) = (self.newmapmillis, 1);
        self.guard_mut(cn, GuardKind::Newmap, window, threshold).record(now).0
    }

    /// §4.8: "Non-admin master kicks within kickmillis" → deny kick.
    pub fn check_mass_kick(&mut self, cn: i32, is_admin: bool, now: i64) -> bool {
        if is_admin {
            return false;
        }
        let (window, threshold) = (self.kickmillis, 1);
        self.guard_mut(cn, GuardKind::MassKick, window, threshold).record(now).0
    }

    pub fn check_texture_scroll(&mut self, cn: i32, now: i64) -> Option<WarnRoute> {
        let (window, threshold) = (self.texturespammillis, self.maxtexturespam);
        let (_, fresh) = self.guard_mut(cn, GuardKind::TextureScroll, window, threshold).record(now);
        fresh.then(|| WarnRoute::from_level(self.editspamwarn))
    }

    pub fn check_mapmodel_scroll(&mut self, cn: i32, now: i64) -> Option<WarnRoute> {
        let (window, threshold) = (self.mapmodelspammillis, self.maxmapmodelspam);
        let (_, fresh) = self.guard_mut(cn, GuardKind::MapmodelScroll, window, threshold).record(now);
        fresh.then(|| WarnRoute::from_level(self.editspamwarn))
    }

    /// §4.8 "Big selection": `s·grid` extent on any axis ≥ `maxselspam`.
    pub fn check_big_selection(&self, lo: Vec3, hi: Vec3) -> Option<WarnRoute> {
        let extent = Vec3 { x: (hi.x - lo.x).abs(), y: (hi.y - lo.y).abs(), z: (hi.z - lo.z).abs() };
        let max_axis = extent.x.max(extent.y).max(extent.z);
        (max_axis >= self.maxselspam).then(|| WarnRoute::from_level(self.editspamwarn))
    }

    /// §4.8 "Fast scroll": union bbox of selections grows ≥ `maxscrollspam`
    /// on any axis within `editscrollmillis`; resets the tracked bbox after
    /// the window elapses.
    pub fn check_fast_scroll(&mut self, cn: i32, lo: Vec3, hi: Vec3, now: i64) -> Option<WarnRoute> {
        let entry = self.selection_bbox.entry(cn).or_insert((lo, hi, now));
        if now - entry.2 > self.editscrollmillis {
            *entry = (lo, hi, now);
            return None;
        }
        entry.0.x = entry.0.x.min(lo.x);
        entry.0.y = entry.0.y.min(lo.y);
        entry.0.z = entry.0.z.min(lo.z);
        entry.1.x = entry.1.x.max(hi.x);
        entry.1.y = entry.1.y.max(hi.y);
        entry.1.z = entry.1.z.max(hi.z);
        let extent_x = (entry.1.x - entry.0.x).abs();
        let extent_y = (entry.1.y - entry.0.y).abs();
        let extent_z = (entry.1.z - entry.0.z).abs();
        let max_axis = extent_x.max(extent_y).max(extent_z);
        if max_axis >= self.maxscrollspam {
            *entry = (lo, hi, now);
            Some(WarnRoute::from_level(self.editspamwarn))
        } else {
            None
        }
    }
}

impl Default for AntiAbuse {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_spam_trips_after_threshold() {
        let mut guard = AntiAbuse::new();
        guard.maxspam = 3;
        guard.spammillis = 1000;
        assert_eq!(guard.check_chat_spam(1, 0).0, false);
        assert_eq!(guard.check_chat_spam(1, 10).0, false);
        assert_eq!(guard.check_chat_spam(1, 20).0, true);
    }

    #[test]
    fn window_resets_after_elapsing() {
        let mut guard = AntiAbuse::new();
        guard.maxspam = 2;
        guard.spammillis = 100;
        assert_eq!(guard.check_chat_spam(1, 0).0, false);
        assert_eq!(guard.check_chat_spam(1, 10).0, true);
        assert_eq!(guard.check_chat_spam(1, 500).0, false);
    }

    #[test]
    fn fourth_message_warns_once_fifth_is_silent() {
        let mut guard = AntiAbuse::new();
        guard.maxspam = 3;
        guard.spammillis = 1000;
        assert!(guard.check_chat_spam(1, 0).1.is_none());
        assert!(guard.check_chat_spam(1, 10).1.is_none());
        let (tripped4, warn4) = guard.check_chat_spam(1, 20);
        assert!(tripped4 && warn4.is_some());
        let (tripped5, warn5) = guard.check_chat_spam(1, 30);
        assert!(tripped5 && warn5.is_none());
    }

    #[test]
    fn mass_kick_denies_non_admin_repeat_kicks() {
        let mut guard = AntiAbuse::new();
        assert!(!guard.check_mass_kick(1, false, 0));
        assert!(guard.check_mass_kick(1, false, 10));
        assert!(!guard.check_mass_kick(1, true, 20));
    }

    #[test]
    fn big_selection_warns_when_extent_exceeds_threshold() {
        let guard = AntiAbuse::new();
        let small = guard.check_big_selection(Vec3::ZERO, Vec3 { x: 10.0, y: 10.0, z: 10.0 });
        assert!(small.is_none());
        let big = guard.check_big_selection(Vec3::ZERO, Vec3 { x: 5000.0, y: 10.0, z: 10.0 });
        assert!(big.is_some());
    }

    #[test]
    fn fast_scroll_accumulates_then_resets() {
        let mut guard = AntiAbuse::new();
        guard.maxscrollspam = 100.0;
        guard.editscrollmillis = 1000;
        let lo = Vec3::ZERO;
        let hi1 = Vec3 { x: 60.0, y: 0.0, z: 0.0 };
        assert!(guard.check_fast_scroll(1, lo, hi1, 0).is_none());
        let hi2 = Vec3 { x: 150.0, y: 0.0, z: 0.0 };
        assert!(guard.check_fast_scroll(1, lo, hi2, 100).is_some());
    }
}
