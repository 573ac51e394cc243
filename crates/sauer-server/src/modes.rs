// modes.rs — polymorphism over FFA/CTF/Capture (§9 "Polymorphism over modes").
// Converted from: the capability-set shape of myq2-original/game/g_*.c's
// per-gametype dispatch tables, but expressed as a native Rust trait rather
// than the teacher's dynamically-loaded game-DLL (`myq2_game_dll`/
// `libloading::GameModule::Dynamic`) — spec.md §9 describes an in-process
// capability set, not an external binary to load, so this drops the FFI
// boundary and keeps only the dispatch-table idea.

use crate::types::Client;

/// Neutral default capability set; concrete modes override only what they
/// need to change (§9: "Default implementations are neutral").
pub trait GameMode: Send {
    fn name(&self) -> &'static str;

    fn entergame(&self, _client: &mut Client) {}
    fn leavegame(&self, _client: &mut Client) {}
    fn moved(&self, _client: &mut Client) {}

    fn canspawn(&self, _client: &Client) -> bool {
        true
    }
    fn spawned(&self, _client: &mut Client) {}

    /// −1 on self/teamkill, +1 otherwise, unless the mode overrides (§4.4).
    fn fragvalue(&self, actor_cn: i32, target_cn: i32, actor_team: &str, target_team: &str) -> i32 {
        if actor_cn == target_cn || (!actor_team.is_empty() && actor_team == target_team) {
            -1
        } else {
            1
        }
    }

    fn died(&self, _target: &mut Client, _actor_cn: i32) {}

    fn canchangeteam(&self, _client: &Client, _new_team: &str) -> bool {
        true
    }
    fn changeteam(&self, _client: &mut Client, _new_team: &str) {}

    fn initclient(&self, _client: &mut Client) {}
    fn update(&mut self) {}
    fn reset(&mut self) {}
    fn intermission(&mut self) {}

    /// CTF/Capture hide individual frag counts from the scoreboard in favor
    /// of team score (§9, used by autoteam's dummy-rank fallback too).
    fn hidefrags(&self) -> bool {
        false
    }

    fn getteamscore(&self, _team: &str) -> i32 {
        0
    }

    /// Whether this mode splits players into good/evil teams at all (§4.6
    /// autoteam only runs for team modes; ffa leaves `client.team` empty).
    fn uses_teams(&self) -> bool {
        false
    }
}

pub struct FreeForAll;

impl GameMode for FreeForAll {
    fn name(&self) -> &'static str {
        "ffa"
    }
}

/// Capture-the-flag: frags still count, but team score is what the mode
/// surfaces in votes/scoreboards.
#[derive(Default)]
pub struct CaptureTheFlag {
    pub flags_good: i32,
    pub flags_evil: i32,
}

impl GameMode for CaptureTheFlag {
    fn name(&self) -> &'static str {
        "ctf"
    }

    fn died(&self, target: &mut Client, _actor_cn: i32) {
        // Dropping a carried flag on death is handled by the flag-carrier
        // tracking in match_state.rs; this hook exists so a future carrier
        // flag can be cleared here without touching the damage pipeline.
        let _ = target;
    }

    fn getteamscore(&self, team: &str) -> i32 {
        match team {
            "good" => self.flags_good,
            "evil" => self.flags_evil,
            _ => 0,
        }
    }

    fn uses_teams(&self) -> bool {
        true
    }
}

/// Capture (zone-holding): scores accrue per tick per held base, so frags
/// are de-emphasized in favor of hold time.
#[derive(Default)]
pub struct Capture {
    pub score_good: i32,
    pub score_evil: i32,
}

impl GameMode for Capture {
    fn name(&self) -> &'static str {
        "capture"
    }

    fn hidefrags(&self) -> bool {
        true
    }

    fn getteamscore(&self, team: &str) -> i32 {
        match team {
            "good" => self.score_good,
            "evil" => self.score_evil,
            _ => 0,
        }
    }

    fn uses_teams(&self) -> bool {
        true
    }
}

pub fn mode_by_name(name: &str) -> Box<dyn GameMode> {
    match name {
        "ctf" => Box::new(CaptureTheFlag::default()),
        "capture" => Box::new(Capture::default()),
        _ => Box::new(FreeForAll),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragvalue_defaults_to_neutral_rules() {
        let ffa = FreeForAll;
        assert_eq!(ffa.fragvalue(1, 2, "", ""), 1);
        assert_eq!(ffa.fragvalue(1, 1, "", ""), -1);
        assert_eq!(ffa.fragvalue(1, 2, "good", "good"), -1);
    }

    #[test]
    fn only_team_modes_use_teams() {
        assert!(!FreeForAll.uses_teams());
        assert!(CaptureTheFlag::default().uses_teams());
        assert!(Capture::default().uses_teams());
    }

    #[test]
    fn ctf_hides_nothing_but_capture_hides_frags() {
        assert!(!CaptureTheFlag::default().hidefrags());
        assert!(Capture::default().hidefrags());
    }

    #[test]
    fn mode_by_name_dispatches() {
        assert_eq!(mode_by_name("ctf").name(), "ctf");
        assert_eq!(mode_by_name("capture").name(), "capture");
        assert_eq!(mode_by_name("anything-else").name(), "ffa");
    }
}
