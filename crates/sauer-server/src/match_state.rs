// match_state.rs — map lifecycle, vote tally, autoteam (§4.6).
// Converted from: the teacher's level-change bookkeeping in sv_init.rs
// (SV_SpawnServer's state reset sequence), generalized from Quake2's single
// map-change path into a vote-driven lifecycle with intermission and
// majority/veto/expiry triggers.

use rand::Rng;

use crate::types::Client;

#[derive(Debug, Clone)]
pub struct Vote {
    pub mapname: String,
    pub mode: String,
}

#[derive(Debug, Default)]
pub struct VoteTally {
    votes: Vec<(i32, Vote)>,
}

impl VoteTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cast(&mut self, cn: i32, vote: Vote) {
        self.votes.retain(|(c, _)| *c != cn);
        self.votes.push((cn, vote));
    }

    pub fn clear(&mut self) {
        self.votes.clear();
    }

    pub fn count_for(&self, vote: &Vote) -> usize {
        self.votes.iter().filter(|(_, v)| v.mapname == vote.mapname && v.mode == vote.mode).count()
    }

    /// §4.6 "Majority": `count > maxvotes/2`.
    pub fn has_majority(&self, total_eligible: usize) -> Option<Vote> {
        for (_, v) in &self.votes {
            if self.count_for(v) * 2 > total_eligible {
                return Some(v.clone());
            }
        }
        None
    }

    /// §4.6 "Intermission expiry → force change to top vote (or reload if
    /// no votes)"; ties broken by a random coin toss.
    pub fn top_vote(&self, rng: &mut impl Rng) -> Option<Vote> {
        if self.votes.is_empty() {
            return None;
        }
        let mut counts: Vec<(Vote, usize)> = Vec::new();
        for (_, v) in &self.votes {
            if let Some(entry) = counts.iter_mut().find(|(cv, _)| cv.mapname == v.mapname && cv.mode == v.mode) {
                entry.1 += 1;
            } else {
                counts.push((v.clone(), 1));
            }
        }
        let max = counts.iter().map(|(_, c)| *c).max().unwrap();
        let tied: Vec<&Vote> = counts.iter().filter(|(_, c)| *c == max).map(|(v, _)| v).collect();
        let idx = if tied.len() == 1 { 0 } else { rng.gen_range(0..tied.len()) };
        Some(tied[idx].clone())
    }
}

/// §4.6 `gamelimit` seeding: "10 min normal, 15 min overtime".
pub fn gamelimit_millis(minremain: i64, overtime: bool) -> i64 {
    let base = if overtime { 15 } else { 10 };
    let _ = minremain;
    base * 60_000
}

/// §4.6 autoteam: iteratively assigns the highest-rank unassigned player to
/// the lower-ranked of {good, evil}. `hidefrags` modes use a dummy rank of 1
/// for every player instead of effectiveness.
pub fn autoteam(clients: &mut [&mut Client], hidefrags: bool) {
    let mut ranked: Vec<(usize, f32)> = clients
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let rank = if hidefrags { 1.0 } else { c.game.rank() };
            (i, rank)
        })
        .collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());

    let mut good_rank_sum = 0.0f32;
    let mut evil_rank_sum = 0.0f32;
    for (i, rank) in ranked {
        if good_rank_sum <= evil_rank_sum {
            clients[i].team = "good".to_string();
            good_rank_sum += rank;
        } else {
            clients[i].team = "evil".to_string();
            evil_rank_sum += rank;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn vote(map: &str, mode: &str) -> Vote {
        Vote { mapname: map.to_string(), mode: mode.to_string() }
    }

    #[test]
    fn majority_triggers_immediate_change() {
        let mut tally = VoteTally::new();
        tally.cast(1, vote("dust", "ffa"));
        tally.cast(2, vote("dust", "ffa"));
        tally.cast(3, vote("dust", "ffa"));
        tally.cast(4, vote("park", "ctf"));
        let winner = tally.has_majority(4).unwrap();
        assert_eq!(winner.mapname, "dust");
    }

    #[test]
    fn no_majority_returns_none() {
        let mut tally = VoteTally::new();
        tally.cast(1, vote("dust", "ffa"));
        tally.cast(2, vote("park", "ctf"));
        assert!(tally.has_majority(4).is_none());
    }

    #[test]
    fn top_vote_with_no_votes_is_none() {
        let tally = VoteTally::new();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(tally.top_vote(&mut rng).is_none());
    }

    #[test]
    fn revoting_replaces_previous_choice() {
        let mut tally = VoteTally::new();
        tally.cast(1, vote("dust", "ffa"));
        tally.cast(1, vote("park", "ctf"));
        assert_eq!(tally.count_for(&vote("dust", "ffa")), 0);
        assert_eq!(tally.count_for(&vote("park", "ctf")), 1);
    }

    #[test]
    fn gamelimit_overtime_is_longer() {
        assert_eq!(gamelimit_millis(0, false), 600_000);
        assert_eq!(gamelimit_millis(0, true), 900_000);
    }

    #[test]
    fn autoteam_splits_players_between_both_teams() {
        let mut c1 = Client::new(0, std::net::IpAddr::from([0, 0, 0, 0]), 1, 0);
        let mut c2 = Client::new(1, std::net::IpAddr::from([0, 0, 0, 0]), 2, 0);
        let mut c3 = Client::new(2, std::net::IpAddr::from([0, 0, 0, 0]), 3, 0);
        autoteam(&mut [&mut c1, &mut c2, &mut c3], true);
        let teams: Vec<&str> = [&c1, &c2, &c3].iter().map(|c| c.team.as_str()).collect();
        assert!(teams.contains(&"good"));
        assert!(teams.contains(&"evil"));
    }
}
