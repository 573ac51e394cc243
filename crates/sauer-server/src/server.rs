// server.rs — process-wide state S (§9 "pass a context by reference,
// avoid globals"). Converted from: the teacher's ServerContext/ServerStatic
// split in server.rs (`sv`/`svs`/cvar-pointer globals collapsed into one
// struct), generalized from Quake2's level-scoped `Server` + persistent
// `ServerStatic` into the single flat context a match-based game needs —
// there's no separate "level load" phase here, just match changes.

use std::collections::HashMap;
use std::net::SocketAddr;

use sauer_common::cmd::CmdContext;
use sauer_common::common::com_printf;
use sauer_common::cvar::CvarContext;
use sauer_common::files::FsContext;
use sauer_common::transport::{Channel, GameSocket, PeerRegistry};
use sauer_common::wire::{read_byte, read_int, read_string, write_byte, write_int, write_string, MessageBuffer};

use crate::antiabuse::AntiAbuse;
use crate::clients::ClientRegistry;
use crate::combat::{self, DeathOutcome, KillMessageTable};
use crate::dispatch::{authorize, DispatchOutcome, MsgTag, Origin};
use crate::items::{ItemTable, ItemTick};
use crate::match_state::{self, Vote, VoteTally};
use crate::modes::{mode_by_name, GameMode};
use crate::privilege::{ClaimOutcome, PrivilegeContext};
use crate::types::{HitInfo, Notice, Privilege};

/// Current match phase (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    Playing,
    Intermission,
    ChangingMap,
}

/// The process-wide context threaded through every handler instead of
/// globals (§9). Lives from server start to shutdown; survives map/mode
/// changes by resetting its match-scoped fields in place.
pub struct ServerContext {
    pub clients: ClientRegistry,
    pub mode: Box<dyn GameMode>,
    pub mode_name: String,
    pub phase: MatchPhase,
    pub map_name: String,
    pub game_millis: i64,
    pub total_millis: i64,
    pub match_start_millis: i64,
    pub intermission_at_millis: Option<i64>,

    pub privilege: PrivilegeContext,
    pub notices: Vec<Notice>,

    pub cvars: CvarContext,
    pub cmds: CmdContext,
    pub fs: FsContext,

    pub socket: Option<GameSocket>,
    pub peers: PeerRegistry,
    pub addr_by_cn: HashMap<i32, SocketAddr>,

    pub vote_target: Option<String>,
    pub vote_yes: Vec<i32>,
    pub vote_no: Vec<i32>,
    pub map_votes: VoteTally,

    pub server_name: String,
    pub server_description: String,
    pub max_clients: usize,

    pub antiabuse: AntiAbuse,
    pub kill_messages: KillMessageTable,
    pub items: Option<ItemTable>,
    pub first_blood_claimed: bool,
    pub bot_names: Vec<String>,

    /// Strings to forward to the master link (`reqauth`/`confauth`), drained
    /// by the caller's event loop each tick (§4.9).
    pub pending_master_forwards: Vec<String>,
    cn_by_addr: HashMap<SocketAddr, i32>,
}

impl ServerContext {
    pub fn new(data_dir: std::path::PathBuf) -> Self {
        Self {
            clients: ClientRegistry::new(),
            mode: mode_by_name("ffa"),
            mode_name: "ffa".to_string(),
            phase: MatchPhase::Playing,
            map_name: String::new(),
            game_millis: 0,
            total_millis: 0,
            match_start_millis: 0,
            intermission_at_millis: None,
            privilege: PrivilegeContext::new(),
            notices: Vec::new(),
            cvars: CvarContext::new(),
            cmds: CmdContext::new(),
            fs: FsContext::with_data_dir(data_dir),
            socket: None,
            peers: PeerRegistry::default(),
            addr_by_cn: HashMap::new(),
            vote_target: None,
            vote_yes: Vec::new(),
            vote_no: Vec::new(),
            map_votes: VoteTally::new(),
            server_name: "sauerservd".to_string(),
            server_description: String::new(),
            max_clients: crate::types::MAXCLIENTS,
            antiabuse: AntiAbuse::new(),
            kill_messages: KillMessageTable::new(),
            items: None,
            first_blood_claimed: false,
            bot_names: Vec::new(),
            pending_master_forwards: Vec::new(),
            cn_by_addr: HashMap::new(),
        }
    }

    /// Switches active mode, resetting match-scoped state (§4.6 map change).
    pub fn set_mode(&mut self, name: &str) {
        self.mode = mode_by_name(name);
        self.mode_name = name.to_string();
        self.mode.reset();
    }

    /// §4.6: advance to a new map under the current or a new mode.
    pub fn change_map(&mut self, map_name: &str, mode_name: Option<&str>) {
        self.phase = MatchPhase::Playing;
        self.map_name = map_name.to_string();
        if let Some(name) = mode_name {
            self.set_mode(name);
        } else {
            self.mode.reset();
        }
        self.match_start_millis = self.game_millis;
        self.intermission_at_millis = None;
        self.vote_target = None;
        self.vote_yes.clear();
        self.vote_no.clear();
        self.map_votes.clear();
        self.first_blood_claimed = false;
        for client in self.clients.iter_mut() {
            client.game.respawn();
            client.events.clear();
        }
        if self.mode.uses_teams() {
            let mut refs: Vec<&mut crate::types::Client> = self.clients.iter_mut().collect();
            match_state::autoteam(&mut refs, self.mode.hidefrags());
        }
    }

    /// §9 query commands `listclients`/`getclient*`: one line per connected
    /// human, matching the operator-console `status` table's columns.
    pub fn list_clients(&self) -> Vec<String> {
        self.clients.iter().map(|c| format!("{} {} {} {}", c.cn, c.name, c.team, c.ip)).collect()
    }

    pub fn is_admin(&self, cn: i32) -> bool {
        self.clients.get(cn).map(|c| c.has_admin_permission()).unwrap_or(false)
    }

    pub fn is_master(&self, cn: i32) -> bool {
        self.clients.get(cn).map(|c| c.privilege >= Privilege::Master).unwrap_or(false)
    }

    fn origin_for(&self, cn: i32) -> Origin {
        match self.clients.get(cn) {
            Some(c) => Origin { cn, privilege: c.privilege, local: c.local, spectator: c.spectator, edit_mode_enabled: c.edit_mode },
            None => Origin { cn, privilege: Privilege::None, local: false, spectator: false, edit_mode_enabled: false },
        }
    }

    /// §4.4 friends/enemies split: team modes scan every connected client's
    /// team string; ffa modes fall back to `friends=1, enemies=N-1`.
    fn friends_enemies(&self, actor_cn: i32) -> (i32, i32) {
        if !self.mode.uses_teams() {
            let others = self.clients.iter().filter(|c| c.cn != actor_cn).count() as i32;
            return (1, others.max(1));
        }
        let Some(actor_team) = self.clients.get(actor_cn).map(|c| c.team.clone()) else {
            return (1, 1);
        };
        let mut friends = 0;
        let mut enemies = 0;
        for c in self.clients.iter() {
            if c.team == actor_team {
                friends += 1;
            } else {
                enemies += 1;
            }
        }
        (friends.max(1), enemies.max(1))
    }

    /// The packet-handling seam (§4.3): decode every framed message in one
    /// datagram's payload, authorize it, and route it into the game-state
    /// modules. `addr` identifies the sending peer; `cn` is resolved from a
    /// prior `ClientConn` if the peer has already joined.
    pub fn handle_payload(&mut self, addr: SocketAddr, _channel: Channel, bytes: &[u8], now_millis: i64) {
        let mut buf = MessageBuffer::from_bytes(bytes);
        buf.begin_reading();
        while buf.remaining() > 0 {
            let tag_byte = read_byte(&mut buf);
            let Some(tag) = MsgTag::from_byte(tag_byte) else {
                if let Some(&cn) = self.cn_by_addr.get(&addr) {
                    self.clients.disconnect(cn);
                    self.cn_by_addr.remove(&addr);
                }
                return;
            };

            if tag == MsgTag::ClientConn {
                let name = read_string(&mut buf);
                let password = read_string(&mut buf);
                self.handle_client_conn(addr, &name, &password, now_millis);
                continue;
            }

            let Some(&cn) = self.cn_by_addr.get(&addr) else {
                continue; // every other tag requires a connected client
            };
            let origin = self.origin_for(cn);
            let owner_cn = self.clients.get(cn).map(|c| c.owner);
            match authorize(tag, &origin, Some(cn), owner_cn) {
                DispatchOutcome::BadTag => {
                    self.clients.disconnect(cn);
                    self.cn_by_addr.remove(&addr);
                    return;
                }
                DispatchOutcome::Unauthorized => continue,
                DispatchOutcome::Accept => {}
            }

            match tag {
                MsgTag::Disconnect => {
                    self.clients.disconnect(cn);
                    self.cn_by_addr.remove(&addr);
                    return;
                }
                MsgTag::Text => {
                    let text = read_string(&mut buf);
                    self.handle_chat(cn, &text, now_millis, false);
                }
                MsgTag::SayTeam => {
                    let text = read_string(&mut buf);
                    self.handle_chat(cn, &text, now_millis, true);
                }
                MsgTag::SetMaster => {
                    let candidate = read_string(&mut buf);
                    self.handle_set_master(cn, &candidate);
                }
                MsgTag::MasterMode => {
                    let mode = read_string(&mut buf);
                    let priv_ = origin.privilege;
                    let local = origin.local;
                    let _ = crate::console::mastermode_f(self, &mode, priv_, local);
                }
                MsgTag::Kick => {
                    let target = read_int(&mut buf);
                    let priv_ = origin.privilege;
                    let local = origin.local;
                    let _ = crate::console::kick_f(self, target, priv_, local);
                }
                MsgTag::AuthTry => {
                    let name = read_string(&mut buf);
                    let (id, forward) = self.privilege.begin_auth(cn, &name);
                    if let Some(c) = self.clients.get_mut(cn) {
                        c.auth_req_id = Some(id);
                    }
                    self.pending_master_forwards.push(forward);
                }
                MsgTag::AuthAns => {
                    let answer = read_string(&mut buf);
                    if let Some(id) = self.clients.get(cn).and_then(|c| c.auth_req_id) {
                        if let Some(forward) = self.privilege.confirm_auth(id, &answer) {
                            self.pending_master_forwards.push(forward);
                        }
                    }
                }
                MsgTag::Shoot | MsgTag::Explode => {
                    let gun = read_byte(&mut buf);
                    let target_cn = read_int(&mut buf);
                    self.handle_hit(cn, gun, target_cn, now_millis);
                }
                MsgTag::ItemAcc => {
                    let idx = read_int(&mut buf) as usize;
                    self.handle_item_pickup(idx, now_millis);
                }
                MsgTag::MapVote => {
                    let mapname = read_string(&mut buf);
                    let mode = read_string(&mut buf);
                    self.handle_map_vote(cn, mapname, mode);
                }
                MsgTag::Suicide => {
                    if let Some(c) = self.clients.get_mut(cn) {
                        combat::queue_suicide(c);
                    }
                }
                _ => {}
            }
        }
    }

    fn handle_client_conn(&mut self, addr: SocketAddr, name: &str, _password: &str, now_millis: i64) {
        if !self.privilege.connection_allowed(&addr.ip()) {
            return;
        }
        if self.privilege.is_blacklisted(&addr.ip().to_string()) {
            return;
        }
        if self.clients.count_connected() >= self.max_clients {
            return;
        }
        let Some(cn) = self.clients.connect_human(addr.ip(), now_millis) else { return };
        if let Some(c) = self.clients.get_mut(cn) {
            c.name = name.to_string();
            c.connected = true;
        }
        self.cn_by_addr.insert(addr, cn);
        self.addr_by_cn.insert(cn, addr);
        self.mode.entergame(self.clients.get_mut(cn).unwrap());
        com_printf(&format!("{} connected\n", name));
    }

    fn handle_chat(&mut self, cn: i32, text: &str, now_millis: i64, team_only: bool) {
        if let Some(rest) = text.strip_prefix("/login ") {
            self.handle_login_command(cn, rest);
            return;
        }
        let (tripped, warn) = self.antiabuse.check_chat_spam(cn, now_millis);
        if let Some(route) = warn {
            let _ = route;
            com_printf(&format!("{} is spamming chat\n", cn));
        }
        if tripped {
            return;
        }
        let name = self.clients.get(cn).map(|c| c.name.clone()).unwrap_or_default();
        if team_only {
            com_printf(&format!("{}(team): {}\n", name, text));
        } else {
            com_printf(&format!("{}: {}\n", name, text));
        }
    }

    /// §4.9 `/login` client command: either the single-arg plaintext admin
    /// password form (grants `permissions="a"`, ground-truthed on
    /// `gameserver.cpp`'s `c2sinfo` handling of a bare `/login <pass>`), or
    /// the two-arg `<user> <password>` form checked against the login table.
    fn handle_login_command(&mut self, cn: i32, args: &str) {
        let mut parts = args.split_whitespace();
        let first = parts.next().unwrap_or("");
        let second = parts.next();
        let granted = match second {
            Some(password) => self.privilege.logins().try_login(first, password).map(|p| p.to_string()),
            None if self.privilege.check_admin_password(first) => Some("a".to_string()),
            None => None,
        };
        let Some(permissions) = granted else {
            com_printf(&format!("{}: login failed\n", cn));
            return;
        };
        if let Some(client) = self.clients.get_mut(cn) {
            client.permissions = permissions;
            if client.has_admin_permission() {
                client.privilege = Privilege::Admin;
            }
        }
        com_printf(&format!("{}: logged in\n", cn));
    }

    fn handle_set_master(&mut self, cn: i32, candidate: &str) {
        let Some(client) = self.clients.get(cn) else { return };
        let session_id = client.session_id;
        let ip = client.ip.to_string();
        match self.privilege.try_claim(cn, session_id, candidate, &ip) {
            ClaimOutcome::Admin => {
                self.clients.get_mut(cn).unwrap().privilege = Privilege::Admin;
            }
            ClaimOutcome::Master => {
                self.clients.get_mut(cn).unwrap().privilege = Privilege::Master;
            }
            ClaimOutcome::NeedsAuth => {
                let name = self.clients.get(cn).unwrap().name.clone();
                let (id, forward) = self.privilege.begin_auth(cn, &name);
                self.clients.get_mut(cn).unwrap().auth_req_id = Some(id);
                self.pending_master_forwards.push(forward);
            }
            ClaimOutcome::Rejected => {}
        }
    }

    /// §4.4: re-derives damage server-side, applies it, and on a kill runs
    /// the full death/spree/multikill/first-blood bookkeeping.
    fn handle_hit(&mut self, actor_cn: i32, gun: u8, target_cn: i32, now_millis: i64) {
        let hits = vec![HitInfo { target_cn, lifesequence: 0, distance: 0.0, push: None }];
        let results = {
            let lookup = |cn: i32| self.clients.get(cn).map(|c| (c.game.state, c.game.life_sequence));
            combat::resolve_damage(actor_cn, gun, false, 1, &hits, lookup, |_| 0.0)
        };
        for result in results {
            let died = {
                let Some(target) = self.clients.get_mut(result.target_cn) else { continue };
                target.game.damage_received += result.damage as i64;
                target.game.health -= result.damage;
                target.game.health <= 0
            };
            if !died {
                continue;
            }
            let actor_team = self.clients.get(actor_cn).map(|c| c.team.clone()).unwrap_or_default();
            let target_team = self.clients.get(result.target_cn).map(|c| c.team.clone()).unwrap_or_default();
            let frag_value = self.mode.fragvalue(actor_cn, result.target_cn, &actor_team, &target_team);
            let (friends, enemies) = self.friends_enemies(actor_cn);
            let actor_is_target = actor_cn == result.target_cn;
            let outcome = self.apply_death_to_registry(actor_cn, result.target_cn, now_millis, frag_value, friends, enemies, actor_is_target);
            self.announce_death(actor_cn, result.target_cn, &outcome);
        }
    }

    fn apply_death_to_registry(&mut self, actor_cn: i32, target_cn: i32, now_millis: i64, frag_value: i32, friends: i32, enemies: i32, actor_is_target: bool) -> DeathOutcome {
        let minspreefrags = 5;
        let multifragmillis = 2000;
        if actor_cn == target_cn {
            let game = &mut self.clients.get_mut(actor_cn).unwrap().game;
            return combat::apply_self_death(game, now_millis, frag_value);
        }
        let (actor_game, target_game) = self.clients.get_pair_mut(actor_cn, target_cn);
        combat::apply_death(actor_game, target_game, now_millis, frag_value, friends, enemies, multifragmillis, minspreefrags, actor_is_target, &mut self.first_blood_claimed)
    }

    fn announce_death(&mut self, actor_cn: i32, target_cn: i32, outcome: &DeathOutcome) {
        if outcome.first_blood {
            com_printf("first blood!\n");
        }
        if let Some(msg) = self.kill_messages.multikill_message(outcome.multifrags) {
            if outcome.multifrags >= self.kill_messages.minmultikill {
                com_printf(&format!("{}: {}\n", actor_cn, msg));
            }
        }
        if let Some(spree) = outcome.spree_ended {
            if let Some((_msg1, msg2)) = self.kill_messages.spree_message(spree) {
                com_printf(&format!("{} {}\n", target_cn, msg2));
            }
        }
    }

    fn handle_item_pickup(&mut self, idx: usize, _now_millis: i64) {
        let Some(items) = self.items.as_mut() else { return };
        let player_count = self.clients.count_connected().max(1);
        let mut rng = rand::thread_rng();
        items.try_pickup(idx, player_count, &mut rng);
    }

    /// §4.5: advance every item slot's respawn countdown by `elapsed_millis`,
    /// broadcasting `ItemSpawn`/`Announce` to connected clients as slots fire.
    pub fn tick_items(&mut self, elapsed_millis: i64, now_millis: i64) {
        let Some(len) = self.items.as_ref().map(|t| t.len()) else { return };
        let mut spawned = Vec::new();
        let mut announced = Vec::new();
        {
            let items = self.items.as_mut().unwrap();
            for idx in 0..len {
                match items.tick(idx, elapsed_millis) {
                    ItemTick::Expired => spawned.push(idx),
                    ItemTick::Announce => announced.push(idx),
                    ItemTick::None => {}
                }
            }
        }
        let targets: Vec<i32> = self.clients.iter().filter(|c| c.connected && !c.is_bot()).map(|c| c.cn).collect();
        for (tag, idxs) in [(MsgTag::ItemSpawn, spawned), (MsgTag::Announce, announced)] {
            for idx in idxs {
                let mut buf = MessageBuffer::new();
                write_byte(&mut buf, tag.as_byte());
                write_int(&mut buf, idx as i32);
                for &cn in &targets {
                    self.send_to_client(cn, Channel::Message, &buf.data, true, now_millis);
                }
            }
        }
    }

    fn handle_map_vote(&mut self, cn: i32, mapname: String, mode: String) {
        self.map_votes.cast(cn, Vote { mapname, mode });
        let total = self.clients.count_connected();
        if let Some(winner) = self.map_votes.has_majority(total) {
            self.change_map(&winner.mapname, Some(&winner.mode));
        }
    }

    /// Builds and sends one reliable/unreliable message to a connected
    /// client over its transport channel, e.g. relaying `SV_AUTHCHAL` once
    /// the master link answers a `reqauth` (§4.9).
    pub fn send_to_client(&mut self, cn: i32, channel: Channel, payload: &[u8], reliable: bool, now_millis: i64) {
        let Some(&addr) = self.addr_by_cn.get(&cn) else { return };
        let packet = self.peers.get_or_create(addr, now_millis).build_packet(channel, payload, reliable);
        if let Some(socket) = &self.socket {
            socket.send_to(&packet, addr);
        }
    }

    pub fn begin_intermission(&mut self) {
        self.phase = MatchPhase::Intermission;
        self.intermission_at_millis = Some(self.game_millis);
        self.mode.intermission();
    }

    /// §4.8/§4.9: prune expired bans/blacklist notices.
    pub fn purge_expired_notices(&mut self) {
        let now = self.game_millis;
        self.notices.retain(|n| !n.expiry.has_expired(now));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn change_map_resets_match_scoped_state() {
        let mut ctx = ServerContext::new(PathBuf::from("."));
        ctx.vote_target = Some("ctf_x".to_string());
        ctx.vote_yes.push(1);
        ctx.phase = MatchPhase::Intermission;
        ctx.change_map("complex", Some("ctf"));
        assert_eq!(ctx.phase, MatchPhase::Playing);
        assert_eq!(ctx.map_name, "complex");
        assert_eq!(ctx.mode_name, "ctf");
        assert!(ctx.vote_target.is_none());
        assert!(ctx.vote_yes.is_empty());
    }

    #[test]
    fn purge_expired_notices_drops_only_expired() {
        let mut ctx = ServerContext::new(PathBuf::from("."));
        ctx.game_millis = 1000;
        ctx.notices.push(Notice { pattern: "1.2.3.4".into(), expiry: crate::types::Expiry::At(500), reason: "expired".into() });
        ctx.notices.push(Notice { pattern: "5.6.7.8".into(), expiry: crate::types::Expiry::At(2000), reason: "active".into() });
        ctx.purge_expired_notices();
        assert_eq!(ctx.notices.len(), 1);
        assert_eq!(ctx.notices[0].reason, "active");
    }

    fn client_conn_bytes(name: &str) -> Vec<u8> {
        let mut buf = MessageBuffer::new();
        write_byte(&mut buf, MsgTag::ClientConn.as_byte());
        write_string(&mut buf, name);
        write_string(&mut buf, "");
        buf.data
    }

    #[test]
    fn handle_payload_client_conn_connects_and_assigns_slot() {
        let mut ctx = ServerContext::new(PathBuf::from("."));
        let addr: SocketAddr = "127.0.0.1:40000".parse().unwrap();
        let bytes = client_conn_bytes("alice");
        ctx.handle_payload(addr, Channel::Message, &bytes, 0);
        assert_eq!(ctx.clients.count_connected(), 1);
        let client = ctx.clients.get(0).unwrap();
        assert_eq!(client.name, "alice");
        assert!(client.connected);
        assert_eq!(ctx.addr_by_cn.get(&0), Some(&addr));
    }

    #[test]
    fn handle_payload_second_connection_gets_next_slot() {
        let mut ctx = ServerContext::new(PathBuf::from("."));
        let addr_a: SocketAddr = "127.0.0.1:40001".parse().unwrap();
        let addr_b: SocketAddr = "127.0.0.1:40002".parse().unwrap();
        ctx.handle_payload(addr_a, Channel::Message, &client_conn_bytes("a"), 0);
        ctx.handle_payload(addr_b, Channel::Message, &client_conn_bytes("b"), 0);
        assert_eq!(ctx.clients.count_connected(), 2);
        assert_eq!(ctx.clients.get(1).unwrap().name, "b");
    }

    #[test]
    fn handle_payload_text_routes_plain_chat_without_panicking() {
        let mut ctx = ServerContext::new(PathBuf::from("."));
        let addr: SocketAddr = "127.0.0.1:40003".parse().unwrap();
        ctx.handle_payload(addr, Channel::Message, &client_conn_bytes("carol"), 0);
        let mut text = MessageBuffer::new();
        write_byte(&mut text, MsgTag::Text.as_byte());
        write_string(&mut text, "gg");
        ctx.handle_payload(addr, Channel::Message, &text.data, 0);
        assert_eq!(ctx.clients.count_connected(), 1);
    }

    #[test]
    fn handle_payload_text_login_grants_admin_via_bare_password() {
        let mut ctx = ServerContext::new(PathBuf::from("."));
        ctx.privilege.set_admin_password("secret");
        let addr: SocketAddr = "127.0.0.1:40004".parse().unwrap();
        ctx.handle_payload(addr, Channel::Message, &client_conn_bytes("dave"), 0);
        let mut login = MessageBuffer::new();
        write_byte(&mut login, MsgTag::Text.as_byte());
        write_string(&mut login, "/login secret");
        ctx.handle_payload(addr, Channel::Message, &login.data, 0);
        let client = ctx.clients.get(0).unwrap();
        assert!(client.has_admin_permission());
        assert_eq!(client.privilege, Privilege::Admin);
    }

    #[test]
    fn handle_payload_text_login_account_grants_its_own_permissions() {
        let mut ctx = ServerContext::new(PathBuf::from("."));
        ctx.privilege.logins_mut().add("eve", "pw123", "s");
        let addr: SocketAddr = "127.0.0.1:40005".parse().unwrap();
        ctx.handle_payload(addr, Channel::Message, &client_conn_bytes("eve"), 0);
        let mut login = MessageBuffer::new();
        write_byte(&mut login, MsgTag::Text.as_byte());
        write_string(&mut login, "/login eve pw123");
        ctx.handle_payload(addr, Channel::Message, &login.data, 0);
        let client = ctx.clients.get(0).unwrap();
        assert_eq!(client.permissions, "s");
        assert!(client.has_admin_permission());
    }

    /// Mirrors `privilege.rs::hash_claim` (private) so the test can build a
    /// wire-accurate `SetMaster` claim without exposing that helper publicly.
    fn claim_hash(cn: i32, session_id: u32, password: &str) -> String {
        use sha1::{Digest, Sha1};
        let mut hasher = Sha1::new();
        hasher.update(format!("{} {} {}", cn, session_id, password).as_bytes());
        hasher.finalize().iter().map(|b| format!("{:02x}", b)).collect()
    }

    #[test]
    fn handle_payload_set_master_promotes_on_correct_admin_claim() {
        let mut ctx = ServerContext::new(PathBuf::from("."));
        ctx.privilege.set_admin_password("hunter2");
        let addr: SocketAddr = "127.0.0.1:40006".parse().unwrap();
        ctx.handle_payload(addr, Channel::Message, &client_conn_bytes("frank"), 0);
        let session_id = ctx.clients.get(0).unwrap().session_id;
        let claim = claim_hash(0, session_id, "hunter2");
        let mut setmaster = MessageBuffer::new();
        write_byte(&mut setmaster, MsgTag::SetMaster.as_byte());
        write_string(&mut setmaster, &claim);
        ctx.handle_payload(addr, Channel::Message, &setmaster.data, 0);
        assert_eq!(ctx.clients.get(0).unwrap().privilege, Privilege::Admin);
    }

    #[test]
    fn handle_payload_shoot_kills_target_and_records_frag() {
        let mut ctx = ServerContext::new(PathBuf::from("."));
        let addr_a: SocketAddr = "127.0.0.1:40007".parse().unwrap();
        let addr_b: SocketAddr = "127.0.0.1:40008".parse().unwrap();
        ctx.handle_payload(addr_a, Channel::Message, &client_conn_bytes("actor"), 0);
        ctx.handle_payload(addr_b, Channel::Message, &client_conn_bytes("target"), 0);
        ctx.clients.get_mut(1).unwrap().game.health = 1;
        ctx.clients.get_mut(1).unwrap().game.state = crate::types::LifeState::Alive;

        let mut shoot = MessageBuffer::new();
        write_byte(&mut shoot, MsgTag::Shoot.as_byte());
        write_byte(&mut shoot, 7); // rifle, well above the 1hp target
        write_int(&mut shoot, 1);
        ctx.handle_payload(addr_a, Channel::Message, &shoot.data, 0);

        assert_eq!(ctx.clients.get(0).unwrap().game.frags, 1);
        assert_eq!(ctx.clients.get(1).unwrap().game.deaths, 1);
        assert_eq!(ctx.clients.get(1).unwrap().game.state, crate::types::LifeState::Dead);
    }

    #[test]
    fn tick_items_fires_expired_and_announce_transitions() {
        let mut ctx = ServerContext::new(PathBuf::from("."));
        ctx.items = Some(crate::items::ItemTable::new(vec![crate::types::ServerEntity { item_type: 5, spawned: true, spawn_delay_millis: 0 }]));
        let mut rng = rand::thread_rng();
        ctx.items.as_mut().unwrap().try_pickup(0, 1, &mut rng);
        assert_eq!(ctx.items.as_ref().unwrap().get(0).unwrap().spawn_delay_millis, 20_000);
        ctx.tick_items(20_000, 0);
        assert!(ctx.items.as_ref().unwrap().get(0).unwrap().spawned);
    }
}
