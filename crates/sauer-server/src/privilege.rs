// privilege.rs — master-mode & privilege (§4.9)
// Converted from: myq2-original/server/sv_user.c's SV_Nextserver/password
// challenge handling, generalized from Quake2's single rcon password to the
// master/admin claim + allow-list model §4.9 describes.

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;

use sha1::{Digest, Sha1};

use crate::types::Privilege;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MasterMode {
    Open,
    Veto,
    Locked,
    Private,
}

impl MasterMode {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "open" => Some(MasterMode::Open),
            "veto" => Some(MasterMode::Veto),
            "locked" => Some(MasterMode::Locked),
            "private" => Some(MasterMode::Private),
            _ => None,
        }
    }
}

/// One outstanding external-auth handshake (§4.9 three-message challenge,
/// ground-truthed on `gameserver.cpp`'s `reqauth`/`chalauth`/`confauth`
/// exchange with the master link).
struct AuthPending {
    cn: i32,
    name: String,
}

/// Bitmask gating which mastermodes are reachable via the `mastermode`
/// command (§4.9 `mastermask`).
pub struct PrivilegeContext {
    pub mode: MasterMode,
    pub mastermask: u32,
    admin_password: Option<String>,
    pub requires_auth: bool,
    allow_list: HashSet<IpAddr>,
    blacklist: Vec<String>,
    whitelist: Vec<String>,
    logins: LoginAccounts,
    next_auth_req: u32,
    auth_pending: HashMap<u32, AuthPending>,
}

pub const MASK_VETO: u32 = 1 << 0;
pub const MASK_LOCKED: u32 = 1 << 1;
pub const MASK_PRIVATE: u32 = 1 << 2;

impl PrivilegeContext {
    pub fn new() -> Self {
        Self {
            mode: MasterMode::Open,
            mastermask: MASK_VETO | MASK_LOCKED | MASK_PRIVATE,
            admin_password: None,
            requires_auth: false,
            allow_list: HashSet::new(),
            blacklist: Vec::new(),
            whitelist: Vec::new(),
            logins: LoginAccounts::new(),
            next_auth_req: 1,
            auth_pending: HashMap::new(),
        }
    }

    pub fn logins(&self) -> &LoginAccounts {
        &self.logins
    }

    pub fn logins_mut(&mut self) -> &mut LoginAccounts {
        &mut self.logins
    }

    /// §4.9 step 1: client sent `authtry <user>`. Assigns a fresh request id,
    /// remembers which client/name it belongs to, and returns the string to
    /// forward to the master link (`reqauth <id> <user>`).
    pub fn begin_auth(&mut self, cn: i32, name: &str) -> (u32, String) {
        let id = self.next_auth_req;
        self.next_auth_req = self.next_auth_req.wrapping_add(1).max(1);
        self.auth_pending.insert(id, AuthPending { cn, name: name.to_string() });
        (id, format!("reqauth {} {}", id, name))
    }

    /// §4.9 step 2: the master link answered `chalauth <id> <val>`. Returns
    /// the `(cn, val)` pair to relay to the client as `SV_AUTHCHAL`.
    pub fn on_chalauth(&self, id: u32, val: &str) -> Option<(i32, String)> {
        self.auth_pending.get(&id).map(|p| (p.cn, val.to_string()))
    }

    /// §4.9 step 3: the client answered the challenge. Forwards
    /// `confauth <id> <val>` to the master link after stripping any trailing
    /// non-hex characters, matching the original's answer sanitization.
    pub fn confirm_auth(&self, id: u32, answer: &str) -> Option<String> {
        if !self.auth_pending.contains_key(&id) {
            return None;
        }
        let val: String = answer.chars().take_while(|c| c.is_ascii_hexdigit()).collect();
        Some(format!("confauth {} {}", id, val))
    }

    /// Master link said `failauth <id>`: clears the pending request and
    /// returns the client it belonged to, so the caller can notify it.
    pub fn on_failauth(&mut self, id: u32) -> Option<i32> {
        self.auth_pending.remove(&id).map(|p| p.cn)
    }

    /// Master link said `succauth <id>`: clears the pending request and
    /// returns `(cn, claimed_name)`; the caller promotes that client to
    /// Master via `setmaster(ci, true, "", ci->authname)`.
    pub fn on_succauth(&mut self, id: u32) -> Option<(i32, String)> {
        self.auth_pending.remove(&id).map(|p| (p.cn, p.name))
    }

    fn mode_allowed(&self, mode: MasterMode) -> bool {
        match mode {
            MasterMode::Open => true,
            MasterMode::Veto => self.mastermask & MASK_VETO != 0,
            MasterMode::Locked => self.mastermask & MASK_LOCKED != 0,
            MasterMode::Private => self.mastermask & MASK_PRIVATE != 0,
        }
    }

    /// Transitions require privilege or local peer (§4.9).
    pub fn set_mode(&mut self, mode: MasterMode, requester_priv: Privilege, requester_local: bool) -> bool {
        if requester_priv == Privilege::None && !requester_local {
            return false;
        }
        if !self.mode_allowed(mode) {
            return false;
        }
        self.mode = mode;
        if mode == MasterMode::Private {
            self.allow_list.clear();
        }
        true
    }

    /// Populated on entry to Private (§4.9): the set of currently-connected
    /// IPs is grandfathered in.
    pub fn seed_allow_list(&mut self, connected_ips: impl IntoIterator<Item = IpAddr>) {
        self.allow_list.extend(connected_ips);
    }

    pub fn allow_list_contains(&self, ip: &IpAddr) -> bool {
        self.allow_list.contains(ip)
    }

    /// §8 testable property: after Private, non-allow-listed IPs are refused.
    pub fn connection_allowed(&self, ip: &IpAddr) -> bool {
        match self.mode {
            MasterMode::Private => self.allow_list_contains(ip),
            _ => true,
        }
    }

    pub fn set_admin_password(&mut self, password: &str) {
        self.admin_password = Some(password.to_string());
    }

    pub fn is_blacklisted(&self, ident: &str) -> bool {
        self.blacklist.iter().any(|pat| sauer_common::wildcards::wildcardfit(pat, ident))
    }

    pub fn is_whitelisted(&self, ident: &str) -> bool {
        self.whitelist.iter().any(|pat| sauer_common::wildcards::wildcardfit(pat, ident))
    }

    pub fn add_blacklist(&mut self, pattern: &str) {
        self.blacklist.push(pattern.to_string());
    }

    pub fn add_whitelist(&mut self, pattern: &str) {
        self.whitelist.push(pattern.to_string());
    }

    /// §4.9 "Claim master": the client proves knowledge of the admin
    /// password by sending `hash(cn || " " || sessionId || " " || password)`
    /// instead of the password itself; the server recomputes the same
    /// challenge with its own copy of the password and compares.
    pub fn try_claim(&self, cn: i32, session_id: u32, candidate: &str, ident: &str) -> ClaimOutcome {
        let is_admin = self.password_matches(cn, session_id, candidate);
        if self.is_blacklisted(ident) && !is_admin {
            return ClaimOutcome::Rejected;
        }
        if is_admin {
            return ClaimOutcome::Admin;
        }
        if self.requires_auth {
            return ClaimOutcome::NeedsAuth;
        }
        ClaimOutcome::Master
    }

    /// Bare `/login <password>` chat form (§4.12): the human types the
    /// plaintext password directly, unlike `SetMaster`'s `try_claim` where
    /// the client software sends `hash(cn||sessionId||password)`.
    pub fn check_admin_password(&self, candidate: &str) -> bool {
        self.admin_password.as_deref() == Some(candidate)
    }

    fn password_matches(&self, cn: i32, session_id: u32, candidate: &str) -> bool {
        match &self.admin_password {
            Some(password) => hash_claim(cn, session_id, password) == candidate,
            None => false,
        }
    }
}

impl Default for PrivilegeContext {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    Admin,
    Master,
    NeedsAuth,
    Rejected,
}

fn hash_claim(cn: i32, session_id: u32, password: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(format!("{} {} {}", cn, session_id, password).as_bytes());
    hex::encode(hasher.finalize())
}

mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{:02x}", b)).collect()
    }
}

fn sha1_hex(s: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(s.as_bytes());
    hex::encode(hasher.finalize())
}

/// One admin-account row (§4.9, ground-truthed on `gameserver.cpp`'s
/// `login` struct and `addlogin`/`getlogins`/`clearlogins` ICOMMANDs).
#[derive(Debug, Clone)]
pub struct LoginAccount {
    pub user: String,
    pub password_sha1: String,
    pub permissions: String,
}

/// The in-game `/login` account table, keyed by username. Distinct from
/// the admin-password challenge in `try_claim`: this is the multi-account
/// permission-string system (`addlogin`), checked via
/// [`Client::has_admin_permission`](crate::types::Client::has_admin_permission).
#[derive(Debug, Default)]
pub struct LoginAccounts {
    accounts: Vec<LoginAccount>,
}

impl LoginAccounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// `addlogin <user> <password> <permissions>`: upserts by username.
    pub fn add(&mut self, user: &str, password: &str, permissions: &str) {
        let hashed = sha1_hex(password);
        if let Some(existing) = self.accounts.iter_mut().find(|a| a.user == user) {
            existing.password_sha1 = hashed;
            existing.permissions = permissions.to_string();
        } else {
            self.accounts.push(LoginAccount { user: user.to_string(), password_sha1: hashed, permissions: permissions.to_string() });
        }
    }

    /// `clearlogins`.
    pub fn clear(&mut self) {
        self.accounts.clear();
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LoginAccount> {
        self.accounts.iter()
    }

    /// `/login <user> <password>`: hashes the candidate and compares to the
    /// stored hash, returning the granted permission string on match.
    pub fn try_login(&self, user: &str, password: &str) -> Option<&str> {
        let hashed = sha1_hex(password);
        self.accounts.iter().find(|a| a.user == user && a.password_sha1 == hashed).map(|a| a.permissions.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn private_mode_blocks_unknown_ips() {
        let mut ctx = PrivilegeContext::new();
        let known: IpAddr = "127.0.0.1".parse().unwrap();
        let unknown: IpAddr = "10.0.0.5".parse().unwrap();
        ctx.set_mode(MasterMode::Private, Privilege::Admin, false);
        ctx.seed_allow_list([known]);
        assert!(ctx.connection_allowed(&known));
        assert!(!ctx.connection_allowed(&unknown));
    }

    #[test]
    fn non_privileged_cannot_change_mode() {
        let mut ctx = PrivilegeContext::new();
        assert!(!ctx.set_mode(MasterMode::Locked, Privilege::None, false));
        assert_eq!(ctx.mode, MasterMode::Open);
    }

    #[test]
    fn local_peer_can_change_mode_without_privilege() {
        let mut ctx = PrivilegeContext::new();
        assert!(ctx.set_mode(MasterMode::Veto, Privilege::None, true));
    }

    #[test]
    fn claim_with_correct_password_grants_admin() {
        let mut ctx = PrivilegeContext::new();
        ctx.set_admin_password("hunter2");
        let cn = 3;
        let sid = 999;
        let correct = hash_claim(cn, sid, "hunter2");
        assert_eq!(ctx.try_claim(cn, sid, &correct, "1.2.3.4"), ClaimOutcome::Admin);
        assert_eq!(ctx.try_claim(cn, sid, "wrong", "1.2.3.4"), ClaimOutcome::Master);
    }

    #[test]
    fn blacklisted_ident_rejected() {
        let mut ctx = PrivilegeContext::new();
        ctx.add_blacklist("cheater*");
        assert!(ctx.is_blacklisted("cheater99"));
        assert_eq!(ctx.try_claim(1, 1, "wrong", "cheater99"), ClaimOutcome::Rejected);
    }

    #[test]
    fn login_account_roundtrips_password_hash() {
        let mut logins = LoginAccounts::new();
        logins.add("alice", "s3cret", "a");
        assert_eq!(logins.try_login("alice", "s3cret"), Some("a"));
        assert_eq!(logins.try_login("alice", "wrong"), None);
        assert_eq!(logins.try_login("bob", "s3cret"), None);
    }

    #[test]
    fn addlogin_upserts_existing_user() {
        let mut logins = LoginAccounts::new();
        logins.add("alice", "first", "a");
        logins.add("alice", "second", "s");
        assert_eq!(logins.try_login("alice", "first"), None);
        assert_eq!(logins.try_login("alice", "second"), Some("s"));
        assert_eq!(logins.len(), 1);
    }

    #[test]
    fn clearlogins_empties_table() {
        let mut logins = LoginAccounts::new();
        logins.add("alice", "pw", "a");
        logins.clear();
        assert!(logins.is_empty());
    }

    #[test]
    fn auth_challenge_three_message_flow_promotes_to_master() {
        let mut ctx = PrivilegeContext::new();
        let (id, forward) = ctx.begin_auth(3, "alice");
        assert_eq!(forward, format!("reqauth {} alice", id));

        let (cn, val) = ctx.on_chalauth(id, "deadbeef").unwrap();
        assert_eq!(cn, 3);
        assert_eq!(val, "deadbeef");

        let confirm = ctx.confirm_auth(id, "cafef00d!!!").unwrap();
        assert_eq!(confirm, format!("confauth {} cafef00d", id));

        let (cn, name) = ctx.on_succauth(id).unwrap();
        assert_eq!(cn, 3);
        assert_eq!(name, "alice");
        assert!(ctx.on_chalauth(id, "stale").is_none());
    }

    #[test]
    fn auth_challenge_failure_clears_pending() {
        let mut ctx = PrivilegeContext::new();
        let (id, _) = ctx.begin_auth(7, "bob");
        assert_eq!(ctx.on_failauth(id), Some(7));
        assert!(ctx.on_succauth(id).is_none());
    }
}
