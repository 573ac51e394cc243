// console.rs — operator console commands: kick/ban/mastermode/map/status/say.
// Converted from: the teacher's sv_kick_f/sv_status_f/sv_con_say_f in
// sv_ccmds.rs (same printf-to-console-and-broadcast shape), retargeted from
// Quake2's client_t slot table to this game's ClientRegistry and from a
// single rcon password to the master/admin privilege model (§4.9).

use sauer_common::common::com_printf;

use crate::privilege::MasterMode;
use crate::server::ServerContext;
use crate::types::{Expiry, Notice, Privilege};

/// Equivalent to the teacher's `sv_kick_f`.
pub fn kick_f(ctx: &mut ServerContext, cn: i32, kicker_priv: Privilege, kicker_local: bool) -> Result<(), &'static str> {
    if kicker_priv == Privilege::None && !kicker_local {
        return Err("insufficient privilege");
    }
    if ctx.clients.get(cn).is_none() {
        return Err("no such client");
    }
    let name = ctx.clients.get(cn).unwrap().name.clone();
    ctx.clients.disconnect(cn);
    com_printf(&format!("{} was kicked\n", name));
    Ok(())
}

/// §4.9/§4.8 "ban" — adds a notice that blocks future reconnection by IP,
/// kicking the target if currently connected.
pub fn ban_f(ctx: &mut ServerContext, cn: i32, reason: &str, duration_millis: Option<i64>, kicker_priv: Privilege, kicker_local: bool) -> Result<(), &'static str> {
    if kicker_priv == Privilege::None && !kicker_local {
        return Err("insufficient privilege");
    }
    let Some(client) = ctx.clients.get(cn) else { return Err("no such client") };
    let pattern = client.ip.to_string();
    let expiry = match duration_millis {
        Some(d) => Expiry::At(ctx.game_millis + d),
        None => Expiry::Permanent,
    };
    ctx.notices.push(Notice { pattern: pattern.clone(), expiry, reason: reason.to_string() });
    ctx.privilege.add_blacklist(&pattern);
    ctx.clients.disconnect(cn);
    com_printf(&format!("{} was banned: {}\n", pattern, reason));
    Ok(())
}

pub fn mastermode_f(ctx: &mut ServerContext, mode: &str, requester_priv: Privilege, requester_local: bool) -> Result<(), &'static str> {
    let mode = MasterMode::from_str(mode).ok_or("unknown mastermode")?;
    if ctx.privilege.set_mode(mode, requester_priv, requester_local) {
        if mode == MasterMode::Private {
            let ips = ctx.clients.iter().map(|c| c.ip);
            let ips: Vec<_> = ips.collect();
            ctx.privilege.seed_allow_list(ips);
        }
        com_printf(&format!("mastermode is now {:?}\n", mode));
        Ok(())
    } else {
        Err("mastermode change denied")
    }
}

/// Equivalent to the teacher's `sv_map_f`: changes map and (optionally) mode.
pub fn map_f(ctx: &mut ServerContext, map_name: &str, mode_name: Option<&str>) {
    ctx.change_map(map_name, mode_name);
    com_printf(&format!("map: {} ({})\n", ctx.map_name, ctx.mode_name));
}

/// Equivalent to the teacher's `sv_status_f`.
pub fn status_f(ctx: &ServerContext) {
    com_printf(&format!("map              : {}\n", ctx.map_name));
    com_printf("cn  frags ping name            address\n");
    com_printf("--- ----- ---- --------------- ---------------\n");
    for client in ctx.clients.iter() {
        com_printf(&format!(
            "{:3} {:5} {:4} {:<15} {}\n",
            client.cn, client.game.frags, client.ping, client.name, client.ip
        ));
    }
}

/// Equivalent to the teacher's `sv_con_say_f`.
pub fn say_f(text: &str) {
    com_printf(&format!("{}\n", text));
}

/// Registers every game-specific console command name with `ctx.cmds` with
/// `None` as its function — the teacher's documented meaning for "forwarded
/// to server as clc_stringcmd" — so `cmdlist`/autocomplete know about them
/// even though the actual handling happens in [`dispatch_command`], which
/// needs a live `&mut ServerContext` a boxed `CmdFunction` closure can't
/// capture.
pub fn register_commands(ctx: &mut ServerContext) {
    const NAMES: &[&str] = &[
        "kick", "ban", "mastermode", "map", "status", "say",
        "addlogin", "clearlogins", "getlogins",
        "addspreemsg", "addmultikillmsg",
        "addbotname", "delbotname", "listbotnames",
        "listclients", "ismaster", "isadmin",
    ];
    for name in NAMES {
        ctx.cmds.cmd_add_command(name, None);
    }
}

/// Parses one operator-console line into a concrete command and runs it.
/// Console input is always local+admin-equivalent, matching the teacher's
/// treatment of the dedicated server's own stdin (§4.9 "local peer"
/// bypasses the privilege check). Returns `false` for an unrecognized
/// command, so the caller can fall back to the cvar/cbuf command system.
pub fn dispatch_command(ctx: &mut ServerContext, line: &str) -> bool {
    let mut parts = line.split_whitespace();
    let Some(cmd) = parts.next() else { return false };
    let rest: Vec<&str> = parts.collect();
    match cmd {
        "kick" => match rest.first().and_then(|s| s.parse().ok()) {
            Some(cn) => {
                if let Err(e) = kick_f(ctx, cn, Privilege::Admin, true) {
                    com_printf(&format!("kick failed: {}\n", e));
                }
            }
            None => return false,
        },
        "ban" => match rest.first().and_then(|s| s.parse().ok()) {
            Some(cn) => {
                let reason = rest.get(1..).map(|r| r.join(" ")).filter(|r| !r.is_empty()).unwrap_or_else(|| "banned".to_string());
                if let Err(e) = ban_f(ctx, cn, &reason, None, Privilege::Admin, true) {
                    com_printf(&format!("ban failed: {}\n", e));
                }
            }
            None => return false,
        },
        "mastermode" => match rest.first() {
            Some(mode) => {
                if let Err(e) = mastermode_f(ctx, mode, Privilege::Admin, true) {
                    com_printf(&format!("mastermode failed: {}\n", e));
                }
            }
            None => return false,
        },
        "map" => match rest.first() {
            Some(map_name) => map_f(ctx, map_name, rest.get(1).copied()),
            None => return false,
        },
        "status" => status_f(ctx),
        "say" => say_f(&rest.join(" ")),
        "addlogin" => {
            if rest.len() != 3 {
                return false;
            }
            ctx.privilege.logins_mut().add(rest[0], rest[1], rest[2]);
            com_printf(&format!("login added: {}\n", rest[0]));
        }
        "clearlogins" => {
            ctx.privilege.logins_mut().clear();
            com_printf("logins cleared\n");
        }
        "getlogins" => {
            for account in ctx.privilege.logins().iter() {
                com_printf(&format!("{} {}\n", account.user, account.permissions));
            }
        }
        "addspreemsg" => {
            if rest.len() != 3 {
                return false;
            }
            let Ok(frags) = rest[0].parse() else { return false };
            ctx.kill_messages.add_spree(frags, rest[1], rest[2]);
        }
        "addmultikillmsg" => {
            if rest.len() != 2 {
                return false;
            }
            let Ok(frags) = rest[0].parse() else { return false };
            ctx.kill_messages.add_multi(frags, rest[1]);
        }
        "addbotname" => match rest.first() {
            Some(name) => ctx.bot_names.push((*name).to_string()),
            None => return false,
        },
        "delbotname" => match rest.first() {
            Some(name) => ctx.bot_names.retain(|n| n != name),
            None => return false,
        },
        "listbotnames" => com_printf(&format!("{}\n", ctx.bot_names.join(", "))),
        "listclients" => {
            for line in ctx.list_clients() {
                com_printf(&format!("{}\n", line));
            }
        }
        "ismaster" => match rest.first().and_then(|s| s.parse().ok()) {
            Some(cn) => com_printf(&format!("{}\n", ctx.is_master(cn))),
            None => return false,
        },
        "isadmin" => match rest.first().and_then(|s| s.parse().ok()) {
            Some(cn) => com_printf(&format!("{}\n", ctx.is_admin(cn))),
            None => return false,
        },
        _ => return false,
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn ctx_with_client() -> (ServerContext, i32) {
        let mut ctx = ServerContext::new(PathBuf::from("."));
        let cn = ctx.clients.connect_human([127, 0, 0, 1].into(), 0).unwrap();
        ctx.clients.get_mut(cn).unwrap().name = "bob".to_string();
        (ctx, cn)
    }

    #[test]
    fn kick_requires_privilege_or_local() {
        let (mut ctx, cn) = ctx_with_client();
        assert!(kick_f(&mut ctx, cn, Privilege::None, false).is_err());
        assert!(ctx.clients.get(cn).is_some());
        assert!(kick_f(&mut ctx, cn, Privilege::None, true).is_ok());
        assert!(ctx.clients.get(cn).is_none());
    }

    #[test]
    fn ban_adds_notice_and_blacklist() {
        let (mut ctx, cn) = ctx_with_client();
        ban_f(&mut ctx, cn, "cheating", None, Privilege::Admin, false).unwrap();
        assert_eq!(ctx.notices.len(), 1);
        assert!(ctx.privilege.is_blacklisted("127.0.0.1"));
    }

    #[test]
    fn dispatch_kick_removes_client() {
        let (mut ctx, cn) = ctx_with_client();
        assert!(dispatch_command(&mut ctx, &format!("kick {}", cn)));
        assert!(ctx.clients.get(cn).is_none());
    }

    #[test]
    fn dispatch_addlogin_then_getlogins_roundtrips() {
        let (mut ctx, _cn) = ctx_with_client();
        assert!(dispatch_command(&mut ctx, "addlogin alice s3cret a"));
        assert_eq!(ctx.privilege.logins().iter().count(), 1);
        assert!(dispatch_command(&mut ctx, "clearlogins"));
        assert!(ctx.privilege.logins().is_empty());
    }

    #[test]
    fn dispatch_addspreemsg_feeds_kill_message_table() {
        let (mut ctx, _cn) = ctx_with_client();
        assert!(dispatch_command(&mut ctx, "addspreemsg 5 on_a_killing_spree spree_ended"));
        assert!(ctx.kill_messages.spree_message(5).is_some());
    }

    #[test]
    fn dispatch_addbotname_then_delbotname() {
        let (mut ctx, _cn) = ctx_with_client();
        assert!(dispatch_command(&mut ctx, "addbotname Ratboy"));
        assert_eq!(ctx.bot_names, vec!["Ratboy".to_string()]);
        assert!(dispatch_command(&mut ctx, "delbotname Ratboy"));
        assert!(ctx.bot_names.is_empty());
    }

    #[test]
    fn dispatch_ismaster_isadmin_reflect_privilege() {
        let (mut ctx, cn) = ctx_with_client();
        ctx.clients.get_mut(cn).unwrap().privilege = Privilege::Admin;
        assert!(dispatch_command(&mut ctx, &format!("isadmin {}", cn)));
        assert!(dispatch_command(&mut ctx, &format!("ismaster {}", cn)));
        assert!(ctx.is_admin(cn));
        assert!(ctx.is_master(cn));
    }

    #[test]
    fn dispatch_unknown_command_returns_false() {
        let (mut ctx, _cn) = ctx_with_client();
        assert!(!dispatch_command(&mut ctx, "frobnicate"));
    }

    #[test]
    fn register_commands_populates_cmd_table() {
        let (mut ctx, _cn) = ctx_with_client();
        register_commands(&mut ctx);
        assert!(ctx.cmds.cmd_functions.iter().any(|f| f.name == "kick"));
    }

    #[test]
    fn mastermode_private_seeds_allow_list_from_connected() {
        let (mut ctx, _cn) = ctx_with_client();
        mastermode_f(&mut ctx, "private", Privilege::Admin, false).unwrap();
        assert!(ctx.privilege.allow_list_contains(&"127.0.0.1".parse().unwrap()));
    }

    #[test]
    fn map_f_updates_map_and_mode() {
        let (mut ctx, _cn) = ctx_with_client();
        map_f(&mut ctx, "complex", Some("ctf"));
        assert_eq!(ctx.map_name, "complex");
        assert_eq!(ctx.mode_name, "ctf");
    }
}
