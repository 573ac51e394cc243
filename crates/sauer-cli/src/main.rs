// main.rs — process entry point (§4.11, §5).
// Converted from: the teacher's WinMain-equivalent Sys_Init/Qcommon_Init
// bootstrap sequence, replaced wholesale since the teacher's entry point is
// a winit GUI event loop with no counterpart here — this server has no
// window, so entry is a single-threaded cooperative loop over sockets,
// a stdin reader thread, and a 5ms timer (§5).

mod services;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use sauer_common::cmd::EXEC_NOW;
use sauer_common::common::{com_printf, ComArgs};
use sauer_common::transport::{Channel, GameSocket, Received};
use sauer_common::wire::{write_byte, write_string, MessageBuffer};
use sauer_server::dispatch::MsgTag;
use sauer_server::server::ServerContext;
use sauer_server::types::Privilege;

use services::master::MasterEvent;
use services::{http, irc, master, ping};

const TICK_MILLIS: i64 = 5;

struct Options {
    description: String,
    server_pass: String,
    admin_pass: String,
    publicserver: u8,
    botlimit: i32,
    uprate: i32,
    maxclients: usize,
    bind_ip: String,
    port: u16,
    master_addr: Option<String>,
    homedir: PathBuf,
    packagedir: PathBuf,
    init_config: Option<String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            description: String::new(),
            server_pass: String::new(),
            admin_pass: String::new(),
            publicserver: 1,
            botlimit: 0,
            uprate: 0,
            maxclients: sauer_server::types::MAXCLIENTS,
            bind_ip: "0.0.0.0".to_string(),
            port: 28785,
            master_addr: None,
            homedir: PathBuf::from("."),
            packagedir: PathBuf::from("packages"),
            init_config: None,
        }
    }
}

/// §6 CLI flags: `-n desc -y pass -p adminpass -o 0|1|2 -g botlimit -u uprate
/// -c maxclients -i bindIP -j port -m master -q homedir -k packagedir -f cfg`.
fn parse_args(args: &ComArgs) -> Options {
    let mut opts = Options::default();
    let mut i = 1;
    while i < args.com_argc() {
        let flag = args.com_argv(i);
        let value = args.com_argv(i + 1);
        match flag {
            "-n" => opts.description = value.to_string(),
            "-y" => opts.server_pass = value.to_string(),
            "-p" => opts.admin_pass = value.to_string(),
            "-o" => opts.publicserver = value.parse().unwrap_or(1),
            "-g" => opts.botlimit = value.parse().unwrap_or(0),
            "-u" => opts.uprate = value.parse().unwrap_or(0),
            "-c" => opts.maxclients = value.parse().unwrap_or(sauer_server::types::MAXCLIENTS),
            "-i" => opts.bind_ip = value.to_string(),
            "-j" => opts.port = value.parse().unwrap_or(28785),
            "-m" => opts.master_addr = Some(value.to_string()),
            "-q" => opts.homedir = PathBuf::from(value),
            "-k" => opts.packagedir = PathBuf::from(value),
            "-f" => opts.init_config = Some(value.to_string()),
            _ => {
                i += 1;
                continue;
            }
        }
        i += 2;
    }
    opts
}

/// §4.11: the only dedicated OS thread — blocking stdin reads feed
/// completed lines into a channel the main loop drains non-blockingly.
fn spawn_stdin_thread() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut line = String::new();
        loop {
            line.clear();
            match stdin.read_line(&mut line) {
                Ok(0) => break,
                Ok(_) => {
                    if tx.send(line.trim_end().to_string()).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });
    rx
}

fn main() {
    let raw_args: Vec<String> = std::env::args().collect();
    let mut args = ComArgs::new();
    args.init(&raw_args);
    let opts = parse_args(&args);

    let mut ctx = ServerContext::new(opts.homedir.clone());
    sauer_server::console::register_commands(&mut ctx);
    ctx.server_description = opts.description.clone();
    ctx.max_clients = opts.maxclients;
    if !opts.admin_pass.is_empty() {
        ctx.privilege.set_admin_password(&opts.admin_pass);
    }
    if let Some(cfg) = &opts.init_config {
        if let Some(bytes) = ctx.fs.load_file(cfg) {
            for line in String::from_utf8_lossy(&bytes).lines() {
                ctx.cmds.cbuf_execute_text(EXEC_NOW, line);
            }
        }
    }

    let bind_addr: SocketAddr = format!("{}:{}", opts.bind_ip, opts.port).parse().unwrap_or_else(|_| {
        com_printf("bad bind address, falling back to 0.0.0.0\n");
        ([0, 0, 0, 0], opts.port).into()
    });

    // §7 tier 3: listen-socket failure on startup is fatal.
    let socket = match GameSocket::bind(bind_addr, false) {
        Ok(s) => s,
        Err(e) => {
            com_printf(&format!("FATAL: failed to bind game socket on {}: {}\n", bind_addr, e));
            std::process::exit(1);
        }
    };
    ctx.socket = Some(socket);
    com_printf(&format!("sauerservd listening on {}\n", bind_addr));

    let info_socket = ping::bind_info_socket(([0, 0, 0, 0], opts.port + 1).into()).ok();
    let http_listener = http::bind(opts.port + 2).ok();
    let mut master_link = opts.master_addr.as_ref().map(|addr| master::MasterLink::new(addr.clone()));
    let mut irc_link: Option<irc::IrcLink> = None;

    let stdin_rx = spawn_stdin_thread();

    let start = Instant::now();
    let mut last_tick_millis: i64 = 0;
    let mut last_worldstate_millis: i64 = 0;

    loop {
        let now_millis = start.elapsed().as_millis() as i64;

        // Poll all I/O sources non-blockingly (§5: "single-threaded
        // cooperative event loop... handlers run to completion").
        let polled: Vec<(SocketAddr, Vec<u8>)> = ctx.socket.as_ref().map(|s| s.poll()).unwrap_or_default();
        for (peer_addr, bytes) in polled {
            let received = {
                let peer = ctx.peers.get_or_create(peer_addr, now_millis);
                peer.process_incoming(&bytes, now_millis)
            };
            if let Received::Payload { channel, bytes } = received {
                ctx.handle_payload(peer_addr, channel, &bytes, now_millis);
            }
        }

        while let Ok(line) = stdin_rx.try_recv() {
            if !sauer_server::console::dispatch_command(&mut ctx, &line) {
                ctx.cmds.cbuf_execute_text(EXEC_NOW, &line);
            }
        }

        if let Some(link) = &mut master_link {
            for event in link.poll(opts.port) {
                handle_master_event(&mut ctx, event, now_millis);
            }
            for forward in ctx.pending_master_forwards.drain(..) {
                link.send_raw(&forward);
            }
        } else {
            ctx.pending_master_forwards.clear();
        }

        if let Some(link) = &mut irc_link {
            for event in link.poll() {
                com_printf(&format!("irc: {:?}\n", event));
            }
        }

        if let Some(listener) = &http_listener {
            if let Ok((stream, _)) = listener.accept() {
                http::serve_one(stream, |req| {
                    let _ = req;
                    (true, http::status_json(&http::StatusSnapshot {
                        map: ctx.map_name.clone(),
                        mode: ctx.mode_name.clone(),
                        modename: ctx.mode.name().to_string(),
                        maxclients: ctx.max_clients,
                        clients: ctx.clients.iter().map(|c| http::ClientSummary {
                            name: c.name.clone(),
                            cn: c.cn,
                            ip: c.ip.to_string(),
                            host: c.host.clone(),
                        }).collect(),
                    }))
                });
            }
        }

        if let Some(socket) = &info_socket {
            let mut buf = [0u8; 512];
            while let Ok((_n, from)) = socket.recv_from(&mut buf) {
                let reply = ping::build_reply(&ping::ServerInfo {
                    num_clients: ctx.clients.count_connected(),
                    protocol_version: 1,
                    mode: &ctx.mode_name,
                    minutes_remaining: 0,
                    max_clients: ctx.max_clients,
                    mastermode: ping::EffectiveMastermode::Open,
                    map_name: &ctx.map_name,
                    description: &ctx.server_description,
                });
                let _ = socket.send_to(reply.as_bytes(), from);
            }
        }

        // §5 "Tick cadence": 5ms timer drives serverUpdate.
        if now_millis - last_tick_millis >= TICK_MILLIS {
            let delta = now_millis - last_tick_millis;
            last_tick_millis = now_millis;
            ctx.game_millis += delta;
            ctx.total_millis += delta;
            ctx.purge_expired_notices();
            ctx.tick_items(delta, now_millis);

            // 33ms gate: coalesce worldstate builds under load.
            if now_millis - last_worldstate_millis >= sauer_server::worldstate::TICK_MILLIS {
                last_worldstate_millis = now_millis;
                broadcast_worldstate(&mut ctx, now_millis);
            }
        }

        std::thread::sleep(Duration::from_millis(1));
    }
}

/// Relays the master link's side of the three-message Auth challenge back
/// into the game state, and on to the waiting client (§4.9).
fn handle_master_event(ctx: &mut ServerContext, event: MasterEvent, now_millis: i64) {
    match event {
        MasterEvent::Registered => com_printf("master: registered\n"),
        MasterEvent::Rejected(reason) => com_printf(&format!("master: registration rejected: {}\n", reason)),
        MasterEvent::AuthChallenge { id, value } => {
            let Ok(id) = id.parse::<u32>() else { return };
            if let Some((cn, val)) = ctx.privilege.on_chalauth(id, &value) {
                let mut buf = MessageBuffer::new();
                write_byte(&mut buf, MsgTag::AuthChal.as_byte());
                write_string(&mut buf, &val);
                ctx.send_to_client(cn, Channel::Message, &buf.data, true, now_millis);
            }
        }
        MasterEvent::AuthFail { id } => {
            let Ok(id) = id.parse::<u32>() else { return };
            if let Some(cn) = ctx.privilege.on_failauth(id) {
                com_printf(&format!("{}: master auth failed\n", cn));
            }
        }
        MasterEvent::AuthSuccess { id } => {
            let Ok(id) = id.parse::<u32>() else { return };
            if let Some((cn, name)) = ctx.privilege.on_succauth(id) {
                if let Some(client) = ctx.clients.get_mut(cn) {
                    client.privilege = Privilege::Master;
                }
                com_printf(&format!("{} authenticated as master\n", name));
            }
        }
    }
}

/// §4.7 steps 4-6: build this tick's worldstate and send every connected
/// human the complement of its own positions/messages ranges.
fn broadcast_worldstate(ctx: &mut ServerContext, now_millis: i64) {
    let ws = sauer_server::worldstate::build_worldstate(ctx.clients.iter_mut());
    let targets: Vec<(i32, bool, bool)> = ctx
        .clients
        .iter()
        .filter(|c| c.connected && !c.is_bot())
        .map(|c| {
            let has_pos = ws.position_ranges.iter().any(|(cn, _)| *cn != c.cn);
            let has_msg = ws.message_ranges.iter().any(|(cn, _)| *cn != c.cn);
            (c.cn, has_pos, has_msg)
        })
        .collect();
    for (cn, has_pos, has_msg) in targets {
        if has_pos {
            let payload = sauer_server::worldstate::complement_for(&ws, cn, &ws.position_ranges, &ws.positions);
            ctx.send_to_client(cn, Channel::Position, &payload, false, now_millis);
        }
        if has_msg {
            let payload = sauer_server::worldstate::complement_for(&ws, cn, &ws.message_ranges, &ws.messages);
            ctx.send_to_client(cn, Channel::Message, &payload, true, now_millis);
        }
    }
}
