// services/master.rs — master-server registration link (§6 "Master-server
// link"). Converted from: the teacher's net_tcp connect/reconnect pattern
// (myq2-sys::net_tcp), generalized from a raw byte stream into this game's
// line-oriented `regserv`/`succreg`/`failreg`/`*auth` protocol.

use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::time::{Duration, Instant};

use sauer_common::common::{com_dprintf, com_printf};

const REREGISTER_INTERVAL: Duration = Duration::from_secs(3600);

#[derive(Debug)]
pub enum MasterEvent {
    Registered,
    Rejected(String),
    AuthChallenge { id: String, value: String },
    AuthFail { id: String },
    AuthSuccess { id: String },
}

/// Non-fatal reconnect-with-backoff link to the master server (§7: "External
/// service failures... are non-fatal: logged, reconnected with backoff").
pub struct MasterLink {
    addr: String,
    stream: Option<BufReader<TcpStream>>,
    last_attempt: Option<Instant>,
    backoff: Duration,
    last_register: Option<Instant>,
    gave_up: bool,
}

impl MasterLink {
    pub fn new(addr: String) -> Self {
        Self { addr, stream: None, last_attempt: None, backoff: Duration::from_secs(1), last_register: None, gave_up: false }
    }

    fn connected(&self) -> bool {
        self.stream.is_some()
    }

    fn try_connect(&mut self) {
        if self.gave_up {
            return;
        }
        if let Some(last) = self.last_attempt {
            if last.elapsed() < self.backoff {
                return;
            }
        }
        self.last_attempt = Some(Instant::now());
        match TcpStream::connect(&self.addr) {
            Ok(stream) => {
                stream.set_nonblocking(true).ok();
                self.stream = Some(BufReader::new(stream));
                self.backoff = Duration::from_secs(1);
                com_dprintf(&format!("master: connected to {}\n", self.addr));
            }
            Err(e) => {
                com_dprintf(&format!("master: connect to {} failed: {}\n", self.addr, e));
                self.backoff = (self.backoff * 2).min(Duration::from_secs(300));
                if e.kind() == std::io::ErrorKind::ConnectionRefused {
                    self.gave_up = true;
                    com_printf(&format!("master: {} refused connection, giving up this session\n", self.addr));
                }
            }
        }
    }

    /// Call once per tick. Reregisters hourly, reconnects on drop.
    pub fn poll(&mut self, port: u16) -> Vec<MasterEvent> {
        if !self.connected() {
            self.try_connect();
        }
        let mut events = Vec::new();
        let should_register = self.last_register.map(|t| t.elapsed() >= REREGISTER_INTERVAL).unwrap_or(true);
        if self.connected() && should_register {
            self.send_line(&format!("regserv {}", port));
            self.last_register = Some(Instant::now());
        }
        if let Some(reader) = &mut self.stream {
            let mut line = String::new();
            loop {
                line.clear();
                match reader.read_line(&mut line) {
                    Ok(0) => {
                        self.stream = None;
                        break;
                    }
                    Ok(_) => {
                        if let Some(event) = parse_line(line.trim_end()) {
                            events.push(event);
                        }
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                    Err(_) => {
                        self.stream = None;
                        break;
                    }
                }
            }
        }
        events
    }

    /// Forwards a pre-built protocol line (`reqauth`/`confauth`) straight to
    /// the master link, bypassing registration bookkeeping.
    pub fn send_raw(&mut self, line: &str) {
        self.send_line(line);
    }

    fn send_line(&mut self, line: &str) {
        if let Some(reader) = &mut self.stream {
            let _ = writeln!(reader.get_mut(), "{}", line);
        }
    }
}

fn parse_line(line: &str) -> Option<MasterEvent> {
    let mut parts = line.split_whitespace();
    match parts.next()? {
        "succreg" => Some(MasterEvent::Registered),
        "failreg" => Some(MasterEvent::Rejected(parts.collect::<Vec<_>>().join(" "))),
        "chalauth" => Some(MasterEvent::AuthChallenge { id: parts.next()?.to_string(), value: parts.collect::<Vec<_>>().join(" ") }),
        "failauth" => Some(MasterEvent::AuthFail { id: parts.next()?.to_string() }),
        "succauth" => Some(MasterEvent::AuthSuccess { id: parts.next()?.to_string() }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_known_line_shapes() {
        assert!(matches!(parse_line("succreg"), Some(MasterEvent::Registered)));
        assert!(matches!(parse_line("failreg too many"), Some(MasterEvent::Rejected(_))));
        assert!(matches!(parse_line("chalauth 7 abc123"), Some(MasterEvent::AuthChallenge { .. })));
        assert!(matches!(parse_line("failauth 7"), Some(MasterEvent::AuthFail { .. })));
        assert!(matches!(parse_line("succauth 7"), Some(MasterEvent::AuthSuccess { .. })));
        assert!(parse_line("gibberish").is_none());
    }
}
