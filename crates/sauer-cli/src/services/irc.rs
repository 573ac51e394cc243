// services/irc.rs — IRC relay bridge (§6 "IRC bridge").
// Converted from: the same net_tcp reconnect-with-backoff shape as
// services/master.rs, generalized to a minimal RFC1459 subset (NICK/USER/
// JOIN/PRIVMSG/PING) sufficient to relay channel chat both ways.

use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::time::{Duration, Instant};

use sauer_common::common::com_dprintf;

pub const DEFAULT_FROGCHAR: char = '@';

#[derive(Debug, PartialEq, Eq)]
pub enum IrcEvent {
    ChannelMessage { nick: String, text: String },
    /// A `frogchar`-prefixed command, already split into name + args (§6:
    /// "executes a whitelisted command set").
    Command { nick: String, name: String, args: Vec<String> },
}

/// Commands reachable via the frogchar prefix (§6).
pub const COMMAND_WHITELIST: &[&str] = &["who", "info", "login", "help"];

pub struct IrcLink {
    addr: String,
    nick: String,
    channel: String,
    frogchar: char,
    stream: Option<BufReader<TcpStream>>,
    last_attempt: Option<Instant>,
    backoff: Duration,
    joined: bool,
}

impl IrcLink {
    pub fn new(addr: String, nick: String, channel: String) -> Self {
        Self { addr, nick, channel, frogchar: DEFAULT_FROGCHAR, stream: None, last_attempt: None, backoff: Duration::from_secs(1), joined: false }
    }

    fn connected(&self) -> bool {
        self.stream.is_some()
    }

    fn try_connect(&mut self) {
        if let Some(last) = self.last_attempt {
            if last.elapsed() < self.backoff {
                return;
            }
        }
        self.last_attempt = Some(Instant::now());
        match TcpStream::connect(&self.addr) {
            Ok(stream) => {
                stream.set_nonblocking(true).ok();
                let mut reader = BufReader::new(stream);
                let _ = writeln!(reader.get_mut(), "NICK {}", self.nick);
                let _ = writeln!(reader.get_mut(), "USER {} 0 * :sauerservd relay", self.nick);
                let _ = writeln!(reader.get_mut(), "JOIN {}", self.channel);
                self.stream = Some(reader);
                self.backoff = Duration::from_secs(1);
                self.joined = true;
                com_dprintf(&format!("irc: connected to {}\n", self.addr));
            }
            Err(e) => {
                com_dprintf(&format!("irc: connect to {} failed: {}\n", self.addr, e));
                self.backoff = (self.backoff * 2).min(Duration::from_secs(300));
            }
        }
    }

    pub fn poll(&mut self) -> Vec<IrcEvent> {
        if !self.connected() {
            self.try_connect();
        }
        let mut events = Vec::new();
        let frogchar = self.frogchar;
        if let Some(reader) = &mut self.stream {
            let mut line = String::new();
            loop {
                line.clear();
                match reader.read_line(&mut line) {
                    Ok(0) => {
                        self.stream = None;
                        self.joined = false;
                        break;
                    }
                    Ok(_) => {
                        let raw = line.trim_end();
                        if let Some(rest) = raw.strip_prefix("PING ") {
                            let _ = writeln!(reader.get_mut(), "PONG {}", rest);
                            continue;
                        }
                        if let Some(event) = parse_privmsg(raw, frogchar) {
                            events.push(event);
                        }
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                    Err(_) => {
                        self.stream = None;
                        self.joined = false;
                        break;
                    }
                }
            }
        }
        events
    }

    pub fn relay_to_channel(&mut self, game_name: &str, text: &str) {
        if let Some(reader) = &mut self.stream {
            let _ = writeln!(reader.get_mut(), "PRIVMSG {} :<{}> {}", self.channel, game_name, text);
        }
    }
}

fn parse_privmsg(line: &str, frogchar: char) -> Option<IrcEvent> {
    // :nick!user@host PRIVMSG #chan :text
    let prefix = line.strip_prefix(':')?;
    let (nick_part, rest) = prefix.split_once(' ')?;
    let nick = nick_part.split('!').next()?.to_string();
    let rest = rest.strip_prefix("PRIVMSG ")?;
    let (_, text) = rest.split_once(" :")?;
    if let Some(cmd_line) = text.strip_prefix(frogchar) {
        let mut parts = cmd_line.split_whitespace();
        let name = parts.next()?.to_lowercase();
        if !COMMAND_WHITELIST.contains(&name.as_str()) {
            return None;
        }
        let args = parts.map(|s| s.to_string()).collect();
        return Some(IrcEvent::Command { nick, name, args });
    }
    Some(IrcEvent::ChannelMessage { nick, text: text.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_channel_message() {
        let line = ":alice!a@host PRIVMSG #game :hello there";
        let event = parse_privmsg(line, '@').unwrap();
        assert_eq!(event, IrcEvent::ChannelMessage { nick: "alice".to_string(), text: "hello there".to_string() });
    }

    #[test]
    fn parses_whitelisted_command() {
        let line = ":bob!b@host PRIVMSG #game :@who";
        let event = parse_privmsg(line, '@').unwrap();
        assert_eq!(event, IrcEvent::Command { nick: "bob".to_string(), name: "who".to_string(), args: vec![] });
    }

    #[test]
    fn non_whitelisted_command_is_dropped() {
        let line = ":bob!b@host PRIVMSG #game :@shutdown";
        assert!(parse_privmsg(line, '@').is_none());
    }
}
