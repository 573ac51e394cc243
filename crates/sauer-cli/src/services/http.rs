// services/http.rs — status/control endpoint + fire-and-forget webhook
// (§6 "HTTP endpoint"/"Webhook"). Converted from: the teacher's manual
// socket-level request handling style (no framework crate anywhere in the
// corpus for this), paired with `serde_json` for response bodies since JSON
// is ambient plumbing across the wider retrieval pack (noted in DESIGN.md
// as a pack-sourced, not teacher-sourced, dependency).

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};

use serde_json::json;

use sauer_common::common::com_dprintf;

pub struct ClientSummary {
    pub name: String,
    pub cn: i32,
    pub ip: String,
    pub host: Option<String>,
}

pub struct StatusSnapshot {
    pub map: String,
    pub mode: String,
    pub modename: String,
    pub maxclients: usize,
    pub clients: Vec<ClientSummary>,
}

#[derive(Debug, Clone)]
pub struct Request {
    pub pass: Option<String>,
    pub kick: Option<i32>,
    pub ban: Option<i32>,
}

/// Parses `GET /?[pass=…&][kick=…|ban=…]`. Returns `None` for any other path.
pub fn parse_request_line(line: &str) -> Option<Request> {
    let mut parts = line.split_whitespace();
    if parts.next()? != "GET" {
        return None;
    }
    let path = parts.next()?;
    if path != "/" && !path.starts_with("/?") {
        return None;
    }
    let query = path.strip_prefix("/?").unwrap_or("");
    let mut req = Request { pass: None, kick: None, ban: None };
    for pair in query.split('&').filter(|s| !s.is_empty()) {
        let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
        match k {
            "pass" => req.pass = Some(v.to_string()),
            "kick" => req.kick = v.parse().ok(),
            "ban" => req.ban = v.parse().ok(),
            _ => {}
        }
    }
    Some(req)
}

pub fn status_json(snapshot: &StatusSnapshot) -> String {
    json!({
        "map": snapshot.map,
        "mode": snapshot.mode,
        "modename": snapshot.modename,
        "maxclients": snapshot.maxclients,
        "clients": snapshot.clients.iter().map(|c| json!({
            "name": c.name,
            "cn": c.cn,
            "ip": c.ip,
            "host": c.host,
        })).collect::<Vec<_>>(),
    })
    .to_string()
}

pub fn result_json(success: bool, message: &str) -> String {
    let key = if success { "success" } else { "error" };
    json!({ key: message }).to_string()
}

fn write_response(stream: &mut TcpStream, status: &str, body: &str) {
    let response = format!(
        "HTTP/1.0 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes());
}

/// Handles one accepted connection: parse the request line, call back into
/// `handle` for the actual action, and write the JSON response (or 404).
pub fn serve_one(mut stream: TcpStream, handle: impl FnOnce(Request) -> (bool, String)) {
    let mut buf = [0u8; 2048];
    let n = match stream.read(&mut buf) {
        Ok(n) => n,
        Err(_) => return,
    };
    let text = String::from_utf8_lossy(&buf[..n]);
    let Some(line) = text.lines().next() else { return };
    match parse_request_line(line) {
        Some(req) => {
            let (ok, body) = handle(req);
            write_response(&mut stream, if ok { "200 OK" } else { "400 Bad Request" }, &body);
        }
        None => {
            write_response(&mut stream, "404 Not Found", &result_json(false, "not found"));
        }
    }
}

pub fn bind(port: u16) -> std::io::Result<TcpListener> {
    let listener = TcpListener::bind(("0.0.0.0", port))?;
    listener.set_nonblocking(true)?;
    Ok(listener)
}

/// §6 "Webhook": fire-and-forget `GET <webhook>?action=…&…`. Failures are
/// logged and otherwise ignored (§7: external service failures non-fatal).
pub fn fire_webhook(base_url: &str, action: &str, args: &[(&str, &str)]) {
    let mut query = format!("action={}", urlencode(action));
    for (k, v) in args {
        query.push('&');
        query.push_str(&urlencode(k));
        query.push('=');
        query.push_str(&urlencode(v));
    }
    let target = format!("{}?{}", base_url, query);
    com_dprintf(&format!("webhook: {}\n", target));
    if let Some((host, port, path)) = split_url(&target) {
        if let Ok(mut stream) = TcpStream::connect((host.as_str(), port)) {
            let request = format!("GET {} HTTP/1.0\r\nHost: {}\r\nConnection: close\r\n\r\n", path, host);
            let _ = stream.write_all(request.as_bytes());
        }
    }
}

fn urlencode(s: &str) -> String {
    let mut out = String::new();
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(b as char),
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}

fn split_url(url: &str) -> Option<(String, u16, String)> {
    let rest = url.strip_prefix("http://")?;
    let (hostport, path) = rest.split_once('/').unwrap_or((rest, ""));
    let (host, port) = hostport.split_once(':').unwrap_or((hostport, "80"));
    Some((host.to_string(), port.parse().ok()?, format!("/{}", path)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_kick_request() {
        let req = parse_request_line("GET /?pass=secret&kick=3 HTTP/1.0").unwrap();
        assert_eq!(req.pass.as_deref(), Some("secret"));
        assert_eq!(req.kick, Some(3));
        assert_eq!(req.ban, None);
    }

    #[test]
    fn root_path_with_no_query_parses() {
        let req = parse_request_line("GET / HTTP/1.0").unwrap();
        assert!(req.pass.is_none());
    }

    #[test]
    fn other_paths_are_rejected() {
        assert!(parse_request_line("GET /admin HTTP/1.0").is_none());
        assert!(parse_request_line("POST / HTTP/1.0").is_none());
    }

    #[test]
    fn status_json_shapes_clients_array() {
        let snap = StatusSnapshot {
            map: "complex".into(),
            mode: "ffa".into(),
            modename: "Free For All".into(),
            maxclients: 16,
            clients: vec![ClientSummary { name: "bob".into(), cn: 0, ip: "1.2.3.4".into(), host: None }],
        };
        let body = status_json(&snap);
        assert!(body.contains("\"map\":\"complex\""));
        assert!(body.contains("\"cn\":0"));
    }

    #[test]
    fn urlencode_escapes_reserved_chars() {
        assert_eq!(urlencode("a b"), "a%20b");
        assert_eq!(urlencode("ok"), "ok");
    }

    #[test]
    fn split_url_parses_host_port_path() {
        let (host, port, path) = split_url("http://example.com:8080/a/b?x=1").unwrap();
        assert_eq!(host, "example.com");
        assert_eq!(port, 8080);
        assert_eq!(path, "/a/b?x=1");
    }
}
