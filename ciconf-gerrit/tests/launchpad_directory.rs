//! Person lookups against a local stand-in for the directory's web service.

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;

use ciconf_core::Login;
use ciconf_gerrit::launchpad::REDACTED;
use ciconf_gerrit::{Directory, LaunchpadCredentials, LaunchpadDirectory};

const XRDS: &str = r#"<?xml version="1.0"?>
<xrds:XRDS xmlns:xrds="xri://$xrds" xmlns="xri://$xrd*($v*2.0)">
  <XRD><Service><LocalID>https://login.launchpad.net/+id/Xyz</LocalID></Service></XRD>
</xrds:XRDS>"#;

/// One request as the server saw it.
#[derive(Debug, Clone)]
struct Seen {
    path: String,
    authorization: Option<String>,
}

struct StubServer {
    base: String,
    seen: Arc<Mutex<Vec<Seen>>>,
}

impl StubServer {
    /// Serve `routes` (path → body) on an ephemeral port until the test ends.
    fn start(routes: impl FnOnce(&str) -> HashMap<String, String>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let base = format!("http://{}", listener.local_addr().expect("addr"));
        let routes = routes(&base);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                respond(stream, &routes, &log);
            }
        });
        Self { base, seen }
    }

    fn seen(&self) -> Vec<Seen> {
        self.seen.lock().expect("lock").clone()
    }
}

fn respond(stream: TcpStream, routes: &HashMap<String, String>, log: &Mutex<Vec<Seen>>) {
    let mut reader = BufReader::new(stream.try_clone().expect("clone"));
    let mut request_line = String::new();
    if reader.read_line(&mut request_line).is_err() {
        return;
    }
    let path = request_line
        .split_whitespace()
        .nth(1)
        .unwrap_or("/")
        .to_string();
    let mut authorization = None;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).unwrap_or(0) == 0 || line.trim().is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.eq_ignore_ascii_case("authorization") {
                authorization = Some(value.trim().to_string());
            }
        }
    }
    log.lock().expect("lock").push(Seen {
        path: path.clone(),
        authorization,
    });

    let (status, body) = match routes.get(&path) {
        Some(body) => ("200 OK", body.as_str()),
        None => ("404 Not Found", "{}"),
    };
    let mut stream = stream;
    let _ = write!(
        stream,
        "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\
         Connection: close\r\n\r\n{body}",
        body.len()
    );
}

fn person_routes(base: &str, email_link: &str) -> HashMap<String, String> {
    HashMap::from([
        (
            "/1.0/~jdoe".to_string(),
            serde_json::json!({
                "display_name": "Jane Doe",
                "is_team": false,
                "preferred_email_address_link": email_link.replace("{base}", base),
            })
            .to_string(),
        ),
        (
            "/1.0/~jdoe/sshkeys".to_string(),
            r#"[{"keytype": "ED25519", "keytext": "AAAAC3", "comment": "jdoe@laptop"}]"#
                .to_string(),
        ),
        (
            "/1.0/~jdoe/+email/jdoe@example.com".to_string(),
            r#"{"email": "jdoe@example.com"}"#.to_string(),
        ),
        ("/~jdoe".to_string(), XRDS.to_string()),
    ])
}

fn credentials() -> LaunchpadCredentials {
    LaunchpadCredentials::parse(
        "[1]\nconsumer_key = ci-sync\nconsumer_secret =\naccess_token = tok\naccess_secret = sec\n",
    )
    .expect("credentials")
}

#[test]
fn anonymous_lookup_with_redacted_email_has_no_email() {
    let server = StubServer::start(|base| person_routes(base, REDACTED));
    let mut directory =
        LaunchpadDirectory::with_roots(format!("{}/1.0", server.base), server.base.clone());

    let record = directory.person(&Login::from("jdoe")).unwrap();

    assert_eq!(record.full_name, "Jane Doe");
    assert_eq!(record.email, None);
    assert_eq!(record.ssh_keys, ["ssh-ed25519 AAAAC3 jdoe@laptop"]);
    assert_eq!(
        record.external_id.as_deref(),
        Some("https://login.launchpad.net/+id/Xyz")
    );
    let seen = server.seen();
    assert!(seen.iter().all(|s| s.authorization.is_none()), "{seen:?}");
    assert!(!seen.iter().any(|s| s.path.contains("+email")));
}

#[test]
fn signed_lookup_follows_the_email_link() {
    let server = StubServer::start(|base| {
        person_routes(base, "{base}/1.0/~jdoe/+email/jdoe@example.com")
    });
    let mut directory =
        LaunchpadDirectory::with_roots(format!("{}/1.0", server.base), server.base.clone())
            .with_credentials(credentials());

    let record = directory.person(&Login::from("jdoe")).unwrap();

    assert_eq!(record.email.as_deref(), Some("jdoe@example.com"));
    let seen = server.seen();
    let api: Vec<&Seen> = seen.iter().filter(|s| s.path.starts_with("/1.0/")).collect();
    assert_eq!(api.len(), 3, "{seen:?}");
    for request in api {
        let header = request.authorization.as_deref().unwrap_or_default();
        assert!(header.starts_with("OAuth "), "{request:?}");
        assert!(header.contains("oauth_token=\"tok\""), "{request:?}");
        assert!(header.contains("oauth_signature=\"%26sec\""), "{request:?}");
    }
}

#[test]
fn redacted_email_is_not_fatal_across_lookups() {
    let server = StubServer::start(|base| person_routes(base, REDACTED));
    let mut directory =
        LaunchpadDirectory::with_roots(format!("{}/1.0", server.base), server.base.clone());

    let first = directory.person(&Login::from("jdoe")).unwrap();
    let second = directory.person(&Login::from("jdoe")).unwrap();

    assert_eq!(first, second);
    let person_fetches = server
        .seen()
        .iter()
        .filter(|s| s.path == "/1.0/~jdoe")
        .count();
    assert_eq!(person_fetches, 1);
}
