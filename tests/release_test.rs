// tests/release_test.rs
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;

use bumper::config::CredentialStore;
use bumper::domain::RemoteEndpoint;
use bumper::release::{Backend, HostedResolver, PublisherResolver, ReleaseDraft};
use bumper::ui::Operator;
use bumper::{BumpError, Result};
use reqwest::blocking::Client;

#[derive(Debug, Clone)]
struct Recorded {
    method: String,
    path: String,
    headers: BTreeMap<String, String>,
    body: String,
}

/// Canned HTTP server: answers `(method, path)` routes, 404 for the rest
struct StubServer {
    port: u16,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl StubServer {
    fn start(routes: Vec<(&'static str, &'static str, u16, &'static str)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let requests = Arc::new(Mutex::new(Vec::new()));

        let recorded = Arc::clone(&requests);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                let request = read_request(&stream);
                let (status, body) = routes
                    .iter()
                    .find(|(method, path, _, _)| *method == request.method && *path == request.path)
                    .map(|(_, _, status, body)| (*status, *body))
                    .unwrap_or((404, r#"{"message":"404 Not Found"}"#));
                recorded.lock().unwrap().push(request);
                write_response(stream, status, body);
            }
        });

        StubServer { port, requests }
    }

    fn endpoint(&self) -> RemoteEndpoint {
        RemoteEndpoint {
            host: format!("127.0.0.1:{}", self.port),
            project_path: "acme/widgets".to_string(),
        }
    }

    fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }
}

fn read_request(stream: &TcpStream) -> Recorded {
    let mut reader = BufReader::new(stream);

    let mut request_line = String::new();
    reader.read_line(&mut request_line).unwrap();
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let path = parts.next().unwrap_or_default().to_string();

    let mut headers = BTreeMap::new();
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).unwrap();
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.insert(name.trim().to_lowercase(), value.trim().to_string());
        }
    }

    let length = headers
        .get("content-length")
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = vec![0; length];
    reader.read_exact(&mut body).unwrap();

    Recorded {
        method,
        path,
        headers,
        body: String::from_utf8(body).unwrap(),
    }
}

fn write_response(mut stream: TcpStream, status: u16, body: &str) {
    let reason = match status {
        200 => "OK",
        201 => "Created",
        401 => "Unauthorized",
        404 => "Not Found",
        _ => "Error",
    };
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        reason,
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes());
}

#[derive(Default)]
struct MemoryStore {
    gitlab: Option<String>,
    github: Option<String>,
    saved: Vec<(Backend, String)>,
}

impl CredentialStore for MemoryStore {
    fn api_key(&self, backend: Backend) -> Option<String> {
        match backend {
            Backend::GitLab => self.gitlab.clone(),
            Backend::GitHub => self.github.clone(),
        }
    }

    fn store_api_key(&mut self, backend: Backend, key: &str) -> Result<()> {
        match backend {
            Backend::GitLab => self.gitlab = Some(key.to_string()),
            Backend::GitHub => self.github = Some(key.to_string()),
        }
        self.saved.push((backend, key.to_string()));
        Ok(())
    }
}

/// Operator that only ever gets asked for credentials
struct KeyOperator {
    answer: &'static str,
    prompts: RefCell<Vec<String>>,
}

impl KeyOperator {
    fn answering(answer: &'static str) -> Self {
        KeyOperator {
            answer,
            prompts: RefCell::new(Vec::new()),
        }
    }
}

impl Operator for KeyOperator {
    fn select_bump(&self, _current_tag: &str, _options: &[String]) -> Result<usize> {
        unreachable!()
    }

    fn show_diff(&self, _diff: &str) {}

    fn confirm(&self, _prompt: &str) -> Result<bool> {
        unreachable!()
    }

    fn request_api_key(&self, prompt: &str) -> Result<String> {
        self.prompts.borrow_mut().push(prompt.to_string());
        Ok(self.answer.to_string())
    }
}

fn local_client() -> Client {
    Client::builder().no_proxy().build().unwrap()
}

fn draft() -> ReleaseDraft {
    ReleaseDraft::new("Widgets", "v1.3.0", "Added thing.")
}

#[test]
fn test_gitlab_release_with_stored_key() {
    let server = StubServer::start(vec![
        ("GET", "/api/v4/version", 200, r#"{"version":"16.0.0"}"#),
        ("GET", "/api/v4/projects/acme%2Fwidgets", 200, r#"{"id":42}"#),
        (
            "POST",
            "/api/v4/projects/42/releases",
            201,
            r#"{"tag_name":"v1.3.0","_links":{"self":"https://gitlab.example.com/acme/widgets/-/releases/v1.3.0"}}"#,
        ),
    ]);
    let mut store = MemoryStore {
        gitlab: Some("glpat-stored".to_string()),
        ..Default::default()
    };
    let operator = KeyOperator::answering("unused");

    let publisher = {
        let mut resolver = HostedResolver::new(&mut store, &operator)
            .unwrap()
            .with_client(local_client())
            .with_scheme("http");
        resolver.resolve(&server.endpoint()).unwrap()
    };
    assert_eq!(publisher.name(), "GitLab");
    assert!(operator.prompts.borrow().is_empty());
    assert!(store.saved.is_empty());

    let url = publisher.publish(&draft()).unwrap();
    assert_eq!(url, "https://gitlab.example.com/acme/widgets/-/releases/v1.3.0");

    let requests = server.requests();
    assert_eq!(requests.len(), 3);
    assert_eq!(
        requests[1].headers.get("private-token").map(String::as_str),
        Some("glpat-stored")
    );

    let create = &requests[2];
    assert_eq!(create.method, "POST");
    let body: serde_json::Value = serde_json::from_str(&create.body).unwrap();
    assert_eq!(body["name"], "Widgets v1.3.0");
    assert_eq!(body["tag_name"], "v1.3.0");
    assert_eq!(body["description"], "Added thing.");
    assert_eq!(
        create.headers.get("private-token").map(String::as_str),
        Some("glpat-stored")
    );
}

#[test]
fn test_unauthorised_probe_still_selects_gitlab_and_asks_for_key() {
    let server = StubServer::start(vec![(
        "GET",
        "/api/v4/version",
        401,
        r#"{"message":"401 Unauthorized"}"#,
    )]);
    let mut store = MemoryStore::default();
    let operator = KeyOperator::answering("  glpat-entered\n");

    let publisher = {
        let mut resolver = HostedResolver::new(&mut store, &operator)
            .unwrap()
            .with_client(local_client())
            .with_scheme("http");
        resolver.resolve(&server.endpoint()).unwrap()
    };

    assert_eq!(publisher.name(), "GitLab");
    assert_eq!(
        operator.prompts.borrow().as_slice(),
        [Backend::GitLab.credential_prompt()]
    );
    assert_eq!(
        store.saved,
        vec![(Backend::GitLab, "glpat-entered".to_string())]
    );
}

#[test]
fn test_empty_key_is_rejected() {
    let server = StubServer::start(vec![("GET", "/api/v4/version", 200, "{}")]);
    let mut store = MemoryStore::default();
    let operator = KeyOperator::answering("   ");

    let mut resolver = HostedResolver::new(&mut store, &operator)
        .unwrap()
        .with_client(local_client())
        .with_scheme("http");
    let err = resolver.resolve(&server.endpoint()).err().unwrap();

    assert!(matches!(err, BumpError::Validation(_)));
}

#[test]
fn test_falls_through_to_github() {
    let server = StubServer::start(vec![
        ("GET", "/api/v3/meta", 200, r#"{"verifiable_password_authentication":false}"#),
        ("GET", "/api/v3/repos/acme/widgets", 200, r#"{"full_name":"acme/widgets"}"#),
        (
            "POST",
            "/api/v3/repos/acme/widgets/releases",
            201,
            r#"{"html_url":"https://ghe.example.com/acme/widgets/releases/tag/v1.3.0"}"#,
        ),
    ]);
    let mut store = MemoryStore {
        github: Some("ghp_stored".to_string()),
        ..Default::default()
    };
    let operator = KeyOperator::answering("unused");

    let publisher = {
        let mut resolver = HostedResolver::new(&mut store, &operator)
            .unwrap()
            .with_client(local_client())
            .with_scheme("http");
        resolver.resolve(&server.endpoint()).unwrap()
    };
    assert_eq!(publisher.name(), "GitHub");

    let url = publisher.publish(&draft()).unwrap();
    assert_eq!(url, "https://ghe.example.com/acme/widgets/releases/tag/v1.3.0");

    let requests = server.requests();
    assert_eq!(requests[0].path, "/api/v4/version");
    assert_eq!(requests[1].path, "/api/v3/meta");

    let create = requests.last().unwrap();
    assert_eq!(
        create.headers.get("authorization").map(String::as_str),
        Some("Bearer ghp_stored")
    );
    assert_eq!(
        create.headers.get("accept").map(String::as_str),
        Some("application/vnd.github+json")
    );
    let body: serde_json::Value = serde_json::from_str(&create.body).unwrap();
    assert_eq!(body["tag_name"], "v1.3.0");
    assert_eq!(body["name"], "Widgets v1.3.0");
    assert_eq!(body["body"], "Added thing.");
}

#[test]
fn test_no_supported_service() {
    let server = StubServer::start(vec![]);
    let mut store = MemoryStore::default();
    let operator = KeyOperator::answering("unused");

    let mut resolver = HostedResolver::new(&mut store, &operator)
        .unwrap()
        .with_client(local_client())
        .with_scheme("http");
    let err = resolver.resolve(&server.endpoint()).err().unwrap();
    drop(resolver);

    assert!(matches!(err, BumpError::ExternalCall { .. }));
    assert!(operator.prompts.borrow().is_empty());
    assert_eq!(server.requests().len(), 2);
}

#[test]
fn test_failed_release_reports_status() {
    let server = StubServer::start(vec![
        ("GET", "/api/v4/version", 200, "{}"),
        ("GET", "/api/v4/projects/acme%2Fwidgets", 200, r#"{"id":7}"#),
        (
            "POST",
            "/api/v4/projects/7/releases",
            409,
            r#"{"message":"Release already exists"}"#,
        ),
    ]);
    let mut store = MemoryStore {
        gitlab: Some("glpat".to_string()),
        ..Default::default()
    };
    let operator = KeyOperator::answering("unused");

    let publisher = {
        let mut resolver = HostedResolver::new(&mut store, &operator)
            .unwrap()
            .with_client(local_client())
            .with_scheme("http");
        resolver.resolve(&server.endpoint()).unwrap()
    };

    match publisher.publish(&draft()) {
        Err(BumpError::ExternalCall { operation, message }) => {
            assert_eq!(operation, "create release");
            assert!(message.contains("409"));
            assert!(message.contains("Release already exists"));
        }
        other => panic!("unexpected result: {:?}", other.map(|_| ())),
    }
}
