//! In-process stand-in for the GitHub Gist API
//!
//! Serves `/user`, `/gists` and `/gists/<id>` over tiny_http on a random local
//! port. Only `Bearer good-token` is accepted.

#![allow(dead_code)]

use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::io::Read;
use std::sync::{Arc, Mutex};
use std::thread;
use tiny_http::{Header, Method, Request, Response, Server};

pub const GOOD_TOKEN: &str = "good-token";

#[derive(Default)]
pub struct FakeState {
    /// gist id -> file name -> content
    pub gists: HashMap<String, BTreeMap<String, String>>,
    next_id: u32,
    /// Report files as truncated so clients must follow raw_url
    pub truncate: bool,
    /// "METHOD /path" for every request received
    pub requests: Vec<String>,
}

pub struct FakeGitHub {
    pub base: String,
    pub state: Arc<Mutex<FakeState>>,
}

impl FakeGitHub {
    pub fn start() -> Self {
        let server = Server::http("127.0.0.1:0").expect("bind fake github");
        let port = server
            .server_addr()
            .to_ip()
            .expect("tcp listener")
            .port();
        let base = format!("http://127.0.0.1:{}", port);
        let state = Arc::new(Mutex::new(FakeState::default()));

        let thread_state = Arc::clone(&state);
        let thread_base = base.clone();
        thread::spawn(move || {
            for request in server.incoming_requests() {
                handle(&thread_state, &thread_base, request);
            }
        });

        Self { base, state }
    }

    /// Seed a gist directly
    pub fn insert_gist(&self, id: &str, filename: &str, content: &str) {
        let mut state = self.state.lock().unwrap();
        state
            .gists
            .entry(id.to_string())
            .or_default()
            .insert(filename.to_string(), content.to_string());
    }

    pub fn file_content(&self, id: &str, filename: &str) -> Option<String> {
        let state = self.state.lock().unwrap();
        state.gists.get(id).and_then(|files| files.get(filename).cloned())
    }

    pub fn gist_count(&self) -> usize {
        self.state.lock().unwrap().gists.len()
    }

    pub fn set_truncate(&self, truncate: bool) {
        self.state.lock().unwrap().truncate = truncate;
    }

    pub fn count_requests(&self, prefix: &str) -> usize {
        let state = self.state.lock().unwrap();
        state.requests.iter().filter(|r| r.starts_with(prefix)).count()
    }
}

fn json_response(status: u16, body: Value) -> Response<std::io::Cursor<Vec<u8>>> {
    Response::from_string(body.to_string())
        .with_status_code(status)
        .with_header(
            Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap(),
        )
}

fn gist_document(base: &str, id: &str, files: &BTreeMap<String, String>, truncate: bool) -> Value {
    let files: serde_json::Map<String, Value> = files
        .iter()
        .map(|(name, content)| {
            let file = if truncate {
                json!({
                    "filename": name,
                    "content": content.chars().take(10).collect::<String>(),
                    "truncated": true,
                    "raw_url": format!("{}/raw/{}/{}", base, id, name),
                })
            } else {
                json!({ "filename": name, "content": content, "truncated": false })
            };
            (name.clone(), file)
        })
        .collect();
    json!({
        "id": id,
        "html_url": format!("https://gist.github.com/{}", id),
        "files": files,
    })
}

fn request_files(body: &str) -> BTreeMap<String, String> {
    let value: Value = serde_json::from_str(body).unwrap_or(Value::Null);
    value["files"]
        .as_object()
        .map(|files| {
            files
                .iter()
                .filter_map(|(name, f)| {
                    f["content"].as_str().map(|c| (name.clone(), c.to_string()))
                })
                .collect()
        })
        .unwrap_or_default()
}

fn handle(state: &Arc<Mutex<FakeState>>, base: &str, mut request: Request) {
    let method = request.method().clone();
    let path = request.url().to_string();
    let mut body = String::new();
    let _ = request.as_reader().read_to_string(&mut body);

    let mut state = state.lock().unwrap();
    state.requests.push(format!("{} {}", method, path));

    // Raw file URLs need no auth
    if let Some(rest) = path.strip_prefix("/raw/") {
        let mut parts = rest.splitn(2, '/');
        let (id, name) = (parts.next().unwrap_or(""), parts.next().unwrap_or(""));
        let response = match state.gists.get(id).and_then(|f| f.get(name)) {
            Some(content) => Response::from_string(content.clone()),
            None => Response::from_string("Not Found").with_status_code(404),
        };
        let _ = request.respond(response);
        return;
    }

    let authorized = request
        .headers()
        .iter()
        .find(|h| h.field.equiv("Authorization"))
        .map(|h| h.value.as_str() == format!("Bearer {}", GOOD_TOKEN))
        .unwrap_or(false);
    if !authorized {
        let _ = request.respond(json_response(401, json!({ "message": "Bad credentials" })));
        return;
    }

    let truncate = state.truncate;
    let response = match (&method, path.as_str()) {
        (Method::Get, "/user") => json_response(200, json!({ "login": "tester" })),
        (Method::Post, "/gists") => {
            state.next_id += 1;
            let id = format!("gist-{}", state.next_id);
            let files = request_files(&body);
            let doc = gist_document(base, &id, &files, false);
            state.gists.insert(id, files);
            json_response(201, doc)
        }
        (Method::Get, p) if p.starts_with("/gists/") => {
            let id = &p["/gists/".len()..];
            match state.gists.get(id) {
                Some(files) => json_response(200, gist_document(base, id, files, truncate)),
                None => json_response(404, json!({ "message": "Not Found" })),
            }
        }
        (Method::Patch, p) if p.starts_with("/gists/") => {
            let id = p["/gists/".len()..].to_string();
            match state.gists.get_mut(&id) {
                Some(files) => {
                    files.extend(request_files(&body));
                    let doc = gist_document(base, &id, files, false);
                    json_response(200, doc)
                }
                None => json_response(404, json!({ "message": "Not Found" })),
            }
        }
        _ => json_response(404, json!({ "message": "Not Found" })),
    };
    let _ = request.respond(response);
}
