//! Minimal HTTP/1.1 server imitating the archive for integration tests.
//!
//! Serves `/metadata/<item>/` as JSON and `/download/<item>/<escaped name>`
//! with the file bytes. Like the real service, requests without a User-Agent
//! or Referer get 403, and unknown items get an empty JSON object.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use arcdl_core::transfer::download_url;
use md5::{Digest, Md5};

#[derive(Debug, Clone)]
pub struct ServedFile {
    pub name: String,
    pub body: Vec<u8>,
    /// MD5 advertised in the metadata; defaults to the body's real digest.
    pub md5: Option<String>,
    pub advertise_size: bool,
}

impl ServedFile {
    pub fn new(name: &str, body: &[u8]) -> Self {
        Self {
            name: name.to_string(),
            body: body.to_vec(),
            md5: Some(hex::encode(Md5::digest(body))),
            advertise_size: true,
        }
    }

    pub fn with_md5(mut self, md5: &str) -> Self {
        self.md5 = Some(md5.to_string());
        self
    }

    pub fn without_size(mut self) -> Self {
        self.advertise_size = false;
        self
    }
}

struct Catalog {
    metadata: HashMap<String, String>,
    downloads: HashMap<String, Vec<u8>>,
}

pub struct ArchiveServer {
    base: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl ArchiveServer {
    /// Root URL, e.g. `http://127.0.0.1:12345/`.
    pub fn base_url(&self) -> &str {
        &self.base
    }

    /// Request paths received so far, in arrival order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn download_requests(&self) -> usize {
        self.requests()
            .iter()
            .filter(|p| p.starts_with("/download/"))
            .count()
    }
}

/// Starts a server in a background thread serving one item. The server runs
/// until the process exits.
pub fn start(item_id: &str, files: Vec<ServedFile>) -> ArchiveServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let base = format!("http://127.0.0.1:{}/", port);

    let mut catalog = Catalog {
        metadata: HashMap::new(),
        downloads: HashMap::new(),
    };
    let entries: Vec<serde_json::Value> = files
        .iter()
        .map(|f| {
            let mut entry = serde_json::json!({ "name": f.name, "source": "original" });
            if f.advertise_size {
                entry["size"] = serde_json::Value::String(f.body.len().to_string());
            }
            if let Some(md5) = &f.md5 {
                entry["md5"] = serde_json::Value::String(md5.clone());
            }
            entry
        })
        .collect();
    catalog.metadata.insert(
        format!("/metadata/{}/", item_id),
        serde_json::json!({ "files": entries }).to_string(),
    );
    for f in &files {
        let url = download_url(&format!("{}download/", base), item_id, &f.name).unwrap();
        let path = url::Url::parse(&url).unwrap().path().to_string();
        catalog.downloads.insert(path, f.body.clone());
    }

    let catalog = Arc::new(catalog);
    let requests = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&requests);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let catalog = Arc::clone(&catalog);
            let log = Arc::clone(&log);
            thread::spawn(move || handle(stream, &catalog, &log));
        }
    });
    ArchiveServer { base, requests }
}

fn handle(mut stream: TcpStream, catalog: &Catalog, log: &Mutex<Vec<String>>) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(5)));
    let Some(head) = read_head(&mut stream) else {
        return;
    };
    let request = parse_request(&head);
    log.lock().unwrap().push(request.path.clone());

    if !request.method.eq_ignore_ascii_case("GET") {
        respond(&mut stream, "405 Method Not Allowed", "text/plain", b"");
        return;
    }
    if !request.has_user_agent || !request.has_referer {
        respond(&mut stream, "403 Forbidden", "text/plain", b"forbidden");
        return;
    }
    if request.path.starts_with("/metadata/") {
        let body = catalog
            .metadata
            .get(&request.path)
            .map(String::as_str)
            .unwrap_or("{}");
        respond(&mut stream, "200 OK", "application/json", body.as_bytes());
        return;
    }
    match catalog.downloads.get(&request.path) {
        Some(body) => respond(&mut stream, "200 OK", "application/octet-stream", body),
        None => respond(&mut stream, "404 Not Found", "text/plain", b"not found"),
    }
}

fn respond(stream: &mut TcpStream, status: &str, content_type: &str, body: &[u8]) {
    let head = format!(
        "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status,
        content_type,
        body.len()
    );
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(body);
}

fn read_head(stream: &mut TcpStream) -> Option<String> {
    let mut data = Vec::new();
    let mut buf = [0u8; 4096];
    while !data.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut buf) {
            Ok(0) | Err(_) => return None,
            Ok(n) => data.extend_from_slice(&buf[..n]),
        }
    }
    String::from_utf8(data).ok()
}

struct Request {
    method: String,
    path: String,
    has_user_agent: bool,
    has_referer: bool,
}

fn parse_request(head: &str) -> Request {
    let mut lines = head.lines();
    let mut first = lines.next().unwrap_or("").split_whitespace();
    let method = first.next().unwrap_or("").to_string();
    let path = first.next().unwrap_or("").to_string();
    let mut has_user_agent = false;
    let mut has_referer = false;
    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            let present = !value.trim().is_empty();
            if name.trim().eq_ignore_ascii_case("user-agent") {
                has_user_agent = present;
            } else if name.trim().eq_ignore_ascii_case("referer") {
                has_referer = present;
            }
        }
    }
    Request {
        method,
        path,
        has_user_agent,
        has_referer,
    }
}
