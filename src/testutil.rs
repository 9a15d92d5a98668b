// src/testutil.rs
// =============================================================================
// Throwaway HTTP responders for tests.
//
// Tests must not depend on the internet, so both the GitHub client and the
// link checker are pointed at a TcpListener on 127.0.0.1 that answers each
// request with a canned response chosen by method + path.
// =============================================================================

use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

// One canned answer
#[derive(Debug, Clone)]
pub struct Canned {
    pub method: &'static str,
    pub path: &'static str,
    pub status: u16,
    pub headers: Vec<(&'static str, String)>,
    pub body: String,
}

impl Canned {
    pub fn status(method: &'static str, path: &'static str, status: u16) -> Self {
        Self {
            method,
            path,
            status,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub fn json(method: &'static str, path: &'static str, status: u16, body: &str) -> Self {
        Self {
            headers: vec![("Content-Type", "application/json".to_string())],
            body: body.to_string(),
            ..Self::status(method, path, status)
        }
    }

    pub fn header(mut self, name: &'static str, value: &str) -> Self {
        self.headers.push((name, value.to_string()));
        self
    }
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<String> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.clone())
    }
}

pub struct Responder {
    pub base_url: String,
    seen: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl Responder {
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.seen.lock().unwrap().clone()
    }
}

// Starts a responder; unknown routes get a 404
pub async fn spawn_responder(routes: Vec<Canned>) -> Responder {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let routes = Arc::new(routes);

    let recorder = seen.clone();
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            let routes = routes.clone();
            let recorder = recorder.clone();
            tokio::spawn(async move {
                serve_one(stream, &routes, &recorder).await;
            });
        }
    });

    Responder { base_url, seen }
}

// Starts a listener that accepts connections and never answers
pub async fn spawn_silent() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });
    base_url
}

// Returns a URL on a port where nothing is listening
pub async fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

async fn serve_one(mut stream: TcpStream, routes: &[Canned], seen: &Mutex<Vec<RecordedRequest>>) {
    let Some(request) = read_request(&mut stream).await else {
        return;
    };

    let canned = routes
        .iter()
        .find(|c| c.method == request.method && c.path == request.path)
        .cloned()
        .unwrap_or_else(|| Canned::json("", "", 404, r#"{"message":"Not Found"}"#));
    let is_head = request.method == "HEAD";
    seen.lock().unwrap().push(request);

    let mut response = format!(
        "HTTP/1.1 {} Canned\r\nContent-Length: {}\r\nConnection: close\r\n",
        canned.status,
        canned.body.len()
    );
    for (name, value) in &canned.headers {
        response.push_str(&format!("{}: {}\r\n", name, value));
    }
    response.push_str("\r\n");
    if !is_head {
        response.push_str(&canned.body);
    }

    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}

async fn read_request(stream: &mut TcpStream) -> Option<RecordedRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();

    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();

    let content_length = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let body = String::from_utf8_lossy(&buf[header_end..]).to_string();

    Some(RecordedRequest {
        method,
        path,
        headers,
        body,
    })
}
