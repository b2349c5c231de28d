//! In-process fake hub for end-to-end tests.
//!
//! One TCP listener serves both halves of a session: `POST` requests get a
//! canned negotiate response, everything else is upgraded to a WebSocket
//! and handed to the test's script. Only the first socket runs the script.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

/// What the fake hub observed.
#[derive(Debug, Default, Clone)]
pub struct HubLog {
    pub negotiate_paths: Vec<String>,
    pub negotiate_content_types: Vec<Option<String>>,
    pub negotiate_auth: Vec<Option<String>>,
    pub socket_uris: Vec<String>,
    pub socket_auth: Vec<Option<String>>,
}

pub struct FakeHub {
    pub base_url: String,
    log: Arc<Mutex<HubLog>>,
    script: Arc<Mutex<Option<JoinHandle<()>>>>,
    task: JoinHandle<()>,
}

impl FakeHub {
    pub fn log(&self) -> HubLog {
        self.log.lock().unwrap().clone()
    }

    /// Wait for the socket script to finish, re-raising its panics.
    pub async fn join_script(&self) {
        let handle = self.script.lock().unwrap().take().expect("no socket was opened");
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("script did not finish")
            .expect("script panicked");
    }
}

impl Drop for FakeHub {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Negotiate body advertising the given transports under id `abc123`.
pub fn negotiate_body(transports: &[&str]) -> Value {
    let available: Vec<Value> = transports
        .iter()
        .map(|t| json!({"transport": t, "transportFormats": ["Text", "Binary"]}))
        .collect();
    json!({"connectionId": "abc123", "availableTransports": available})
}

/// Start a hub answering negotiate with `negotiate` and running `script`
/// on the first WebSocket.
pub async fn start<F, Fut>(negotiate: Value, script: F) -> FakeHub
where
    F: FnOnce(ServerSocket) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let log = Arc::new(Mutex::new(HubLog::default()));
    let script_handle = Arc::new(Mutex::new(None));
    let body = negotiate.to_string();

    let task = {
        let log = Arc::clone(&log);
        let script_handle = Arc::clone(&script_handle);
        tokio::spawn(async move {
            let mut script = Some(script);
            while let Ok((stream, _)) = listener.accept().await {
                if is_http_post(&stream).await {
                    answer_negotiate(stream, &body, &log).await;
                } else if let Some(script) = script.take() {
                    let socket = accept_socket(stream, &log).await;
                    *script_handle.lock().unwrap() = Some(tokio::spawn(script(socket)));
                }
            }
        })
    };

    FakeHub {
        base_url: format!("http://{addr}"),
        log,
        script: script_handle,
        task,
    }
}

async fn is_http_post(stream: &TcpStream) -> bool {
    let mut head = [0u8; 4];
    loop {
        match stream.peek(&mut head).await {
            Ok(n) if n >= head.len() => return &head == b"POST",
            Ok(0) | Err(_) => return false,
            Ok(_) => tokio::time::sleep(Duration::from_millis(1)).await,
        }
    }
}

fn header_value(request: &str, name: &str) -> Option<String> {
    request.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        key.trim()
            .eq_ignore_ascii_case(name)
            .then(|| value.trim().to_string())
    })
}

async fn answer_negotiate(mut stream: TcpStream, body: &str, log: &Mutex<HubLog>) {
    let mut request = Vec::new();
    let mut chunk = [0u8; 1024];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut chunk).await.unwrap();
        if n == 0 {
            return;
        }
        request.extend_from_slice(&chunk[..n]);
    }

    let text = String::from_utf8_lossy(&request);
    {
        let mut log = log.lock().unwrap();
        log.negotiate_paths
            .push(text.split_whitespace().nth(1).unwrap_or_default().to_string());
        log.negotiate_content_types.push(header_value(&text, "content-type"));
        log.negotiate_auth.push(header_value(&text, "authorization"));
    }

    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n\
         Content-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    stream.write_all(response.as_bytes()).await.unwrap();
    let _ = stream.shutdown().await;
}

async fn accept_socket(stream: TcpStream, log: &Arc<Mutex<HubLog>>) -> ServerSocket {
    let log = Arc::clone(log);
    let record = move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        let mut log = log.lock().unwrap();
        log.socket_uris.push(request.uri().to_string());
        log.socket_auth.push(
            request
                .headers()
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        );
        Ok(response)
    };
    let ws = tokio_tungstenite::accept_hdr_async(stream, record)
        .await
        .unwrap();
    ServerSocket { ws }
}

/// Server end of a WebSocket speaking the hub framing.
pub struct ServerSocket {
    ws: WebSocketStream<TcpStream>,
}

impl ServerSocket {
    /// Next frame from the client, `None` once the client closes.
    ///
    /// Panics unless the frame ends in exactly one record separator.
    pub async fn recv_frame(&mut self) -> Option<Value> {
        loop {
            match self.ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    let body = text.strip_suffix('\u{1e}').expect("missing record separator");
                    assert!(!body.ends_with('\u{1e}'), "more than one separator: {text:?}");
                    return Some(serde_json::from_str(body).expect("client sent invalid JSON"));
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => continue,
                Some(Ok(Message::Binary(data))) => panic!("unexpected binary frame: {data:?}"),
                Some(Ok(Message::Close(_)) | Err(_)) | None => return None,
            }
        }
    }

    /// Receive the handshake request and answer with `response`.
    pub async fn handshake(&mut self, response: Value) {
        let request = self.recv_frame().await.expect("no handshake request");
        assert_eq!(request, json!({"protocol": "json", "version": 1}));
        self.send_frame(response).await;
    }

    pub async fn send_frame(&mut self, value: Value) {
        self.send_raw(&format!("{value}\u{1e}")).await;
    }

    pub async fn send_raw(&mut self, text: &str) {
        self.ws.send(Message::Text(text.to_string())).await.unwrap();
    }

    /// Send an invocation of `target` with `arguments`.
    pub async fn invoke(&mut self, target: &str, arguments: Value) {
        self.send_frame(json!({"type": 1, "target": target, "arguments": arguments}))
            .await;
    }

    /// Wait until the client closes its end.
    pub async fn drain(&mut self) {
        while self.recv_frame().await.is_some() {}
    }

    /// Close the WebSocket without a hub-level close message.
    pub async fn close(&mut self) {
        let _ = self.ws.close(None).await;
    }
}
