//! Local HTTP/1.1 endpoint for driving the Graph client over a real socket.
//!
//! Each accepted connection serves exactly one request with the next queued
//! reply and is then closed. Requests are recorded before the reply is sent.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// A request as it arrived on the wire.
#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub method: String,
    pub target: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

/// What to answer the next request with.
pub(crate) enum Reply {
    /// Complete response written at once.
    Full {
        status: u16,
        content_type: &'static str,
        body: Vec<u8>,
    },
    /// 200 whose body arrives one chunk per `interval`.
    Trickle {
        chunks: Vec<Vec<u8>>,
        interval: Duration,
    },
    /// 200 announcing `total_len` bytes that sends `head` and then goes quiet.
    Stall {
        head: Vec<u8>,
        total_len: usize,
        pause: Duration,
    },
}

impl Reply {
    pub fn json(status: u16, body: &str) -> Self {
        Reply::Full {
            status,
            content_type: "application/json",
            body: body.as_bytes().to_vec(),
        }
    }

    pub fn bytes(body: &[u8]) -> Self {
        Reply::Full {
            status: 200,
            content_type: "application/octet-stream",
            body: body.to_vec(),
        }
    }
}

pub(crate) struct TestServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    handle: JoinHandle<()>,
}

impl TestServer {
    /// Start serving `replies` in order. Requests beyond the queue get a 500.
    pub async fn start(replies: Vec<Reply>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let mut replies: VecDeque<Reply> = replies.into();

        let recorded = requests.clone();
        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let reply = replies
                    .pop_front()
                    .unwrap_or_else(|| Reply::json(500, r#"{"error":"no reply queued"}"#));
                serve(stream, reply, &recorded).await;
            }
        });

        Self {
            addr,
            requests,
            handle,
        }
    }

    /// Absolute URL for `path` on this server.
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve(stream: TcpStream, reply: Reply, recorded: &Mutex<Vec<RecordedRequest>>) {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let Some(request) = read_request(&mut reader).await else {
        return;
    };
    recorded.lock().unwrap().push(request);

    match reply {
        Reply::Full {
            status,
            content_type,
            body,
        } => {
            let head = response_head(status, content_type, body.len());
            let _ = write_half.write_all(head.as_bytes()).await;
            let _ = write_half.write_all(&body).await;
        }
        Reply::Trickle { chunks, interval } => {
            let total = chunks.iter().map(Vec::len).sum();
            let head = response_head(200, "application/octet-stream", total);
            let _ = write_half.write_all(head.as_bytes()).await;
            let _ = write_half.flush().await;
            for chunk in chunks {
                tokio::time::sleep(interval).await;
                if write_half.write_all(&chunk).await.is_err() {
                    return;
                }
                let _ = write_half.flush().await;
            }
        }
        Reply::Stall {
            head,
            total_len,
            pause,
        } => {
            let response = response_head(200, "application/octet-stream", total_len);
            let _ = write_half.write_all(response.as_bytes()).await;
            let _ = write_half.write_all(&head).await;
            let _ = write_half.flush().await;
            tokio::time::sleep(pause).await;
        }
    }
    let _ = write_half.shutdown().await;
}

fn response_head(status: u16, content_type: &str, len: usize) -> String {
    let reason = match status {
        200 => "OK",
        201 => "Created",
        401 => "Unauthorized",
        404 => "Not Found",
        _ => "Error",
    };
    format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status, reason, content_type, len
    )
}

async fn read_request<R: AsyncRead + Unpin>(reader: &mut BufReader<R>) -> Option<RecordedRequest> {
    let mut line = String::new();
    reader.read_line(&mut line).await.ok()?;
    let mut parts = line.split_whitespace();
    let method = parts.next()?.to_string();
    let target = parts.next()?.to_string();

    let mut headers = HashMap::new();
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).await.ok()? == 0 {
            break;
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
        }
    }

    let body = if let Some(len) = headers.get("content-length") {
        let mut body = vec![0; len.parse().ok()?];
        reader.read_exact(&mut body).await.ok()?;
        body
    } else if headers
        .get("transfer-encoding")
        .is_some_and(|v| v.eq_ignore_ascii_case("chunked"))
    {
        read_chunked(reader).await?
    } else {
        Vec::new()
    };

    Some(RecordedRequest {
        method,
        target,
        headers,
        body,
    })
}

async fn read_chunked<R: AsyncRead + Unpin>(reader: &mut BufReader<R>) -> Option<Vec<u8>> {
    let mut body = Vec::new();
    loop {
        let mut size_line = String::new();
        reader.read_line(&mut size_line).await.ok()?;
        let size_hex = size_line.trim().split(';').next()?;
        let size = usize::from_str_radix(size_hex, 16).ok()?;

        if size == 0 {
            // Trailers end with an empty line.
            loop {
                let mut trailer = String::new();
                if reader.read_line(&mut trailer).await.ok()? == 0 || trailer.trim().is_empty() {
                    return Some(body);
                }
            }
        }

        let start = body.len();
        body.resize(start + size, 0);
        reader.read_exact(&mut body[start..]).await.ok()?;
        let mut crlf = [0u8; 2];
        reader.read_exact(&mut crlf).await.ok()?;
    }
}
