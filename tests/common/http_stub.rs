//! One-shot HTTP server standing in for the speech service

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub struct HttpStub {
    pub url: String,
    /// Resolves to the raw request (head and body) once served
    pub request: JoinHandle<String>,
}

impl HttpStub {
    /// Answer a single request with `status` and `body`
    pub async fn start(status: u16, content_type: &str, body: Vec<u8>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind stub listener");
        let addr = listener.local_addr().expect("No local addr");
        let content_type = content_type.to_string();

        let request = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept failed");
            let raw = read_request(&mut socket).await;

            let head = format!(
                "HTTP/1.1 {} Stub\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                status,
                content_type,
                body.len()
            );
            socket.write_all(head.as_bytes()).await.expect("write failed");
            socket.write_all(&body).await.expect("write failed");
            socket.shutdown().await.ok();
            raw
        });

        Self {
            url: format!("http://{}/cognitiveservices/v1", addr),
            request,
        }
    }
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        let n = socket.read(&mut chunk).await.expect("read failed");
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);

        let text = String::from_utf8_lossy(&buf);
        if let Some(split) = text.find("\r\n\r\n") {
            let content_length = text[..split]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if buf.len() >= split + 4 + content_length {
                break;
            }
        }
    }

    String::from_utf8_lossy(&buf).into_owned()
}
