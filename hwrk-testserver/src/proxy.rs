use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

const MAX_HEAD_BYTES: usize = 8 * 1024;

/// `CONNECT`-only forward proxy that records the tunnels it opens.
pub struct TestProxy {
    addr: SocketAddr,
    tunnels: Arc<AtomicU64>,
    last_target: Arc<Mutex<Option<String>>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl TestProxy {
    pub async fn start() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let tunnels = Arc::new(AtomicU64::new(0));
        let last_target = Arc::new(Mutex::new(None));
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let task = {
            let tunnels = tunnels.clone();
            let last_target = last_target.clone();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = &mut shutdown_rx => break,
                        accepted = listener.accept() => {
                            let Ok((stream, _)) = accepted else { continue };
                            tokio::spawn(tunnel(stream, tunnels.clone(), last_target.clone()));
                        }
                    }
                }
            })
        };

        Ok(Self {
            addr,
            tunnels,
            last_target,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn tunnels(&self) -> u64 {
        self.tunnels.load(Ordering::Relaxed)
    }

    /// `host:port` of the most recent `CONNECT`.
    pub fn last_target(&self) -> Option<String> {
        self.last_target.lock().ok().and_then(|t| t.clone())
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for TestProxy {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn tunnel(
    mut client: TcpStream,
    tunnels: Arc<AtomicU64>,
    last_target: Arc<Mutex<Option<String>>>,
) {
    let Some(target) = read_connect_target(&mut client).await else {
        let _ = client
            .write_all(b"HTTP/1.1 400 Bad Request\r\ncontent-length: 0\r\n\r\n")
            .await;
        return;
    };

    if let Ok(mut last) = last_target.lock() {
        *last = Some(target.clone());
    }

    let Ok(mut upstream) = TcpStream::connect(target.as_str()).await else {
        let _ = client
            .write_all(b"HTTP/1.1 502 Bad Gateway\r\ncontent-length: 0\r\n\r\n")
            .await;
        return;
    };

    tunnels.fetch_add(1, Ordering::Relaxed);
    if client
        .write_all(b"HTTP/1.1 200 Connection established\r\n\r\n")
        .await
        .is_err()
    {
        return;
    }
    let _ = tokio::io::copy_bidirectional(&mut client, &mut upstream).await;
}

/// Reads the request head one byte at a time so nothing after it is consumed.
async fn read_connect_target(stream: &mut TcpStream) -> Option<String> {
    let mut head = Vec::with_capacity(256);
    while !head.ends_with(b"\r\n\r\n") {
        if head.len() > MAX_HEAD_BYTES {
            return None;
        }
        head.push(stream.read_u8().await.ok()?);
    }

    let head = std::str::from_utf8(&head).ok()?;
    let mut request_line = head.lines().next()?.split_whitespace();
    match (request_line.next(), request_line.next()) {
        (Some("CONNECT"), Some(target)) => Some(target.to_string()),
        _ => None,
    }
}
