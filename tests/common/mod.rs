#![allow(dead_code)]

use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::Duration,
};

use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    task::JoinHandle,
};

pub type Handler = dyn Fn(&str) -> Option<Vec<u8>> + Send + Sync;
pub type Delay = dyn Fn(&str) -> Duration + Send + Sync;

/// In-process stand-in for an emulator network bridge. Every command line is
/// recorded; the handler produces the raw reply bytes, or `None` to drop the
/// connection. An empty reply leaves the command unanswered.
pub struct FakeEmuNw {
    pub addr: SocketAddr,
    pub commands: Arc<Mutex<Vec<String>>>,
    pub payloads: Arc<Mutex<Vec<Vec<u8>>>>,
    task: JoinHandle<()>,
}

impl FakeEmuNw {
    pub async fn spawn(handler: impl Fn(&str) -> Option<Vec<u8>> + Send + Sync + 'static) -> Self {
        Self::spawn_delayed(|_| Duration::ZERO, handler).await
    }

    /// Like [`FakeEmuNw::spawn`], waiting `delay(command)` before each reply.
    pub async fn spawn_delayed(
        delay: impl Fn(&str) -> Duration + Send + Sync + 'static,
        handler: impl Fn(&str) -> Option<Vec<u8>> + Send + Sync + 'static,
    ) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind fake bridge");
        let addr = listener.local_addr().expect("fake bridge address");
        let commands = Arc::new(Mutex::new(Vec::new()));
        let payloads = Arc::new(Mutex::new(Vec::new()));
        let handler: Arc<Handler> = Arc::new(handler);
        let delay: Arc<Delay> = Arc::new(delay);
        let task = {
            let commands = Arc::clone(&commands);
            let payloads = Arc::clone(&payloads);
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    tokio::spawn(serve_emunw(
                        stream,
                        Arc::clone(&handler),
                        Arc::clone(&delay),
                        Arc::clone(&commands),
                        Arc::clone(&payloads),
                    ));
                }
            })
        };
        Self {
            addr,
            commands,
            payloads,
            task,
        }
    }

    pub fn host(&self) -> String {
        self.addr.to_string()
    }

    /// Recorded commands other than status polls.
    pub fn memory_commands(&self) -> Vec<String> {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .filter(|command| !command.starts_with("EMU_STATUS"))
            .cloned()
            .collect()
    }
}

impl Drop for FakeEmuNw {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve_emunw(
    stream: TcpStream,
    handler: Arc<Handler>,
    delay: Arc<Delay>,
    commands: Arc<Mutex<Vec<String>>>,
    payloads: Arc<Mutex<Vec<Vec<u8>>>>,
) {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
        let command = line.trim_end().to_string();
        if command.starts_with('b') {
            let Ok(0) = reader.read_u8().await else { return };
            let Ok(len) = reader.read_u32().await else { return };
            let mut payload = vec![0u8; len as usize];
            if reader.read_exact(&mut payload).await.is_err() {
                return;
            }
            payloads.lock().unwrap().push(payload);
        }
        commands.lock().unwrap().push(command.clone());
        let pause = delay(&command);
        if !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }
        match handler(&command) {
            Some(reply) => {
                if write_half.write_all(&reply).await.is_err() {
                    return;
                }
            }
            None => return,
        }
    }
}

pub fn binary_reply(data: &[u8]) -> Vec<u8> {
    let mut reply = vec![0u8];
    reply.extend_from_slice(&(data.len() as u32).to_be_bytes());
    reply.extend_from_slice(data);
    reply
}

pub fn ascii_reply(fields: &[(&str, &str)]) -> Vec<u8> {
    let mut reply = String::from("\n");
    for (key, value) in fields {
        reply.push_str(&format!("{key}:{value}\n"));
    }
    reply.push('\n');
    reply.into_bytes()
}

pub fn status_reply(game: &str) -> Vec<u8> {
    ascii_reply(&[("state", "running"), ("game", game)])
}

/// Accepts connections and never answers.
pub struct StalledPeer {
    pub addr: SocketAddr,
    task: JoinHandle<()>,
}

impl StalledPeer {
    pub async fn spawn() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind stalled peer");
        let addr = listener.local_addr().expect("stalled peer address");
        let task = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });
        Self { addr, task }
    }
}

impl Drop for StalledPeer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// An address with nothing listening on it.
pub async fn refused_address() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind probe port");
    let addr = listener.local_addr().expect("probe port address");
    drop(listener);
    addr
}

/// A Lua bridge script connecting to the driver. Answers `Version`, serves
/// `Read` from `memory` and records every line it receives.
pub struct FakeLuaScript {
    pub lines: Arc<Mutex<Vec<String>>>,
    task: JoinHandle<()>,
}

impl FakeLuaScript {
    pub async fn connect(
        addr: SocketAddr,
        memory: impl Fn(u32, usize) -> Vec<u8> + Send + 'static,
    ) -> Self {
        let stream = TcpStream::connect(addr).await.expect("connect to lua bridge");
        let lines = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&lines);
        let task = tokio::spawn(async move {
            let (read_half, mut write_half) = stream.into_split();
            let mut reader = BufReader::new(read_half);
            let mut line = String::new();
            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) | Err(_) => return,
                    Ok(_) => {}
                }
                let command = line.trim_end().to_string();
                recorded.lock().unwrap().push(command.clone());
                let fields: Vec<&str> = command.split('|').collect();
                let reply = match fields.as_slice() {
                    ["Version"] => Some("Version|test bridge|1|FakeEmu\n".to_string()),
                    ["Read", address, size] => {
                        let address: u32 = address.parse().unwrap();
                        let size: usize = size.parse().unwrap();
                        let data = memory(address, size);
                        Some(format!("{}\n", serde_json::json!({ "data": data })))
                    }
                    _ => None,
                };
                if let Some(reply) = reply {
                    if write_half.write_all(reply.as_bytes()).await.is_err() {
                        return;
                    }
                }
            }
        });
        Self { lines, task }
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    /// Drops the connection as a crashed emulator would.
    pub fn disconnect(self) {
        self.task.abort();
    }
}

/// Polls `check` until it holds or `limit` passes.
pub async fn eventually<F, Fut>(limit: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
