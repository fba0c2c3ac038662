//! A Lua bridge script that connected to us. The script answers one command
//! at a time, so each logical read or write is its own round trip.
use std::{
    net::SocketAddr,
    sync::{
        Mutex, OnceLock, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufStream},
    net::TcpStream,
    sync::Mutex as AsyncMutex,
    time::Instant,
};
use tracing::{debug, trace, warn};

use crate::{
    device::{
        AccessContext, Device, DeviceError, DeviceMemory, DeviceResult, Heartbeat,
        MemoryReadRequest, MemoryReadResponse, MemoryWriteRequest, MemoryWriteResponse,
    },
    snes::{
        address::{AddressSpace, AddressTuple},
        memory::resolve_address,
    },
};

use super::protocol::{self, BridgeVersion};

struct Connection {
    stream: BufStream<TcpStream>,
    in_flight: bool,
}

pub struct LuaBridgeDevice {
    key: String,
    peer: SocketAddr,
    version: OnceLock<BridgeVersion>,
    connection: AsyncMutex<Option<Connection>>,
    closed: AtomicBool,
    last_activity: Mutex<Instant>,
    request_timeout: Duration,
}

impl LuaBridgeDevice {
    pub fn accept(stream: TcpStream, peer: SocketAddr, request_timeout: Duration) -> Self {
        if let Err(err) = stream.set_nodelay(true) {
            debug!(peer = %peer, error = %err, "set_nodelay failed");
        }
        Self {
            key: peer.to_string(),
            peer,
            version: OnceLock::new(),
            connection: AsyncMutex::new(Some(Connection {
                stream: BufStream::new(stream),
                in_flight: false,
            })),
            closed: AtomicBool::new(false),
            last_activity: Mutex::new(Instant::now()),
            request_timeout,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Emulator reported by the handshake, if it completed.
    pub fn emulator(&self) -> Option<&str> {
        self.version.get().map(|version| version.emulator.as_str())
    }

    /// Sends one command line and, when `answered`, reads one reply line.
    async fn round_trip(
        &self,
        ctx: &AccessContext,
        line: &str,
        answered: bool,
    ) -> DeviceResult<Option<String>> {
        let ctx = ctx.or_timeout(self.request_timeout);
        let mut guard = ctx.wait(self.connection.lock()).await?;
        if guard.as_ref().is_some_and(|connection| connection.in_flight) {
            warn!(device = %self.key, "previous command was interrupted, closing");
            self.closed.store(true, Ordering::Release);
            guard.take();
        }
        let Some(connection) = guard.as_mut() else {
            return Err(DeviceError::Closed);
        };
        trace!(device = %self.key, command = line.trim_end(), "send");
        connection.in_flight = true;
        let stream = &mut connection.stream;
        let result = ctx
            .run(async {
                stream.write_all(line.as_bytes()).await?;
                stream.flush().await?;
                if !answered {
                    return Ok(None);
                }
                let mut reply = String::new();
                if stream.read_line(&mut reply).await? == 0 {
                    return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof));
                }
                Ok(Some(reply))
            })
            .await;
        match result {
            Ok(reply) => {
                connection.in_flight = false;
                *self.last_activity.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
                Ok(reply)
            }
            Err(err) => {
                warn!(device = %self.key, error = %err, "round trip failed, closing");
                self.closed.store(true, Ordering::Release);
                guard.take();
                Err(err)
            }
        }
    }

    async fn request(&self, ctx: &AccessContext, line: &str) -> DeviceResult<String> {
        self.round_trip(ctx, line, true)
            .await?
            .ok_or_else(|| DeviceError::Protocol("missing reply".to_string()))
    }

    async fn fire(&self, ctx: &AccessContext, line: &str) -> DeviceResult<()> {
        self.round_trip(ctx, line, false).await.map(drop)
    }

    /// A reply that is not a version line means the stream is out of step,
    /// so the device is closed.
    pub async fn handshake(&self, ctx: &AccessContext) -> DeviceResult<BridgeVersion> {
        let reply = self.request(ctx, protocol::VERSION).await?;
        match protocol::parse_version_reply(&reply) {
            Ok(version) => {
                let _ = self.version.set(version.clone());
                Ok(version)
            }
            Err(err) => {
                let _ = self.close().await;
                Err(err)
            }
        }
    }
}

/// Bus and pak forms of one request address.
fn locate(tuple: AddressTuple) -> DeviceResult<(u32, AddressTuple)> {
    let bus = tuple.translate(AddressSpace::SnesABus)?;
    let pak = resolve_address(tuple)?.pak_address;
    Ok((
        bus.address,
        AddressTuple::new(pak, AddressSpace::FxPakPro, tuple.mapping),
    ))
}

#[async_trait]
impl DeviceMemory for LuaBridgeDevice {
    async fn multi_read_memory(
        &self,
        ctx: &AccessContext,
        reads: &[MemoryReadRequest],
    ) -> DeviceResult<Vec<MemoryReadResponse>> {
        let located = reads
            .iter()
            .map(|read| locate(read.request_address))
            .collect::<DeviceResult<Vec<_>>>()?;
        let mut responses = Vec::with_capacity(reads.len());
        for (read, (bus, device_address)) in reads.iter().zip(located) {
            let reply = self
                .request(ctx, &protocol::read_command(bus, read.size))
                .await?;
            let data = match protocol::parse_read_reply(&reply) {
                Ok(data) => data,
                Err(err) => {
                    if err.is_fatal() {
                        let _ = self.close().await;
                    }
                    return Err(err);
                }
            };
            if data.len() != read.size {
                return Err(DeviceError::UnexpectedLength {
                    expected: read.size,
                    actual: data.len(),
                });
            }
            responses.push(MemoryReadResponse {
                request_address: read.request_address,
                device_address,
                data,
            });
        }
        Ok(responses)
    }

    async fn multi_write_memory(
        &self,
        ctx: &AccessContext,
        writes: &[MemoryWriteRequest],
    ) -> DeviceResult<Vec<MemoryWriteResponse>> {
        let located = writes
            .iter()
            .map(|write| locate(write.request_address))
            .collect::<DeviceResult<Vec<_>>>()?;
        let mut responses = Vec::with_capacity(writes.len());
        for (write, (bus, device_address)) in writes.iter().zip(located) {
            self.fire(ctx, &protocol::write_command(bus, &write.data))
                .await?;
            responses.push(MemoryWriteResponse {
                request_address: write.request_address,
                device_address,
                size: write.data.len(),
            });
        }
        Ok(responses)
    }
}

#[async_trait]
impl Device for LuaBridgeDevice {
    async fn reset_system(&self, ctx: &AccessContext) -> DeviceResult<()> {
        self.fire(ctx, protocol::RESET).await
    }

    /// The script does not report its state, so the requested state is
    /// returned once the command is delivered.
    async fn pause_unpause(&self, ctx: &AccessContext, paused: bool) -> DeviceResult<bool> {
        let line = if paused { protocol::PAUSE } else { protocol::UNPAUSE };
        self.fire(ctx, line).await?;
        Ok(paused)
    }

    async fn pause_toggle(&self, ctx: &AccessContext) -> DeviceResult<()> {
        self.fire(ctx, protocol::PAUSE_TOGGLE).await
    }

    async fn close(&self) -> DeviceResult<()> {
        self.closed.store(true, Ordering::Release);
        let mut guard = self.connection.lock().await;
        if let Some(mut connection) = guard.take() {
            if let Err(err) = connection.stream.shutdown().await {
                debug!(device = %self.key, error = %err, "shutdown on close");
            }
            debug!(device = %self.key, "closed");
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[async_trait]
impl Heartbeat for LuaBridgeDevice {
    fn label(&self) -> &str {
        &self.key
    }

    fn idle_for(&self) -> Duration {
        self.last_activity
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .elapsed()
    }

    async fn heartbeat(&self, ctx: &AccessContext) -> DeviceResult<()> {
        let reply = self.request(ctx, protocol::VERSION).await?;
        protocol::parse_version_reply(&reply).map(drop)
    }
}
