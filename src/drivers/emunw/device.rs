//! One persistent connection to an emulator bridge. Every batch holds the
//! connection lock from the first command to the last reply; a batch that
//! was interrupted leaves the connection marked in flight and the next user
//! closes it, since the stream has no way to resynchronise.
use std::{
    sync::{
        Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio::{
    io::{AsyncWriteExt, BufStream},
    net::TcpStream,
    sync::{Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard},
    time::Instant,
};
use tracing::{debug, trace, warn};

use crate::{
    device::{
        AccessContext, Device, DeviceError, DeviceMemory, DeviceResult, Heartbeat,
        MemoryReadRequest, MemoryReadResponse, MemoryWriteRequest, MemoryWriteResponse,
        RequestGroup, group_by_memory_type, split_payload,
    },
    snes::{
        address::{AddressSpace, AddressTuple},
        mapping::MappingError,
        memory::MemoryType,
    },
};

use super::protocol::{self, Reply};

/// Fields of interest from `EMU_STATUS`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct EmulatorStatus {
    pub state: Option<String>,
    pub game: Option<String>,
}

impl EmulatorStatus {
    pub fn is_paused(&self) -> bool {
        self.state.as_deref() == Some("paused")
    }
}

struct Connection {
    stream: BufStream<TcpStream>,
    in_flight: bool,
}

pub struct EmuNwDevice {
    key: String,
    connection: AsyncMutex<Option<Connection>>,
    closed: AtomicBool,
    last_activity: Mutex<Instant>,
    request_timeout: Duration,
}

impl EmuNwDevice {
    pub async fn connect(
        key: impl Into<String>,
        address: &str,
        ctx: &AccessContext,
        request_timeout: Duration,
    ) -> DeviceResult<Self> {
        ctx.check()?;
        let key = key.into();
        let stream = ctx.run(TcpStream::connect(address)).await?;
        stream.set_nodelay(true)?;
        debug!(device = %key, "connected");
        Ok(Self {
            key,
            connection: AsyncMutex::new(Some(Connection {
                stream: BufStream::new(stream),
                in_flight: false,
            })),
            closed: AtomicBool::new(false),
            last_activity: Mutex::new(Instant::now()),
            request_timeout,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    fn touch(&self) {
        *self.last_activity.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    fn mark_closed(&self, guard: &mut AsyncMutexGuard<'_, Option<Connection>>) {
        self.closed.store(true, Ordering::Release);
        guard.take();
    }

    /// Sends `frames` and reads `replies` replies under one lock hold.
    async fn exchange(
        &self,
        ctx: &AccessContext,
        frames: &[Vec<u8>],
        replies: usize,
    ) -> DeviceResult<Vec<Reply>> {
        let ctx = ctx.or_timeout(self.request_timeout);
        let mut guard = ctx.wait(self.connection.lock()).await?;
        if guard.as_ref().is_some_and(|connection| connection.in_flight) {
            warn!(device = %self.key, "previous exchange was interrupted, closing");
            self.mark_closed(&mut guard);
        }
        let Some(connection) = guard.as_mut() else {
            return Err(DeviceError::Closed);
        };
        connection.in_flight = true;
        let stream = &mut connection.stream;
        let result = ctx
            .run(async {
                for frame in frames {
                    stream.write_all(frame).await?;
                }
                stream.flush().await?;
                let mut collected = Vec::with_capacity(replies);
                for _ in 0..replies {
                    collected.push(protocol::read_reply(stream).await?);
                }
                Ok(collected)
            })
            .await;
        match result {
            Ok(collected) => {
                connection.in_flight = false;
                self.touch();
                Ok(collected)
            }
            Err(err) => {
                warn!(device = %self.key, error = %err, "exchange failed, closing");
                self.mark_closed(&mut guard);
                Err(err)
            }
        }
    }

    async fn command(&self, ctx: &AccessContext, line: &str) -> DeviceResult<Reply> {
        trace!(device = %self.key, command = line.trim_end(), "send");
        let mut replies = self.exchange(ctx, &[line.as_bytes().to_vec()], 1).await?;
        replies
            .pop()
            .ok_or_else(|| DeviceError::Protocol("missing reply".to_string()))
    }

    pub async fn status(&self, ctx: &AccessContext) -> DeviceResult<EmulatorStatus> {
        let reply = self.command(ctx, "EMU_STATUS\n").await?;
        let status = EmulatorStatus {
            state: reply.field("state").map(str::to_string),
            game: reply.field("game").map(str::to_string),
        };
        reply.into_ascii()?;
        Ok(status)
    }
}

/// The bridge addresses memory by region, so a group outside every region
/// cannot be expressed in a command.
fn require_classified(groups: &[RequestGroup]) -> DeviceResult<()> {
    match groups
        .iter()
        .find(|group| group.memory_type == MemoryType::Unknown)
    {
        Some(group) => Err(MappingError::Unclassified {
            address: group.members[0].pak_address,
        }
        .into()),
        None => Ok(()),
    }
}

fn pak_tuple(request: AddressTuple, pak_address: u32) -> AddressTuple {
    AddressTuple::new(pak_address, AddressSpace::FxPakPro, request.mapping)
}

#[async_trait]
impl DeviceMemory for EmuNwDevice {
    async fn multi_read_memory(
        &self,
        ctx: &AccessContext,
        reads: &[MemoryReadRequest],
    ) -> DeviceResult<Vec<MemoryReadResponse>> {
        let groups = group_by_memory_type(reads)?;
        require_classified(&groups)?;
        let frames: Vec<Vec<u8>> = groups
            .iter()
            .map(|group| protocol::read_command(group.memory_type, &group.members).into_bytes())
            .collect();
        let replies = self.exchange(ctx, &frames, groups.len()).await?;

        let mut slots: Vec<Option<MemoryReadResponse>> = vec![None; reads.len()];
        for (group, reply) in groups.iter().zip(replies) {
            let payload = reply.into_binary()?;
            let parts = split_payload(group, &payload).ok_or(DeviceError::UnexpectedLength {
                expected: group.total_size(),
                actual: payload.len(),
            })?;
            for (member, data) in parts {
                let request = reads[member.index].request_address;
                slots[member.index] = Some(MemoryReadResponse {
                    request_address: request,
                    device_address: pak_tuple(request, member.pak_address),
                    data: data.to_vec(),
                });
            }
        }
        slots
            .into_iter()
            .map(|slot| slot.ok_or_else(|| DeviceError::Protocol("unanswered read".to_string())))
            .collect()
    }

    async fn multi_write_memory(
        &self,
        ctx: &AccessContext,
        writes: &[MemoryWriteRequest],
    ) -> DeviceResult<Vec<MemoryWriteResponse>> {
        let groups = group_by_memory_type(writes)?;
        require_classified(&groups)?;
        let mut frames = Vec::with_capacity(groups.len() * 2);
        for group in &groups {
            frames.push(protocol::write_command(group.memory_type, &group.members).into_bytes());
            let payload: Vec<u8> = group
                .members
                .iter()
                .flat_map(|member| writes[member.index].data.iter().copied())
                .collect();
            frames.push(protocol::binary_block(&payload));
        }
        let replies = self.exchange(ctx, &frames, groups.len()).await?;
        for reply in replies {
            if let Some(message) = reply.error() {
                return Err(DeviceError::Remote(message.to_string()));
            }
        }

        let mut responses: Vec<Option<MemoryWriteResponse>> = vec![None; writes.len()];
        for member in groups.iter().flat_map(|group| group.members.iter()) {
            let request = writes[member.index].request_address;
            responses[member.index] = Some(MemoryWriteResponse {
                request_address: request,
                device_address: pak_tuple(request, member.pak_address),
                size: member.size,
            });
        }
        Ok(responses.into_iter().flatten().collect())
    }
}

#[async_trait]
impl Device for EmuNwDevice {
    async fn reset_system(&self, ctx: &AccessContext) -> DeviceResult<()> {
        self.command(ctx, "EMU_RESET\n").await?.into_ascii()?;
        Ok(())
    }

    async fn pause_unpause(&self, ctx: &AccessContext, paused: bool) -> DeviceResult<bool> {
        let line = if paused { "EMU_PAUSE\n" } else { "EMU_RESUME\n" };
        self.command(ctx, line).await?.into_ascii()?;
        let status = self.status(ctx).await?;
        Ok(match status.state {
            Some(_) => status.is_paused(),
            None => paused,
        })
    }

    async fn pause_toggle(&self, ctx: &AccessContext) -> DeviceResult<()> {
        let status = self.status(ctx).await?;
        let line = if status.is_paused() { "EMU_RESUME\n" } else { "EMU_PAUSE\n" };
        self.command(ctx, line).await?.into_ascii()?;
        Ok(())
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
impl Heartbeat for EmuNwDevice {
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
        self.status(ctx).await.map(drop)
    }
}
