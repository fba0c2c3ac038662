//! Wire format of the emulator network bridge.
//!
//! Commands are single ASCII lines. A command prefixed with `b` is followed
//! by a binary block. Replies come in two shapes, told apart by their first
//! byte:
//!
//! * `0x00`, a 4-byte big-endian length, then that many payload bytes;
//! * `\n`, then `key:value` lines up to an empty line. A key repeating
//!   within one reply starts a new item.
use std::{fmt::Write as _, io};

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::{
    device::{DeviceError, DeviceResult, GroupMember},
    snes::memory::MemoryType,
};

const BINARY_SENTINEL: u8 = 0x00;
const ASCII_SENTINEL: u8 = b'\n';
/// Larger replies than this are treated as a desynchronised stream.
pub const MAX_BINARY_REPLY: usize = 16 * 1024 * 1024;

pub type AsciiItem = Vec<(String, String)>;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Reply {
    Binary(Vec<u8>),
    Ascii(Vec<AsciiItem>),
}

impl Reply {
    /// First value of `key` across all items.
    pub fn field(&self, key: &str) -> Option<&str> {
        match self {
            Reply::Binary(_) => None,
            Reply::Ascii(items) => items
                .iter()
                .flatten()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str()),
        }
    }

    pub fn error(&self) -> Option<&str> {
        self.field("error")
    }

    pub fn into_binary(self) -> DeviceResult<Vec<u8>> {
        if let Some(message) = self.error() {
            return Err(DeviceError::Remote(message.to_string()));
        }
        match self {
            Reply::Binary(data) => Ok(data),
            Reply::Ascii(_) => Err(DeviceError::Remote(
                "expected a binary reply".to_string(),
            )),
        }
    }

    pub fn into_ascii(self) -> DeviceResult<Vec<AsciiItem>> {
        if let Some(message) = self.error() {
            return Err(DeviceError::Remote(message.to_string()));
        }
        match self {
            Reply::Ascii(items) => Ok(items),
            Reply::Binary(_) => Err(DeviceError::Remote(
                "expected an ascii reply".to_string(),
            )),
        }
    }
}

fn invalid(message: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message.into())
}

pub async fn read_reply<R: AsyncBufRead + Unpin>(reader: &mut R) -> io::Result<Reply> {
    match reader.read_u8().await? {
        BINARY_SENTINEL => {
            let len = reader.read_u32().await? as usize;
            if len > MAX_BINARY_REPLY {
                return Err(invalid(format!("binary reply of {len} bytes")));
            }
            let mut data = vec![0u8; len];
            reader.read_exact(&mut data).await?;
            Ok(Reply::Binary(data))
        }
        ASCII_SENTINEL => {
            let mut items: Vec<AsciiItem> = Vec::new();
            let mut current = AsciiItem::new();
            let mut line = String::new();
            loop {
                line.clear();
                if reader.read_line(&mut line).await? == 0 {
                    return Err(io::Error::from(io::ErrorKind::UnexpectedEof));
                }
                let entry = line.trim_end_matches(['\r', '\n']);
                if entry.is_empty() {
                    break;
                }
                let (key, value) = entry
                    .split_once(':')
                    .ok_or_else(|| invalid(format!("malformed reply line '{entry}'")))?;
                if current.iter().any(|(k, _)| k == key) {
                    items.push(std::mem::take(&mut current));
                }
                current.push((key.to_string(), value.to_string()));
            }
            if !current.is_empty() {
                items.push(current);
            }
            Ok(Reply::Ascii(items))
        }
        other => Err(invalid(format!("unexpected reply sentinel 0x{other:02X}"))),
    }
}

fn region_args(memory_type: MemoryType, members: &[GroupMember]) -> String {
    let mut args = memory_type.as_str().to_string();
    for member in members {
        let _ = write!(args, ";${:X};${:X}", member.offset, member.size);
    }
    args
}

/// `CORE_READ <type>;$<offset>;$<size>...`
pub fn read_command(memory_type: MemoryType, members: &[GroupMember]) -> String {
    format!("CORE_READ {}\n", region_args(memory_type, members))
}

/// `bCORE_WRITE <type>;$<offset>;$<size>...`, to be followed by
/// [`binary_block`] carrying the concatenated payloads.
pub fn write_command(memory_type: MemoryType, members: &[GroupMember]) -> String {
    format!("bCORE_WRITE {}\n", region_args(memory_type, members))
}

pub fn binary_block(payload: &[u8]) -> Vec<u8> {
    let mut block = Vec::with_capacity(payload.len() + 5);
    block.push(BINARY_SENTINEL);
    block.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    block.extend_from_slice(payload);
    block
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    async fn parse(bytes: &[u8]) -> io::Result<Reply> {
        read_reply(&mut BufReader::new(bytes)).await
    }

    #[tokio::test]
    async fn binary_reply_reads_declared_length() {
        let reply = parse(&[0, 0, 0, 0, 3, 7, 8, 9, 0xEE]).await.unwrap();
        assert_eq!(reply, Reply::Binary(vec![7, 8, 9]), "trailing byte left unread");
    }

    #[tokio::test]
    async fn repeated_key_starts_new_item() {
        let reply = parse(b"\nid:1\nname:a\nid:2\nname:b\n\n").await.unwrap();
        let Reply::Ascii(items) = reply else {
            panic!("ascii reply expected");
        };
        assert_eq!(items.len(), 2);
        assert_eq!(items[1], vec![("id".into(), "2".into()), ("name".into(), "b".into())]);
    }

    #[tokio::test]
    async fn error_reply_is_a_remote_failure() {
        let reply = parse(b"\nerror:invalid memory\n\n").await.unwrap();
        let err = reply.into_binary().unwrap_err();
        assert!(matches!(&err, DeviceError::Remote(msg) if msg == "invalid memory"));
        assert!(!err.is_fatal(), "stream is still in sync");
    }

    #[tokio::test]
    async fn garbage_sentinel_is_invalid_data() {
        let err = parse(b"xyz").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        let truncated = parse(b"\nstate:running\n").await.unwrap_err();
        assert_eq!(truncated.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn commands_list_offset_size_pairs() {
        let members = [
            GroupMember { index: 0, pak_address: 0xF5_0010, offset: 0x10, size: 2 },
            GroupMember { index: 2, pak_address: 0xF5_0100, offset: 0x100, size: 0x20 },
        ];
        assert_eq!(read_command(MemoryType::Wram, &members), "CORE_READ WRAM;$10;$2;$100;$20\n");
        assert_eq!(write_command(MemoryType::Sram, &members[..1]), "bCORE_WRITE SRAM;$10;$2\n");
        assert_eq!(binary_block(&[1, 2]), vec![0, 0, 0, 0, 2, 1, 2]);
    }
}
