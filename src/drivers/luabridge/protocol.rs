//! Lua bridge wire format. Every command is one `|`-separated line; only
//! `Read` and `Version` are answered, `Read` with a JSON object and
//! `Version` with a `|`-separated line.
use serde::Deserialize;

use crate::device::{DeviceError, DeviceResult};

pub const VERSION: &str = "Version\n";
pub const RESET: &str = "Reset\n";
pub const PAUSE: &str = "Pause\n";
pub const UNPAUSE: &str = "Unpause\n";
pub const PAUSE_TOGGLE: &str = "PauseToggle\n";

/// `Read|<bus address>|<size>`, both decimal.
pub fn read_command(bus_address: u32, size: usize) -> String {
    format!("Read|{bus_address}|{size}\n")
}

/// `Write|<bus address>|<byte>|<byte>...`, all decimal.
pub fn write_command(bus_address: u32, data: &[u8]) -> String {
    let mut line = format!("Write|{bus_address}");
    for byte in data {
        line.push('|');
        line.push_str(&byte.to_string());
    }
    line.push('\n');
    line
}

#[derive(Debug, Default, Deserialize)]
struct ReadReply {
    #[serde(default)]
    data: Vec<u8>,
    #[serde(default)]
    error: Option<String>,
}

/// Parses a `Read` reply. Malformed JSON means the stream can no longer be
/// trusted; an `error` member is an ordinary request failure.
pub fn parse_read_reply(line: &str) -> DeviceResult<Vec<u8>> {
    let reply: ReadReply = serde_json::from_str(line.trim())
        .map_err(|err| DeviceError::Protocol(format!("malformed read reply: {err}")))?;
    match reply.error {
        Some(message) => Err(DeviceError::Remote(message)),
        None => Ok(reply.data),
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BridgeVersion {
    pub version: String,
    pub emulator: String,
}

/// Parses `Version|<fields>...`. The last field names the emulator; the
/// field before it is the script version when present.
pub fn parse_version_reply(line: &str) -> DeviceResult<BridgeVersion> {
    let mut fields = line.trim_end().split('|');
    if fields.next() != Some("Version") {
        return Err(DeviceError::Protocol(format!(
            "unexpected reply to Version: '{}'",
            line.trim_end()
        )));
    }
    let rest: Vec<&str> = fields.collect();
    let (version, emulator) = match rest.as_slice() {
        [] => ("", "Unknown"),
        [emulator] => ("", *emulator),
        [.., version, emulator] => (*version, *emulator),
    };
    Ok(BridgeVersion {
        version: version.to_string(),
        emulator: emulator.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_use_decimal_fields() {
        assert_eq!(read_command(0x7E_0010, 2), "Read|8257552|2\n");
        assert_eq!(write_command(0x7E_0000, &[0x01, 0xFF]), "Write|8257536|1|255\n");
    }

    #[test]
    fn read_reply_variants() {
        assert_eq!(parse_read_reply("{\"data\":[1,2,3]}\n").unwrap(), vec![1, 2, 3]);
        let err = parse_read_reply("{\"error\":\"bad domain\"}").unwrap_err();
        assert!(!err.is_fatal(), "script-side error keeps the connection");
        let err = parse_read_reply("data=1,2").unwrap_err();
        assert!(err.is_fatal(), "garbage means the stream is lost");
    }

    #[test]
    fn version_reply_names_emulator() {
        let version = parse_version_reply("Version|Lua bridge|3|BizHawk\n").unwrap();
        assert_eq!(version.emulator, "BizHawk");
        assert_eq!(version.version, "3");
        assert_eq!(parse_version_reply("Version|snes9x").unwrap().emulator, "snes9x");
        assert!(parse_version_reply("{\"data\":[]}").is_err());
    }
}
