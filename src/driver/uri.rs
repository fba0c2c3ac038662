use std::{fmt, str::FromStr};

use crate::device::DeviceError;

/// `kind://address`, where `kind` names the driver and `address` is the
/// driver-specific endpoint (usually `host:port`).
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct DeviceUri {
    kind: String,
    address: String,
}

impl DeviceUri {
    pub fn new(kind: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            address: address.into(),
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

impl FromStr for DeviceUri {
    type Err = DeviceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((kind, address)) = s.split_once("://") else {
            return Err(DeviceError::InvalidUri(s.to_string()));
        };
        let address = address.trim_end_matches('/');
        if kind.is_empty() || address.is_empty() {
            return Err(DeviceError::InvalidUri(s.to_string()));
        }
        if !kind
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '+'))
        {
            return Err(DeviceError::InvalidUri(s.to_string()));
        }
        Ok(Self::new(kind.to_ascii_lowercase(), address))
    }
}

impl fmt::Display for DeviceUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.kind, self.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_kind_and_address() {
        let uri: DeviceUri = "emunw://127.0.0.1:48879".parse().unwrap();
        assert_eq!(uri.kind(), "emunw");
        assert_eq!(uri.address(), "127.0.0.1:48879");
        assert_eq!(uri.to_string(), "emunw://127.0.0.1:48879", "display is the canonical form");
    }

    #[test]
    fn kind_is_case_insensitive() {
        let uri: DeviceUri = "LuaBridge://10.0.0.2:5000/".parse().unwrap();
        assert_eq!(uri.kind(), "luabridge");
        assert_eq!(uri.address(), "10.0.0.2:5000", "trailing slash dropped");
    }

    #[test]
    fn rejects_malformed_uris() {
        for bad in ["127.0.0.1:48879", "://host", "emunw://", "em nw://host"] {
            assert!(
                matches!(bad.parse::<DeviceUri>(), Err(DeviceError::InvalidUri(_))),
                "'{bad}' must be rejected"
            );
        }
    }
}
