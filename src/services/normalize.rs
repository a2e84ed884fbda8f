//! Canonical string forms for realized attribute values.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use thiserror::Error;
use uuid::Uuid;

use crate::domain::errors::HarnessError;

/// Value that cannot be put in realized form.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("Invalid IP address: {0}")]
    InvalidIp(String),

    #[error("Invalid IP prefix: {0}")]
    InvalidPrefix(String),

    #[error("Invalid MAC address: {0}")]
    InvalidMac(String),

    #[error("Invalid GUID: {0}")]
    InvalidGuid(String),
}

impl From<NormalizeError> for HarnessError {
    fn from(err: NormalizeError) -> Self {
        Self::InvalidValue(err.to_string())
    }
}

/// Canonical text of an IPv4 or IPv6 address.
pub fn ip(text: &str) -> Result<String, NormalizeError> {
    text.trim()
        .parse::<IpAddr>()
        .map(|addr| addr.to_string())
        .map_err(|_| NormalizeError::InvalidIp(text.to_string()))
}

/// Split a CIDR prefix into canonical network address and dotted/colon mask.
///
/// `10.1.2.3/16` becomes `("10.1.0.0", "255.255.0.0")`.
pub fn prefix(cidr: &str) -> Result<(String, String), NormalizeError> {
    let invalid = || NormalizeError::InvalidPrefix(cidr.to_string());
    let (addr, len) = cidr.trim().split_once('/').ok_or_else(invalid)?;
    let addr: IpAddr = addr.parse().map_err(|_| invalid())?;
    let len: u32 = len.parse().map_err(|_| invalid())?;

    match addr {
        IpAddr::V4(v4) => {
            if len > 32 {
                return Err(invalid());
            }
            let mask = u32::MAX.checked_shl(32 - len).unwrap_or(0);
            let network = Ipv4Addr::from(u32::from(v4) & mask);
            Ok((network.to_string(), Ipv4Addr::from(mask).to_string()))
        }
        IpAddr::V6(v6) => {
            if len > 128 {
                return Err(invalid());
            }
            let mask = u128::MAX.checked_shl(128 - len).unwrap_or(0);
            let network = Ipv6Addr::from(u128::from(v6) & mask);
            Ok((network.to_string(), Ipv6Addr::from(mask).to_string()))
        }
    }
}

/// Canonical `AA:BB:CC:DD:EE:FF` form of a MAC written with `:`, `-` or no separators.
pub fn mac(text: &str) -> Result<String, NormalizeError> {
    let digits: String = text
        .chars()
        .filter(|c| *c != ':' && *c != '-')
        .collect();
    if digits.len() != 12 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(NormalizeError::InvalidMac(text.to_string()));
    }

    let upper = digits.to_ascii_uppercase();
    let octets: Vec<&str> = (0..6).map(|i| &upper[i * 2..i * 2 + 2]).collect();
    Ok(octets.join(":"))
}

/// GUID as 32 lowercase hex digits, the byte form carried in payloads.
pub fn guid_hex(text: &str) -> Result<String, NormalizeError> {
    Uuid::parse_str(text.trim())
        .map(|guid| guid.simple().to_string())
        .map_err(|_| NormalizeError::InvalidGuid(text.to_string()))
}
