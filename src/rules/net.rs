//! Network rules.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use serde_json::Value;

use crate::errors::{Error, Result};

/// An IPv4/IPv6 network in `address/prefix` notation.
///
/// Parsed once at rule construction; a malformed block is a validation
/// error. Candidate addresses that do not parse, or belong to the other
/// address family, are simply outside the block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CidrBlock {
    addr: IpAddr,
    prefix: u8,
}

impl CidrBlock {
    pub fn parse(cidr: &str) -> Result<Self> {
        let bad = || Error::Validation(format!("malformed CIDR block '{}'", cidr));

        let (addr, prefix) = cidr.split_once('/').ok_or_else(bad)?;
        let addr: IpAddr = addr.parse().map_err(|_| bad())?;
        let prefix: u8 = prefix.parse().map_err(|_| bad())?;

        let max = match addr {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };
        if prefix > max {
            return Err(bad());
        }
        Ok(Self { addr, prefix })
    }

    pub fn contains(&self, candidate: IpAddr) -> bool {
        match (self.addr, candidate) {
            (IpAddr::V4(net), IpAddr::V4(ip)) => {
                masked_v4(net, self.prefix) == masked_v4(ip, self.prefix)
            }
            (IpAddr::V6(net), IpAddr::V6(ip)) => {
                masked_v6(net, self.prefix) == masked_v6(ip, self.prefix)
            }
            _ => false,
        }
    }
}

impl fmt::Display for CidrBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix)
    }
}

fn masked_v4(addr: Ipv4Addr, prefix: u8) -> u32 {
    if prefix == 0 {
        return 0;
    }
    u32::from(addr) >> (32 - u32::from(prefix))
}

fn masked_v6(addr: Ipv6Addr, prefix: u8) -> u128 {
    if prefix == 0 {
        return 0;
    }
    u128::from(addr) >> (128 - u32::from(prefix))
}

pub(super) fn within(block: &CidrBlock, what: &Value) -> bool {
    match what {
        Value::String(s) => s
            .parse::<IpAddr>()
            .map_or(false, |addr| block.contains(addr)),
        _ => false,
    }
}
