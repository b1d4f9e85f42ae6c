//! ARP-based MAC address lookup
//!
//! Before touching a device, the CLI checks that the target IP actually
//! belongs to an ICP DAS gateway by resolving its MAC address and comparing
//! the vendor prefix. Resolution is behind a trait so the check can be
//! driven with a fake in tests.

use std::fmt;
use std::net::{Ipv4Addr, UdpSocket};
use std::thread;
use std::time::Duration;

use crate::error::{NetworkError, NetworkResult};

/// Vendor prefix (OUI) assigned to ICP DAS
pub const ICPDAS_OUI: [u8; 3] = [0x00, 0x0D, 0xE0];

/// A 48-bit hardware address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    pub fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// Parse the colon-separated form used by ARP tables.
    pub fn parse(text: &str) -> Option<Self> {
        let mut octets = [0u8; 6];
        let mut count = 0;
        for part in text.split(':') {
            if count == 6 {
                return None;
            }
            octets[count] = u8::from_str_radix(part, 16).ok()?;
            count += 1;
        }
        (count == 6).then_some(Self(octets))
    }

    /// True when the address carries the ICP DAS vendor prefix.
    pub fn is_icpdas(&self) -> bool {
        self.0[..3] == ICPDAS_OUI
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let o = &self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            o[0], o[1], o[2], o[3], o[4], o[5]
        )
    }
}

/// Resolves an IPv4 address to the MAC address answering for it.
pub trait MacResolver {
    fn resolve(&self, ip: Ipv4Addr) -> NetworkResult<MacAddress>;
}

/// Resolver backed by the operating system's ARP table.
///
/// A short UDP probe is sent first so the kernel performs the ARP exchange
/// for addresses not yet in the table.
pub struct ArpTableResolver;

impl ArpTableResolver {
    pub fn new() -> Self {
        Self
    }

    fn prime(&self, ip: Ipv4Addr) {
        if let Ok(socket) = UdpSocket::bind("0.0.0.0:0") {
            // The datagram itself is irrelevant; it only triggers ARP.
            let _ = socket.send_to(&[0u8], (ip, 9));
            thread::sleep(Duration::from_millis(50));
        }
    }
}

impl Default for ArpTableResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl MacResolver for ArpTableResolver {
    #[cfg(target_os = "linux")]
    fn resolve(&self, ip: Ipv4Addr) -> NetworkResult<MacAddress> {
        self.prime(ip);
        let table = std::fs::read_to_string("/proc/net/arp").map_err(|e| {
            NetworkError::ArpTableUnavailable { reason: e.to_string() }
        })?;
        lookup_in_arp_table(&table, ip)
    }

    #[cfg(not(target_os = "linux"))]
    fn resolve(&self, _ip: Ipv4Addr) -> NetworkResult<MacAddress> {
        Err(NetworkError::ArpTableUnavailable {
            reason: "ARP table lookup is only implemented for Linux".to_string(),
        })
    }
}

/// Find `ip` in a `/proc/net/arp` style table.
///
/// Columns: IP address, HW type, Flags, HW address, Mask, Device. The
/// first line is a header.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn lookup_in_arp_table(table: &str, ip: Ipv4Addr) -> NetworkResult<MacAddress> {
    let needle = ip.to_string();
    for line in table.lines().skip(1) {
        let mut columns = line.split_whitespace();
        let entry_ip = columns.next();
        let hw_address = columns.nth(2);
        if entry_ip == Some(needle.as_str()) {
            if let Some(mac) = hw_address.and_then(MacAddress::parse) {
                // An all-zero entry means the ARP exchange never completed.
                if mac.octets() != [0u8; 6] {
                    return Ok(mac);
                }
            }
        }
    }
    Err(NetworkError::MacNotFound { ip: needle })
}
