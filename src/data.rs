//! Configuration entity model for one PDS device snapshot
//!
//! `PdsConfig` is the typed in-memory form of everything the manager reads
//! from or writes to a device: the Telnet-backed scalar settings and the
//! HTTP-backed Modbus gateway settings, including one `ModbusComPort` entry
//! per physical serial port. The entity round-trips to JSON field-for-field
//! (see the `persist` module), preserving serial-port list order.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::telnet::LINE_TERMINATOR;

/// Modbus protocol variant bridged on a serial port.
///
/// The device's configuration page encodes the variant as an integer in
/// form submissions and as a literal token (`ASCII` / `RTU`) on the status
/// page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModbusType {
    #[default]
    Ascii,
    Rtu,
}

impl ModbusType {
    /// Integer encoding used in form submissions.
    pub fn as_wire(self) -> i32 {
        match self {
            ModbusType::Ascii => 0,
            ModbusType::Rtu => 1,
        }
    }

    /// Literal token as rendered on the scraped status page.
    pub fn token(self) -> &'static str {
        match self {
            ModbusType::Ascii => "ASCII",
            ModbusType::Rtu => "RTU",
        }
    }
}

/// One physical COM port's Modbus bridging rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModbusComPort {
    /// Physical COM port index
    pub com_port_id: i32,
    /// Number of Modbus IDs mapped through this port
    pub nb_of_id: i32,
    /// Offset applied to incoming Modbus IDs
    pub id_offset: i32,
    /// Response timeout in milliseconds
    pub time_out: i32,
    /// Protocol variant spoken on the serial side
    pub modbus_type: ModbusType,
}

/// Housekeeping suffix the device appends to each line of the COM text
/// block; it reports live connection state, not configuration, and must
/// not survive a read so that a later write does not replay it.
static COM_CONNECT_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\. connect=\d\r\n").expect("COM suffix pattern must compile"));

/// Full configuration of one PDS device.
///
/// Telnet-backed fields are raw response text and stay `None` when a read
/// failed or the field was never read; the synchronization engine skips
/// `None` fields on write rather than defaulting them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PdsConfig {
    // Telnet, read-only
    pub firmware_version: Option<String>,
    pub mac: Option<String>,
    pub ip_filter: Option<String>,
    pub socket: Option<String>,

    // Telnet, read/write
    com_ports: Option<String>,
    pub name: Option<String>,
    pub alias: Option<String>,
    pub ip: Option<String>,
    pub mask: Option<String>,
    pub gateway: Option<String>,
    pub dhcp: Option<String>,
    pub echo_mode: Option<String>,
    pub udp_search: Option<String>,
    pub broadcast: Option<String>,
    pub system_timeout: Option<String>,
    pub socket_timeout: Option<String>,
    pub end_char: Option<String>,
    pub echo_cmd_no: Option<String>,

    // HTTP-backed gateway settings
    pub gateway_modbus_id: i32,
    pub modbus_port: i32,
    pub modbus_com_ports: Vec<ModbusComPort>,
}

impl PdsConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serial-port configuration text block, one line per port setting.
    pub fn com_ports(&self) -> Option<&str> {
        self.com_ports.as_deref()
    }

    /// Assign the serial-port text block, stripping the per-line
    /// `. connect=N` housekeeping suffix the device includes in reads.
    pub fn set_com_ports(&mut self, value: Option<String>) {
        self.com_ports = value
            .map(|text| COM_CONNECT_SUFFIX.replace_all(&text, LINE_TERMINATOR).into_owned());
    }
}
