//! Declarative field schema binding entity fields to device backends
//!
//! The synchronization engine never inspects the entity's shape at run
//! time; it iterates these static tables. Each Telnet-backed field has
//! exactly one `TelnetFieldSpec` naming its shell command and read/write
//! capabilities, and each HTTP-backed field has exactly one `HttpFieldSpec`
//! naming its form key, the regex capture group supplying its raw value,
//! and the converter that interprets it. A field is never dual-backed.

use crate::convert::{ConvertedValue, INT_CONVERTER, MODBUS_TYPE_CONVERTER};
use crate::data::{ModbusComPort, PdsConfig};

/// Identifies one Telnet-backed scalar field of `PdsConfig`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelnetField {
    FirmwareVersion,
    Mac,
    IpFilter,
    Socket,
    ComPorts,
    Name,
    Alias,
    Ip,
    Mask,
    Gateway,
    Dhcp,
    EchoMode,
    UdpSearch,
    Broadcast,
    SystemTimeout,
    SocketTimeout,
    EndChar,
    EchoCmdNo,
}

impl TelnetField {
    /// Read the field's current value from the entity.
    pub fn get<'a>(&self, config: &'a PdsConfig) -> Option<&'a str> {
        match self {
            TelnetField::FirmwareVersion => config.firmware_version.as_deref(),
            TelnetField::Mac => config.mac.as_deref(),
            TelnetField::IpFilter => config.ip_filter.as_deref(),
            TelnetField::Socket => config.socket.as_deref(),
            TelnetField::ComPorts => config.com_ports(),
            TelnetField::Name => config.name.as_deref(),
            TelnetField::Alias => config.alias.as_deref(),
            TelnetField::Ip => config.ip.as_deref(),
            TelnetField::Mask => config.mask.as_deref(),
            TelnetField::Gateway => config.gateway.as_deref(),
            TelnetField::Dhcp => config.dhcp.as_deref(),
            TelnetField::EchoMode => config.echo_mode.as_deref(),
            TelnetField::UdpSearch => config.udp_search.as_deref(),
            TelnetField::Broadcast => config.broadcast.as_deref(),
            TelnetField::SystemTimeout => config.system_timeout.as_deref(),
            TelnetField::SocketTimeout => config.socket_timeout.as_deref(),
            TelnetField::EndChar => config.end_char.as_deref(),
            TelnetField::EchoCmdNo => config.echo_cmd_no.as_deref(),
        }
    }

    /// Assign the field on the entity. `ComPorts` goes through the
    /// normalizing setter; every other field is stored verbatim.
    pub fn set(&self, config: &mut PdsConfig, value: Option<String>) {
        match self {
            TelnetField::FirmwareVersion => config.firmware_version = value,
            TelnetField::Mac => config.mac = value,
            TelnetField::IpFilter => config.ip_filter = value,
            TelnetField::Socket => config.socket = value,
            TelnetField::ComPorts => config.set_com_ports(value),
            TelnetField::Name => config.name = value,
            TelnetField::Alias => config.alias = value,
            TelnetField::Ip => config.ip = value,
            TelnetField::Mask => config.mask = value,
            TelnetField::Gateway => config.gateway = value,
            TelnetField::Dhcp => config.dhcp = value,
            TelnetField::EchoMode => config.echo_mode = value,
            TelnetField::UdpSearch => config.udp_search = value,
            TelnetField::Broadcast => config.broadcast = value,
            TelnetField::SystemTimeout => config.system_timeout = value,
            TelnetField::SocketTimeout => config.socket_timeout = value,
            TelnetField::EndChar => config.end_char = value,
            TelnetField::EchoCmdNo => config.echo_cmd_no = value,
        }
    }
}

/// Binds one `PdsConfig` field to its Telnet shell command.
#[derive(Debug, Clone, Copy)]
pub struct TelnetFieldSpec {
    pub field: TelnetField,
    /// Shell command token sent to read or write the field
    pub command: &'static str,
    pub can_read: bool,
    pub can_write: bool,
    /// Write the value as multiple command lines, one per text line
    pub split_by_line: bool,
}

const fn read_only(field: TelnetField, command: &'static str) -> TelnetFieldSpec {
    TelnetFieldSpec { field, command, can_read: true, can_write: false, split_by_line: false }
}

const fn read_write(field: TelnetField, command: &'static str) -> TelnetFieldSpec {
    TelnetFieldSpec { field, command, can_read: true, can_write: true, split_by_line: false }
}

/// The complete Telnet command table for the PDS family.
pub const TELNET_FIELDS: &[TelnetFieldSpec] = &[
    read_only(TelnetField::FirmwareVersion, "VER"),
    read_only(TelnetField::Mac, "MAC"),
    read_only(TelnetField::IpFilter, "IPFILTER"),
    read_only(TelnetField::Socket, "SOCKET"),
    TelnetFieldSpec {
        field: TelnetField::ComPorts,
        command: "COM",
        can_read: true,
        can_write: true,
        split_by_line: true,
    },
    read_write(TelnetField::Name, "NAME"),
    read_write(TelnetField::Alias, "ALIAS"),
    read_write(TelnetField::Ip, "IP"),
    read_write(TelnetField::Mask, "MASK"),
    read_write(TelnetField::Gateway, "GATEWAY"),
    read_write(TelnetField::Dhcp, "DHCP"),
    read_write(TelnetField::EchoMode, "M"),
    read_write(TelnetField::UdpSearch, "UDP"),
    read_write(TelnetField::Broadcast, "Broadcast"),
    read_write(TelnetField::SystemTimeout, "SystemTimeout"),
    read_write(TelnetField::SocketTimeout, "SocketTimeout"),
    read_write(TelnetField::EndChar, "EndChar"),
    read_write(TelnetField::EchoCmdNo, "EchoCmdNo"),
];

/// Command issued after a write pass to reboot the device.
pub const RESET_COMMAND: &str = "RESET";

/// Identifies one HTTP-backed gateway-level field of `PdsConfig`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpGatewayField {
    GatewayModbusId,
    ModbusPort,
}

impl HttpGatewayField {
    pub fn get(&self, config: &PdsConfig) -> i32 {
        match self {
            HttpGatewayField::GatewayModbusId => config.gateway_modbus_id,
            HttpGatewayField::ModbusPort => config.modbus_port,
        }
    }

    pub fn set(&self, config: &mut PdsConfig, value: ConvertedValue) {
        if let Some(value) = value.as_int() {
            match self {
                HttpGatewayField::GatewayModbusId => config.gateway_modbus_id = value,
                HttpGatewayField::ModbusPort => config.modbus_port = value,
            }
        }
    }
}

/// Identifies one HTTP-backed field of a `ModbusComPort` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpPortField {
    ComPortId,
    NbOfId,
    IdOffset,
    TimeOut,
    ModbusType,
}

impl HttpPortField {
    /// Integer form-field encoding of the field's current value.
    pub fn get_wire(&self, port: &ModbusComPort) -> i32 {
        match self {
            HttpPortField::ComPortId => port.com_port_id,
            HttpPortField::NbOfId => port.nb_of_id,
            HttpPortField::IdOffset => port.id_offset,
            HttpPortField::TimeOut => port.time_out,
            HttpPortField::ModbusType => port.modbus_type.as_wire(),
        }
    }

    pub fn set(&self, port: &mut ModbusComPort, value: ConvertedValue) {
        match self {
            HttpPortField::ComPortId => {
                if let Some(value) = value.as_int() {
                    port.com_port_id = value;
                }
            }
            HttpPortField::NbOfId => {
                if let Some(value) = value.as_int() {
                    port.nb_of_id = value;
                }
            }
            HttpPortField::IdOffset => {
                if let Some(value) = value.as_int() {
                    port.id_offset = value;
                }
            }
            HttpPortField::TimeOut => {
                if let Some(value) = value.as_int() {
                    port.time_out = value;
                }
            }
            HttpPortField::ModbusType => {
                if let Some(value) = value.as_modbus_type() {
                    port.modbus_type = value;
                }
            }
        }
    }
}

/// Binds one HTTP-backed field to its form key, capture group and
/// converter.
///
/// `group` is matched as a prefix against capture-group names, because the
/// status-page pattern uses alternation with suffixed group names (`COM` /
/// `COM2`) for enabled and disabled port blocks.
#[derive(Debug, Clone, Copy)]
pub struct HttpFieldSpec<F: 'static> {
    pub field: F,
    /// Key used in form-encoded POST submissions
    pub key: &'static str,
    /// Capture-group name prefix supplying the raw value on read
    pub group: &'static str,
    /// Registry name of the converter interpreting the raw value
    pub converter: &'static str,
}

/// Gateway-level HTTP fields scraped from and posted to `modbus_M.cgi`.
pub const GATEWAY_HTTP_FIELDS: &[HttpFieldSpec<HttpGatewayField>] = &[
    HttpFieldSpec {
        field: HttpGatewayField::GatewayModbusId,
        key: "NETID",
        group: "gId",
        converter: INT_CONVERTER,
    },
    HttpFieldSpec {
        field: HttpGatewayField::ModbusPort,
        key: "MBPORT",
        group: "gPort",
        converter: INT_CONVERTER,
    },
];

/// Per-serial-port HTTP fields.
pub const COM_PORT_HTTP_FIELDS: &[HttpFieldSpec<HttpPortField>] = &[
    HttpFieldSpec {
        field: HttpPortField::ComPortId,
        key: "COM",
        group: "COM",
        converter: INT_CONVERTER,
    },
    HttpFieldSpec {
        field: HttpPortField::NbOfId,
        key: "IDNUM",
        group: "NBID",
        converter: INT_CONVERTER,
    },
    HttpFieldSpec {
        field: HttpPortField::IdOffset,
        key: "ID_OFF",
        group: "offset",
        converter: INT_CONVERTER,
    },
    HttpFieldSpec {
        field: HttpPortField::TimeOut,
        key: "TIMEOUT",
        group: "timeout",
        converter: INT_CONVERTER,
    },
    HttpFieldSpec {
        field: HttpPortField::ModbusType,
        key: "TYPE",
        group: "type",
        converter: MODBUS_TYPE_CONVERTER,
    },
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::ConverterRegistry;

    #[test]
    fn test_telnet_table_has_one_descriptor_per_field() {
        for (i, spec) in TELNET_FIELDS.iter().enumerate() {
            for other in &TELNET_FIELDS[i + 1..] {
                assert_ne!(spec.field, other.field, "duplicate descriptor for {:?}", spec.field);
                assert_ne!(spec.command, other.command, "duplicate command {}", spec.command);
            }
        }
    }

    #[test]
    fn test_read_only_fields_never_write() {
        for spec in TELNET_FIELDS {
            assert!(spec.can_read || spec.can_write, "{:?} is inert", spec.field);
            if matches!(
                spec.field,
                TelnetField::FirmwareVersion | TelnetField::Mac | TelnetField::IpFilter | TelnetField::Socket
            ) {
                assert!(!spec.can_write, "{:?} must be read-only", spec.field);
            }
        }
    }

    #[test]
    fn test_split_flag_only_on_com_text_block() {
        for spec in TELNET_FIELDS {
            assert_eq!(
                spec.split_by_line,
                spec.field == TelnetField::ComPorts,
                "unexpected split flag on {:?}",
                spec.field
            );
        }
    }

    #[test]
    fn test_http_tables_reference_registered_converters() {
        for spec in GATEWAY_HTTP_FIELDS {
            assert!(ConverterRegistry::get(spec.converter).is_ok());
        }
        for spec in COM_PORT_HTTP_FIELDS {
            assert!(ConverterRegistry::get(spec.converter).is_ok());
        }
    }

    #[test]
    fn test_field_accessors_round_trip() {
        let mut config = PdsConfig::new();
        TelnetField::Name.set(&mut config, Some("GW-1".to_string()));
        assert_eq!(TelnetField::Name.get(&config), Some("GW-1"));
        assert_eq!(TelnetField::Alias.get(&config), None);
    }
}
