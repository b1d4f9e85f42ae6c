//! Schema-driven synchronization of a configuration with a live device
//!
//! `PdsConnection` owns one Telnet session and one HTTP client and drives
//! the field schema against them: `read_configuration` populates a fresh
//! entity field by field, `write_configuration` pushes an entity's non-null
//! fields back. The Telnet backend exchanges command lines with the shell;
//! the HTTP backend scrapes the Modbus status page with fixed regular
//! expressions on read and submits one form-encoded POST per serial port on
//! write.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::convert::ConverterRegistry;
use crate::data::{ModbusComPort, PdsConfig};
use crate::error::{PdsError, PdsResult};
use crate::http::{FormPost, HttpClient, ReqwestClient};
use crate::schema::{
    HttpFieldSpec, HttpGatewayField, COM_PORT_HTTP_FIELDS, GATEWAY_HTTP_FIELDS, RESET_COMMAND,
    TELNET_FIELDS,
};
use crate::telnet::{TelnetTerminal, LINE_TERMINATOR};

/// Default TCP port of the device's command shell
pub const TELNET_PORT: u16 = 23;

/// CGI path of the Modbus gateway configuration page
const MODBUS_PAGE_PATH: &str = "/modbus_M.cgi";
/// Query id that selects the status view of the page
const STATUS_QUERY_ID: u32 = 25623;
/// Query id used in the Referer of configuration submissions
const CONFIG_REFERER_ID: u32 = 11661;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const FORM_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,\
image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.7";

/// Gateway-level settings as rendered on the status page.
static GATEWAY_PAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Gateway ID=(?P<gId>\d).*<br>TCP/UDP port=(?P<gPort>[^<]*)")
        .expect("gateway page pattern must compile")
});

/// One serial-port block on the status page. Enabled ports carry the full
/// parameter set; disabled ports render as `COM n: #ID=0:Disable` and are
/// matched by the suffixed alternation groups.
static COM_PORT_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"COM (?P<COM>\w+): #ID=(?P<NBID>\d+):Range=(?P<range>\d+).*?timeout=(?P<timeout>\d+).*?type=(?P<type>\w+),\s+ID offset=(?P<offset>-?\d+)|COM (?P<COM2>\d+):\s#ID=(?P<NBID2>0):Disable",
    )
    .expect("serial-port block pattern must compile")
});

/// Whether a write pass is followed by a device reboot.
///
/// `Always` reproduces the device tooling's behavior: the RESET command is
/// issued unconditionally, without verifying that the preceding writes
/// succeeded. `Never` leaves the device running for inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartPolicy {
    Always,
    Never,
}

/// A synchronization connection to one PDS device.
///
/// Owns the Telnet session and HTTP client exclusively for the duration of
/// one read or write operation; not safe for concurrent use.
pub struct PdsConnection {
    hostname: String,
    telnet: TelnetTerminal,
    http: Box<dyn HttpClient>,
}

impl PdsConnection {
    /// Open a session to the device's command shell and prepare the HTTP
    /// client for its web interface.
    pub fn connect(hostname: &str) -> PdsResult<Self> {
        let telnet = TelnetTerminal::connect(hostname, TELNET_PORT)?;
        let http = Box::new(ReqwestClient::new()?);
        Ok(Self::with_parts(hostname, telnet, http))
    }

    /// Assemble a connection from an existing session and HTTP client.
    /// This is the injection point for driving the engine with fakes.
    pub fn with_parts(hostname: &str, telnet: TelnetTerminal, http: Box<dyn HttpClient>) -> Self {
        Self { hostname: hostname.to_string(), telnet, http }
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Read the full configuration from the device.
    ///
    /// Returns a fresh entity populated field by field. Individual scrape
    /// misses leave the affected field at its default; a failing status
    /// page skips the HTTP pass entirely. Transport failures propagate.
    pub fn read_configuration(&mut self) -> PdsResult<PdsConfig> {
        let mut config = PdsConfig::new();
        self.read_telnet_fields(&mut config)?;
        self.read_http_fields(&mut config)?;
        Ok(config)
    }

    fn read_telnet_fields(&mut self, config: &mut PdsConfig) -> PdsResult<()> {
        for spec in TELNET_FIELDS.iter().filter(|spec| spec.can_read) {
            self.telnet.write(spec.command)?;
            let response = self.telnet.read()?;
            // The device echoes the command before its response; the echo
            // is framing, not field data.
            let echo = format!("{}{}", spec.command, LINE_TERMINATOR);
            let payload = response.strip_prefix(&echo).unwrap_or(&response);
            spec.field.set(config, Some(payload.to_string()));
            log::debug!("read {:?} via {}", spec.field, spec.command);
        }
        Ok(())
    }

    fn read_http_fields(&mut self, config: &mut PdsConfig) -> PdsResult<()> {
        let url = format!("http://{}{}?ID={}", self.hostname, MODBUS_PAGE_PATH, STATUS_QUERY_ID);
        let response = self.http.get(&url)?;
        if !response.is_success() {
            // A partial entity is acceptable; the Telnet fields stand.
            log::warn!("status page returned {}; skipping HTTP fields", response.status);
            return Ok(());
        }
        apply_gateway_fields(config, &response.body)?;
        config.modbus_com_ports = extract_com_ports(&response.body)?;
        Ok(())
    }

    /// Push the entity's configuration to the device.
    ///
    /// Fields whose value is unset are skipped, never defaulted. With
    /// `RestartPolicy::Always`, a RESET command follows both passes.
    pub fn write_configuration(
        &mut self,
        config: &PdsConfig,
        restart: RestartPolicy,
    ) -> PdsResult<()> {
        self.write_telnet_fields(config)?;
        self.write_http_fields(config)?;
        if restart == RestartPolicy::Always {
            log::info!("restarting device {}", self.hostname);
            self.telnet.write(RESET_COMMAND)?;
        }
        Ok(())
    }

    fn write_telnet_fields(&mut self, config: &PdsConfig) -> PdsResult<()> {
        for spec in TELNET_FIELDS.iter().filter(|spec| spec.can_write) {
            let value = match spec.field.get(config) {
                Some(value) => value,
                None => continue,
            };
            for segment in transmit_segments(value, spec.split_by_line) {
                self.telnet.write(segment)?;
            }
            log::debug!("wrote {:?}", spec.field);
        }
        // One drain of the cumulative shell output for the whole pass.
        let response = self.telnet.read()?;
        if !response.is_empty() {
            log::info!("device response:\n{response}");
        }
        Ok(())
    }

    fn write_http_fields(&mut self, config: &PdsConfig) -> PdsResult<()> {
        let url = format!("http://{}{}", self.hostname, MODBUS_PAGE_PATH);
        let referer = format!("{url}?ID={CONFIG_REFERER_ID}");
        for port in &config.modbus_com_ports {
            let body = form_body(config, port);
            let post = FormPost {
                content_type: FORM_CONTENT_TYPE,
                accept: FORM_ACCEPT,
                referer: &referer,
                body: &body,
            };
            let response = self.http.post_form(&url, &post)?;
            if !response.is_success() {
                log::warn!(
                    "port {} submission returned {}",
                    port.com_port_id,
                    response.status
                );
            }
        }
        Ok(())
    }

    /// Release the underlying session. Safe to call more than once.
    pub fn close(&mut self) {
        self.telnet.close();
    }
}

/// Segments actually transmitted for one field value.
///
/// A split-by-line value is split on the line terminator; any other value
/// becomes itself plus one synthetic empty segment. In both cases the
/// final segment is a framing artifact and is never transmitted.
fn transmit_segments(value: &str, split_by_line: bool) -> Vec<&str> {
    let mut segments: Vec<&str> = if split_by_line {
        value.split(LINE_TERMINATOR).collect()
    } else {
        vec![value, ""]
    };
    segments.pop();
    segments
}

/// Assign gateway-level fields from the scraped status page.
fn apply_gateway_fields(config: &mut PdsConfig, body: &str) -> PdsResult<()> {
    let caps = match GATEWAY_PAGE.captures(body) {
        Some(caps) => caps,
        None => return Ok(()), // page variant without gateway summary
    };
    for spec in GATEWAY_HTTP_FIELDS {
        let raw = capture_by_prefix(&GATEWAY_PAGE, &caps, spec.group);
        let converter = ConverterRegistry::get(spec.converter).map_err(PdsError::from)?;
        if let Some(value) = converter.convert(raw).map_err(PdsError::from)? {
            spec.field.set(config, value);
        }
    }
    Ok(())
}

/// Extract every serial-port block from the scraped status page, in order
/// of appearance.
fn extract_com_ports(body: &str) -> PdsResult<Vec<ModbusComPort>> {
    let mut ports = Vec::new();
    for caps in COM_PORT_BLOCK.captures_iter(body) {
        let mut port = ModbusComPort::default();
        for spec in COM_PORT_HTTP_FIELDS {
            let raw = capture_by_prefix(&COM_PORT_BLOCK, &caps, spec.group);
            let converter = ConverterRegistry::get(spec.converter).map_err(PdsError::from)?;
            if let Some(value) = converter.convert(raw).map_err(PdsError::from)? {
                spec.field.set(&mut port, value);
            }
        }
        ports.push(port);
    }
    Ok(ports)
}

/// First non-empty named capture whose group name starts with `prefix`.
///
/// The port pattern names its alternation groups with suffixes (`COM` /
/// `COM2`), so descriptors address groups by prefix rather than exact name.
fn capture_by_prefix<'t>(pattern: &Regex, caps: &Captures<'t>, prefix: &str) -> Option<&'t str> {
    pattern
        .capture_names()
        .flatten()
        .filter(|name| name.starts_with(prefix))
        .find_map(|name| {
            caps.name(name)
                .filter(|m| !m.as_str().is_empty())
                .map(|m| m.as_str())
        })
}

/// Build one port's form submission body.
///
/// Key order matches the device's own configuration page; the two trailer
/// pairs commit and apply the submission. No trailing separator.
fn form_body(config: &PdsConfig, port: &ModbusComPort) -> String {
    let mut body = String::new();
    push_pair(&mut body, gateway_form_key(HttpGatewayField::GatewayModbusId), config.gateway_modbus_id);
    for spec in COM_PORT_HTTP_FIELDS {
        push_pair(&mut body, spec.key, spec.field.get_wire(port));
    }
    push_pair(&mut body, gateway_form_key(HttpGatewayField::ModbusPort), config.modbus_port);
    push_pair(&mut body, "SAVE", 1);
    push_pair(&mut body, "APPLY", 1);
    body
}

fn push_pair(body: &mut String, key: &str, value: i32) {
    use std::fmt::Write;
    if !body.is_empty() {
        body.push('&');
    }
    let _ = write!(body, "{key}={value}");
}

fn gateway_form_key(field: HttpGatewayField) -> &'static str {
    GATEWAY_HTTP_FIELDS
        .iter()
        .find(|spec| spec.field == field)
        .map(|spec: &HttpFieldSpec<HttpGatewayField>| spec.key)
        .expect("gateway field present in schema table")
}
