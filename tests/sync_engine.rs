//! End-to-end synchronization tests: a fake device on the Telnet side and a
//! scripted HTTP client on the web side.

mod common;

use std::collections::HashMap;
use std::thread;
use std::time::Duration;

use pdsman::data::{ModbusComPort, ModbusType, PdsConfig};
use pdsman::http::HttpClient;
use pdsman::sync::{PdsConnection, RestartPolicy};
use pdsman::telnet::TelnetTerminal;

use common::{
    fast_timing, shell_reply, spawn_fake_device, FakeHttpClient, SharedDeviceLog,
    UnreachableHttpClient,
};

const STATUS_PAGE: &str = "<html><body>Gateway ID=5<br>TCP/UDP port=502\n\
    <td>COM 1: #ID=8:Range=1 to 8, timeout=300 ms, type=ASCII,  ID offset=0</td>\n\
    <td>COM 2: #ID=0:Disable</td></body></html>";

/// Scripted replies for every readable shell command.
fn device_responses() -> HashMap<String, Vec<u8>> {
    let replies = [
        ("VER", "v3.2.1[013]\r\n"),
        ("MAC", "MAC=00:0D:E0:12:34:56\r\n"),
        ("IPFILTER", "IP filter disabled\r\n"),
        ("SOCKET", "SOCKET=0\r\n"),
        ("COM", "Port1=115200,8,0,1. connect=1\r\nPort2=9600,8,0,1. connect=0\r\n"),
        ("NAME", "NAME=PDS-755\r\n"),
        ("ALIAS", "ALIAS=gw\r\n"),
        ("IP", "IP=192.168.1.10\r\n"),
        ("MASK", "MASK=255.255.255.0\r\n"),
        ("GATEWAY", "GATEWAY=192.168.1.1\r\n"),
        ("DHCP", "DHCP=0\r\n"),
        ("M", "M=0\r\n"),
        ("UDP", "UDP=1\r\n"),
        ("Broadcast", "Broadcast=1\r\n"),
        ("SystemTimeout", "SystemTimeout=300\r\n"),
        ("SocketTimeout", "SocketTimeout=0\r\n"),
        ("EndChar", "EndChar=0d\r\n"),
        ("EchoCmdNo", "EchoCmdNo=0\r\n"),
    ];
    replies
        .iter()
        .map(|(command, body)| (command.to_string(), shell_reply(command, body)))
        .collect()
}

fn connect(device_port: u16, http: Box<dyn HttpClient>) -> PdsConnection {
    let telnet = TelnetTerminal::connect_with_timing("127.0.0.1", device_port, fast_timing())
        .expect("connect to fake device");
    PdsConnection::with_parts("127.0.0.1", telnet, http)
}

/// The write pass finishes with a drain read, but the device thread logs
/// asynchronously; give it a moment before inspecting the log.
fn settle(log: &SharedDeviceLog) -> Vec<String> {
    thread::sleep(Duration::from_millis(100));
    log.lock().unwrap().lines.clone()
}

#[test]
fn test_read_populates_entity_from_both_backends() {
    let (device_port, _log) = spawn_fake_device(device_responses());
    let (http, _posts) = FakeHttpClient::new(200, STATUS_PAGE);
    let mut connection = connect(device_port, Box::new(http));

    let config = connection.read_configuration().expect("read configuration");
    connection.close();

    // Shell fields: echo and prompt framing removed, payload verbatim.
    assert_eq!(config.firmware_version.as_deref(), Some("v3.2.1[013]\r\n"));
    assert_eq!(config.mac.as_deref(), Some("MAC=00:0D:E0:12:34:56\r\n"));
    assert_eq!(config.name.as_deref(), Some("NAME=PDS-755\r\n"));
    assert_eq!(config.ip.as_deref(), Some("IP=192.168.1.10\r\n"));
    assert_eq!(config.echo_cmd_no.as_deref(), Some("EchoCmdNo=0\r\n"));

    // COM text block normalized on assignment.
    assert_eq!(
        config.com_ports(),
        Some("Port1=115200,8,0,1\r\nPort2=9600,8,0,1\r\n")
    );

    // Gateway settings scraped from the status page.
    assert_eq!(config.gateway_modbus_id, 5);
    assert_eq!(config.modbus_port, 502);

    // Serial-port blocks in page order, disabled block at defaults.
    assert_eq!(
        config.modbus_com_ports,
        vec![
            ModbusComPort {
                com_port_id: 1,
                nb_of_id: 8,
                id_offset: 0,
                time_out: 300,
                modbus_type: ModbusType::Ascii,
            },
            ModbusComPort { com_port_id: 2, ..ModbusComPort::default() },
        ]
    );
}

#[test]
fn test_read_skips_http_fields_on_status_failure() {
    let (device_port, _log) = spawn_fake_device(device_responses());
    let (http, _posts) = FakeHttpClient::new(500, "internal error");
    let mut connection = connect(device_port, Box::new(http));

    let config = connection.read_configuration().expect("read configuration");
    connection.close();

    // Shell fields stand, HTTP-backed fields stay at their defaults.
    assert_eq!(config.name.as_deref(), Some("NAME=PDS-755\r\n"));
    assert_eq!(config.gateway_modbus_id, 0);
    assert_eq!(config.modbus_port, 0);
    assert!(config.modbus_com_ports.is_empty());
}

#[test]
fn test_read_fails_on_http_transport_error() {
    let (device_port, _log) = spawn_fake_device(device_responses());
    let mut connection = connect(device_port, Box::new(UnreachableHttpClient));

    assert!(connection.read_configuration().is_err());
    connection.close();
}

#[test]
fn test_write_sends_set_fields_and_one_post_per_port() {
    let (device_port, log) = spawn_fake_device(HashMap::new());
    let (http, posts) = FakeHttpClient::new(200, "");
    let mut connection = connect(device_port, Box::new(http));

    let mut config = PdsConfig::new();
    config.set_com_ports(Some("Port1=115200,8,0,1\r\nPort2=9600,8,0,1\r\n".to_string()));
    config.name = Some("NAME=GW-1".to_string());
    config.gateway_modbus_id = 5;
    config.modbus_port = 502;
    config.modbus_com_ports = vec![
        ModbusComPort {
            com_port_id: 1,
            nb_of_id: 8,
            id_offset: 0,
            time_out: 300,
            modbus_type: ModbusType::Rtu,
        },
        ModbusComPort {
            com_port_id: 2,
            nb_of_id: 3,
            id_offset: -4,
            time_out: 200,
            modbus_type: ModbusType::Ascii,
        },
    ];

    connection
        .write_configuration(&config, RestartPolicy::Never)
        .expect("write configuration");
    connection.close();

    // Shell pass: split COM lines first (table order), then NAME. Unset
    // fields are skipped, and the trailing split artifact is never sent.
    let lines = settle(&log);
    assert_eq!(lines, vec!["Port1=115200,8,0,1", "Port2=9600,8,0,1", "NAME=GW-1"]);

    // HTTP pass: one submission per serial port, shared gateway settings.
    let posts = posts.borrow();
    assert_eq!(posts.len(), 2);
    assert_eq!(
        posts[0].body,
        "NETID=5&COM=1&IDNUM=8&ID_OFF=0&TIMEOUT=300&TYPE=1&MBPORT=502&SAVE=1&APPLY=1"
    );
    assert_eq!(
        posts[1].body,
        "NETID=5&COM=2&IDNUM=3&ID_OFF=-4&TIMEOUT=200&TYPE=0&MBPORT=502&SAVE=1&APPLY=1"
    );
    for post in posts.iter() {
        assert_eq!(post.url, "http://127.0.0.1/modbus_M.cgi");
        assert_eq!(post.referer, "http://127.0.0.1/modbus_M.cgi?ID=11661");
        assert_eq!(post.content_type, "application/x-www-form-urlencoded");
        assert!(post.body.ends_with("SAVE=1&APPLY=1"));
        assert!(!post.body.ends_with('&'));
    }
}

#[test]
fn test_restart_policy_always_issues_reset_last() {
    let (device_port, log) = spawn_fake_device(HashMap::new());
    let (http, posts) = FakeHttpClient::new(200, "");
    let mut connection = connect(device_port, Box::new(http));

    let mut config = PdsConfig::new();
    config.name = Some("NAME=GW-1".to_string());

    connection
        .write_configuration(&config, RestartPolicy::Always)
        .expect("write configuration");
    connection.close();

    let lines = settle(&log);
    assert_eq!(lines, vec!["NAME=GW-1", "RESET"]);
    assert!(posts.borrow().is_empty());
}

#[test]
fn test_restart_policy_never_skips_reset() {
    let (device_port, log) = spawn_fake_device(HashMap::new());
    let (http, _posts) = FakeHttpClient::new(200, "");
    let mut connection = connect(device_port, Box::new(http));

    let mut config = PdsConfig::new();
    config.name = Some("NAME=GW-1".to_string());

    connection
        .write_configuration(&config, RestartPolicy::Never)
        .expect("write configuration");
    connection.close();

    let lines = settle(&log);
    assert!(!lines.iter().any(|line| line == "RESET"));
}
