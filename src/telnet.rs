//! Telnet command session for the PDS control port
//!
//! The PDS family exposes a line-oriented command shell on TCP port 23. The
//! shell speaks just enough Telnet to confuse a plain TCP client: the device
//! sends option negotiation sequences mixed into its responses, echoes every
//! command it receives, and terminates each response with an interactive
//! prompt instead of an explicit end-of-response marker.
//!
//! This module is deliberately not a general Telnet implementation. The
//! session announces a fixed set of options once after connecting and never
//! answers the peer's negotiation requests; inbound negotiation bytes are
//! consumed and discarded during reads. The device family tolerates this,
//! and it keeps the session a simple request/response exchanger.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::thread;
use std::time::Duration;

use crate::error::{TelnetError, TelnetResult};

/// Canonical line terminator for the command shell
pub const LINE_TERMINATOR: &str = "\r\n";

/// Prompt terminator character; a response's last line ending in this
/// character is the interactive prompt, not payload
const PROMPT_TERMINATOR: char = '>';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelnetCommand {
    SE = 240,
    SB = 250,
    WILL = 251,
    WONT = 252,
    DO = 253,
    DONT = 254,
    IAC = 255, // Interpret As Command
}

impl TelnetCommand {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            240 => Some(TelnetCommand::SE),
            250 => Some(TelnetCommand::SB),
            251 => Some(TelnetCommand::WILL),
            252 => Some(TelnetCommand::WONT),
            253 => Some(TelnetCommand::DO),
            254 => Some(TelnetCommand::DONT),
            255 => Some(TelnetCommand::IAC),
            _ => None,
        }
    }

    /// True for the four option verbs that are always followed by an
    /// option byte on the wire
    pub fn is_option_verb(value: u8) -> bool {
        (TelnetCommand::WILL as u8..=TelnetCommand::DONT as u8).contains(&value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelnetOption {
    Echo = 1,
    SuppressGoAhead = 3,
    TerminalType = 24,
    NegotiateAboutWindowSize = 31,
    TerminalSpeed = 32,
    NewEnvironment = 39,
}

impl TelnetOption {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(TelnetOption::Echo),
            3 => Some(TelnetOption::SuppressGoAhead),
            24 => Some(TelnetOption::TerminalType),
            31 => Some(TelnetOption::NegotiateAboutWindowSize),
            32 => Some(TelnetOption::TerminalSpeed),
            39 => Some(TelnetOption::NewEnvironment),
            _ => None,
        }
    }
}

/// One-shot option announcement sent immediately after connecting.
///
/// The device expects a client that claims ordinary terminal capabilities
/// and asks the remote side to echo; it does not require the announcement
/// to be followed up with a compliant negotiation exchange.
const NEGOTIATION_PREAMBLE: [u8; 21] = [
    TelnetCommand::IAC as u8, TelnetCommand::WILL as u8, TelnetOption::NegotiateAboutWindowSize as u8,
    TelnetCommand::IAC as u8, TelnetCommand::WILL as u8, TelnetOption::TerminalSpeed as u8,
    TelnetCommand::IAC as u8, TelnetCommand::WILL as u8, TelnetOption::TerminalType as u8,
    TelnetCommand::IAC as u8, TelnetCommand::WILL as u8, TelnetOption::NewEnvironment as u8,
    TelnetCommand::IAC as u8, TelnetCommand::DO as u8, TelnetOption::Echo as u8,
    TelnetCommand::IAC as u8, TelnetCommand::WILL as u8, TelnetOption::SuppressGoAhead as u8,
    TelnetCommand::IAC as u8, TelnetCommand::DO as u8, TelnetOption::SuppressGoAhead as u8,
];

/// Session lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Negotiating,
    Ready,
    Closed,
}

/// Timing knobs for the request/response exchange.
///
/// The device has no response-termination marker beyond the prompt, so the
/// read side waits for the stream to go quiet: `read` concludes once no new
/// bytes arrive within one `idle_timeout` window. The write side pauses for
/// `settle_delay` after each command to give the device time to start
/// responding before the next operation.
#[derive(Debug, Clone, Copy)]
pub struct TelnetTiming {
    pub settle_delay: Duration,
    pub idle_timeout: Duration,
}

impl Default for TelnetTiming {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(50),
            idle_timeout: Duration::from_millis(100),
        }
    }
}

/// A command/response session with one PDS device.
///
/// One session owns one TCP connection and is used strictly sequentially:
/// every exchange is a `write` followed by a `read`, with no pipelining and
/// no concurrent callers.
#[derive(Debug)]
pub struct TelnetTerminal {
    stream: Option<TcpStream>,
    state: SessionState,
    timing: TelnetTiming,
}

impl TelnetTerminal {
    /// Connect to the device's command shell and announce our options.
    pub fn connect(hostname: &str, port: u16) -> TelnetResult<Self> {
        Self::connect_with_timing(hostname, port, TelnetTiming::default())
    }

    /// Connect with explicit timing, used to tighten the idle window in
    /// tests and on fast local networks.
    pub fn connect_with_timing(
        hostname: &str,
        port: u16,
        timing: TelnetTiming,
    ) -> TelnetResult<Self> {
        let mut terminal = Self {
            stream: None,
            state: SessionState::Connecting,
            timing,
        };

        let stream = TcpStream::connect((hostname, port))
            .map_err(|error| TelnetError::Transport { operation: "connect", error })?;
        stream
            .set_nodelay(true)
            .map_err(|error| TelnetError::Transport { operation: "connect", error })?;
        terminal.stream = Some(stream);

        terminal.state = SessionState::Negotiating;
        terminal.send_preamble()?;
        terminal.state = SessionState::Ready;

        log::debug!("Telnet session to {hostname}:{port} ready");
        Ok(terminal)
    }

    /// Current lifecycle state of the session.
    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Ready && self.stream.is_some()
    }

    /// Override the read-side idle window and post-write settle delay.
    pub fn set_timing(&mut self, timing: TelnetTiming) {
        self.timing = timing;
    }

    fn send_preamble(&mut self) -> TelnetResult<()> {
        let stream = self.stream.as_mut().ok_or(TelnetError::NotConnected)?;
        stream
            .write_all(&NEGOTIATION_PREAMBLE)
            .and_then(|()| stream.flush())
            .map_err(|error| TelnetError::Transport { operation: "negotiation", error })
    }

    /// Send one command line.
    ///
    /// Appends the canonical line terminator, transmits, then sleeps the
    /// settle delay so the device can begin responding before the caller's
    /// next operation.
    pub fn write(&mut self, command: &str) -> TelnetResult<()> {
        if self.state != SessionState::Ready {
            return Err(TelnetError::NotConnected);
        }
        let stream = self.stream.as_mut().ok_or(TelnetError::NotConnected)?;

        let mut line = Vec::with_capacity(command.len() + LINE_TERMINATOR.len());
        line.extend_from_slice(command.as_bytes());
        line.extend_from_slice(LINE_TERMINATOR.as_bytes());
        stream
            .write_all(&line)
            .and_then(|()| stream.flush())
            .map_err(|error| TelnetError::Transport { operation: "write", error })?;

        thread::sleep(self.timing.settle_delay);
        Ok(())
    }

    /// Drain the device's response.
    ///
    /// Repeatedly consumes all available bytes, then sleeps one idle window;
    /// the response is complete once no new bytes arrived during the window.
    /// Embedded negotiation sequences are stripped, and a trailing prompt
    /// line is excluded from the returned text.
    pub fn read(&mut self) -> TelnetResult<String> {
        if self.state != SessionState::Ready {
            return Err(TelnetError::NotConnected);
        }
        let stream = self.stream.as_mut().ok_or(TelnetError::NotConnected)?;

        stream
            .set_nonblocking(true)
            .map_err(|error| TelnetError::Transport { operation: "read", error })?;

        let mut raw = Vec::new();
        loop {
            drain_available(stream, &mut raw)?;
            thread::sleep(self.timing.idle_timeout);
            if !bytes_pending(stream)? {
                break;
            }
        }

        stream
            .set_nonblocking(false)
            .map_err(|error| TelnetError::Transport { operation: "read", error })?;

        let text = strip_telnet_commands(&raw);
        Ok(trim_prompt(&text).to_string())
    }

    /// Close the session. Further operations fail with `NotConnected`.
    pub fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(std::net::Shutdown::Both);
        }
        self.state = SessionState::Closed;
    }
}

impl Drop for TelnetTerminal {
    fn drop(&mut self) {
        self.close();
    }
}

/// Consume every byte currently available on the socket without blocking.
fn drain_available(stream: &mut TcpStream, raw: &mut Vec<u8>) -> TelnetResult<()> {
    let mut buffer = [0u8; 1024];
    loop {
        match stream.read(&mut buffer) {
            Ok(0) => return Ok(()), // peer closed; whatever we have is the response
            Ok(n) => raw.extend_from_slice(&buffer[..n]),
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => return Ok(()),
            Err(ref e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(error) => return Err(TelnetError::Transport { operation: "read", error }),
        }
    }
}

/// Check whether more bytes arrived during the idle window.
fn bytes_pending(stream: &TcpStream) -> TelnetResult<bool> {
    let mut probe = [0u8; 1];
    match stream.peek(&mut probe) {
        Ok(0) => Ok(false), // peer closed
        Ok(_) => Ok(true),
        Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(false),
        Err(error) => Err(TelnetError::Transport { operation: "read", error }),
    }
}

/// Decode a raw byte stream, filtering out embedded negotiation sequences.
///
/// Option verbs (`IAC WILL/WONT/DO/DONT opt`) are stripped as three-byte
/// sequences, the literal escape (`IAC IAC`) and any other `IAC cmd` pair
/// as two bytes. The stripped sequences are never acknowledged; the device
/// does not require negotiation compliance.
fn strip_telnet_commands(raw: &[u8]) -> String {
    let mut text = String::with_capacity(raw.len());
    let mut pos = 0;
    while pos < raw.len() {
        let byte = raw[pos];
        if byte == TelnetCommand::IAC as u8 {
            match raw.get(pos + 1) {
                Some(&verb) if TelnetCommand::is_option_verb(verb) => pos += 3,
                Some(_) => pos += 2,
                None => pos += 1, // truncated sequence at end of stream
            }
        } else {
            text.push(byte as char);
            pos += 1;
        }
    }
    text
}

/// Strip a trailing interactive prompt.
///
/// If the last line of the response ends with the prompt terminator, that
/// entire line is framing rather than payload and is excluded.
fn trim_prompt(text: &str) -> &str {
    let last_line = text.rsplit(LINE_TERMINATOR).next().unwrap_or(text);
    if !last_line.is_empty() && last_line.ends_with(PROMPT_TERMINATOR) {
        &text[..text.len() - last_line.len()]
    } else {
        text
    }
}
