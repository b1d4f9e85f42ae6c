//! Shared test doubles: an in-process fake PDS device for the Telnet side
//! and a scripted HTTP client for the web interface.
#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use std::thread;

use std::time::Duration;

use pdsman::error::{HttpError, HttpResult};
use pdsman::http::{FormPost, HttpClient, HttpResponse};
use pdsman::telnet::TelnetTiming;

/// Tight timing for loopback sessions; keeps the idle-window reads fast
/// while staying well above thread scheduling jitter.
pub fn fast_timing() -> TelnetTiming {
    TelnetTiming {
        settle_delay: Duration::from_millis(5),
        idle_timeout: Duration::from_millis(40),
    }
}

/// Prompt the fake device appends to every reply.
pub const FAKE_PROMPT: &str = "PDS-755>";

/// Everything the fake device observed: raw bytes as received and the
/// decoded command lines.
#[derive(Default)]
pub struct DeviceLog {
    pub raw: Vec<u8>,
    pub lines: Vec<String>,
}

pub type SharedDeviceLog = Arc<Mutex<DeviceLog>>;

/// Standard shell reply: command echo, body, prompt.
pub fn shell_reply(command: &str, body: &str) -> Vec<u8> {
    format!("{command}\r\n{body}{FAKE_PROMPT}").into_bytes()
}

/// Spawn a fake device on an ephemeral loopback port.
///
/// The device accepts exactly one connection, consumes (and discards)
/// Telnet negotiation sequences, logs every received command line, and
/// replies with the scripted bytes for lines it recognizes. Unknown lines
/// are logged without a reply, which is how the write pass is observed.
pub fn spawn_fake_device(responses: HashMap<String, Vec<u8>>) -> (u16, SharedDeviceLog) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind fake device");
    let port = listener.local_addr().expect("local addr").port();
    let log: SharedDeviceLog = Arc::new(Mutex::new(DeviceLog::default()));
    let thread_log = Arc::clone(&log);

    thread::spawn(move || {
        let (mut stream, _) = match listener.accept() {
            Ok(accepted) => accepted,
            Err(_) => return,
        };
        let mut pending = Vec::new();
        let mut buffer = [0u8; 1024];
        loop {
            let n = match stream.read(&mut buffer) {
                Ok(0) | Err(_) => return,
                Ok(n) => n,
            };
            let chunk = &buffer[..n];
            thread_log.lock().unwrap().raw.extend_from_slice(chunk);
            pending.extend_from_slice(&strip_negotiation(chunk));

            while let Some(line) = take_line(&mut pending) {
                thread_log.lock().unwrap().lines.push(line.clone());
                if let Some(reply) = responses.get(&line) {
                    if stream.write_all(reply).is_err() {
                        return;
                    }
                }
            }
        }
    });

    (port, log)
}

/// Remove IAC sequences from a received chunk.
fn strip_negotiation(chunk: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(chunk.len());
    let mut i = 0;
    while i < chunk.len() {
        if chunk[i] == 255 {
            match chunk.get(i + 1) {
                Some(&verb) if (251..=254).contains(&verb) => i += 3,
                Some(_) => i += 2,
                None => i += 1,
            }
        } else {
            out.push(chunk[i]);
            i += 1;
        }
    }
    out
}

/// Pop one complete CRLF-terminated line off the pending buffer.
fn take_line(pending: &mut Vec<u8>) -> Option<String> {
    let end = pending.windows(2).position(|w| w == b"\r\n")?;
    let line: Vec<u8> = pending.drain(..end + 2).take(end).collect();
    Some(String::from_utf8_lossy(&line).into_owned())
}

/// One recorded POST submission.
#[derive(Debug, Clone)]
pub struct RecordedPost {
    pub url: String,
    pub content_type: String,
    pub accept: String,
    pub referer: String,
    pub body: String,
}

/// Scripted HTTP client: replies to GET with a fixed response and records
/// every POST.
pub struct FakeHttpClient {
    get_response: HttpResponse,
    posts: Rc<RefCell<Vec<RecordedPost>>>,
}

impl FakeHttpClient {
    pub fn new(status: u16, body: &str) -> (Self, Rc<RefCell<Vec<RecordedPost>>>) {
        let posts = Rc::new(RefCell::new(Vec::new()));
        let client = Self {
            get_response: HttpResponse { status, body: body.to_string() },
            posts: Rc::clone(&posts),
        };
        (client, posts)
    }
}

impl HttpClient for FakeHttpClient {
    fn get(&self, _url: &str) -> HttpResult<HttpResponse> {
        Ok(self.get_response.clone())
    }

    fn post_form(&self, url: &str, post: &FormPost<'_>) -> HttpResult<HttpResponse> {
        self.posts.borrow_mut().push(RecordedPost {
            url: url.to_string(),
            content_type: post.content_type.to_string(),
            accept: post.accept.to_string(),
            referer: post.referer.to_string(),
            body: post.body.to_string(),
        });
        Ok(HttpResponse { status: 200, body: String::new() })
    }
}

/// An HTTP client that fails every request; used where the HTTP pass must
/// not run at all.
pub struct UnreachableHttpClient;

impl HttpClient for UnreachableHttpClient {
    fn get(&self, url: &str) -> HttpResult<HttpResponse> {
        Err(HttpError::Transport { url: url.to_string(), message: "unreachable".to_string() })
    }

    fn post_form(&self, url: &str, _post: &FormPost<'_>) -> HttpResult<HttpResponse> {
        Err(HttpError::Transport { url: url.to_string(), message: "unreachable".to_string() })
    }
}
