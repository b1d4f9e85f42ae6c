/// ERROR HANDLING: Structured error types for every subsystem
/// Provides the error enums surfaced by the session, engine and converters
pub mod error;

/// TELNET: Line-oriented command session for the PDS control port
/// Handles option announcement, idle-drain reads and prompt trimming
pub mod telnet;

/// CONVERTERS: Named value converters used by the HTTP field schema
pub mod convert;

/// SCHEMA: Declarative field descriptor tables binding entity fields
/// to Telnet commands and HTTP form keys / capture groups
pub mod schema;

/// DATA MODEL: In-memory representation of one device configuration
pub mod data;

/// HTTP: Injected HTTP client abstraction and the reqwest implementation
pub mod http;

/// SYNC ENGINE: Schema-driven read/write of a configuration against
/// the Telnet and HTTP backends
pub mod sync;

/// NETWORK UTILITIES: ARP-based MAC address lookup
pub mod netutil;

/// PERSISTENCE: JSON snapshot read/write
pub mod persist;
