/// Application-wide constants
/// Protocol values shared by both transports live here

/// Maximum paste size in bytes (5 MB)
pub const MAX_PAYLOAD_SIZE: usize = 5_000_000;

/// How long a paste stays retrievable after creation
pub const PASTE_TTL_HOURS: i64 = 72;

/// Symbols used for paste identifiers (no `0`)
pub const ID_ALPHABET: &[u8] = b"123456789abcdefghijklmnopqrstuvwxyz";

/// Identifier length for regular pastes
pub const ID_LENGTH: usize = 7;

/// Identifier length for `?secure=true` pastes
pub const SECURE_ID_LENGTH: usize = 32;

/// Identifier draws before allocation gives up
pub const MAX_ALLOCATION_ATTEMPTS: usize = 10;

/// Spam/attack patterns rejected verbatim (case-sensitive)
pub const DENYLISTED_PHRASES: &[&str] = &[
    "Cookie: mstshash=Administ",
    "-esystem('cmd /c echo .close",
    "md /c echo Set xHttp=createobjec",
];

/// Byte-stream read buffer size
pub const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Deadline for the first chunk on the byte-stream transport
pub const DEFAULT_INITIAL_READ_TIMEOUT_SECS: u64 = 5;

/// Inactivity deadline once the client has started sending
pub const DEFAULT_IDLE_READ_TIMEOUT_SECS: u64 = 2;

/// Longest possible PROXY protocol v1 header, CRLF included
pub const PROXY_V1_MAX_LEN: usize = 107;

/// Expired-row sweep interval in seconds (1 hour)
pub const CLEANUP_INTERVAL_SECS: u64 = 3600;

/// Default HTTP port
pub const DEFAULT_HTTP_PORT: u16 = 3334;

/// Default byte-stream port
pub const DEFAULT_TCP_PORT: u16 = 9999;
