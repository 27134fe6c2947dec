// src/constants.rs

pub const DEFAULT_FTP_PORT: u16 = 21;

pub const FTP_LOGIN: &str = "anonymous";
pub const FTP_PASSWD: &str = "anonymous@";

// Transfer block sizing: start small so slow links report progress early,
// grow once enough data went through.
pub const INITIAL_BLOCK_SIZE: usize = 2 * 1024;
pub const MAXIMUM_BLOCK_SIZE: usize = 32 * 1024;
pub const BLOCK_GROW_THRESHOLD: u64 = 64 * 1024;

// Bytes collected before the first data chunk so MIME sniffing sees content.
pub const MINIMUM_MIME_SIZE: usize = 1024;

// Partial uploads/downloads smaller than this are deleted on failure.
pub const DEFAULT_MINIMUM_KEEP_SIZE: u64 = 5000;

pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 20;
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 60;
