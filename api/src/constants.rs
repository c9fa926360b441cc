//! Application constants

/// Default listen port
pub const DEFAULT_PORT: u16 = 3000;

/// Default request body limit (200 MB); recorded clips travel inline as base64
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 200 * 1024 * 1024;
