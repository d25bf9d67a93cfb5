//! Shared constants for end-to-end tests
//!
//! When fixture data changes, update only this file and `fixtures.rs`.

// ============================================================================
// Test Artist IDs
// ============================================================================

/// "Radiohead", embedded close to Muse and Coldplay
pub const RADIOHEAD_ID: &str = "radiohead";

/// "Muse"
pub const MUSE_ID: &str = "muse";

/// "Coldplay"
pub const COLDPLAY_ID: &str = "coldplay";

/// "Johann Sebastian Bach", embedded far from everyone else
pub const BACH_ID: &str = "bach";

/// Artist with attributes but no embedding
pub const UNEMBEDDED_ID: &str = "unembedded";

/// Id that does not exist at all
pub const UNKNOWN_ID: &str = "ghost";

// ============================================================================
// Timeouts
// ============================================================================

/// Timeout for a single HTTP request
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// How long to wait for the server to accept connections
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Poll interval while waiting for the server
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 20;

/// Delay of the background calculator before its records become visible
pub const BACKGROUND_CALCULATION_DELAY_MS: u64 = 150;
