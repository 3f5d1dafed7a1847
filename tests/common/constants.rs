//! Shared constants for end-to-end tests
//!
//! When fixture data changes, update only this file.

// ============================================================================
// Fixture IDs
// ============================================================================

/// Artist "The Test Band", answered by the primary agent.
pub const ARTIST_1_ID: &str = "artist-123";

/// Artist whose biography the primary agent always fails on.
pub const FLAKY_ARTIST_ID: &str = "artist-flaky";

/// Albums of ARTIST_1_ID.
pub const ALBUM_1_ID: &str = "album-1";
pub const ALBUM_2_ID: &str = "album-2";

/// Id present in neither table.
pub const MISSING_ID: &str = "missing-id";

/// Artists plus albums in the fixture database.
pub const FIXTURE_ENTITY_COUNT: usize = 4;

// ============================================================================
// Fake agents
// ============================================================================

pub const PRIMARY_AGENT: &str = "primary";
pub const BACKUP_AGENT: &str = "backup";

// ============================================================================
// Timeouts
// ============================================================================

pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 20;
pub const REQUEST_TIMEOUT_SECS: u64 = 10;
pub const EVENT_TIMEOUT_MS: u64 = 5000;
