// =============================================================================
// Skillswap Backend Constants
// =============================================================================
// This file contains all constants used throughout the backend to enable
// easy tuning and configuration from a single location.

// =============================================================================
// SERVER CONFIGURATION
// =============================================================================

/// Default server port if not specified in environment
pub const DEFAULT_SERVER_PORT: u16 = 4000;

// =============================================================================
// DATABASE CONFIGURATION
// =============================================================================

/// Default SQLite database URL; `mode=rwc` creates the file on first run
pub const DEFAULT_DATABASE_URL: &str = "sqlite://skillswap.db?mode=rwc";

/// Default maximum number of connections in the database pool
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;

// =============================================================================
// CREDITS
// =============================================================================

/// Balance assigned to a freshly registered account. Credits are earned and
/// spent only through settled exchanges after this point.
pub const STARTING_CREDITS: i64 = 0;

/// Minimum hourly rate a skill may advertise
pub const MIN_SKILL_RATE: i64 = 1;

// =============================================================================
// CONTENT LIMITS
// =============================================================================

/// Maximum character limit for a proposal note
pub const NOTE_CHAR_LIMIT: usize = 400;

/// Maximum character limit for a plain chat message
pub const CHAT_MESSAGE_CHAR_LIMIT: usize = 2000;

/// Maximum character limit for a skill or user name
pub const NAME_CHAR_LIMIT: usize = 80;

// =============================================================================
// AUTH
// =============================================================================

/// Number of random bytes in a bearer token (hex encoding doubles the length)
pub const AUTH_TOKEN_BYTES: usize = 32;

// =============================================================================
// EVENTS
// =============================================================================

/// Capacity of the in-process message event channel; subscribers that lag
/// past this many events start losing the oldest ones.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;
