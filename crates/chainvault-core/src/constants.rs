//! ─── ChainVault protocol constants ──────────────────────────────────────────
//!
//! Every tunable named by the design is collected here with the default the
//! design prescribes. `chainvault-facade::config::LedgerConfig` exposes the
//! subset an embedder may override; everything else is a fixed protocol
//! invariant (key sizes, wire-format prefixes) and stays a `const`.

// ── Cryptography ──────────────────────────────────────────────────────────────

/// AES-256-GCM key size (bytes).
pub const AES_KEY_LEN: usize = 32;

/// AES-GCM standard nonce size (96 bits).
pub const AES_NONCE_LEN: usize = 12;

/// AES-GCM authentication tag size (128 bits).
pub const AES_TAG_LEN: usize = 16;

/// PBKDF2-HMAC-SHA512 iteration count.
pub const PBKDF2_ITERATIONS: u32 = 210_000;

/// PBKDF2 salt size (128 bits).
pub const PBKDF2_SALT_LEN: usize = 16;

/// Hex-lowercase length of a SHA3-256 digest.
pub const SHA3_HEX_LEN: usize = 64;

/// The zero digest used as `previous_hash` for the genesis block: 64 hex zeros.
pub fn zero_hash_hex() -> String {
    "0".repeat(SHA3_HEX_LEN)
}

/// Current hybrid envelope wire-format version.
pub const ENVELOPE_VERSION_CURRENT: &str = "BMEK-v1.0";

/// Legacy envelope wire-format version (user-public-key-wrapped DEK).
pub const ENVELOPE_VERSION_LEGACY: &str = "GCM-v1.0";

// ── Sizing ─────────────────────────────────────────────────────────────────────

/// Maximum serialized payload size accepted by `ChainEngine::append` (DoS ceiling).
pub const MAX_PAYLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Maximum `owner_name` length (chars) for an authorized-key record.
pub const MAX_OWNER_NAME_LEN: usize = 256;

/// Payloads at or above this size are routed to off-chain storage.
pub const OFF_CHAIN_THRESHOLD_BYTES: usize = 512 * 1024;

/// Off-chain files older than this are eligible for GZIP compression.
pub const OFF_CHAIN_COMPRESS_AGE_SECS: i64 = 90 * 24 * 3600;

// ── Validation ─────────────────────────────────────────────────────────────────

/// Eager validation emits a warning at this block count.
pub const EAGER_VALIDATION_WARN_BLOCKS: u64 = 100_000;

/// Eager validation hard-fails at this block count; callers must use streaming.
pub const EAGER_VALIDATION_MAX_BLOCKS: u64 = 500_000;

/// Default streaming validation batch size.
pub const STREAMING_BATCH_SIZE: usize = 1_000;

// ── RBAC ───────────────────────────────────────────────────────────────────────

/// Maximum blocks an `Admin` may roll back in one call.
pub const ADMIN_MAX_ROLLBACK_DEPTH: u64 = 100;

// ── Maintenance ─────────────────────────────────────────────────────────────────

/// Size-monitor task interval (seconds).
pub const MAINTENANCE_SIZE_MONITOR_INTERVAL_SECS: u64 = 3_600;

/// VACUUM/OPTIMIZE task interval (seconds).
pub const MAINTENANCE_VACUUM_INTERVAL_SECS: u64 = 7 * 24 * 3_600;

/// Minimum interval enforced between VACUUM runs unless `force_vacuum()` is used.
pub const MAINTENANCE_VACUUM_MIN_INTERVAL_SECS: u64 = 6 * 24 * 3_600;

/// VACUUM timeout after which a warning is logged (it is not interrupted).
pub const MAINTENANCE_VACUUM_TIMEOUT_SECS: u64 = 2 * 3_600;

/// Cleanup (orphan sweep) task interval (seconds).
pub const MAINTENANCE_CLEANUP_INTERVAL_SECS: u64 = 24 * 3_600;

/// Maximum orphan files removed per cleanup cycle.
pub const MAINTENANCE_CLEANUP_MAX_FILES: usize = 1_000;

/// Size-monitor warning threshold (fraction of configured max DB size).
pub const MAINTENANCE_SIZE_WARN_FRACTION: f64 = 0.75;

/// Size-monitor critical threshold (fraction of configured max DB size).
pub const MAINTENANCE_SIZE_CRITICAL_FRACTION: f64 = 0.90;

/// Dedicated maintenance thread-pool size, bounding I/O concurrency.
pub const MAINTENANCE_POOL_THREADS: usize = 2;

// ── Default paths ────────────────────────────────────────────────────────────────

/// Default BMEK file path, relative to the configured key directory.
pub const DEFAULT_BMEK_FILENAME: &str = "blockchain-master-key.aes256";

/// Bootstrap admin seed file names, under the key directory.
pub const GENESIS_ADMIN_PRIVATE_FILENAME: &str = "genesis-admin.private";
pub const GENESIS_ADMIN_PUBLIC_FILENAME: &str = "genesis-admin.public";

/// Export schema version emitted by this implementation.
pub const EXPORT_SCHEMA_VERSION: u32 = 1;
