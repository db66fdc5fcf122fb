/// ─── QuestLink Protocol Constants ───────────────────────────────────────────
///
/// Values shared between the verification core, the API surface and any
/// presentation layer. The server-side copies are authoritative.

// ── Verification window ──────────────────────────────────────────────────────

/// Upper bound on any verification window (seconds). Campaign configuration
/// may request less, never more: 60 minutes.
pub const MAX_VERIFICATION_DURATION_SECONDS: u64 = 3_600;

/// Window used when an authored config omits `durationSeconds`.
pub const DEFAULT_VERIFICATION_DURATION_SECONDS: u64 = MAX_VERIFICATION_DURATION_SECONDS;

// ── Request budget ───────────────────────────────────────────────────────────

/// Whole-request verification budget in milliseconds.
pub const DEFAULT_VERIFY_TIMEOUT_MS: u64 = 8_000;

// ── Chain scanning ───────────────────────────────────────────────────────────

/// Blocks fetched concurrently while walking back from the chain head.
pub const DEFAULT_SCAN_BATCH_SIZE: u64 = 25;

/// Block budget for one function check when the chain's block time is unknown.
pub const DEFAULT_MAX_SCAN_BLOCKS: u64 = 2_048;

/// Extra history scanned past the window so a near miss can be reported with
/// its observed timestamp instead of as "no activity".
pub const DEFAULT_LOOKBACK_SECONDS: u64 = MAX_VERIFICATION_DURATION_SECONDS;

// ── Ledger queries ───────────────────────────────────────────────────────────

/// Maximum page size for XP transaction listings.
pub const MAX_HISTORY_PAGE: u32 = 200;

/// Separator used when several transaction hashes prove one completion.
pub const TX_HASH_SEPARATOR: &str = ",";
