/// Application name used for config, data and cache directories.
pub const APP_NAME: &str = "kiln";

/// Directory inside an install prefix that holds kiln's own bookkeeping.
pub const PREFIX_STATE_DIR: &str = ".kiln";

/// Subdirectory of [`PREFIX_STATE_DIR`] holding install receipts.
pub const RECEIPTS_DIR: &str = "receipts";

/// Lock file name inside [`PREFIX_STATE_DIR`].
pub const LOCK_FILENAME: &str = "lock";

/// Scratch directory created inside every build and test path.
pub const SCRATCH_DIR: &str = ".tmp";

/// Value of `SOURCE_DATE_EPOCH` for every step.
/// 315532800 = January 1, 1980 00:00:00 UTC (ZIP epoch).
pub const SOURCE_DATE_EPOCH: &str = "315532800";

/// Suffix of the temporary sibling file an artifact is copied to before being renamed into place.
pub const PARTIAL_SUFFIX: &str = ".kiln-partial";
