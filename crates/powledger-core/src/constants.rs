pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;
/// Leading hex zeros a block hash needs. Fixed, there is no retargeting.
pub const POW_DIFFICULTY: usize = 4;
/// How many nonces the cancellable search tries between flag checks.
pub const CANCEL_CHECK_INTERVAL: u64 = 1024;
