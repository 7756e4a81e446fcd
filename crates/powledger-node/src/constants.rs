pub(crate) const DEFAULT_LISTEN: &str = "127.0.0.1:8080";
pub(crate) const DEFAULT_PEER_TIMEOUT_SECS: u64 = 5;
