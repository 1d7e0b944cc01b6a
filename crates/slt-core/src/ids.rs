use std::{
    fmt,
    time::{SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Serialize};

/// Correlates a response frame to the request that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(
    /// Opaque client-generated identifier.
    pub String,
);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Issues session-unique request identifiers of the form `req_<n>_<unix_ms>`.
///
/// The counter alone guarantees uniqueness; the timestamp only makes ids
/// readable in logs.
#[derive(Debug)]
pub struct RequestIdGen {
    next: u64,
}

impl RequestIdGen {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Returns the next identifier and advances the counter.
    pub fn next_id(&mut self) -> RequestId {
        let seq = self.next;
        self.next = self.next.saturating_add(1);
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_millis());
        RequestId(format!("req_{seq}_{stamp}"))
    }
}

impl Default for RequestIdGen {
    fn default() -> Self {
        Self::new()
    }
}
