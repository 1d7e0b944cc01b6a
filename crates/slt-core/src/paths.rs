use std::{env, path::PathBuf};

/// Environment variable overriding where preferences are kept.
pub const STATE_DIR_ENV: &str = "SLT_STATE_DIR";

/// Directory holding saved client preferences: `$SLT_STATE_DIR`, else
/// `~/.slt`, else `.slt` under the working directory.
pub fn default_state_dir() -> PathBuf {
    env::var_os(STATE_DIR_ENV)
        .map(PathBuf::from)
        .or_else(|| env::var_os("HOME").map(|home| PathBuf::from(home).join(".slt")))
        .unwrap_or_else(|| PathBuf::from(".slt"))
}
