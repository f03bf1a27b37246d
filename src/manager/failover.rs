//! Failover policy.

use serde::{Deserialize, Serialize};

/// How many hosts one logical call may try before surfacing the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailoverPolicy {
    /// On failure, surface the error without trying another host.
    #[default]
    FailFast,

    /// On failure, try one more host before giving up.
    OnFailTryOneNextAvailable,

    /// On failure, try every known host before giving up.
    OnFailTryAllAvailable,
}

impl FailoverPolicy {
    /// Whether another attempt may run.
    ///
    /// `excluded` counts hosts this call has already failed on;
    /// `remaining` counts live hosts not yet excluded. Evaluated fresh
    /// before each retry so a live set that shrank or grew mid-call is
    /// reflected.
    pub fn allows_retry(&self, excluded: usize, remaining: usize) -> bool {
        if remaining == 0 {
            return false;
        }
        match self {
            FailoverPolicy::FailFast => false,
            FailoverPolicy::OnFailTryOneNextAvailable => excluded < 2,
            FailoverPolicy::OnFailTryAllAvailable => true,
        }
    }
}
