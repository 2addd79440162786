//! Single-use freshness tokens for state-changing operator actions.
//!
//! A token is `<salt>.<digest>`: a random per-issue salt and a SHA-256
//! digest over the service secret, the action, the post, the operator, a
//! 12-hour tick and the salt. It verifies during the tick it was issued in
//! and the one after, and only once. Every issue gets a fresh salt, so
//! spending one token never blocks the next.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::common::PostId;

/// Length of one tick in seconds; a token lives for one to two ticks.
pub const TICK_SECONDS: i64 = 12 * 60 * 60;

/// Hex characters of the digest kept in a token.
const DIGEST_CHARS: usize = 32;

pub struct NonceService {
    secret: String,
    /// Consumed token -> tick it was accepted in
    used: Mutex<HashMap<String, i64>>,
}

impl NonceService {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            used: Mutex::new(HashMap::new()),
        }
    }

    pub fn issue(&self, action: &str, post_id: PostId, operator: &str, now: DateTime<Utc>) -> String {
        let salt = Uuid::new_v4().simple().to_string();
        let digest = self.digest(action, post_id, operator, tick(now), &salt);
        format!("{}.{}", salt, digest)
    }

    /// Check and consume a token.
    pub fn verify(
        &self,
        token: &str,
        action: &str,
        post_id: PostId,
        operator: &str,
        now: DateTime<Utc>,
    ) -> bool {
        let Some((salt, digest)) = token.split_once('.') else {
            return false;
        };
        let current = tick(now);
        let valid = [current, current - 1].into_iter().any(|t| {
            let expected = self.digest(action, post_id, operator, t, salt);
            bool::from(expected.as_bytes().ct_eq(digest.as_bytes()))
        });
        if !valid {
            return false;
        }

        let mut used = match self.used.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        used.retain(|_, t| *t >= current - 1);
        used.insert(token.to_string(), current).is_none()
    }

    fn digest(&self, action: &str, post_id: PostId, operator: &str, tick: i64, salt: &str) -> String {
        let post_id = post_id.to_string();
        let tick = tick.to_string();
        let mut hasher = Sha256::new();
        let parts = [
            self.secret.as_str(),
            action,
            post_id.as_str(),
            operator,
            tick.as_str(),
            salt,
        ];
        for part in parts {
            hasher.update(part.as_bytes());
            hasher.update(b"|");
        }
        let hex = format!("{:x}", hasher.finalize());
        hex[..DIGEST_CHARS].to_string()
    }
}

fn tick(now: DateTime<Utc>) -> i64 {
    now.timestamp().div_euclid(TICK_SECONDS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn test_token_is_single_use() {
        let nonces = NonceService::new("secret");
        let now = at(1_700_000_000);
        let token = nonces.issue("regenerate", PostId(5), "alice", now);

        assert!(nonces.verify(&token, "regenerate", PostId(5), "alice", now));
        assert!(!nonces.verify(&token, "regenerate", PostId(5), "alice", now));
    }

    #[test]
    fn test_token_is_bound_to_post_operator_and_action() {
        let nonces = NonceService::new("secret");
        let now = at(1_700_000_000);
        let token = nonces.issue("regenerate", PostId(5), "alice", now);

        assert!(!nonces.verify(&token, "regenerate", PostId(6), "alice", now));
        assert!(!nonces.verify(&token, "regenerate", PostId(5), "bob", now));
        assert!(!nonces.verify(&token, "clear_log", PostId(5), "alice", now));
        assert!(!NonceService::new("other").verify(&token, "regenerate", PostId(5), "alice", now));
    }

    #[test]
    fn test_token_survives_one_tick_then_expires() {
        let nonces = NonceService::new("secret");
        let issued = at(TICK_SECONDS * 1000);
        let token = nonces.issue("regenerate", PostId(1), "alice", issued);

        let next_tick = issued + Duration::seconds(TICK_SECONDS);
        let two_ticks = issued + Duration::seconds(2 * TICK_SECONDS);
        assert!(!nonces.verify(&token, "regenerate", PostId(1), "alice", two_ticks));
        assert!(nonces.verify(&token, "regenerate", PostId(1), "alice", next_tick));
    }

    #[test]
    fn test_fresh_tokens_work_after_one_is_spent() {
        let nonces = NonceService::new("secret");
        let now = at(1_700_000_000);

        let first = nonces.issue("regenerate", PostId(5), "alice", now);
        assert!(nonces.verify(&first, "regenerate", PostId(5), "alice", now));

        let second = nonces.issue("regenerate", PostId(5), "alice", now);
        assert_ne!(first, second);
        assert!(nonces.verify(&second, "regenerate", PostId(5), "alice", now));
    }

    #[test]
    fn test_malformed_or_tampered_tokens_are_rejected() {
        let nonces = NonceService::new("secret");
        let now = at(1_700_000_000);
        let token = nonces.issue("regenerate", PostId(5), "alice", now);
        let (salt, digest) = token.split_once('.').unwrap();

        assert!(!nonces.verify("", "regenerate", PostId(5), "alice", now));
        assert!(!nonces.verify(digest, "regenerate", PostId(5), "alice", now));
        let other_salt = format!("{}.{}", "0".repeat(salt.len()), digest);
        assert!(!nonces.verify(&other_salt, "regenerate", PostId(5), "alice", now));
        assert!(nonces.verify(&token, "regenerate", PostId(5), "alice", now));
    }
}
