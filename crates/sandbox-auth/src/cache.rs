use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::principal::Principal;

/// Optional verification cache, gated by config (§4.1: "cacheable only
/// when explicitly opted into ... default is no caching to keep
/// revocation immediate"). Keyed by the raw credential — callers must
/// only construct this when they have already decided caching is safe for
/// their deployment.
pub struct AuthCache {
    entries: DashMap<String, (Principal, Instant)>,
    ttl: Duration,
}

impl AuthCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self { entries: DashMap::new(), ttl }
    }

    #[must_use]
    pub fn get(&self, credential: &str) -> Option<Principal> {
        let entry = self.entries.get(credential)?;
        let (principal, inserted_at) = entry.value();
        if inserted_at.elapsed() > self.ttl {
            drop(entry);
            self.entries.remove(credential);
            return None;
        }
        Some(principal.clone())
    }

    pub fn put(&self, credential: String, principal: Principal) {
        self.entries.insert(credential, (principal, Instant::now()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_expires_after_ttl() {
        let cache = AuthCache::new(Duration::from_millis(1));
        cache.put("cred".to_string(), Principal::development());
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get("cred").is_none());
    }

    #[test]
    fn entry_hits_within_ttl() {
        let cache = AuthCache::new(Duration::from_secs(60));
        cache.put("cred".to_string(), Principal::development());
        assert!(cache.get("cred").is_some());
    }
}
