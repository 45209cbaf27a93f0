//! Account-scoped cache keys.
//!
//! Every entity record is stored under `prefix + raw id`, where the prefix
//! captures the instance host and the credential the data was fetched with.
//! The same post loaded by two accounts therefore lands in two records, and
//! one account's vote state never shows up under another.

use std::fmt;

use sha2::{Digest, Sha256};
use url::Url;

use crate::session::Account;

const ANONYMOUS: &str = "anon";
const CREDENTIAL_DIGEST_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn has_prefix(&self, prefixer: &CachePrefixer) -> bool {
        self.0.starts_with(prefixer.prefix())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CachePrefixer {
    prefix: String,
}

impl CachePrefixer {
    pub fn for_account(account: &Account) -> Self {
        let host = instance_host(&account.instance);
        let identity = match account.jwt.as_deref().filter(|jwt| !jwt.is_empty()) {
            Some(jwt) => credential_digest(jwt),
            None => ANONYMOUS.to_string(),
        };
        Self {
            prefix: format!("{host}_{identity}_"),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn key(&self, raw_id: &str) -> CacheKey {
        debug_assert!(!raw_id.is_empty(), "cache key raw id must not be empty");
        CacheKey(format!("{}{}", self.prefix, raw_id))
    }
}

fn instance_host(instance: &str) -> String {
    match Url::parse(instance) {
        Ok(url) => match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => instance.to_string(),
        },
        Err(_) => instance.to_string(),
    }
}

fn credential_digest(jwt: &str) -> String {
    let digest = Sha256::digest(jwt.as_bytes());
    let mut encoded = hex::encode(digest);
    encoded.truncate(CREDENTIAL_DIGEST_LEN);
    encoded
}
