//! Contract keys correlate in-game delivery contracts with purchases.
//!
//! The only link between a purchase and the in-game contract that delivers it is the free-text contract title, so the
//! key has to survive being typed (or pasted) by a human. Keys look like `PT-7K2QX9M`: a fixed prefix, six
//! Crockford base-32 characters and a single check character derived from a Blake2b hash of the body. The check
//! character lets the settlement pass tell a real key apart from a random word in the title that happens to share the
//! prefix.
use std::{fmt::Display, sync::OnceLock};

use blake2::{Blake2b512, Digest};
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const CONTRACT_KEY_PREFIX: &str = "PT-";
const BODY_LENGTH: usize = 6;
const CROCKFORD: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContractKey(String);

impl ContractKey {
    /// Generates a fresh, checksummed key.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let body = (0..BODY_LENGTH).map(|_| CROCKFORD[rng.gen_range(0..CROCKFORD.len())] as char).collect::<String>();
        let check = check_char(&body);
        Self(format!("{CONTRACT_KEY_PREFIX}{body}{check}"))
    }

    /// Parses a structured key. Returns `None` if the format or check character is wrong.
    pub fn parse(s: &str) -> Option<Self> {
        let rest = s.strip_prefix(CONTRACT_KEY_PREFIX)?;
        if rest.len() != BODY_LENGTH + 1 || !rest.bytes().all(|b| CROCKFORD.contains(&b)) {
            return None;
        }
        let (body, check) = rest.split_at(BODY_LENGTH);
        check.starts_with(check_char(body)).then(|| Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for ContractKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<ContractKey> for String {
    fn from(value: ContractKey) -> Self {
        value.0
    }
}

fn check_char(body: &str) -> char {
    let hash = Blake2b512::digest(body.as_bytes());
    CROCKFORD[(hash[0] as usize) % CROCKFORD.len()] as char
}

fn key_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"PT-[0-9A-HJKMNP-TV-Z]{7}").ok()).as_ref()
}

/// Returns every valid structured key found in `title`, in order of appearance and without duplicates.
pub fn extract_contract_keys(title: &str) -> Vec<ContractKey> {
    let Some(pattern) = key_pattern() else {
        return Vec::new();
    };
    let mut keys: Vec<ContractKey> = Vec::new();
    for key in pattern.find_iter(title).filter_map(|m| ContractKey::parse(m.as_str())) {
        if !keys.contains(&key) {
            keys.push(key);
        }
    }
    keys
}
