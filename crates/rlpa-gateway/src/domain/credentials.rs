//! Management credentials for shell sessions.
//!
//! Identifiers are short enough to read off a device screen, so they use an
//! alphabet without look-alike characters. Passwords are decimal digits.
//!
//! ## Invariants
//!
//! - Identifiers are unique among live credentials (insert is atomic on the
//!   vacant map entry).
//! - Password comparison is constant time.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rand::Rng;
use subtle::ConstantTimeEq;

use crate::config::CredentialConfig;

const ID_ALPHABET: &[u8] = b"abcdefghijkmnpqrstuvwxyzACDEFGHJKLMNPQRSTUVWXY345679";
const PASSWORD_ALPHABET: &[u8] = b"0123456789";

/// Random identifiers to try before giving up on a crowded registry.
const MAX_ISSUE_ATTEMPTS: usize = 1024;

/// An issued identifier/password pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub id: String,
    pub password: String,
}

#[derive(Debug)]
pub struct CredentialRegistry {
    entries: DashMap<String, String>,
    config: CredentialConfig,
}

impl CredentialRegistry {
    pub fn new(config: CredentialConfig) -> Self {
        Self {
            entries: DashMap::new(),
            config,
        }
    }

    /// Issue a fresh credential, or `None` when no free identifier was found.
    pub fn issue(&self) -> Option<Credential> {
        let mut rng = rand::thread_rng();
        for _ in 0..MAX_ISSUE_ATTEMPTS {
            let id = random_string(&mut rng, ID_ALPHABET, self.config.id_length);
            if let Entry::Vacant(slot) = self.entries.entry(id.clone()) {
                let password =
                    random_string(&mut rng, PASSWORD_ALPHABET, self.config.password_length);
                slot.insert(password.clone());
                return Some(Credential { id, password });
            }
        }
        None
    }

    pub fn verify(&self, id: &str, password: &str) -> bool {
        self.entries
            .get(id)
            .map(|stored| bool::from(stored.as_bytes().ct_eq(password.as_bytes())))
            .unwrap_or(false)
    }

    pub fn revoke(&self, id: &str) -> bool {
        self.entries.remove(id).is_some()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn random_string(rng: &mut impl Rng, alphabet: &[u8], len: usize) -> String {
    (0..len)
        .map(|_| alphabet[rng.gen_range(0..alphabet.len())] as char)
        .collect()
}
