//! Keysets and their atomically swapped publication handle.
//!
//! # Post-conditions
//! - A `Keyset` is never mutated after construction.
//! - `KeysetHandle::replace` publishes a whole keyset in one pointer swap.
//!
//! # Invariants
//! - Readers holding a snapshot keep seeing that snapshot, whatever is
//!   published after they loaded it.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::Deserialize;
use serde_json::Value;

use super::key::{KeyEntry, KeyEntryError, VerifiablePublicKey};

/// The raw authority response: `{"keys": [...]}`.
///
/// Entries stay untyped so one malformed entry cannot fail the whole document.
#[derive(Debug, Deserialize)]
pub struct KeyPublicationDocument {
    /// Published entries in document order.
    pub keys: Vec<Value>,
}

/// Verifiable keys indexed by key identifier.
#[derive(Debug, Default)]
pub struct Keyset {
    keys: HashMap<String, VerifiablePublicKey>,
}

impl Keyset {
    /// Create an empty keyset.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a keyset from keys, in order.
    ///
    /// A key whose `kid` was already seen replaces the earlier one.
    #[must_use]
    pub fn from_keys(keys: impl IntoIterator<Item = VerifiablePublicKey>) -> Self {
        let mut map = HashMap::new();
        for key in keys {
            let kid = key.kid().to_string();
            if map.insert(kid, key).is_some() {
                tracing::warn!("duplicate kid in keyset; later entry replaces earlier one");
            }
        }
        Self { keys: map }
    }

    /// Build a keyset from a parsed publication document.
    ///
    /// Entries that cannot be turned into a key are logged and skipped.
    /// Duplicate `kid`s resolve last-one-wins in document order.
    #[must_use]
    pub fn from_document(document: KeyPublicationDocument) -> Self {
        let total = document.keys.len();
        let keys = document
            .keys
            .into_iter()
            .enumerate()
            .filter_map(|(index, value)| match parse_entry(value) {
                Ok(key) => Some(key),
                Err((kid, error)) => {
                    tracing::warn!(
                        "skipping key entry {index} (kid {}): {error}",
                        kid.as_deref().unwrap_or("<none>")
                    );
                    None
                }
            });
        let keyset = Self::from_keys(keys);

        tracing::debug!("built keyset with {} of {} entries", keyset.len(), total);
        keyset
    }

    /// Look up a key by identifier.
    #[must_use]
    pub fn get(&self, kid: &str) -> Option<&VerifiablePublicKey> {
        self.keys.get(kid)
    }

    /// Number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the keyset holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Key identifiers, sorted.
    #[must_use]
    pub fn kids(&self) -> Vec<&str> {
        let mut kids: Vec<&str> = self.keys.keys().map(String::as_str).collect();
        kids.sort_unstable();
        kids
    }
}

fn parse_entry(value: Value) -> Result<VerifiablePublicKey, (Option<String>, KeyEntryError)> {
    let kid = value.get("kid").and_then(Value::as_str).map(str::to_string);
    let entry: KeyEntry = serde_json::from_value(value)
        .map_err(|e| (kid.clone(), KeyEntryError::Shape(e.to_string())))?;
    VerifiablePublicKey::from_entry(&entry).map_err(|e| (kid, e))
}

/// The currently published keyset.
///
/// Verification reads a snapshot without locking; a refresh replaces the
/// whole keyset with one atomic store.
#[derive(Debug)]
pub struct KeysetHandle {
    current: ArcSwap<Keyset>,
}

impl KeysetHandle {
    /// Create a handle publishing `keyset`.
    #[must_use]
    pub fn new(keyset: Keyset) -> Self {
        Self {
            current: ArcSwap::from_pointee(keyset),
        }
    }

    /// The keyset published right now.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Keyset> {
        self.current.load_full()
    }

    /// Publish `keyset`, returning the one it replaced.
    pub fn replace(&self, keyset: Keyset) -> Arc<Keyset> {
        self.replace_arc(Arc::new(keyset))
    }

    /// Publish an already shared keyset, returning the one it replaced.
    pub fn replace_arc(&self, keyset: Arc<Keyset>) -> Arc<Keyset> {
        self.current.swap(keyset)
    }
}

impl Default for KeysetHandle {
    fn default() -> Self {
        Self::new(Keyset::new())
    }
}
