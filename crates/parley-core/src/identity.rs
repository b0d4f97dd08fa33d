//! Identity registry: which connection owns which display name.
//!
//! A name maps to at most one session at any time. `claim` is a single
//! check-and-set under `&mut self`, so whoever serializes access to the
//! registry (the driver's lock) gets atomic claims for free: of any number of
//! concurrent claims for the same name, exactly one succeeds.
//!
//! Releases carry the releasing session's ID and only remove a matching
//! entry. A stale release (the name was freed and reclaimed by someone else in
//! the meantime) is therefore a no-op instead of evicting the new owner.

use std::collections::HashMap;

use crate::error::IdentityError;

/// Registry of claimed display names.
///
/// Names are case-sensitive and compared exactly.
#[derive(Debug, Default)]
pub struct IdentityRegistry {
    /// Name → owning session ID
    owners: HashMap<String, u64>,
}

impl IdentityRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `name` for `session_id`.
    ///
    /// On success the name is registered to the session. On failure the
    /// registry is unchanged.
    ///
    /// # Errors
    ///
    /// - `IdentityError::EmptyName` if `name` is empty
    /// - `IdentityError::NameTaken` if any session (including this one)
    ///   already holds `name`
    pub fn claim(&mut self, name: &str, session_id: u64) -> Result<(), IdentityError> {
        if name.is_empty() {
            return Err(IdentityError::EmptyName);
        }

        if self.owners.contains_key(name) {
            return Err(IdentityError::NameTaken(name.to_string()));
        }

        self.owners.insert(name.to_string(), session_id);
        Ok(())
    }

    /// Release `name` if it is currently owned by `session_id`.
    ///
    /// Returns `true` if an entry was removed. Idempotent: releasing an absent
    /// name, or a name owned by a different session, returns `false` and
    /// changes nothing.
    pub fn release(&mut self, name: &str, session_id: u64) -> bool {
        if self.owners.get(name) != Some(&session_id) {
            return false;
        }

        self.owners.remove(name);
        true
    }

    /// Session that owns `name`. `None` if unclaimed.
    pub fn lookup(&self, name: &str) -> Option<u64> {
        self.owners.get(name).copied()
    }

    /// Whether `name` is currently claimed.
    pub fn is_claimed(&self, name: &str) -> bool {
        self.owners.contains_key(name)
    }

    /// Number of claimed names.
    pub fn len(&self) -> usize {
        self.owners.len()
    }

    /// Whether no names are claimed.
    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    /// All claimed names, in no particular order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.owners.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_and_lookup() {
        let mut registry = IdentityRegistry::new();

        assert!(registry.claim("alice", 1).is_ok());
        assert_eq!(registry.lookup("alice"), Some(1));
        assert_eq!(registry.lookup("bob"), None);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn second_claim_is_rejected_without_mutation() {
        let mut registry = IdentityRegistry::new();
        registry.claim("alice", 1).unwrap();

        let result = registry.claim("alice", 2);
        assert_eq!(result, Err(IdentityError::NameTaken("alice".to_string())));
        assert_eq!(registry.lookup("alice"), Some(1));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn owner_cannot_claim_twice() {
        let mut registry = IdentityRegistry::new();
        registry.claim("alice", 1).unwrap();

        assert!(matches!(registry.claim("alice", 1), Err(IdentityError::NameTaken(_))));
    }

    #[test]
    fn names_are_case_sensitive() {
        let mut registry = IdentityRegistry::new();
        registry.claim("alice", 1).unwrap();

        assert!(registry.claim("Alice", 2).is_ok());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn empty_name_is_rejected() {
        let mut registry = IdentityRegistry::new();
        assert_eq!(registry.claim("", 1), Err(IdentityError::EmptyName));
        assert!(registry.is_empty());
    }

    #[test]
    fn release_frees_name_for_reuse() {
        let mut registry = IdentityRegistry::new();
        registry.claim("alice", 1).unwrap();

        assert!(registry.release("alice", 1));
        assert!(!registry.is_claimed("alice"));
        assert!(registry.claim("alice", 2).is_ok());
    }

    #[test]
    fn release_is_idempotent() {
        let mut registry = IdentityRegistry::new();
        registry.claim("alice", 1).unwrap();

        assert!(registry.release("alice", 1));
        assert!(!registry.release("alice", 1));
        assert!(!registry.release("nobody", 1));
    }

    #[test]
    fn stale_release_keeps_new_owner() {
        let mut registry = IdentityRegistry::new();
        registry.claim("alice", 1).unwrap();
        registry.release("alice", 1);
        registry.claim("alice", 2).unwrap();

        // Session 1's late cleanup must not evict session 2
        assert!(!registry.release("alice", 1));
        assert_eq!(registry.lookup("alice"), Some(2));
    }

    #[test]
    fn names_lists_current_claims() {
        let mut registry = IdentityRegistry::new();
        registry.claim("alice", 1).unwrap();
        registry.claim("bob", 2).unwrap();
        registry.release("alice", 1);

        let names: Vec<&str> = registry.names().collect();
        assert_eq!(names, vec!["bob"]);
    }
}
