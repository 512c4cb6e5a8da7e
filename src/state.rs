//! In-memory session state for one recipient.
//!
//! `SessionState` is the canonical representation every on-disk format
//! decodes into. Invariants it enforces through its API:
//! - Local and remote fingerprints are only ever set together
//! - The "not yet established" version sentinel never leaves this type
//!   through a public getter
//! - The embedded session key is only handed out on an exact key-id match

use crate::keys::{IdentityKey, SessionKey};

/// Storage-level recipient identifier
pub type RecipientId = u64;

/// Internal version value meaning "no session established yet"
pub const UNESTABLISHED_VERSION: u32 = 31337;

/// Maps an application-level recipient handle to its storage identifier
pub trait CanonicalAddress {
    fn canonical_id(&self) -> RecipientId;
}

impl CanonicalAddress for RecipientId {
    fn canonical_id(&self) -> RecipientId {
        *self
    }
}

/// Session state persisted per recipient
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionState {
    recipient_id: RecipientId,
    counter: u32,
    local_fingerprint: Vec<u8>,
    remote_fingerprint: Vec<u8>,
    current_session_version: u32,
    negotiated_session_version: u32,
    identity_key: Option<IdentityKey>,
    session_key: Option<SessionKey>,
    verified_session_key: bool,
    prekey_bundle_required: bool,
}

impl SessionState {
    /// Fresh state for a recipient with no stored session
    pub fn new(recipient_id: RecipientId) -> Self {
        Self {
            recipient_id,
            counter: 0,
            local_fingerprint: Vec::new(),
            remote_fingerprint: Vec::new(),
            current_session_version: UNESTABLISHED_VERSION,
            negotiated_session_version: UNESTABLISHED_VERSION,
            identity_key: None,
            session_key: None,
            verified_session_key: false,
            prekey_bundle_required: false,
        }
    }

    #[must_use]
    pub fn recipient_id(&self) -> RecipientId {
        self.recipient_id
    }

    #[must_use]
    pub fn counter(&self) -> u32 {
        self.counter
    }

    pub fn increment_counter(&mut self) {
        self.counter += 1;
    }

    pub(crate) fn set_counter(&mut self, counter: u32) {
        self.counter = counter;
    }

    #[must_use]
    pub fn local_fingerprint(&self) -> &[u8] {
        &self.local_fingerprint
    }

    #[must_use]
    pub fn remote_fingerprint(&self) -> &[u8] {
        &self.remote_fingerprint
    }

    /// Set both session fingerprints
    ///
    /// An empty fingerprint counts as unset. Records written by older clients
    /// may carry only one of the two, so a mixed pair is stored as given and
    /// `has_session_id` reports it as no session id.
    pub fn set_session_id(&mut self, local_fingerprint: Vec<u8>, remote_fingerprint: Vec<u8>) {
        self.local_fingerprint = local_fingerprint;
        self.remote_fingerprint = remote_fingerprint;
    }

    /// Whether both fingerprints are set
    #[must_use]
    pub fn has_session_id(&self) -> bool {
        !self.local_fingerprint.is_empty() && !self.remote_fingerprint.is_empty()
    }

    /// Protocol version in effect, 0 if no session has been established
    #[must_use]
    pub fn session_version(&self) -> u32 {
        if self.current_session_version == UNESTABLISHED_VERSION {
            0
        } else {
            self.current_session_version
        }
    }

    pub(crate) fn raw_session_version(&self) -> u32 {
        self.current_session_version
    }

    pub fn set_session_version(&mut self, version: u32) {
        self.current_session_version = version;
    }

    #[must_use]
    pub fn is_established(&self) -> bool {
        self.current_session_version != UNESTABLISHED_VERSION
    }

    /// Version negotiated with the peer, 0 if none has been negotiated
    #[must_use]
    pub fn negotiated_session_version(&self) -> u32 {
        if self.negotiated_session_version == UNESTABLISHED_VERSION {
            0
        } else {
            self.negotiated_session_version
        }
    }

    pub(crate) fn raw_negotiated_session_version(&self) -> u32 {
        self.negotiated_session_version
    }

    pub fn set_negotiated_session_version(&mut self, version: u32) {
        self.negotiated_session_version = version;
    }

    #[must_use]
    pub fn identity_key(&self) -> Option<&IdentityKey> {
        self.identity_key.as_ref()
    }

    pub fn set_identity_key(&mut self, identity_key: Option<IdentityKey>) {
        self.identity_key = identity_key;
    }

    #[must_use]
    pub fn is_verified_session(&self) -> bool {
        self.verified_session_key
    }

    /// Only reachable from the record codec; there is no public way to verify a session
    pub(crate) fn mark_verified(&mut self) {
        self.verified_session_key = true;
    }

    #[must_use]
    pub fn is_prekey_bundle_required(&self) -> bool {
        self.prekey_bundle_required
    }

    pub fn set_prekey_bundle_required(&mut self, required: bool) {
        self.prekey_bundle_required = required;
    }

    #[must_use]
    pub fn has_session_key(&self) -> bool {
        self.session_key.is_some()
    }

    pub fn set_session_key(&mut self, session_key: SessionKey) {
        self.session_key = Some(session_key);
    }

    /// Drop the embedded session key (zeroized on drop)
    pub fn clear_session_key(&mut self) {
        self.session_key = None;
    }

    pub(crate) fn session_key(&self) -> Option<&SessionKey> {
        self.session_key.as_ref()
    }

    /// Session key for exactly this (local, remote) key id pair
    ///
    /// A stored key derived for any other pair is never returned.
    #[must_use]
    pub fn lookup_session_key(&self, local_key_id: u32, remote_key_id: u32) -> Option<&SessionKey> {
        self.session_key.as_ref().filter(|key| {
            key.local_key_id() == local_key_id && key.remote_key_id() == remote_key_id
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(local: u32, remote: u32) -> SessionKey {
        SessionKey::new(local, remote, vec![1; 32], vec![2; 20])
    }

    #[test]
    fn test_fresh_state_defaults() {
        let state = SessionState::new(17);
        assert_eq!(state.recipient_id(), 17);
        assert_eq!(state.counter(), 0);
        assert_eq!(state.session_version(), 0);
        assert_eq!(state.negotiated_session_version(), 0);
        assert!(!state.is_established());
        assert!(!state.has_session_id());
        assert!(state.local_fingerprint().is_empty());
        assert!(state.remote_fingerprint().is_empty());
        assert!(state.identity_key().is_none());
        assert!(!state.has_session_key());
        assert!(!state.is_verified_session());
        assert!(!state.is_prekey_bundle_required());
    }

    #[test]
    fn test_sentinel_reported_as_zero() {
        let mut state = SessionState::new(1);
        state.set_session_version(UNESTABLISHED_VERSION);
        assert_eq!(state.session_version(), 0);
        assert_eq!(state.raw_session_version(), UNESTABLISHED_VERSION);

        state.set_session_version(2);
        assert_eq!(state.session_version(), 2);
        assert!(state.is_established());

        // 0 is a real stored value, not the sentinel
        state.set_session_version(0);
        assert_eq!(state.session_version(), 0);
        assert!(state.is_established());
    }

    #[test]
    fn test_negotiated_sentinel_reported_as_zero() {
        let mut state = SessionState::new(1);
        assert_eq!(state.negotiated_session_version(), 0);
        assert_eq!(state.raw_negotiated_session_version(), UNESTABLISHED_VERSION);

        state.set_negotiated_session_version(3);
        assert_eq!(state.negotiated_session_version(), 3);
        assert_eq!(state.raw_negotiated_session_version(), 3);
    }

    #[test]
    fn test_increment_counter_by_one() {
        let mut state = SessionState::new(1);
        state.increment_counter();
        state.increment_counter();
        assert_eq!(state.counter(), 2);
    }

    #[test]
    fn test_session_id_sets_both_fingerprints() {
        let mut state = SessionState::new(1);
        state.set_session_id(b"local".to_vec(), b"remote".to_vec());
        assert_eq!(state.local_fingerprint(), b"local");
        assert_eq!(state.remote_fingerprint(), b"remote");
        assert!(state.has_session_id());
    }

    #[test]
    fn test_half_set_session_id_counts_as_unset() {
        let mut state = SessionState::new(1);
        state.set_session_id(b"local".to_vec(), Vec::new());
        assert!(!state.has_session_id());
        assert_eq!(state.local_fingerprint(), b"local");

        state.set_session_id(Vec::new(), b"remote".to_vec());
        assert!(!state.has_session_id());
    }

    #[test]
    fn test_lookup_without_key_is_none() {
        let state = SessionState::new(1);
        assert!(state.lookup_session_key(0, 0).is_none());
    }

    #[test]
    fn test_lookup_requires_exact_match() {
        let mut state = SessionState::new(1);
        state.set_session_key(key(5, 6));

        assert_eq!(state.lookup_session_key(5, 6), Some(&key(5, 6)));
        assert!(state.lookup_session_key(5, 7).is_none());
        assert!(state.lookup_session_key(4, 6).is_none());
        assert!(state.lookup_session_key(6, 5).is_none());
    }

    #[test]
    fn test_clear_session_key() {
        let mut state = SessionState::new(1);
        state.set_session_key(key(1, 1));
        state.clear_session_key();
        assert!(!state.has_session_key());
        assert!(state.lookup_session_key(1, 1).is_none());
    }

    #[test]
    fn test_mark_verified_is_sticky() {
        let mut state = SessionState::new(1);
        state.mark_verified();
        assert!(state.is_verified_session());
    }

    #[test]
    fn test_recipient_id_is_its_own_canonical_address() {
        let id: RecipientId = 99;
        assert_eq!(id.canonical_id(), 99);
    }
}
