//! Persistence of session records.
//!
//! `SessionStore` owns the load / save / delete lifecycle for every
//! recipient's record:
//! - Load never fails: a missing record yields a fresh state, and a record
//!   that cannot be fully read yields the fields decoded so far, tagged as
//!   partial
//! - Save always writes the current format and fails loudly; a lost save
//!   would leave the two peers with diverging session state
//! - Every load, save and delete runs under the store's `RecordLock`

use std::io;

use tracing::{debug, warn};

use crate::codec::{self, CodecError, RecordFormat};
use crate::fs::RecordStore;
use crate::keys::{MasterSecret, PlainSessionKeyCodec, SessionKeyCodec};
use crate::lock::{GlobalLock, RecordLock};
use crate::state::{CanonicalAddress, RecipientId, SessionState};

/// Error types for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to encode session record for recipient {recipient_id}: {source}")]
    Encode {
        recipient_id: RecipientId,
        #[source]
        source: CodecError,
    },
    #[error("Failed to save session record for recipient {recipient_id}: {source}")]
    Save {
        recipient_id: RecipientId,
        #[source]
        source: io::Error,
    },
    #[error("Failed to delete session record for recipient {recipient_id}: {source}")]
    Delete {
        recipient_id: RecipientId,
        #[source]
        source: io::Error,
    },
}

/// Why a load stopped before the end of the record
#[derive(Debug, thiserror::Error)]
pub enum LoadFault {
    #[error("Read failed: {0}")]
    Read(#[from] io::Error),
    #[error("Decode failed: {0}")]
    Decode(#[from] CodecError),
}

/// How a load ended
#[derive(Debug)]
pub enum LoadStatus {
    /// No record exists; the state is the default
    Fresh,
    /// The whole record was decoded
    Loaded(RecordFormat),
    /// Loading stopped early; the state holds whatever was decoded first
    Partial(LoadFault),
}

/// State returned by `SessionStore::load` with its load status
#[derive(Debug)]
pub struct LoadedSession {
    pub state: SessionState,
    pub status: LoadStatus,
}

impl LoadedSession {
    #[must_use]
    pub fn is_fresh(&self) -> bool {
        matches!(self.status, LoadStatus::Fresh)
    }

    #[must_use]
    pub fn is_partial(&self) -> bool {
        matches!(self.status, LoadStatus::Partial(_))
    }

    /// Format the record was stored in, if it was fully decoded
    #[must_use]
    pub fn format(&self) -> Option<RecordFormat> {
        match self.status {
            LoadStatus::Loaded(format) => Some(format),
            LoadStatus::Fresh | LoadStatus::Partial(_) => None,
        }
    }

    #[must_use]
    pub fn into_state(self) -> SessionState {
        self.state
    }
}

/// Session record store - handles load/save/delete lifecycle
pub struct SessionStore<S, C = PlainSessionKeyCodec, L = GlobalLock> {
    /// Record backend
    records: S,
    /// Codec for the embedded session key blob
    codec: C,
    /// Lock taken around every record access
    lock: L,
    /// Handed to the session key codec, never stored in records
    master: MasterSecret,
}

impl<S: RecordStore> SessionStore<S> {
    /// Create a store using the plain session key codec and the process-wide lock
    pub fn new(records: S, master: MasterSecret) -> Self {
        Self::with_parts(records, PlainSessionKeyCodec, GlobalLock::process(), master)
    }
}

impl<S: RecordStore, C: SessionKeyCodec, L: RecordLock> SessionStore<S, C, L> {
    /// Create a store with a custom session key codec and lock
    pub fn with_parts(records: S, codec: C, lock: L, master: MasterSecret) -> Self {
        Self {
            records,
            codec,
            lock,
            master,
        }
    }

    /// Get the record backend
    #[must_use]
    pub fn records(&self) -> &S {
        &self.records
    }

    #[must_use]
    pub fn lock(&self) -> &L {
        &self.lock
    }

    /// Load the session for a recipient, or a fresh state if none is stored
    pub fn open(&self, recipient: &impl CanonicalAddress) -> SessionState {
        self.load(recipient).into_state()
    }

    /// Load the session for a recipient, reporting how the load ended
    pub fn load(&self, recipient: &impl CanonicalAddress) -> LoadedSession {
        let recipient_id = recipient.canonical_id();
        let mut state = SessionState::new(recipient_id);

        let _guard = self.lock.acquire(recipient_id);

        let bytes = match self.records.read(recipient_id) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                warn!(recipient_id, "No session information found");
                return LoadedSession {
                    state,
                    status: LoadStatus::Fresh,
                };
            }
            Err(err) => {
                warn!(recipient_id, error = %err, "Session record read failed");
                return LoadedSession {
                    state,
                    status: LoadStatus::Partial(LoadFault::Read(err)),
                };
            }
        };

        match codec::decode_into(&mut state, &bytes, &self.codec, &self.master) {
            Ok(format) => {
                if !format.is_current() {
                    warn!(recipient_id, ?format, "Legacy session record, will migrate on next save");
                }
                LoadedSession {
                    state,
                    status: LoadStatus::Loaded(format),
                }
            }
            Err(err) => {
                warn!(recipient_id, error = %err, "Session record load abandoned");
                LoadedSession {
                    state,
                    status: LoadStatus::Partial(LoadFault::Decode(err)),
                }
            }
        }
    }

    /// Write the state as a current-format record, replacing any previous record
    pub fn save(&self, state: &SessionState) -> Result<(), StoreError> {
        let recipient_id = state.recipient_id();
        let bytes = codec::encode(state, &self.codec, &self.master)
            .map_err(|source| StoreError::Encode { recipient_id, source })?;

        let _guard = self.lock.acquire(recipient_id);
        self.records
            .write(recipient_id, &bytes)
            .map_err(|source| StoreError::Save { recipient_id, source })?;

        debug!(recipient_id, len = bytes.len(), "Saved session record");
        Ok(())
    }

    /// Delete a recipient's record; deleting a missing record succeeds
    pub fn delete(&self, recipient: &impl CanonicalAddress) -> Result<(), StoreError> {
        let recipient_id = recipient.canonical_id();
        let _guard = self.lock.acquire(recipient_id);

        match self.records.delete(recipient_id) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Delete { recipient_id, source }),
        }
    }

    /// Whether a record is stored for the recipient
    #[must_use]
    pub fn exists(&self, recipient: &impl CanonicalAddress) -> bool {
        let recipient_id = recipient.canonical_id();
        debug!(recipient_id, "Checking for session record");
        self.records.exists(recipient_id)
    }
}

// ============================================================
// TESTS
// ============================================================
