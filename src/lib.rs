//! Session Record - versioned per-recipient session storage
//!
//! This crate persists the session state of an end-to-end encrypted messaging
//! protocol, one record per recipient, and loads records written by every
//! historical version of the format:
//! - Four record layouts (unmarked legacy, V1, V2, V3), detected by a leading marker
//! - Loads migrate implicitly: every save writes the current layout
//! - Key material zeroized on drop
//! - One lock serializing every record load and save
//!
//! ## Architecture
//!
//! ```text
//! SessionStore (load / save / delete, error policy)
//!     ├── RecordLock (GlobalLock or ShardedLock)
//!     ├── codec (RecordFormat detection, decode, encode)
//!     │     └── SessionKeyCodec (embedded session key blob + MasterSecret)
//!     ↓ whole-record read / write-and-truncate
//! RecordStore (DirectoryStore / InMemoryStore)
//!     ↓
//! sessions/<recipient_id>: [marker][counter][fp][fp][version]...[session key]
//! ```

#![deny(unsafe_code)]
#![warn(clippy::all)]

pub mod codec;
pub mod config;
pub mod fs;
pub mod io;
pub mod keys;
pub mod lock;
pub mod state;
pub mod store;

pub use codec::{
    decode, decode_into, encode, peek_format, CodecError, RecordFormat,
    CURRENT_MARKER, MARKER_V1, MARKER_V2, MARKER_V3,
};
pub use config::StoreConfig;
pub use fs::{DirectoryStore, InMemoryStore, RecordStore};
pub use io::{RecordReader, RecordWriter};
pub use keys::{
    IdentityKey, KeyError, MasterSecret, PlainSessionKeyCodec, SessionKey, SessionKeyCodec,
    IDENTITY_KEY_LEN, IDENTITY_KEY_SERIALIZED_LEN, IDENTITY_KEY_TYPE,
};
pub use lock::{GlobalLock, RecordLock, ShardedLock};
pub use state::{CanonicalAddress, RecipientId, SessionState, UNESTABLISHED_VERSION};
pub use store::{LoadFault, LoadStatus, LoadedSession, SessionStore, StoreError};
