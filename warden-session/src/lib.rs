//! # Warden Session
//!
//! Tarball-at-rest: keeps a directory-based session (for example a
//! messenger protocol library's state directory) encrypted as a single blob
//! on disk, and projects it into a private owner-only scratch directory
//! while the wrapping process runs.
//!
//! The vault file holds `{ version, iv, ciphertext, tag }` JSON whose
//! plaintext is gzip-compressed pack format (see [`pack`]) for one level of
//! files. The scratch directory is re-encrypted on a periodic timer and on
//! every explicit [`SessionStore::flush`], and three-pass wiped on
//! [`SessionStore::close`].
//!
//! ## Quick Start
//!
//! ```ignore
//! use warden_session::SessionStore;
//!
//! # tokio_test::block_on(async {
//! let store = SessionStore::for_account("channels/whatsapp", "primary", &[0u8; 32]).unwrap();
//! let scratch = store.open().await.unwrap();
//! // Hand `scratch` to the session library; it reads and writes plain files.
//! store.flush().await.unwrap();
//! store.close().await.unwrap();
//! # });
//! ```

pub mod error;
pub mod pack;
pub mod store;

pub use error::{PackError, SessionError};
pub use pack::{pack, unpack, MAX_NAME_BYTES};
pub use store::{SessionStore, DEFAULT_FLUSH_INTERVAL};

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
