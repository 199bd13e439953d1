//! Privdock Core
//!
//! Store and reveal pipelines over the external ledger and FHE
//! capabilities, plus the per-owner ledger view.
//!
//! ```text
//!  locator ─▶ StorePipeline ─▶ encrypt(locator, one-time address)
//!                             ─▶ IdentityEncryptor (address -> handle)
//!                             ─▶ LedgerWriter::submit
//!
//!  LedgerView::load ─▶ LedgerReader ─▶ [record, Hidden] ...
//!  LedgerView::reveal(i) ─▶ Revealer ─▶ AuthorizedDecryptor (handle -> address)
//!                                    ─▶ decrypt(envelope, address) -> locator
//! ```

pub mod error;
pub mod reveal;
pub mod store;
pub mod view;

pub use error::{DockError, ErrorKind};
pub use reveal::{Recovered, RevealConfig, RevealState, Revealer};
pub use store::{STORE_FAILED, StoreConfig, StoreContext, StorePipeline, StoreStage, StoredFile};
pub use view::{LedgerEntry, LedgerView, RevealTrigger, ViewScope};
