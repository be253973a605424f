//! # Kiln Storage
//!
//! The storage engine capability consumed by Kiln.
//!
//! The engine is treated as an opaque collaborator: Kiln never looks inside
//! its on-disk structures, it only drives it through [`StorageEngine`]. This
//! crate defines that trait together with the value types that cross it:
//!
//! - [`Document`] - an opaque stored document with flags and a type tag
//! - [`EngineConfig`] - open flags plus an optional [`EncryptionKey`]
//! - [`StorageError`] - engine-reported conditions, each with a stable code
//!
//! ## Available Engines
//!
//! - [`MemoryEngine`] - process-local engine keyed by path, for tests and
//!   ephemeral databases
//!
//! ## Example
//!
//! ```rust
//! use kiln_storage::{Document, EngineConfig, MemoryEngine, StorageEngine};
//!
//! let config = EngineConfig::new().create(true);
//! let mut engine = MemoryEngine::open("doc-example.kiln", &config).unwrap();
//!
//! let txn = engine.begin_transaction().unwrap();
//! engine.put(txn, Document::new("greeting", "note", b"hello".to_vec())).unwrap();
//! engine.commit_transaction(txn).unwrap();
//!
//! let doc = engine.get("greeting").unwrap().unwrap();
//! assert_eq!(doc.body(), b"hello");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod document;
mod engine;
mod error;
mod key;
mod memory;

pub use config::{DatabaseFlags, EngineConfig};
pub use document::{Document, DocumentFlags};
pub use engine::{StorageEngine, TransactionId};
pub use error::{StorageError, StorageResult};
pub use key::{EncryptionAlgorithm, EncryptionKey, KEY_SIZE};
pub use memory::MemoryEngine;
