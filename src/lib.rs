//! Named collections of JSON records, each persisted to its own JSON file.
//!
//! Every record carries an application-chosen identity field (say `email`)
//! plus a store-generated internal id under `"__id__"`. Writes are checked
//! against both: reusing an identity key with a different internal id is a
//! conflict. Pick a flush policy (immediate / async / manual); whichever you
//! choose, [`RecordStoreHandle::shutdown`] writes everything out.
//!
//! ```rust,no_run
//! use json_collections::{CollectionSchema, RecordStore};
//! use serde_json::json;
//!
//! let store = RecordStore::open([CollectionSchema::new("users", "email", "data/users.json")]).unwrap();
//! let rec = json!({"email": "a@x.com", "name": "A"}).as_object().cloned().unwrap();
//! let stored = store.upsert("users", rec).unwrap();
//! println!("{}", stored["__id__"]);
//! store.shutdown().unwrap();
//! ```
//!
//! [`dispatch`](dispatch::dispatch) maps HTTP-shaped requests onto the store
//! for whatever server you put in front of it.
//!
//! **Single-process only.** If multiple processes open the same files they
//! will clobber each other.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod collection;
pub mod dispatch;
pub mod error;
pub mod flush;
pub mod persist;
pub mod record;
pub mod registry;
pub mod schema;
pub mod serializer;
pub mod store;

pub use collection::CollectionState;
pub use dispatch::{dispatch, Method, Request, Response};
pub use error::{Error, Result};
pub use flush::FlushPolicy;
pub use record::Record;
pub use registry::CollectionRegistry;
pub use schema::{CollectionSchema, INTERNAL_ID_FIELD};
pub use store::{RecordStore, RecordStoreBuilder, RecordStoreHandle};
