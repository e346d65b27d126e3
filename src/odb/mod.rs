//! Object identifiers and object-database access.
//!
//! The object database is the seam between the storage layers (pack
//! windows, loose files) and the walkers: `open` hands back an object's
//! kind and inflated payload, `has_object` answers existence queries.
//! Tree and commit parsers consume objects exclusively through this
//! interface.

pub mod database;
pub mod errors;
pub mod loose;
pub mod object_id;

pub use database::{MemoryObjectDatabase, ObjectData, ObjectDatabase, ObjectKind};
pub use errors::ObjectError;
pub use loose::LooseObjectDatabase;
pub use object_id::ObjectId;
