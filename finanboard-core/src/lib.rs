//! FinanBoard Core - Record Types and Query Keys
//!
//! Typed records for every FinanBoard collection, the composite keys that
//! address cached query results, configuration and the error taxonomy.
//! All other crates depend on this one. No I/O lives here.

pub mod config;
pub mod entities;
pub mod enums;
pub mod error;
pub mod identity;
pub mod query_key;
pub mod records;

pub use config::{AppConfig, LogFormat, RollbackPolicy};
pub use entities::*;
pub use enums::*;
pub use error::*;
pub use identity::*;
pub use query_key::{QueryKey, RecordFilter, ScopeParam};
pub use records::RecordSet;
