//! FinanBoard App - Screen Services Over the Data Layer
//!
//! Wires a remote store, the query cache and the mutation coordinator into
//! one [`AppContext`], and exposes a service per FinanBoard screen.

pub mod context;
pub mod error;
pub mod services;
pub mod telemetry;

pub use context::AppContext;
pub use error::{AppError, AppResult};
pub use services::*;
pub use telemetry::init_tracing;
