//! dz-localities: Algerian wilaya/commune registry.
//!
//! XML feed import into a versioned store, a TTL read-through cache, and
//! bilingual (Latin/Arabic) option labels served over HTTP or the CLI.

pub mod error;
pub mod locality;
pub mod server;
pub mod settings;

pub use error::{LocalityError, Result};
pub use settings::{AppConfig, LabelSettings};
