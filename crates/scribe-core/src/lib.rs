//! The note service: authoritative store, visibility rules and the search
//! index kept in step with them.

pub mod error;
pub mod notes;
pub mod password;
pub mod rebuild;

pub use error::{CoreError, CoreResult};
pub use notes::{Notes, SearchIndex};
