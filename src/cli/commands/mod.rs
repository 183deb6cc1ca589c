//! Command implementations for the annograph CLI
//!
//! Each command has its own module with an `XArgs` struct and a `run`
//! function returning a message suitable for stderr on failure.

pub mod extract;
pub mod fragment_id;
pub mod inspect;
pub mod validate;

pub use extract::ExtractArgs;
pub use fragment_id::FragmentIdArgs;
pub use inspect::InspectArgs;
pub use validate::ValidateArgs;
