//! Command implementations.

pub mod announce;
pub mod genpsk;
pub mod listen;

pub use announce::run_announce;
pub use genpsk::run_genpsk;
pub use listen::run_listen;
