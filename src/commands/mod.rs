pub mod definitions;
pub mod sync;

pub use definitions::{bootstrap_commands, desired_commands};
pub use sync::{sync_for, sync_guild};
