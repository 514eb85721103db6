//! CLI command handlers. Each command is in its own file.

mod checksum;
mod get;
mod list;

pub use checksum::run_checksum;
pub use get::run_get;
pub use list::run_list;
