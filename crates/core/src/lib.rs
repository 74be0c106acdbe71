pub mod config;
pub mod entity;
pub mod error;
pub mod formatter;
pub mod grains;
pub mod inventory;
pub mod profile;
pub mod source;

pub use config::Config;
pub use entity::*;
pub use error::*;
pub use formatter::Formatter;
pub use grains::{Grains, MinionGrains};
pub use profile::SyncProfile;
