pub mod config;
pub mod effects;
pub mod flags;
pub mod guard;
pub mod handlers;
pub mod host;
pub mod messages;
pub mod placeholder;
pub mod scheduler;
pub mod services;
pub mod session;
pub mod zones;

#[cfg(test)]
mod test_support;

// Re-exports for convenience
pub use config::{ConfigError, load_config, load_config_or_default, save_config};
pub use flags::{Flag, FlagParseError, FlagType, FlagValue};
pub use handlers::{FlagEffect, FlagValueHandler, HandlerFactory, SessionHandler};
pub use host::{CrossingKind, EntityId, Location};
pub use services::{HostParts, HostServices};
pub use session::{SessionManager, TrackedEntitySession};
pub use zones::{RegionSet, ZoneLayout, ZoneQuery};
