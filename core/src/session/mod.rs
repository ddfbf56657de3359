mod manager;

#[cfg(test)]
mod manager_tests;

pub use manager::{SessionManager, TrackedEntitySession};
