pub mod replay;
pub mod scenario;

pub use replay::{Replay, StepReport};
pub use scenario::{Scenario, ScenarioError};
