//! Change impact resolution, build ordering, and fail-fast execution for multibuild.

pub mod compose;
pub mod error;
pub mod execute;
pub mod impact;
pub mod init;
pub mod order;
pub mod ownership;
pub mod pipeline;

pub use compose::{compose, ComposedSet};
pub use error::EngineError;
pub use execute::{
    shell_runner, BuildExecutor, BuildObserver, BuildOutcome, ExecutionReport, Halt, HaltCause,
    SilentObserver,
};
pub use impact::ChangeImpactResolver;
pub use init::init_config;
pub use order::order;
pub use ownership::PathOwnershipResolver;
pub use pipeline::{BuildPlan, Pipeline};
