//! Plan, then run: the whole flow from a revision range to build outcomes.

use serde::Serialize;

use multibuild_config::BuildConfig;
use multibuild_git::RevisionDiffProvider;
use multibuild_unit::{BuildUnitId, BuildUnitSet, PreferredOrder};
use multibuild_util::process::CommandRunner;

use crate::compose::compose;
use crate::error::EngineError;
use crate::execute::{BuildExecutor, BuildObserver, ExecutionReport};
use crate::impact::ChangeImpactResolver;
use crate::order::order;
use crate::ownership::PathOwnershipResolver;

/// What a run would build, computed without executing anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildPlan {
    pub from: String,
    pub to: String,
    /// Units owning at least one changed path, in discovery order.
    pub impacted: BuildUnitSet,
    /// Always-build units that were not impacted.
    pub forced: Vec<BuildUnitId>,
    /// The final execution order.
    pub sequence: Vec<BuildUnitId>,
}

impl BuildPlan {
    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }
}

/// Wires the resolvers, composer, orderer and executor together.
pub struct Pipeline<'a, D, R>
where
    D: RevisionDiffProvider + ?Sized,
    R: CommandRunner + ?Sized,
{
    config: &'a BuildConfig,
    preferred: &'a PreferredOrder,
    diff: &'a D,
    runner: &'a R,
}

impl<'a, D, R> Pipeline<'a, D, R>
where
    D: RevisionDiffProvider + ?Sized,
    R: CommandRunner + ?Sized,
{
    pub fn new(
        config: &'a BuildConfig,
        preferred: &'a PreferredOrder,
        diff: &'a D,
        runner: &'a R,
    ) -> Self {
        Self {
            config,
            preferred,
            diff,
            runner,
        }
    }

    /// Work out what to build for `from..to`. Runs no build commands.
    ///
    /// # Errors
    /// Returns an error if the marker pattern is invalid, the working
    /// directory cannot be scanned, or the range cannot be diffed.
    pub fn plan(&self, from: &str, to: &str) -> Result<BuildPlan, EngineError> {
        let ownership = PathOwnershipResolver::from_config(self.config)?;
        let impacted = ChangeImpactResolver::new(self.diff, &ownership).resolve(from, to)?;
        let composed = compose(&impacted, &self.config.always_build);
        let sequence = order(&composed.working, self.preferred);

        tracing::info!(
            impacted = impacted.len(),
            forced = composed.forced.len(),
            total = sequence.len(),
            "planned build"
        );

        Ok(BuildPlan {
            from: from.to_owned(),
            to: to.to_owned(),
            impacted,
            forced: composed.forced,
            sequence,
        })
    }

    /// Execute a plan's sequence.
    ///
    /// # Errors
    /// Returns [`EngineError::NothingToBuild`] if the plan is empty.
    pub fn run(
        &self,
        plan: &BuildPlan,
        observer: &mut dyn BuildObserver,
    ) -> Result<ExecutionReport, EngineError> {
        BuildExecutor::new(self.runner, &self.config.command).execute(&plan.sequence, observer)
    }

    /// [`plan`](Self::plan) followed by [`run`](Self::run).
    ///
    /// # Errors
    /// Returns an error if planning fails or the plan is empty.
    pub fn plan_and_run(
        &self,
        from: &str,
        to: &str,
        observer: &mut dyn BuildObserver,
    ) -> Result<ExecutionReport, EngineError> {
        let plan = self.plan(from, to)?;
        self.run(&plan, observer)
    }
}
