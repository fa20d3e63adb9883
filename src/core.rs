//! Application root: owns the database pool, every store, and the invoker handle - an explicit
//! composition root rather than leaving wiring to each binary.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::config::{Config, DbConfig};
use crate::error::StoreError;
use crate::invoker::{Grader, Invoker};
use crate::models::contest::ContestStore;
use crate::models::contest_problem::ContestProblemStore;
use crate::models::contest_solution::ContestSolutionStore;
use crate::models::participant::ParticipantStore;
use crate::models::problem::ProblemStore;
use crate::models::report::{ReportHooks, ReportStore};
use crate::models::role::RoleStore;
use crate::models::solution::SolutionStore;
use crate::models::user::{UserHooks, UserStore};
use crate::store::postgres::PgObjectStoreBuilder;

#[derive(thiserror::Error, Debug)]
pub enum CoreError {
    #[error("postgres is the only supported driver in this build: {0:?}")]
    UnsupportedDriver(DbConfig),
    #[error(transparent)]
    Connect(#[from] sqlx::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// All stores the rest of the crate depends on, built once and cloned around (every store handle
/// is `Arc`-backed, so cloning `Core` is cheap).
#[derive(Clone)]
pub struct Core {
    pub pool: PgPool,
    pub users: UserStore,
    pub roles: RoleStore,
    pub problems: ProblemStore,
    pub contests: ContestStore,
    pub participants: ParticipantStore,
    pub solutions: SolutionStore,
    pub reports: ReportStore,
    pub contest_problems: ContestProblemStore,
    pub contest_solutions: ContestSolutionStore,
}

impl Core {
    /// Connects to the configured database and builds every store (creating tables on first run).
    #[tracing::instrument(skip_all)]
    pub async fn new(config: &Config) -> Result<Self, CoreError> {
        let url = config.db.postgres_url().ok_or_else(|| CoreError::UnsupportedDriver(config.db.clone()))?;
        let pool = PgPoolOptions::new().max_connections(16).connect(&url).await?;

        let gap_expiry = chrono::Duration::seconds(config.store.gap_expiry_secs as i64);

        let users = PgObjectStoreBuilder::new(pool.clone(), "user")
            .with_hooks(UserHooks::default())
            .with_gap_expiry(gap_expiry)
            .try_build()
            .await?;
        let roles = PgObjectStoreBuilder::new(pool.clone(), "role")
            .with_hooks(crate::models::role::RoleHooks::default())
            .with_gap_expiry(gap_expiry)
            .try_build()
            .await?;
        let problems = PgObjectStoreBuilder::new(pool.clone(), "problem").with_gap_expiry(gap_expiry).try_build().await?;
        let contests = PgObjectStoreBuilder::new(pool.clone(), "contest").with_gap_expiry(gap_expiry).try_build().await?;
        let participants = PgObjectStoreBuilder::new(pool.clone(), "contest_participant")
            .with_gap_expiry(gap_expiry)
            .try_build()
            .await?;
        let solutions = PgObjectStoreBuilder::new(pool.clone(), "solution").with_gap_expiry(gap_expiry).try_build().await?;
        let reports = PgObjectStoreBuilder::new(pool.clone(), "report")
            .with_hooks(ReportHooks::default())
            .with_gap_expiry(gap_expiry)
            .try_build()
            .await?;
        let contest_problems = PgObjectStoreBuilder::new(pool.clone(), "contest_problem")
            .with_gap_expiry(gap_expiry)
            .try_build()
            .await?;
        let contest_solutions = PgObjectStoreBuilder::new(pool.clone(), "contest_solution")
            .with_gap_expiry(gap_expiry)
            .try_build()
            .await?;

        Ok(Self {
            pool,
            users,
            roles,
            problems,
            contests,
            participants,
            solutions,
            reports,
            contest_problems,
            contest_solutions,
        })
    }

    /// Builds an [`Invoker`] wired to this core's Reports/Solutions/Problems stores.
    pub fn invoker<G: Grader + Clone>(&self, grader: G, config: crate::config::InvokerConfig) -> Invoker<G> {
        Invoker::new(self.reports.clone(), self.solutions.clone(), self.problems.clone(), grader, config)
    }
}
