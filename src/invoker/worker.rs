use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::config::InvokerConfig;
use crate::error::InvokerError;
use crate::models::problem::ProblemStore;
use crate::models::report::{Report, ReportStore, ReportStoreExt, Verdict};
use crate::models::solution::{Solution, SolutionStore};
use crate::store::ObjectStore;
use crate::types::unix_time;

/// Terminal verdict produced by grading one solution.
#[derive(Debug, Clone)]
pub struct GradeResult {
    pub verdict: Verdict,
    pub data: serde_json::Value,
}

/// The language-specific grader, an external collaborator. This crate owns the claim/publish
/// pipeline around it, not the grading itself.
#[async_trait]
pub trait Grader: Send + Sync {
    async fn grade(&self, solution: &Solution) -> Result<GradeResult, InvokerError>;
}

/// One grading worker. Cheap to clone (every field is a cheaply-cloneable store handle or
/// `Arc`-backed token); typically run as several tokio tasks sharing the same stores.
#[derive(Clone)]
pub struct Invoker<G: Grader + Clone> {
    reports: ReportStore,
    solutions: SolutionStore,
    problems: ProblemStore,
    grader: G,
    config: InvokerConfig,
    cancel: CancellationToken,
}

impl<G: Grader + Clone> Invoker<G> {
    pub fn new(reports: ReportStore, solutions: SolutionStore, problems: ProblemStore, grader: G, config: InvokerConfig) -> Self {
        Self {
            reports,
            solutions,
            problems,
            grader,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Signals the loop started by [`Invoker::run`] to stop after its current tick.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Runs the tick loop until [`Invoker::stop`] is called.
    #[tracing::instrument(skip_all)]
    pub async fn run(&self) {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(self.config.poll_interval_secs.max(1)));
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return,
                _ = interval.tick() => {}
            }

            match self.tick().await {
                Ok(true) => {}
                Ok(false) => {}
                Err(err) => tracing::warn!(error = %err, "invoker tick failed"),
            }
        }
    }

    /// Runs a single tick: claim, load context, grade, publish. Returns `Ok(true)` if a report
    /// was claimed and graded, `Ok(false)` if the queue was empty.
    #[tracing::instrument(skip_all)]
    pub async fn tick(&self) -> Result<bool, InvokerError> {
        let claimed = match self.claim().await? {
            Some(report) => report,
            None => return Ok(false),
        };

        match self.load_solution(&claimed).await {
            Ok(solution) => {
                let result = self.grade(&solution).await;
                self.publish(claimed.solution_id, result).await?;
            }
            Err(err) => {
                tracing::warn!(report_id = claimed.id, error = %err, "abandoning report: solution unavailable");
                self.publish(
                    claimed.solution_id,
                    Err(err),
                )
                .await?;
            }
        }

        Ok(true)
    }

    /// Step 1, "Claim": picks the lowest-id `Queued` report and transitions it to `Running` with
    /// a conditional update, so a worker racing another on the same report loses the race cleanly
    /// instead of double-grading.
    async fn claim(&self) -> Result<Option<Report>, InvokerError> {
        self.reports.sync().await?;

        for candidate in self.reports.queued() {
            let mut running = candidate.clone();
            running.verdict = Verdict::Running;

            if self.reports.update_if(running.clone(), None, "verdict", "queued").await? {
                return Ok(Some(running));
            }
            // Another worker won the race for this report; try the next candidate.
        }

        Ok(None)
    }

    /// Step 2, "Load context": syncs Solutions/Problems and looks up the Solution the claimed
    /// report refers to.
    async fn load_solution(&self, report: &Report) -> Result<Solution, InvokerError> {
        self.solutions.sync().await?;
        self.problems.sync().await?;

        self.solutions.get(report.solution_id).ok_or(InvokerError::MissingSolution(report.solution_id))
    }

    /// Step 3, "Grade": invokes the external grader.
    async fn grade(&self, solution: &Solution) -> Result<GradeResult, InvokerError> {
        self.grader.grade(solution).await
    }

    /// Step 4, "Publish": appends a *new* Report event carrying the terminal verdict - the old
    /// `Running` report is left alone, since only the latest report is ever observed externally.
    async fn publish(&self, solution_id: crate::types::ObjectId, result: Result<GradeResult, InvokerError>) -> Result<(), InvokerError> {
        let (verdict, data) = match result {
            Ok(result) => (result.verdict, result.data),
            // A failed grade produces a terminal error-verdict report rather than leaving Running.
            Err(err) => (Verdict::Failed, serde_json::json!({ "error": err.to_string() })),
        };

        let report = Report {
            id: 0,
            solution_id,
            verdict,
            create_time: unix_time(chrono::Utc::now()),
            data,
        };

        self.reports.create(report, None).await?;
        Ok(())
    }
}
