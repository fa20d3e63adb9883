//! Report entity and the verdict state machine: `Queued(0) -> Running(-1) -> Terminal`. Only the
//! latest report per solution is observed externally; grading attempts append a new report
//! rather than mutating an old one.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::store::postgres::PgObjectStore;
use crate::store::{Entity, ObjectStore, StoreHooks};
use crate::types::{ObjectId, UnixTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Queued,
    Running,
    Accepted,
    WrongAnswer,
    CompilationError,
    TimeLimitExceeded,
    MemoryLimitExceeded,
    RuntimeError,
    PresentationError,
    SecurityViolation,
    Failed,
}

impl Verdict {
    /// The reserved sentinel codes: `0 = Queued`, `-1 = Running`. Every other verdict is terminal.
    pub fn code(self) -> i32 {
        match self {
            Verdict::Queued => 0,
            Verdict::Running => -1,
            Verdict::Accepted => 1,
            Verdict::WrongAnswer => 2,
            Verdict::CompilationError => 3,
            Verdict::TimeLimitExceeded => 4,
            Verdict::MemoryLimitExceeded => 5,
            Verdict::RuntimeError => 6,
            Verdict::PresentationError => 7,
            Verdict::SecurityViolation => 8,
            Verdict::Failed => 9,
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, Verdict::Queued | Verdict::Running)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    #[serde(default)]
    pub id: ObjectId,
    pub solution_id: ObjectId,
    pub verdict: Verdict,
    pub create_time: UnixTime,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Entity for Report {
    fn id(&self) -> ObjectId {
        self.id
    }
    fn set_id(&mut self, id: ObjectId) {
        self.id = id;
    }
}

/// Maintains, per solution, the ordered list of report ids - used both to find "the latest
/// report" (standings, HTTP `GET /solutions/:id`) and to find the queued reports the invoker
/// claims from.
#[derive(Default)]
pub struct ReportHooks {
    by_solution: RwLock<HashMap<ObjectId, Vec<ObjectId>>>,
}

impl StoreHooks<Report> for ReportHooks {
    fn on_create(&self, object: &Report) {
        self.by_solution.write().unwrap().entry(object.solution_id).or_default().push(object.id);
    }
    fn on_update(&self, _previous: &Report, object: &Report) {
        let mut by_solution = self.by_solution.write().unwrap();
        let ids = by_solution.entry(object.solution_id).or_default();
        if !ids.contains(&object.id) {
            ids.push(object.id);
        }
    }
    fn on_delete(&self, object: &Report) {
        if let Some(ids) = self.by_solution.write().unwrap().get_mut(&object.solution_id) {
            ids.retain(|&id| id != object.id);
        }
    }
}

pub type ReportStore = PgObjectStore<Report, ReportHooks>;

pub trait ReportStoreExt {
    /// All reports for a solution, ordered by id (== creation order, since reports are never
    /// reordered - only appended).
    fn by_solution_id(&self, solution_id: ObjectId) -> Vec<Report>;

    /// The most recently created report for a solution, or `None` if it hasn't been graded yet.
    fn latest_by_solution_id(&self, solution_id: ObjectId) -> Option<Report>;

    /// Every report whose verdict is still `Queued`, ordered by id ascending - the invoker's
    /// claim candidates.
    fn queued(&self) -> Vec<Report>;
}

impl ReportStoreExt for ReportStore {
    fn by_solution_id(&self, solution_id: ObjectId) -> Vec<Report> {
        let ids = self.hooks().by_solution.read().unwrap().get(&solution_id).cloned().unwrap_or_default();
        let mut reports: Vec<Report> = ids.into_iter().filter_map(|id| self.get(id)).collect();
        reports.sort_by_key(|r| r.id);
        reports
    }

    fn latest_by_solution_id(&self, solution_id: ObjectId) -> Option<Report> {
        self.by_solution_id(solution_id).into_iter().next_back()
    }

    fn queued(&self) -> Vec<Report> {
        let mut reports: Vec<Report> = self.all().into_iter().filter(|r| r.verdict == Verdict::Queued).collect();
        reports.sort_by_key(|r| r.id);
        reports
    }
}
