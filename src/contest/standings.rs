//! Standings manager: ICPC-style scoring, penalty and ranking.

use crate::models::contest_problem::ContestProblem;
use crate::models::contest_solution::ContestSolution;
use crate::models::participant::{ContestParticipant, ParticipantKind};
use crate::models::problem::ProblemStore;
use crate::models::report::{ReportStore, ReportStoreExt, Verdict};
use crate::models::solution::SolutionStore;
use crate::models::{Contest, Problem, Report, Solution};
use crate::store::ObjectStore;
use crate::types::{ObjectId, UnixTime};

#[derive(Debug, Clone)]
pub struct StandingsColumn {
    pub problem_id: ObjectId,
    pub code: String,
}

#[derive(Debug, Clone)]
pub struct StandingsCell {
    pub attempts: i64,
    /// `None` until at least one (non-compilation-error) attempt has been judged; `Some(verdict)`
    /// with `verdict == Verdict::Queued` represents a still-pending attempt.
    pub verdict: Option<Verdict>,
    pub time: UnixTime,
}

#[derive(Debug, Clone)]
pub struct StandingsRow {
    pub participant_id: ObjectId,
    pub account_id: ObjectId,
    pub kind: ParticipantKind,
    /// One entry per [`StandingsColumn`], `None` where the participant has no attempt at all.
    pub cells: Vec<Option<StandingsCell>>,
    pub score: i64,
    pub penalty: i64,
}

#[derive(Debug, Clone)]
pub struct ContestStandings {
    pub columns: Vec<StandingsColumn>,
    pub rows: Vec<StandingsRow>,
}

fn kind_order(kind: ParticipantKind) -> u8 {
    match kind {
        ParticipantKind::Manager => 0,
        ParticipantKind::Regular => 1,
        ParticipantKind::Upsolving => 2,
    }
}

/// Total order used to rank standings rows: `(kind_order, -score, penalty)` ascending (testable
/// property 6). Reflexive/antisymmetric/transitive because it's a lexicographic comparison over
/// totally-ordered keys; `Vec::sort_by` is a stable sort, so rows that compare equal keep their
/// relative input order.
fn compare_rows(a: &StandingsRow, b: &StandingsRow) -> std::cmp::Ordering {
    kind_order(a.kind)
        .cmp(&kind_order(b.kind))
        .then(b.score.cmp(&a.score))
        .then(a.penalty.cmp(&b.penalty))
}

fn effective_begin_time(contest: &Contest, participant: &ContestParticipant) -> UnixTime {
    if participant.kind == ParticipantKind::Regular {
        if let Some(begin_time) = participant.config.begin_time {
            return begin_time;
        }
    }
    contest.config.begin_time
}

/// Narrow lookup surfaces the standings builder needs, so its scoring logic can be unit tested
/// against plain in-memory maps instead of a live `PgObjectStore`.
pub trait SolutionLookup {
    fn get_solution(&self, id: ObjectId) -> Option<Solution>;
}

impl SolutionLookup for SolutionStore {
    fn get_solution(&self, id: ObjectId) -> Option<Solution> {
        self.get(id)
    }
}

pub trait ReportLookup {
    fn latest_report(&self, solution_id: ObjectId) -> Option<Report>;
}

impl ReportLookup for ReportStore {
    fn latest_report(&self, solution_id: ObjectId) -> Option<Report> {
        self.latest_by_solution_id(solution_id)
    }
}

pub trait ProblemLookup {
    fn get_problem(&self, id: ObjectId) -> Option<Problem>;
}

impl ProblemLookup for ProblemStore {
    fn get_problem(&self, id: ObjectId) -> Option<Problem> {
        self.get(id)
    }
}

fn problem_points(problem_id: ObjectId, contest_problem: &ContestProblem, problems: &impl ProblemLookup) -> i64 {
    if let Some(points) = contest_problem.config.get("points").and_then(|v| v.as_i64()) {
        return points;
    }
    problems.get_problem(problem_id).map(|p| p.points()).unwrap_or(1)
}

/// Computes a cell for one `(participant, problem)` pair by walking its solutions in submission
/// order, skipping frozen and compilation-error attempts, and stopping at the first accepted one.
fn compute_cell(
    solution_ids: &[ObjectId],
    solutions: &impl SolutionLookup,
    reports: &impl ReportLookup,
    now: UnixTime,
    effective_begin_time: UnixTime,
) -> Option<StandingsCell> {
    let mut ordered: Vec<_> = solution_ids.iter().filter_map(|&id| solutions.get_solution(id)).filter(|s| s.create_time < now).collect();
    ordered.sort_by_key(|s| (s.create_time, s.id));

    let mut attempts = 0i64;
    let mut verdict = None;
    let mut time = 0;

    for solution in &ordered {
        match reports.latest_report(solution.id) {
            None => {
                // Pending: counts as an attempt with the Queued sentinel and blocks the rest of
                // this column from being visible until it resolves.
                attempts += 1;
                verdict = Some(Verdict::Queued);
                break;
            }
            Some(report) if report.verdict == Verdict::CompilationError => {
                continue;
            }
            Some(report) => {
                attempts += 1;
                verdict = Some(report.verdict);
                time = (solution.create_time - effective_begin_time).max(0);
                if report.verdict == Verdict::Accepted {
                    break;
                }
            }
        }
    }

    if attempts == 0 {
        None
    } else {
        Some(StandingsCell { attempts, verdict, time })
    }
}

pub struct StandingsInput<'a, S, R, P> {
    pub contest: &'a Contest,
    pub participants: &'a [ContestParticipant],
    pub contest_problems: &'a [ContestProblem],
    pub contest_solutions: &'a [ContestSolution],
    pub solutions: &'a S,
    pub reports: &'a R,
    pub problems: &'a P,
    pub now: UnixTime,
}

/// Builds `ContestStandings` for `(contest, now)`. Unreadable Solution/Report rows are silently
/// skipped: partial standings are preferred over no standings at all.
pub fn build_standings<S: SolutionLookup, R: ReportLookup, P: ProblemLookup>(input: StandingsInput<'_, S, R, P>) -> ContestStandings {
    let StandingsInput {
        contest,
        participants,
        contest_problems,
        contest_solutions,
        solutions,
        reports,
        problems,
        now,
    } = input;

    let mut sorted_problems: Vec<&ContestProblem> = contest_problems.iter().collect();
    sorted_problems.sort_by(|a, b| a.code.cmp(&b.code));

    let columns: Vec<StandingsColumn> = sorted_problems
        .iter()
        .map(|cp| StandingsColumn {
            problem_id: cp.problem_id,
            code: cp.code.clone(),
        })
        .collect();

    let mut rows: Vec<StandingsRow> = Vec::with_capacity(participants.len());

    for participant in participants {
        let begin_time = effective_begin_time(contest, participant);
        let mut cells = Vec::with_capacity(columns.len());
        let mut score = 0i64;
        let mut penalty = 0i64;

        for contest_problem in &sorted_problems {
            let solution_ids: Vec<ObjectId> = contest_solutions
                .iter()
                .filter(|cs| cs.participant_id == participant.id && cs.problem_id == contest_problem.problem_id)
                .map(|cs| cs.solution_id)
                .collect();

            let cell = compute_cell(&solution_ids, solutions, reports, now, begin_time);

            if let Some(cell) = &cell {
                if cell.verdict == Some(Verdict::Accepted) {
                    score += problem_points(contest_problem.problem_id, contest_problem, problems);
                    penalty += (cell.attempts - 1) * 20 + cell.time / 60;
                }
            }

            cells.push(cell);
        }

        rows.push(StandingsRow {
            participant_id: participant.id,
            account_id: participant.account_id,
            kind: participant.kind,
            cells,
            score,
            penalty,
        });
    }

    rows.sort_by(compare_rows);

    ContestStandings { columns, rows }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::contest::ContestConfig;
    use std::collections::HashMap;

    struct FakeSolutions(HashMap<ObjectId, Solution>);
    impl SolutionLookup for FakeSolutions {
        fn get_solution(&self, id: ObjectId) -> Option<Solution> {
            self.0.get(&id).cloned()
        }
    }

    struct FakeReports(HashMap<ObjectId, Report>);
    impl ReportLookup for FakeReports {
        fn latest_report(&self, solution_id: ObjectId) -> Option<Report> {
            self.0.get(&solution_id).cloned()
        }
    }

    fn solution(id: ObjectId, create_time: UnixTime) -> Solution {
        Solution {
            id,
            user_id: 1,
            problem_id: 1,
            contest_id: Some(1),
            source_code: String::new(),
            create_time,
        }
    }

    fn report(id: ObjectId, solution_id: ObjectId, verdict: Verdict, create_time: UnixTime) -> Report {
        Report {
            id,
            solution_id,
            verdict,
            create_time,
            data: serde_json::Value::Null,
        }
    }

    #[test]
    fn kind_order_ranks_managers_first() {
        assert!(kind_order(ParticipantKind::Manager) < kind_order(ParticipantKind::Regular));
        assert!(kind_order(ParticipantKind::Regular) < kind_order(ParticipantKind::Upsolving));
    }

    #[test]
    fn compare_rows_breaks_ties_by_penalty_then_is_stable() {
        let row = |score: i64, penalty: i64| StandingsRow {
            participant_id: 0,
            account_id: 0,
            kind: ParticipantKind::Regular,
            cells: vec![],
            score,
            penalty,
        };

        let mut rows = vec![row(10, 30), row(20, 5), row(20, 1)];
        rows.sort_by(compare_rows);

        assert_eq!((rows[0].score, rows[0].penalty), (20, 1));
        assert_eq!((rows[1].score, rows[1].penalty), (20, 5));
        assert_eq!((rows[2].score, rows[2].penalty), (10, 30));
    }

    #[test]
    fn s3_scenario_scores_and_penalty() {
        // Contest begin=1000, duration=3600. One Regular participant: WrongAnswer at t=1100,
        // Accepted at t=1200. Expected score=1, penalty=(2-1)*20 + floor((1200-1000)/60) = 23.
        let _contest = Contest {
            id: 1,
            owner_id: None,
            config: ContestConfig {
                begin_time: 1000,
                duration: 3600,
                enable_registration: false,
                enable_upsolving: false,
            },
        };

        let solutions = FakeSolutions(HashMap::from([(1, solution(1, 1100)), (2, solution(2, 1200))]));
        let reports = FakeReports(HashMap::from([
            (1, report(1, 1, Verdict::WrongAnswer, 1100)),
            (2, report(2, 2, Verdict::Accepted, 1200)),
        ]));

        let cell = compute_cell(&[1, 2], &solutions, &reports, 1800, 1000);
        let cell = cell.expect("attempts were made");

        assert_eq!(cell.attempts, 2);
        assert_eq!(cell.verdict, Some(Verdict::Accepted));
        assert_eq!(cell.time, 200);

        let penalty = (cell.attempts - 1) * 20 + cell.time / 60;
        assert_eq!(penalty, 23);
    }

    #[test]
    fn frozen_solutions_are_ignored() {
        let solutions = FakeSolutions(HashMap::from([(1, solution(1, 2000))]));
        let reports = FakeReports(HashMap::new());

        // now == create_time: frozen, since solutions at or after `now` are not yet visible.
        let cell = compute_cell(&[1], &solutions, &reports, 2000, 1000);
        assert!(cell.is_none());
    }

    #[test]
    fn compilation_error_does_not_count_as_an_attempt() {
        let solutions = FakeSolutions(HashMap::from([(1, solution(1, 1100)), (2, solution(2, 1200))]));
        let reports = FakeReports(HashMap::from([
            (1, report(1, 1, Verdict::CompilationError, 1100)),
            (2, report(2, 2, Verdict::Accepted, 1200)),
        ]));

        let cell = compute_cell(&[1, 2], &solutions, &reports, 1800, 1000).unwrap();
        assert_eq!(cell.attempts, 1);
        assert_eq!(cell.verdict, Some(Verdict::Accepted));
    }

    #[test]
    fn pending_report_blocks_later_attempts() {
        let solutions = FakeSolutions(HashMap::from([(1, solution(1, 1100)), (2, solution(2, 1200))]));
        // No report for solution 1: it's still queued/running.
        let reports = FakeReports(HashMap::from([(2, report(2, 2, Verdict::Accepted, 1200))]));

        let cell = compute_cell(&[1, 2], &solutions, &reports, 1800, 1000).unwrap();
        assert_eq!(cell.attempts, 1);
        assert_eq!(cell.verdict, Some(Verdict::Queued));
    }

    #[test]
    fn accepted_stops_the_column_even_with_further_solutions() {
        let solutions = FakeSolutions(HashMap::from([(1, solution(1, 1100)), (2, solution(2, 1200)), (3, solution(3, 1300))]));
        let reports = FakeReports(HashMap::from([
            (1, report(1, 1, Verdict::WrongAnswer, 1100)),
            (2, report(2, 2, Verdict::Accepted, 1200)),
            (3, report(3, 3, Verdict::WrongAnswer, 1300)),
        ]));

        let cell = compute_cell(&[1, 2, 3], &solutions, &reports, 1800, 1000).unwrap();
        assert_eq!(cell.attempts, 2);
        assert_eq!(cell.verdict, Some(Verdict::Accepted));
    }
}
