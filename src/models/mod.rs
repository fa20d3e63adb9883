//! Concrete stores: one module per entity, each a thin `Entity` impl plus (where the entity needs
//! one) a [`crate::store::StoreHooks`] capability record maintaining secondary indexes.

pub mod contest;
pub mod contest_problem;
pub mod contest_solution;
pub mod participant;
pub mod problem;
pub mod report;
pub mod role;
pub mod solution;
pub mod user;

pub use contest::{Contest, ContestConfig, ContestStore};
pub use contest_problem::{ContestProblem, ContestProblemStore};
pub use contest_solution::{ContestSolution, ContestSolutionStore};
pub use participant::{ContestParticipant, ParticipantConfig, ParticipantKind, ParticipantStore};
pub use problem::{Problem, ProblemStore};
pub use report::{Report, ReportStore, Verdict};
pub use role::{Role, RoleStore};
pub use solution::{Solution, SolutionStore};
pub use user::{User, UserHooks, UserStore};
