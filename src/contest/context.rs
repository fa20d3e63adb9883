//! Contest context manager.
//!
//! `build_context` is a pure function of `(contest, participants, now, caller_permissions)`: it
//! never touches a store, so it can be unit tested directly and reused verbatim by both the HTTP
//! layer (out of scope here) and the standings manager.

use crate::models::contest::Stage;
use crate::models::{Contest, ContestParticipant, ParticipantKind};
use crate::permission::PermissionSet;
use crate::types::{ObjectId, UnixTime};

/// Permission names synthesized by the contest context manager. Role-derived permissions
/// (`login`, `register_contests`, ...) live in [`crate::models::role`]; these are the
/// contest-scoped ones layered on top.
pub mod permission_names {
    pub const OBSERVE_CONTEST: &str = "observe_contest";
    pub const REGISTER_CONTEST: &str = "register_contest";
    pub const DEREGISTER_CONTEST: &str = "deregister_contest";
    pub const DELETE_CONTEST: &str = "delete_contest";
    pub const OBSERVE_CONTEST_PROBLEMS: &str = "observe_contest_problems";
    pub const CREATE_CONTEST_PROBLEM: &str = "create_contest_problem";
    pub const UPDATE_CONTEST_PROBLEM: &str = "update_contest_problem";
    pub const DELETE_CONTEST_PROBLEM: &str = "delete_contest_problem";
    pub const OBSERVE_CONTEST_PARTICIPANTS: &str = "observe_contest_participants";
    pub const CREATE_CONTEST_PARTICIPANT: &str = "create_contest_participant";
    pub const UPDATE_CONTEST_PARTICIPANT: &str = "update_contest_participant";
    pub const DELETE_CONTEST_PARTICIPANT: &str = "delete_contest_participant";
    pub const OBSERVE_CONTEST_SOLUTIONS: &str = "observe_contest_solutions";
    pub const SUBMIT_CONTEST_SOLUTION: &str = "submit_contest_solution";
    pub const UPDATE_CONTEST_SOLUTION: &str = "update_contest_solution";
    pub const DELETE_CONTEST_SOLUTION: &str = "delete_contest_solution";
    pub const OBSERVE_CONTEST_STANDINGS: &str = "observe_contest_standings";
    pub const OBSERVE_FULL_STANDINGS: &str = "observe_full_standings";
    /// `register_contests`, the account-wide permission checked, not granted, by the contest
    /// context manager.
    pub const REGISTER_CONTESTS: &str = "register_contests";
}
use permission_names as p;

#[derive(Debug, Clone)]
pub struct ContestContext {
    pub contest: Contest,
    /// The caller's real and synthesized participations.
    pub participants: Vec<ContestParticipant>,
    pub permissions: PermissionSet,
    pub stage: Stage,
    pub now: UnixTime,
    pub effective_participant: Option<ContestParticipant>,
}

impl ContestContext {
    /// Overrides the effective participant by id, as long as it is one of the caller's own
    /// participations.
    pub fn with_effective_participant_override(mut self, participant_id: ObjectId) -> Self {
        if let Some(p) = self.participants.iter().find(|p| p.id == participant_id) {
            self.effective_participant = Some(p.clone());
        }
        self
    }
}

fn kind_matches_stage(kind: ParticipantKind, stage: Stage) -> bool {
    match kind {
        ParticipantKind::Manager => true,
        ParticipantKind::Regular => stage == Stage::Started,
        ParticipantKind::Upsolving => stage == Stage::Finished,
    }
}

fn synthetic_participant(contest_id: ObjectId, account_id: ObjectId, kind: ParticipantKind) -> ContestParticipant {
    ContestParticipant {
        id: 0,
        contest_id,
        account_id,
        kind,
        config: Default::default(),
    }
}

/// Builds a [`ContestContext`] for one caller, given their real participations in this contest
/// and their account-wide [`PermissionSet`].
///
/// `participants` must already be filtered to the caller's own participations in `contest`.
pub fn build_context(
    contest: Contest,
    mut participants: Vec<ContestParticipant>,
    now: UnixTime,
    caller_account_id: ObjectId,
    caller_permissions: &PermissionSet,
) -> ContestContext {
    let stage = contest.stage_at(now);
    let mut permissions = PermissionSet::new();

    let has_regular = participants.iter().any(|p| p.kind == ParticipantKind::Regular);
    let has_upsolving = participants.iter().any(|p| p.kind == ParticipantKind::Upsolving);
    let has_manager = participants.iter().any(|p| p.kind == ParticipantKind::Manager);

    for participant in &participants {
        apply_participant_permissions(participant.kind, stage, &mut permissions);
    }

    let is_owner = contest.owner_id == Some(caller_account_id);
    if is_owner {
        permissions.add([p::DELETE_CONTEST]);
        if !has_manager {
            let manager = synthetic_participant(contest.id, caller_account_id, ParticipantKind::Manager);
            apply_participant_permissions(ParticipantKind::Manager, stage, &mut permissions);
            participants.push(manager);
        }
    }

    if !has_regular && stage == Stage::NotStarted && contest.config.enable_registration {
        permissions.add([p::OBSERVE_CONTEST]);
        if caller_permissions.has(p::REGISTER_CONTESTS) {
            permissions.add([p::REGISTER_CONTEST]);
        }
    }

    if !has_upsolving && stage == Stage::Finished && contest.config.enable_upsolving && (has_regular || contest.config.enable_registration) {
        let upsolving = synthetic_participant(contest.id, caller_account_id, ParticipantKind::Upsolving);
        apply_participant_permissions(ParticipantKind::Upsolving, stage, &mut permissions);
        participants.push(upsolving);
    }

    let effective_participant = participants.iter().find(|p| kind_matches_stage(p.kind, stage)).cloned();

    ContestContext {
        contest,
        participants,
        permissions,
        stage,
        now,
        effective_participant,
    }
}

fn apply_participant_permissions(kind: ParticipantKind, stage: Stage, permissions: &mut PermissionSet) {
    match (kind, stage) {
        (ParticipantKind::Manager, _) => permissions.add([
            p::OBSERVE_CONTEST,
            p::OBSERVE_CONTEST_PROBLEMS,
            p::CREATE_CONTEST_PROBLEM,
            p::UPDATE_CONTEST_PROBLEM,
            p::DELETE_CONTEST_PROBLEM,
            p::OBSERVE_CONTEST_PARTICIPANTS,
            p::CREATE_CONTEST_PARTICIPANT,
            p::UPDATE_CONTEST_PARTICIPANT,
            p::DELETE_CONTEST_PARTICIPANT,
            p::OBSERVE_CONTEST_SOLUTIONS,
            p::SUBMIT_CONTEST_SOLUTION,
            p::UPDATE_CONTEST_SOLUTION,
            p::DELETE_CONTEST_SOLUTION,
            p::OBSERVE_CONTEST_STANDINGS,
            p::OBSERVE_FULL_STANDINGS,
        ]),
        (ParticipantKind::Regular, Stage::Started) => permissions.add([
            p::OBSERVE_CONTEST,
            p::OBSERVE_CONTEST_PROBLEMS,
            p::OBSERVE_CONTEST_SOLUTIONS,
            p::SUBMIT_CONTEST_SOLUTION,
            p::OBSERVE_CONTEST_STANDINGS,
        ]),
        (ParticipantKind::Regular, Stage::Finished) => {
            permissions.add([p::OBSERVE_CONTEST, p::OBSERVE_CONTEST_PROBLEMS, p::OBSERVE_CONTEST_STANDINGS])
        }
        (ParticipantKind::Regular, Stage::NotStarted) => permissions.add([p::OBSERVE_CONTEST, p::DEREGISTER_CONTEST]),
        (ParticipantKind::Regular, Stage::NotPlanned) => permissions.add([p::OBSERVE_CONTEST]),
        (ParticipantKind::Upsolving, Stage::Finished) => permissions.add([
            p::OBSERVE_CONTEST,
            p::OBSERVE_CONTEST_PROBLEMS,
            p::OBSERVE_CONTEST_SOLUTIONS,
            p::SUBMIT_CONTEST_SOLUTION,
            p::OBSERVE_CONTEST_STANDINGS,
        ]),
        (ParticipantKind::Upsolving, _) => permissions.add([p::OBSERVE_CONTEST]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::contest::ContestConfig;
    use crate::models::participant::ParticipantConfig;

    fn contest(begin_time: UnixTime, duration: UnixTime, owner_id: Option<ObjectId>) -> Contest {
        Contest {
            id: 1,
            owner_id,
            config: ContestConfig {
                begin_time,
                duration,
                enable_registration: true,
                enable_upsolving: true,
            },
        }
    }

    fn participant(kind: ParticipantKind, begin_time: Option<UnixTime>) -> ContestParticipant {
        ContestParticipant {
            id: 10,
            contest_id: 1,
            account_id: 42,
            kind,
            config: ParticipantConfig { begin_time },
        }
    }

    #[test]
    fn regular_started_can_submit() {
        let ctx = build_context(contest(1000, 3600, None), vec![participant(ParticipantKind::Regular, None)], 1500, 42, &PermissionSet::new());
        assert_eq!(ctx.stage, Stage::Started);
        assert!(ctx.permissions.has(p::SUBMIT_CONTEST_SOLUTION));
        assert!(ctx.effective_participant.is_some());
    }

    #[test]
    fn regular_finished_cannot_submit() {
        let ctx = build_context(contest(1000, 100, None), vec![participant(ParticipantKind::Regular, None)], 2000, 42, &PermissionSet::new());
        assert_eq!(ctx.stage, Stage::Finished);
        assert!(!ctx.permissions.has(p::SUBMIT_CONTEST_SOLUTION));
        assert!(ctx.permissions.has(p::OBSERVE_CONTEST));
    }

    #[test]
    fn owner_gets_delete_and_synthesized_manager() {
        let ctx = build_context(contest(1000, 100, Some(42)), vec![], 2000, 42, &PermissionSet::new());
        assert!(ctx.permissions.has(p::DELETE_CONTEST));
        assert!(ctx.participants.iter().any(|pt| pt.kind == ParticipantKind::Manager));
        assert_eq!(ctx.effective_participant.unwrap().kind, ParticipantKind::Manager);
    }

    #[test]
    fn s5_scenario_synthesizes_upsolving_participant() {
        // Caller has no participation in a Finished contest with enable_upsolving and
        // enable_registration both true.
        let ctx = build_context(contest(1000, 100, None), vec![], 2000, 42, &PermissionSet::new());

        assert_eq!(ctx.stage, Stage::Finished);
        assert!(ctx.participants.iter().any(|pt| pt.kind == ParticipantKind::Upsolving));
        assert!(ctx.permissions.has(p::SUBMIT_CONTEST_SOLUTION));
    }

    #[test]
    fn unregistered_not_started_with_registration_enabled_can_register() {
        let mut caller_permissions = PermissionSet::new();
        caller_permissions.add([p::REGISTER_CONTESTS]);

        let ctx = build_context(contest(1000, 100, None), vec![], 500, 42, &caller_permissions);

        assert_eq!(ctx.stage, Stage::NotStarted);
        assert!(ctx.permissions.has(p::OBSERVE_CONTEST));
        assert!(ctx.permissions.has(p::REGISTER_CONTEST));
    }

    #[test]
    fn build_context_is_deterministic() {
        let c = contest(1000, 3600, Some(7));
        let participants = vec![participant(ParticipantKind::Regular, Some(950))];
        let permissions = PermissionSet::new();

        let a = build_context(c.clone(), participants.clone(), 1200, 42, &permissions);
        let b = build_context(c, participants, 1200, 42, &permissions);

        assert_eq!(a.stage, b.stage);
        assert_eq!(a.permissions, b.permissions);
    }
}
