//! Contest entity and stage derivation.

use serde::{Deserialize, Serialize};

use crate::store::postgres::PgObjectStore;
use crate::store::{Entity, NoHooks};
use crate::types::{ObjectId, UnixTime};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContestConfig {
    pub begin_time: UnixTime,
    pub duration: UnixTime,
    #[serde(default)]
    pub enable_registration: bool,
    #[serde(default)]
    pub enable_upsolving: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contest {
    #[serde(default)]
    pub id: ObjectId,
    pub owner_id: Option<ObjectId>,
    pub config: ContestConfig,
}

impl Entity for Contest {
    fn id(&self) -> ObjectId {
        self.id
    }
    fn set_id(&mut self, id: ObjectId) {
        self.id = id;
    }
}

/// Contest lifecycle phase, derived from `now` and the contest's configured window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    NotPlanned,
    NotStarted,
    Started,
    Finished,
}

impl Contest {
    /// Stage derivation:
    /// - `begin_time == 0` → `NotPlanned`.
    /// - `now < begin_time` → `NotStarted`.
    /// - `begin_time <= now < begin_time + duration` → `Started`.
    /// - `now >= begin_time + duration` → `Finished`.
    ///
    /// Monotone in `now` for fixed config: the three thresholds `begin_time` and
    /// `begin_time + duration` are visited in order as `now` increases.
    pub fn stage_at(&self, now: UnixTime) -> Stage {
        let begin = self.config.begin_time;
        if begin == 0 {
            return Stage::NotPlanned;
        }
        let end = begin + self.config.duration;
        if now < begin {
            Stage::NotStarted
        } else if now < end {
            Stage::Started
        } else {
            Stage::Finished
        }
    }
}

pub type ContestStore = PgObjectStore<Contest, NoHooks>;

#[cfg(test)]
mod tests {
    use super::*;

    fn contest(begin_time: UnixTime, duration: UnixTime) -> Contest {
        Contest {
            id: 1,
            owner_id: None,
            config: ContestConfig {
                begin_time,
                duration,
                enable_registration: false,
                enable_upsolving: false,
            },
        }
    }

    #[test]
    fn stage_is_not_planned_when_begin_time_is_zero() {
        assert_eq!(contest(0, 100).stage_at(1000), Stage::NotPlanned);
    }

    #[test]
    fn stage_s4_scenario() {
        let c = contest(1000, 100);
        assert_eq!(c.stage_at(999), Stage::NotStarted);
        assert_eq!(c.stage_at(1000), Stage::Started);
        assert_eq!(c.stage_at(1100), Stage::Finished);
    }

    #[test]
    fn stage_is_monotone_in_now() {
        let c = contest(1000, 3600);
        let samples = [0, 999, 1000, 2000, 4599, 4600, 10_000];
        let stages: Vec<Stage> = samples.iter().map(|&t| c.stage_at(t)).collect();
        for window in stages.windows(2) {
            assert!(window[0] <= window[1]);
        }
    }
}
