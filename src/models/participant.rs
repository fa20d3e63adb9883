use serde::{Deserialize, Serialize};

use crate::store::postgres::PgObjectStore;
use crate::store::{Entity, NoHooks};
use crate::types::{ObjectId, UnixTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantKind {
    Regular,
    Upsolving,
    Manager,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParticipantConfig {
    /// Personal start time overriding the contest's, only meaningful for `Regular` participants.
    #[serde(default)]
    pub begin_time: Option<UnixTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContestParticipant {
    #[serde(default)]
    pub id: ObjectId,
    pub contest_id: ObjectId,
    pub account_id: ObjectId,
    pub kind: ParticipantKind,
    #[serde(default)]
    pub config: ParticipantConfig,
}

impl Entity for ContestParticipant {
    fn id(&self) -> ObjectId {
        self.id
    }
    fn set_id(&mut self, id: ObjectId) {
        self.id = id;
    }
}

pub type ParticipantStore = PgObjectStore<ContestParticipant, NoHooks>;
