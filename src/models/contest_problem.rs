use serde::{Deserialize, Serialize};

use crate::store::postgres::PgObjectStore;
use crate::store::{Entity, NoHooks};
use crate::types::ObjectId;

/// `code` is a human label ("A", "B", ...) that also orders the problem's column in standings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContestProblem {
    #[serde(default)]
    pub id: ObjectId,
    pub contest_id: ObjectId,
    pub problem_id: ObjectId,
    pub code: String,
    #[serde(default)]
    pub config: serde_json::Value,
}

impl Entity for ContestProblem {
    fn id(&self) -> ObjectId {
        self.id
    }
    fn set_id(&mut self, id: ObjectId) {
        self.id = id;
    }
}

pub type ContestProblemStore = PgObjectStore<ContestProblem, NoHooks>;
