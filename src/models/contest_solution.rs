use serde::{Deserialize, Serialize};

use crate::store::postgres::PgObjectStore;
use crate::store::{Entity, NoHooks};
use crate::types::ObjectId;

/// Join row associating a contest participation's submission with the problem it targets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContestSolution {
    #[serde(default)]
    pub id: ObjectId,
    pub participant_id: ObjectId,
    pub problem_id: ObjectId,
    pub solution_id: ObjectId,
}

impl Entity for ContestSolution {
    fn id(&self) -> ObjectId {
        self.id
    }
    fn set_id(&mut self, id: ObjectId) {
        self.id = id;
    }
}

pub type ContestSolutionStore = PgObjectStore<ContestSolution, NoHooks>;
