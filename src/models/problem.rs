use serde::{Deserialize, Serialize};

use crate::store::postgres::PgObjectStore;
use crate::store::{Entity, NoHooks};
use crate::types::ObjectId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Problem {
    #[serde(default)]
    pub id: ObjectId,
    pub owner_id: ObjectId,
    pub config: serde_json::Value,
    pub title: String,
}

impl Problem {
    /// Points awarded for an accepted solution to this problem, defaulting to 1.
    pub fn points(&self) -> i64 {
        self.config.get("points").and_then(|v| v.as_i64()).unwrap_or(1)
    }
}

impl Entity for Problem {
    fn id(&self) -> ObjectId {
        self.id
    }
    fn set_id(&mut self, id: ObjectId) {
        self.id = id;
    }
}

pub type ProblemStore = PgObjectStore<Problem, NoHooks>;
