use serde::{Deserialize, Serialize};

use crate::store::postgres::PgObjectStore;
use crate::store::{Entity, NoHooks};
use crate::types::{ObjectId, UnixTime};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Solution {
    #[serde(default)]
    pub id: ObjectId,
    pub user_id: ObjectId,
    pub problem_id: ObjectId,
    #[serde(default)]
    pub contest_id: Option<ObjectId>,
    pub source_code: String,
    pub create_time: UnixTime,
}

impl Entity for Solution {
    fn id(&self) -> ObjectId {
        self.id
    }
    fn set_id(&mut self, id: ObjectId) {
        self.id = id;
    }
}

pub type SolutionStore = PgObjectStore<Solution, NoHooks>;
