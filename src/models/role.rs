//! Role entity, the built-in role enumeration, and the `AccountRole`/`RoleRole` transitive
//! closure.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::permission::PermissionSet;
use crate::store::postgres::PgObjectStore;
use crate::store::{Entity, StoreHooks};
use crate::types::ObjectId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    #[serde(default)]
    pub id: ObjectId,
    pub name: String,
}

impl Entity for Role {
    fn id(&self) -> ObjectId {
        self.id
    }
    fn set_id(&mut self, id: ObjectId) {
        self.id = id;
    }
}

/// The closed enumeration of built-in roles. Custom roles may still be created, but these names
/// are reserved and always resolvable without a database round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinRole {
    Login,
    ObserveContest,
    RegisterContests,
    SubmitContestSolution,
    Admin,
}

impl BuiltinRole {
    pub fn name(self) -> &'static str {
        match self {
            BuiltinRole::Login => "login",
            BuiltinRole::ObserveContest => "observe_contest",
            BuiltinRole::RegisterContests => "register_contests",
            BuiltinRole::SubmitContestSolution => "submit_contest_solution",
            BuiltinRole::Admin => "admin",
        }
    }

    pub const ALL: [BuiltinRole; 5] = [
        BuiltinRole::Login,
        BuiltinRole::ObserveContest,
        BuiltinRole::RegisterContests,
        BuiltinRole::SubmitContestSolution,
        BuiltinRole::Admin,
    ];
}

#[derive(Default)]
pub struct RoleHooks {
    by_name: RwLock<HashMap<String, ObjectId>>,
}

impl StoreHooks<Role> for RoleHooks {
    fn on_create(&self, object: &Role) {
        self.by_name.write().unwrap().insert(object.name.clone(), object.id);
    }
    fn on_update(&self, previous: &Role, object: &Role) {
        if previous.name != object.name {
            let mut by_name = self.by_name.write().unwrap();
            by_name.remove(&previous.name);
            by_name.insert(object.name.clone(), object.id);
        }
    }
    fn on_delete(&self, object: &Role) {
        self.by_name.write().unwrap().remove(&object.name);
    }
}

pub type RoleStore = PgObjectStore<Role, RoleHooks>;

impl RoleStore {
    pub fn get_by_name(&self, name: &str) -> Option<Role> {
        use crate::store::ObjectStore;
        let id = *self.hooks().by_name.read().unwrap().get(name)?;
        self.get(id)
    }
}

/// Resolves an account's flat [`PermissionSet`] by walking the `RoleRole` DAG from the account's
/// directly-assigned roles. Cyclic graphs are tolerated: an explicit worklist with a visited-set
/// is used instead of recursion.
pub fn resolve_permissions(direct_role_names: &[String], role_edges: &HashMap<String, Vec<String>>) -> PermissionSet {
    let mut visited: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<String> = direct_role_names.iter().cloned().collect();

    while let Some(name) = queue.pop_front() {
        if !visited.insert(name.clone()) {
            continue;
        }
        if let Some(children) = role_edges.get(&name) {
            for child in children {
                if !visited.contains(child) {
                    queue.push_back(child.clone());
                }
            }
        }
    }

    PermissionSet::from_names(visited)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_transitive_closure_of_role_edges() {
        let mut edges = HashMap::new();
        edges.insert("contestant".to_string(), vec!["login".to_string(), "observer".to_string()]);
        edges.insert("observer".to_string(), vec!["observe_contest".to_string()]);

        let permissions = resolve_permissions(&["contestant".to_string()], &edges);

        assert!(permissions.has("contestant"));
        assert!(permissions.has("login"));
        assert!(permissions.has("observer"));
        assert!(permissions.has("observe_contest"));
    }

    #[test]
    fn tolerates_cycles_in_the_role_graph() {
        let mut edges = HashMap::new();
        edges.insert("a".to_string(), vec!["b".to_string()]);
        edges.insert("b".to_string(), vec!["a".to_string()]);

        let permissions = resolve_permissions(&["a".to_string()], &edges);

        assert!(permissions.has("a"));
        assert!(permissions.has("b"));
        assert_eq!(permissions.len(), 2);
    }
}
