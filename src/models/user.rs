//! User entity and password hashing.

use std::collections::HashMap;
use std::sync::RwLock;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_512};

use crate::store::postgres::PgObjectStore;
use crate::store::{Entity, StoreHooks};
use crate::types::ObjectId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub id: ObjectId,
    pub account_id: ObjectId,
    pub login: String,
    pub password_hash: String,
    pub password_salt: String,
}

impl Entity for User {
    fn id(&self) -> ObjectId {
        self.id
    }
    fn set_id(&mut self, id: ObjectId) {
        self.id = id;
    }
}

impl User {
    /// Sets a new password, generating a fresh random salt. `global_salt` is the
    /// deployment-wide pepper from [`crate::config::SecurityConfig`].
    ///
    /// Hash construction: `base64(SHA3-512(salt ‖ SHA3-512(password) ‖ global_salt))`. Two
    /// consecutive calls yield different `password_salt` with overwhelming probability (16
    /// random bytes).
    pub fn set_password(&mut self, password: &str, global_salt: &str) {
        let mut salt_bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut salt_bytes);
        let salt = BASE64.encode(salt_bytes);

        self.password_hash = hash_password(password, &salt, global_salt);
        self.password_salt = salt;
    }

    pub fn check_password(&self, password: &str, global_salt: &str) -> bool {
        let expected = hash_password(password, &self.password_salt, global_salt);
        constant_time_eq(expected.as_bytes(), self.password_hash.as_bytes())
    }
}

fn hash_password(password: &str, salt: &str, global_salt: &str) -> String {
    let inner_digest = Sha3_512::digest(password.as_bytes());

    let mut hasher = Sha3_512::new();
    hasher.update(salt.as_bytes());
    hasher.update(BASE64.encode(inner_digest).as_bytes());
    hasher.update(global_salt.as_bytes());
    let digest = hasher.finalize();

    BASE64.encode(digest)
}

/// Avoids leaking hash-comparison timing, the way a hand-rolled `==` over secret material would.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Secondary indexes kept in sync at apply time (User by login; User by account_id), guarded by
/// their own lock since they're read without going through the replica's lock
/// (`UserStore::get_by_login`).
#[derive(Default)]
pub struct UserHooks {
    by_login: RwLock<HashMap<String, ObjectId>>,
    by_account_id: RwLock<HashMap<ObjectId, ObjectId>>,
}

impl StoreHooks<User> for UserHooks {
    fn on_create(&self, object: &User) {
        self.by_login.write().unwrap().insert(object.login.clone(), object.id);
        self.by_account_id.write().unwrap().insert(object.account_id, object.id);
    }

    fn on_update(&self, previous: &User, object: &User) {
        if previous.login != object.login {
            let mut by_login = self.by_login.write().unwrap();
            by_login.remove(&previous.login);
            by_login.insert(object.login.clone(), object.id);
        }
        if previous.account_id != object.account_id {
            let mut by_account_id = self.by_account_id.write().unwrap();
            by_account_id.remove(&previous.account_id);
            by_account_id.insert(object.account_id, object.id);
        }
    }

    fn on_delete(&self, object: &User) {
        self.by_login.write().unwrap().remove(&object.login);
        self.by_account_id.write().unwrap().remove(&object.account_id);
    }
}

pub type UserStore = PgObjectStore<User, UserHooks>;

/// Lookups by secondary index, on top of the generic [`crate::store::ObjectStore`] surface.
pub trait UserStoreExt {
    fn get_by_login(&self, login: &str) -> Option<User>;
    fn get_by_account_id(&self, account_id: ObjectId) -> Option<User>;
}

impl UserStoreExt for UserStore {
    fn get_by_login(&self, login: &str) -> Option<User> {
        use crate::store::ObjectStore;
        let id = *self.hooks().by_login.read().unwrap().get(login)?;
        self.get(id)
    }

    fn get_by_account_id(&self, account_id: ObjectId) -> Option<User> {
        use crate::store::ObjectStore;
        let id = *self.hooks().by_account_id.read().unwrap().get(&account_id)?;
        self.get(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: 1,
            account_id: 1,
            login: "alice".to_string(),
            password_hash: String::new(),
            password_salt: String::new(),
        }
    }

    #[test]
    fn check_password_accepts_correct_password() {
        let mut u = user();
        u.set_password("hunter2", "pepper");
        assert!(u.check_password("hunter2", "pepper"));
    }

    #[test]
    fn check_password_rejects_wrong_password() {
        let mut u = user();
        u.set_password("hunter2", "pepper");
        assert!(!u.check_password("hunter3", "pepper"));
    }

    #[test]
    fn consecutive_set_password_calls_use_different_salts() {
        let mut a = user();
        let mut b = user();
        a.set_password("hunter2", "pepper");
        b.set_password("hunter2", "pepper");
        assert_ne!(a.password_salt, b.password_salt);
        assert_ne!(a.password_hash, b.password_hash);
    }
}
