//! Permission set: an unordered collection of role names.

use std::collections::HashSet;

/// Union of role names granted to a caller for the duration of one request.
///
/// `AccountRole`/`RoleRole` edges and their transitive closure are resolved elsewhere (by the
/// role store); this type is just the resulting flat set plus the small amount of
/// context-specific permissions the contest context manager layers on top.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionSet(HashSet<String>);

impl PermissionSet {
    pub fn new() -> Self {
        Self(HashSet::new())
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(names.into_iter().map(Into::into).collect())
    }

    /// Adds the given role names. Commutative and idempotent: the resulting set never depends on
    /// call order, and adding an already-present name is a no-op.
    pub fn add<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            self.0.insert(name.into());
        }
    }

    pub fn has(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    pub fn has_any(&self, names: &[&str]) -> bool {
        names.iter().any(|name| self.has(name))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl FromIterator<String> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_is_commutative_and_idempotent() {
        let mut a = PermissionSet::new();
        a.add(["submit_contest_solution", "login"]);
        a.add(["login"]);

        let mut b = PermissionSet::new();
        b.add(["login"]);
        b.add(["login", "submit_contest_solution"]);

        assert_eq!(a, b);
        assert_eq!(a.len(), 2);
    }

    #[test]
    fn has_is_membership_test() {
        let mut set = PermissionSet::new();
        set.add(["observe_contest"]);
        assert!(set.has("observe_contest"));
        assert!(!set.has("submit_contest_solution"));
    }

    #[test]
    fn clone_is_independent() {
        let mut original = PermissionSet::new();
        original.add(["login"]);

        let mut cloned = original.clone();
        cloned.add(["register_contest"]);

        assert!(!original.has("register_contest"));
        assert!(cloned.has("register_contest"));
    }
}
