//! Fixture seeders.
//!
//! A seeder is a reversible fixture: `apply` inserts its rows, `revert`
//! deletes them. Applying twice without reverting fails with the store's
//! uniqueness error and inserts nothing.

use crate::error::StoreResult;
use crate::memory::UserStore;
use crate::model::UserRecord;
use crate::password::hash_password;

/// A reversible fixture.
pub trait Seeder: Send + Sync {
    /// Short name used in logs and on the command line.
    fn name(&self) -> &'static str;

    /// Inserts the fixture rows, returning how many were inserted.
    fn apply(&self, store: &dyn UserStore) -> StoreResult<usize>;

    /// Removes the fixture rows, returning how many were removed.
    fn revert(&self, store: &dyn UserStore) -> StoreResult<usize>;
}

/// Usernames owned by [`DemoUserSeeder`].
pub const DEMO_USERNAMES: [&str; 2] = ["Demo", "FakeUser1"];

const DEMO_USERS: [(&str, &str, &str); 2] = [
    ("demo@user.demo", "Demo", "password"),
    ("user1@user.com", "FakeUser1", "password2"),
];

/// Seeds the two demo accounts used by the frontend's demo login.
///
/// | email | username | password |
/// |---|---|---|
/// | `demo@user.demo` | `Demo` | `password` |
/// | `user1@user.com` | `FakeUser1` | `password2` |
#[derive(Debug, Default, Clone, Copy)]
pub struct DemoUserSeeder;

impl DemoUserSeeder {
    /// Creates the seeder.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Builds the rows, hashing each password with a fresh salt.
    pub fn records(&self) -> StoreResult<Vec<UserRecord>> {
        DEMO_USERS
            .iter()
            .map(|(email, username, password)| {
                Ok(UserRecord::new(*email, *username, hash_password(password)?))
            })
            .collect()
    }
}

impl Seeder for DemoUserSeeder {
    fn name(&self) -> &'static str {
        "demo-user"
    }

    fn apply(&self, store: &dyn UserStore) -> StoreResult<usize> {
        let inserted = store.bulk_insert(self.records()?)?.len();
        tracing::info!(seeder = self.name(), inserted, "seeder applied");
        Ok(inserted)
    }

    fn revert(&self, store: &dyn UserStore) -> StoreResult<usize> {
        let removed = store.delete_by_usernames(&DEMO_USERNAMES);
        tracing::info!(seeder = self.name(), removed, "seeder reverted");
        Ok(removed)
    }
}
