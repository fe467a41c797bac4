//! The user persistence seam and its in-memory implementation.

use std::collections::BTreeMap;

use chrono::Utc;
use parking_lot::RwLock;
use trailhead_core::FieldViolation;

use crate::error::{StoreError, StoreResult};
use crate::model::{User, UserRecord};

/// User persistence.
///
/// Inserts enforce uniqueness of `username` and `email`; a failed bulk
/// insert leaves the store untouched.
pub trait UserStore: Send + Sync + 'static {
    /// Inserts one row.
    fn insert(&self, record: UserRecord) -> StoreResult<User>;

    /// Inserts all rows or none.
    fn bulk_insert(&self, records: Vec<UserRecord>) -> StoreResult<Vec<User>>;

    /// Deletes rows whose username is in `usernames`, returning how many went.
    fn delete_by_usernames(&self, usernames: &[&str]) -> usize;

    /// Looks a user up by primary key.
    fn find_by_id(&self, id: u64) -> Option<User>;

    /// Looks a user up by username or email.
    fn find_by_credential(&self, credential: &str) -> Option<User>;

    /// Number of rows.
    fn count(&self) -> usize;
}

#[derive(Debug, Default)]
struct Table {
    rows: BTreeMap<u64, User>,
    next_id: u64,
}

impl Table {
    fn conflicts(&self, record: &UserRecord, pending: &[User]) -> Vec<FieldViolation> {
        let existing = || self.rows.values().chain(pending.iter());
        let mut violations = Vec::new();

        if existing().any(|u| u.username == record.username) {
            violations.push(FieldViolation::unique("username"));
        }
        if existing().any(|u| u.email == record.email) {
            violations.push(FieldViolation::unique("email"));
        }

        violations
    }

    /// Checks a record against the table plus rows staged in the same
    /// batch, and builds the row it would become.
    fn stage(&self, record: UserRecord, pending: &[User]) -> StoreResult<User> {
        let violations = record.check();
        if !violations.is_empty() {
            return Err(StoreError::InvalidRecord { violations });
        }

        let violations = self.conflicts(&record, pending);
        if !violations.is_empty() {
            tracing::debug!(username = %record.username, "unique constraint violated");
            return Err(StoreError::UniqueViolation { violations });
        }

        Ok(User {
            id: self.next_id + pending.len() as u64 + 1,
            email: record.email,
            username: record.username,
            hashed_password: record.hashed_password,
            created_at: Utc::now(),
        })
    }

    fn commit(&mut self, users: &[User]) {
        for user in users {
            self.next_id = self.next_id.max(user.id);
            self.rows.insert(user.id, user.clone());
        }
    }
}

/// A [`UserStore`] backed by a map behind a `parking_lot` lock.
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    table: RwLock<Table>,
}

impl MemoryUserStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All rows, ordered by id.
    #[must_use]
    pub fn all(&self) -> Vec<User> {
        self.table.read().rows.values().cloned().collect()
    }
}

impl UserStore for MemoryUserStore {
    fn insert(&self, record: UserRecord) -> StoreResult<User> {
        let mut table = self.table.write();
        let user = table.stage(record, &[])?;
        table.commit(std::slice::from_ref(&user));
        Ok(user)
    }

    fn bulk_insert(&self, records: Vec<UserRecord>) -> StoreResult<Vec<User>> {
        let mut table = self.table.write();
        let mut pending: Vec<User> = Vec::with_capacity(records.len());

        for record in records {
            let user = table.stage(record, &pending)?;
            pending.push(user);
        }

        table.commit(&pending);
        Ok(pending)
    }

    fn delete_by_usernames(&self, usernames: &[&str]) -> usize {
        let mut table = self.table.write();
        let before = table.rows.len();
        table
            .rows
            .retain(|_, user| !usernames.contains(&user.username.as_str()));
        before - table.rows.len()
    }

    fn find_by_id(&self, id: u64) -> Option<User> {
        self.table.read().rows.get(&id).cloned()
    }

    fn find_by_credential(&self, credential: &str) -> Option<User> {
        self.table
            .read()
            .rows
            .values()
            .find(|u| u.username == credential || u.email == credential)
            .cloned()
    }

    fn count(&self) -> usize {
        self.table.read().rows.len()
    }
}
