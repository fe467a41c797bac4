//! # Trailhead Store
//!
//! The user persistence seam used by sign-up and the demo-user fixture.
//!
//! - [`UserStore`] - Persistence trait with unique `username` and `email`
//! - [`MemoryUserStore`] - In-memory implementation
//! - [`DemoUserSeeder`] - Reversible fixture inserting the two demo accounts
//! - [`hash_password`] / [`verify_password`] - Argon2id hashing
//!
//! Constraint failures convert into
//! [`AppError::Validation`](trailhead_core::AppError::Validation), so a
//! duplicate sign-up reaches the client as a `"Validation error"` body.
//!
//! ```
//! use trailhead_store::{DemoUserSeeder, MemoryUserStore, Seeder, UserStore};
//!
//! let store = MemoryUserStore::new();
//! let seeder = DemoUserSeeder::new();
//!
//! seeder.apply(&store).unwrap();
//! assert_eq!(store.count(), 2);
//! assert!(seeder.apply(&store).is_err());
//!
//! seeder.revert(&store).unwrap();
//! assert_eq!(store.count(), 0);
//! ```

#![doc(html_root_url = "https://docs.rs/trailhead-store/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod memory;
mod model;
mod password;
mod seeder;

pub use error::{StoreError, StoreResult, VALIDATION_MESSAGE};
pub use memory::{MemoryUserStore, UserStore};
pub use model::{User, UserRecord};
pub use password::{hash_password, verify_password};
pub use seeder::{DemoUserSeeder, Seeder, DEMO_USERNAMES};
