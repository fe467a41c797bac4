//! # Trailhead Bookings
//!
//! The booking model and the per-user booking list: given every loaded
//! booking and the signed-in user, produce the props for each of that
//! user's booking items.
//!
//! Identifiers are `u64` newtypes that accept either JSON numbers or
//! numeric strings, so `"7"` and `7` name the same user.

#![doc(html_root_url = "https://docs.rs/trailhead-bookings/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod ids;
mod model;
mod selection;

pub use ids::{BookingId, CampsiteId, ParseIdError, UserId};
pub use model::{Booking, Session, SessionUser, StoreState};
pub use selection::{bookings_for_user, user_bookings, BookingItemProps};
