//! Per-user booking list.

use serde::Serialize;

use crate::ids::{BookingId, CampsiteId, UserId};
use crate::model::{Booking, StoreState};

/// Props handed to the renderer of one booking item.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingItemProps {
    /// Position in the rendered list.
    pub key: usize,
    /// Booking id.
    pub id: BookingId,
    /// Owner.
    pub user_id: UserId,
    /// Arrival date.
    pub check_in: String,
    /// Departure date.
    pub check_out: String,
    /// Price.
    pub total_cost: f64,
    /// Party size.
    pub total_guests: u32,
    /// Booked campsite.
    pub campsite_id: CampsiteId,
}

impl BookingItemProps {
    fn new(key: usize, booking: &Booking) -> Self {
        Self {
            key,
            id: booking.id,
            user_id: booking.user_id,
            check_in: booking.check_in.clone(),
            check_out: booking.check_out.clone(),
            total_cost: booking.total_cost,
            total_guests: booking.total_guests,
            campsite_id: booking.campsite_id,
        }
    }
}

/// Bookings owned by `user_id`, in iteration order of `bookings`.
pub fn bookings_for_user<'a, I>(bookings: I, user_id: UserId) -> impl Iterator<Item = &'a Booking>
where
    I: IntoIterator<Item = &'a Booking>,
{
    bookings.into_iter().filter(move |b| b.user_id == user_id)
}

/// Item props for every booking of the signed-in user.
///
/// Nobody signed in means an empty list.
///
/// ```
/// use trailhead_bookings::{user_bookings, BookingId, StoreState};
///
/// let state = StoreState::from_json(r#"{
///     "bookings": {
///         "1": {"id": 1, "userId": 7, "checkIn": "2022-06-01", "checkOut": "2022-06-02",
///               "totalCost": 40, "totalGuests": 2, "campsiteId": 3},
///         "2": {"id": 2, "userId": 9, "checkIn": "2022-07-01", "checkOut": "2022-07-05",
///               "totalCost": 160, "totalGuests": 4, "campsiteId": 3}
///     },
///     "session": {"user": {"id": "7"}}
/// }"#).unwrap();
///
/// let items = user_bookings(&state);
/// assert_eq!(items.len(), 1);
/// assert_eq!(items[0].id, BookingId(1));
/// ```
#[must_use]
pub fn user_bookings(state: &StoreState) -> Vec<BookingItemProps> {
    let Some(user_id) = state.session_user_id() else {
        return Vec::new();
    };

    bookings_for_user(state.bookings.values(), user_id)
        .enumerate()
        .map(|(key, booking)| BookingItemProps::new(key, booking))
        .collect()
}
