//! Booking rows and the client-side state they are selected from.

use std::collections::BTreeMap;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

use crate::ids::{BookingId, CampsiteId, UserId};

/// A booking as delivered to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    /// Primary key.
    pub id: BookingId,
    /// Owner of the booking.
    pub user_id: UserId,
    /// Arrival date as sent by the API.
    pub check_in: String,
    /// Departure date as sent by the API.
    pub check_out: String,
    /// Price; decimal columns may arrive as strings.
    #[serde(deserialize_with = "amount")]
    pub total_cost: f64,
    /// Party size.
    pub total_guests: u32,
    /// Booked campsite.
    pub campsite_id: CampsiteId,
}

fn amount<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Amount {
        Number(f64),
        Text(String),
    }

    match Amount::deserialize(deserializer)? {
        Amount::Number(n) => Ok(n),
        Amount::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| de::Error::invalid_value(de::Unexpected::Str(&s), &"a decimal amount")),
    }
}

/// The signed-in user, as far as the booking list cares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    /// Primary key.
    pub id: UserId,
}

/// Session slice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// `None` when nobody is signed in.
    #[serde(default)]
    pub user: Option<SessionUser>,
}

/// The parts of client state the booking list reads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreState {
    /// Every loaded booking, keyed by id.
    #[serde(default)]
    pub bookings: BTreeMap<BookingId, Booking>,
    /// Session slice.
    #[serde(default)]
    pub session: Session,
}

impl StoreState {
    /// Builds state from a JSON document.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Signed-in user id, if any.
    #[must_use]
    pub fn session_user_id(&self) -> Option<UserId> {
        self.session.user.as_ref().map(|u| u.id)
    }
}
