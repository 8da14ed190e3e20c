//! Record models matching the voicemail assistant's table schemas.
//!
//! Each table has a row struct deriving `sqlx::FromRow` (what the query returns) and a record
//! struct (what the rest of the crate consumes). Conversions normalize the loosely typed SQLite
//! columns: integer flags become booleans, status strings become [`calls::CallStatus`].
//!
//! - [`calls`]: one row per inbound call
//! - [`messages`]: one row per voicemail, with the transcript and its JSON analysis

pub mod calls;
pub mod messages;
