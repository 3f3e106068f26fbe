use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Profile record sent to the profile service at registration time.
///
/// Serialized as `application/x-www-form-urlencoded` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfilePayload {
    pub email: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub avatar_url: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub birth_date: String,
    pub last_updated: DateTime<Utc>,
}

