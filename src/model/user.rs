use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

string_id!(
    /// Type-safe identifier for Users.
    UserId
);

/// A user record owned by the identity authority. Read-only here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
