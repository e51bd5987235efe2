//! The club resource cached and distributed by the higher layers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A club as returned by the backend API.
///
/// The cache layer treats this as an opaque payload; only the API
/// client parses it. Unknown fields from newer backends are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Club {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    #[serde(default)]
    pub member_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}
