// Wire types for the Community platform JSON API.
//
// Field names match the backend exactly. The backend encodes "empty"
// optional text as JSON `false`, so optional fields go through
// `falsy_string` which maps `null` and `false` to `None`.

use serde::{Deserialize, Deserializer, Serialize};

/// Deserialize a string that the backend may send as `null` or `false`.
pub(crate) fn falsy_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Falsy {
        Text(String),
        Flag(#[allow(dead_code)] bool),
    }

    Ok(match Option::<Falsy>::deserialize(deserializer)? {
        Some(Falsy::Text(s)) => Some(s),
        Some(Falsy::Flag(_)) | None => None,
    })
}

// ── Resources ────────────────────────────────────────────────────────

/// `POST /services/{id}` → `result`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ServiceResponse {
    pub id: u64,
    pub name: String,
    /// Base64-encoded image, opaque to this crate.
    #[serde(default, deserialize_with = "falsy_string")]
    pub image: Option<String>,
    #[serde(default)]
    pub qualification: f64,
    #[serde(default, deserialize_with = "falsy_string")]
    pub description: Option<String>,
    #[serde(default)]
    pub is_following: bool,
}

/// One item of `GET /employees/{service_id}`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EmployeeResponse {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default, deserialize_with = "falsy_string")]
    pub email: Option<String>,
    /// URL or base64 payload, opaque to this crate.
    #[serde(default, deserialize_with = "falsy_string")]
    pub photo: Option<String>,
}

/// One item of `GET /proposals/{service_id}`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ProposalResponse {
    pub id: u64,
    #[serde(default)]
    pub create_date: String,
    pub name: String,
    #[serde(default, deserialize_with = "falsy_string")]
    pub written_by: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default, deserialize_with = "falsy_string")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "falsy_string")]
    pub close_date: Option<String>,
}

/// One item of `GET /reviews/{service_id}`. Reviews carry no id.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ReviewResponse {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub rating: f64,
    #[serde(default, deserialize_with = "falsy_string")]
    pub written_by: Option<String>,
}

// ── Mutations ────────────────────────────────────────────────────────

/// The `{ "params": { ... } }` request envelope used by every POST body.
#[derive(Debug, Serialize)]
pub struct Params<T> {
    pub params: T,
}

/// `result` of an action endpoint (`/employees/unlink`, `/services/follow`).
#[derive(Debug, Clone, Deserialize)]
pub struct ActionReply {
    #[serde(default)]
    pub success: bool,
    #[serde(default, rename = "Message", alias = "message")]
    pub message: Option<String>,
}

/// Body of `POST /proposals/create`.
#[derive(Debug, Clone, Serialize)]
pub struct NewProposal {
    pub name: String,
    /// Session token of the author; the backend resolves it to a user.
    pub written_by: String,
    pub description: String,
    pub service_id: u64,
    #[serde(rename = "debateEndDate")]
    pub debate_end_date: String,
    #[serde(rename = "deliberationEndDate")]
    pub deliberation_end_date: String,
}

/// Body of `POST /reviews/create`.
#[derive(Debug, Clone, Serialize)]
pub struct NewReview {
    pub name: String,
    pub description: String,
    pub rating: u8,
    pub written_by: String,
    pub service_id: u64,
}
