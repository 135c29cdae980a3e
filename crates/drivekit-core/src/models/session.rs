use serde::{Deserialize, Serialize};

/// Secondary account stored in the local cache.
///
/// `local_id` is assigned by the cache on insert; `token` is the opaque
/// rotation token consumed by the account-switch flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(default)]
    pub local_id: Option<i64>,
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub avatar: Option<String>,
    pub token: String,
}

/// Identity claims presented when the realtime connection is established.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub email: String,
}

impl From<&SessionRecord> for Identity {
    fn from(session: &SessionRecord) -> Self {
        Identity {
            id: session.id.clone(),
            email: session.email.clone(),
        }
    }
}
