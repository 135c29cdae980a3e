use serde::{Deserialize, Serialize};

/// One page of a cursor-paginated listing.
///
/// A null cursor signals that no further pages exist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    #[serde(default = "none_cursor")]
    pub cursor: Option<String>,
}

fn none_cursor() -> Option<String> {
    None
}
