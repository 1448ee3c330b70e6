use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResponseModality {
    Image,
    Text,
}

/// What a feature hands back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    Images,
    Analysis,
}
