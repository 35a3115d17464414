//! Portfolio (view) membership, used only to expand portfolio scopes.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct View {
    pub uuid: String,
    /// Project or branch uuids aggregated by the portfolio.
    pub members: BTreeSet<String>,
}

impl View {
    pub fn new<I, S>(uuid: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            uuid: uuid.into(),
            members: members.into_iter().map(Into::into).collect(),
        }
    }
}
