//! # Response Types
//!
//! 1Password Connect REST API response structures.
//!
//! Only the fields the controller reads are modelled; everything else in the payload
//! is ignored by serde.
//!
//! References:
//! - [1Password Connect API Reference](https://developer.1password.com/docs/connect/api-reference/)

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Entry of `GET /v1/vaults`
#[derive(Debug, Deserialize)]
pub struct VaultSummary {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// Entry of `GET /v1/vaults/{vault}/items`
#[derive(Debug, Deserialize)]
pub struct ItemSummary {
    pub id: String,
    #[serde(default)]
    pub title: String,
}

/// Full item from `GET /v1/vaults/{vault}/items/{item}`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullItem {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub vault: VaultRef,
    #[serde(default)]
    pub sections: Vec<ItemSection>,
    #[serde(default)]
    pub fields: Vec<ItemField>,
    #[serde(default)]
    pub files: Vec<ItemFile>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct VaultRef {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct ItemSection {
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
}

/// Reference from a field or file back to its section
#[derive(Debug, Deserialize)]
pub struct SectionRef {
    pub id: String,
}

#[derive(Deserialize)]
pub struct ItemField {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub section: Option<SectionRef>,
}

impl std::fmt::Debug for ItemField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ItemField")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("value", &"***")
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
pub struct ItemFile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub content_path: Option<String>,
    #[serde(default)]
    pub section: Option<SectionRef>,
}
