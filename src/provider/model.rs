//! # Vault Model
//!
//! Provider-neutral view of a vault item: sections holding value fields and file
//! attachments, each carrying the vault-side last-modified time.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// A vault item with its sections keyed by section label
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Item {
    pub id: String,
    pub title: String,
    pub sections: BTreeMap<String, Section>,
    pub last_modified: Option<DateTime<Utc>>,
}

impl Item {
    /// Find a section by label, falling back to its id
    #[must_use]
    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections
            .get(name)
            .or_else(|| self.sections.values().find(|section| section.id == name))
    }
}

/// One section of an item
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Section {
    pub id: String,
    pub label: String,
    /// Value fields keyed by label
    pub values: BTreeMap<String, Field>,
    /// File attachments keyed by file name
    pub files: BTreeMap<String, FileRef>,
    pub last_modified: Option<DateTime<Utc>>,
}

impl Section {
    /// Build a single-field section, used for the single-key source variant
    #[must_use]
    pub fn from_field(label: &str, key: &str, field: Field) -> Self {
        let last_modified = field.last_modified;
        Self {
            id: label.to_string(),
            label: label.to_string(),
            values: BTreeMap::from([(key.to_string(), field)]),
            files: BTreeMap::new(),
            last_modified,
        }
    }

    /// Newest of the section timestamp and the timestamps of the named fields
    ///
    /// Names that do not resolve to a value field are ignored.
    #[must_use]
    pub fn newest_timestamp<'a>(
        &self,
        field_names: impl IntoIterator<Item = &'a str>,
    ) -> Option<DateTime<Utc>> {
        field_names
            .into_iter()
            .filter_map(|name| self.values.get(name).and_then(|field| field.last_modified))
            .chain(self.last_modified)
            .max()
    }
}

/// A value field
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Field {
    pub value: String,
    pub last_modified: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Field")
            .field("value", &"***")
            .field("last_modified", &self.last_modified)
            .finish()
    }
}

impl Field {
    pub fn new(value: impl Into<String>, last_modified: Option<DateTime<Utc>>) -> Self {
        Self {
            value: value.into(),
            last_modified,
        }
    }
}

/// Reference to a file attachment; content is fetched separately
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileRef {
    pub id: String,
    pub name: String,
    pub vault_id: String,
    pub item_id: String,
    /// Server-provided content path, when the backend reports one
    pub content_path: Option<String>,
}
