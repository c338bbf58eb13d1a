//! # Vault Providers
//!
//! The controller reaches the external vault only through the [`VaultProvider`] trait.
//! Lookups are treated as reliable per call: there is no retry in this layer, failures
//! surface to the reconciler and are retried by the controller's error policy.
//!
//! - `model` - Provider-neutral item/section/field types
//! - `onepassword` - 1Password Connect REST implementation

mod model;
pub mod onepassword;

pub use model::{Field, FileRef, Item, Section};
pub use onepassword::OnePasswordConnect;

use async_trait::async_trait;
use thiserror::Error;

/// Errors returned by a vault provider
#[derive(Debug, Error)]
pub enum VaultError {
    /// The vault, item, section, field or file does not exist
    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },
    /// The vault answered with a non-success status
    #[error("vault request failed with HTTP {status}: {message}")]
    Http { status: u16, message: String },
    /// The request never completed
    #[error("vault request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// The response could not be interpreted
    #[error("unexpected vault response: {0}")]
    Decode(String),
}

impl VaultError {
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        VaultError::NotFound {
            kind,
            name: name.into(),
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, VaultError::NotFound { .. })
    }
}

/// Provider trait for vault backends
#[async_trait]
pub trait VaultProvider: Send + Sync {
    /// Fetch a whole item with all of its sections
    async fn get_item(&self, vault: &str, item: &str) -> Result<Item, VaultError>;

    /// Fetch a single field
    ///
    /// The default implementation fetches the item and picks the field out of it. A key that
    /// names a file attachment instead of a value field returns the file content, which must
    /// be UTF-8, stamped with the section's last-modified time.
    async fn get_key(
        &self,
        vault: &str,
        item: &str,
        section: &str,
        key: &str,
    ) -> Result<Field, VaultError> {
        let fetched = self.get_item(vault, item).await?;
        let section = fetched
            .section(section)
            .ok_or_else(|| VaultError::not_found("section", section))?;
        if let Some(field) = section.values.get(key) {
            return Ok(field.clone());
        }
        let file = section
            .files
            .get(key)
            .ok_or_else(|| VaultError::not_found("field", key))?;
        let content = self.file_content(file).await?;
        let value = String::from_utf8(content)
            .map_err(|_| VaultError::Decode(format!("file '{key}' is not valid UTF-8")))?;
        Ok(Field::new(value, section.last_modified))
    }

    /// Download the content of a file attachment
    async fn file_content(&self, file: &FileRef) -> Result<Vec<u8>, VaultError>;
}
