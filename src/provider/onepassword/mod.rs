//! # 1Password Connect Client
//!
//! Client for the 1Password Connect REST API.
//!
//! Vaults and items may be referenced either by their Connect id or by name/title; names are
//! resolved with a filtered list call before the item is fetched.
//!
//! References:
//! - [1Password Connect API Reference](https://developer.1password.com/docs/connect/api-reference/)
//! - API endpoints: `/v1/vaults`, `/v1/vaults/{vault}/items/{item}`,
//!   `/v1/vaults/{vault}/items/{item}/files/{file}/content`

mod responses;

use crate::config::VaultConfig;
use crate::observability;
use crate::provider::{Field, FileRef, Item, Section, VaultError, VaultProvider};
use async_trait::async_trait;
use reqwest::{Client, Response};
use responses::{FullItem, ItemSummary, VaultSummary};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, warn, Instrument};
use zeroize::Zeroizing;

/// Length of the opaque ids Connect assigns to vaults and items
const CONNECT_ID_LEN: usize = 26;

/// 1Password Connect REST client
pub struct OnePasswordConnect {
    http_client: Client,
    base_url: String,
    token: Zeroizing<String>,
}

impl std::fmt::Debug for OnePasswordConnect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnePasswordConnect")
            .field("base_url", &self.base_url)
            .field("token", &"***")
            .finish_non_exhaustive()
    }
}

impl OnePasswordConnect {
    /// Create a new client from the vault configuration
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built
    pub fn new(config: &VaultConfig) -> Result<Self, VaultError> {
        let http_client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            http_client,
            base_url: config.url.clone(),
            token: config.token.clone(),
        })
    }

    /// Base URL requests are sent to
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send(
        &self,
        operation: &'static str,
        path: &str,
        query: Option<(&str, String)>,
    ) -> Result<Response, VaultError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.http_client.get(&url).bearer_auth(self.token.as_str());
        if let Some((name, value)) = query {
            request = request.query(&[(name, value)]);
        }

        observability::metrics::increment_vault_requests(operation);
        let start = Instant::now();
        let result = request.send().await;
        observability::metrics::observe_vault_request_duration(
            operation,
            start.elapsed().as_secs_f64(),
        );

        let response = result.inspect_err(|_| {
            observability::metrics::increment_vault_errors(operation);
        })?;
        debug!(status = response.status().as_u16(), "{} {}", operation, path);
        Ok(response)
    }

    /// Issue a GET and decode the JSON body; 404 becomes `NotFound { kind, name }`
    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        path: &str,
        query: Option<(&str, String)>,
        kind: &'static str,
        name: &str,
    ) -> Result<T, VaultError> {
        let response = self.send(operation, path, query).await?;
        let response = check_status(operation, response, kind, name).await?;
        response.json::<T>().await.map_err(|e| {
            observability::metrics::increment_vault_errors(operation);
            VaultError::Decode(format!("{operation}: {e}"))
        })
    }

    async fn resolve_vault_id(&self, vault: &str) -> Result<String, VaultError> {
        if looks_like_connect_id(vault) {
            return Ok(vault.to_string());
        }
        let vaults: Vec<VaultSummary> = self
            .get_json(
                "list_vaults",
                "/v1/vaults",
                Some(("filter", format!("name eq \"{vault}\""))),
                "vault",
                vault,
            )
            .await?;
        pick_unique("vault", vault, vaults.into_iter().map(|v| (v.id, v.name)))
    }

    async fn resolve_item_id(&self, vault_id: &str, item: &str) -> Result<String, VaultError> {
        if looks_like_connect_id(item) {
            return Ok(item.to_string());
        }
        let items: Vec<ItemSummary> = self
            .get_json(
                "list_items",
                &format!("/v1/vaults/{vault_id}/items"),
                Some(("filter", format!("title eq \"{item}\""))),
                "item",
                item,
            )
            .await?;
        pick_unique("item", item, items.into_iter().map(|i| (i.id, i.title)))
    }
}

#[async_trait]
impl VaultProvider for OnePasswordConnect {
    async fn get_item(&self, vault: &str, item: &str) -> Result<Item, VaultError> {
        let span = tracing::info_span!("onepassword.item.get", vault = vault, item = item);
        async move {
            let vault_id = self.resolve_vault_id(vault).await?;
            let item_id = self.resolve_item_id(&vault_id, item).await?;
            let full: FullItem = self
                .get_json(
                    "get_item",
                    &format!("/v1/vaults/{vault_id}/items/{item_id}"),
                    None,
                    "item",
                    item,
                )
                .await?;
            Ok(into_item(full))
        }
        .instrument(span)
        .await
    }

    async fn file_content(&self, file: &FileRef) -> Result<Vec<u8>, VaultError> {
        let path = file.content_path.clone().unwrap_or_else(|| {
            format!(
                "/v1/vaults/{}/items/{}/files/{}/content",
                file.vault_id, file.item_id, file.id
            )
        });
        let span = tracing::info_span!("onepassword.file.content", file = file.name.as_str());
        async move {
            let response = self.send("file_content", &path, None).await?;
            let response = check_status("file_content", response, "file", &file.name).await?;
            let bytes = response.bytes().await.inspect_err(|_| {
                observability::metrics::increment_vault_errors("file_content");
            })?;
            Ok(bytes.to_vec())
        }
        .instrument(span)
        .await
    }
}

async fn check_status(
    operation: &'static str,
    response: Response,
    kind: &'static str,
    name: &str,
) -> Result<Response, VaultError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status.as_u16() == 404 {
        return Err(VaultError::not_found(kind, name));
    }
    observability::metrics::increment_vault_errors(operation);
    let message = response.text().await.unwrap_or_default();
    Err(VaultError::Http {
        status: status.as_u16(),
        message,
    })
}

/// Connect ids are 26 lowercase alphanumeric characters
fn looks_like_connect_id(reference: &str) -> bool {
    reference.len() == CONNECT_ID_LEN
        && reference
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
}

fn pick_unique(
    kind: &'static str,
    name: &str,
    candidates: impl Iterator<Item = (String, String)>,
) -> Result<String, VaultError> {
    let matches: Vec<(String, String)> = candidates.filter(|(_, n)| n == name).collect();
    match matches.as_slice() {
        [] => Err(VaultError::not_found(kind, name)),
        [(id, _)] => Ok(id.clone()),
        [(id, _), ..] => {
            warn!(
                "{} '{}' is ambiguous ({} matches), using {}",
                kind,
                name,
                matches.len(),
                id
            );
            Ok(id.clone())
        }
    }
}

/// Regroup the flat Connect field/file lists into sections keyed by label
///
/// Connect only reports `updatedAt` for the whole item, so that timestamp is used for every
/// section and field. Fields and files without a section are not addressable and are skipped.
fn into_item(full: FullItem) -> Item {
    let last_modified = full.updated_at;
    let mut by_id: BTreeMap<String, Section> = full
        .sections
        .into_iter()
        .map(|section| {
            let label = section.label.unwrap_or_else(|| section.id.clone());
            (
                section.id.clone(),
                Section {
                    id: section.id,
                    label,
                    last_modified,
                    ..Section::default()
                },
            )
        })
        .collect();

    for field in full.fields {
        let Some(section) = field.section.and_then(|s| by_id.get_mut(&s.id)) else {
            continue;
        };
        let label = field.label.unwrap_or(field.id);
        section.values.insert(
            label,
            Field::new(field.value.unwrap_or_default(), last_modified),
        );
    }

    for file in full.files {
        let Some(section) = file.section.and_then(|s| by_id.get_mut(&s.id)) else {
            continue;
        };
        section.files.insert(
            file.name.clone(),
            FileRef {
                id: file.id,
                name: file.name,
                vault_id: full.vault.id.clone(),
                item_id: full.id.clone(),
                content_path: file.content_path,
            },
        );
    }

    Item {
        id: full.id,
        title: full.title,
        sections: by_id
            .into_values()
            .map(|section| (section.label.clone(), section))
            .collect(),
        last_modified,
    }
}
