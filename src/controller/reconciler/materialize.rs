//! # Secret Materializer
//!
//! Turns a vault section into the complete data of a destination secret.
//!
//! - `opaque`: every `{from, to}` mapping resolves `from` against the section's value fields,
//!   then against its file attachments.
//! - `docker-registry`: a registry host, a token and an optional email are assembled into a
//!   `.dockerconfigjson` blob. Mappings whose `to` is `registry`, `token` or `email` pick the
//!   vault field for that role; unmapped roles fall back to a section field with the role's
//!   name. A single mapping with any other `to` is the pre-formatted token file form: `from`
//!   is the token (usually a JSON key file) and `to` is the registry host.
//!
//! The output is always the full payload; nothing is merged with an existing secret.

use crate::constants::{
    DOCKER_CONFIG_JSON_KEY, DOCKER_TOKEN_USERNAME, SECRET_TYPE_DOCKER_CONFIG_JSON,
    SECRET_TYPE_OPAQUE,
};
use crate::crd::{KeyMapping, SecretKind, VaultSecretSpec};
use crate::provider::{Section, VaultError, VaultProvider};
use k8s_openapi::ByteString;
use serde_json::json;
use std::collections::BTreeMap;
use thiserror::Error;

const ROLE_REGISTRY: &str = "registry";
const ROLE_TOKEN: &str = "token";
const ROLE_EMAIL: &str = "email";

#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error("field '{0}' is neither a value nor a file in the vault section")]
    MissingField(String),
    #[error("{0} secrets need at least one key mapping")]
    NoKeyMappings(&'static str),
    #[error("docker-registry credential has no {0} (map a field to '{0}' or add a '{0}' field)")]
    MissingRole(&'static str),
    #[error(
        "docker-registry mappings must target 'registry', 'token' and 'email', or be a single token file mapping (got {0} mappings)"
    )]
    AmbiguousRegistryMapping(usize),
    #[error("field '{0}' is not valid UTF-8")]
    NotUtf8(String),
    #[error("reading file '{name}' failed: {source}")]
    File {
        name: String,
        #[source]
        source: VaultError,
    },
}

/// Complete secret payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretPayload {
    pub secret_type: String,
    pub data: BTreeMap<String, ByteString>,
}

/// Build the destination payload for `spec` from `section`
pub async fn materialize(
    spec: &VaultSecretSpec,
    section: &Section,
    vault: &dyn VaultProvider,
) -> Result<SecretPayload, MaterializeError> {
    let keys = spec.effective_keys();
    match spec.secret.secret_type {
        SecretKind::Opaque => materialize_opaque(&keys, section, vault).await,
        SecretKind::DockerRegistry => materialize_docker(&keys, section, vault).await,
    }
}

async fn materialize_opaque(
    keys: &[KeyMapping],
    section: &Section,
    vault: &dyn VaultProvider,
) -> Result<SecretPayload, MaterializeError> {
    if keys.is_empty() {
        return Err(MaterializeError::NoKeyMappings(SecretKind::Opaque.as_str()));
    }
    let mut data = BTreeMap::new();
    for mapping in keys {
        let value = resolve(section, &mapping.from, vault).await?;
        data.insert(mapping.to.clone(), ByteString(value));
    }
    Ok(SecretPayload {
        secret_type: SECRET_TYPE_OPAQUE.to_string(),
        data,
    })
}

async fn materialize_docker(
    keys: &[KeyMapping],
    section: &Section,
    vault: &dyn VaultProvider,
) -> Result<SecretPayload, MaterializeError> {
    let is_role = |to: &str| matches!(to, ROLE_REGISTRY | ROLE_TOKEN | ROLE_EMAIL);

    let (host, token, email) = match keys {
        [] => {
            return Err(MaterializeError::NoKeyMappings(
                SecretKind::DockerRegistry.as_str(),
            ))
        }
        [single] if !is_role(&single.to) => {
            let token = resolve_text(section, &single.from, vault).await?;
            (single.to.clone(), token, None)
        }
        mappings if mappings.iter().all(|m| is_role(&m.to)) => {
            let host = resolve_role(mappings, ROLE_REGISTRY, section, vault)
                .await?
                .ok_or(MaterializeError::MissingRole(ROLE_REGISTRY))?;
            let token = resolve_role(mappings, ROLE_TOKEN, section, vault)
                .await?
                .ok_or(MaterializeError::MissingRole(ROLE_TOKEN))?;
            let email = resolve_role(mappings, ROLE_EMAIL, section, vault).await?;
            (host, token, email)
        }
        mappings => return Err(MaterializeError::AmbiguousRegistryMapping(mappings.len())),
    };

    let blob = docker_config_json(&host, &token, email.as_deref());
    Ok(SecretPayload {
        secret_type: SECRET_TYPE_DOCKER_CONFIG_JSON.to_string(),
        data: BTreeMap::from([(
            DOCKER_CONFIG_JSON_KEY.to_string(),
            ByteString(blob.into_bytes()),
        )]),
    })
}

/// `{"auths": {<host>: {"username": "_json_key", "password": <token>, "email": <email>}}}`
///
/// `email` is left out entirely when absent.
#[must_use]
pub fn docker_config_json(host: &str, token: &str, email: Option<&str>) -> String {
    let mut entry = json!({
        "username": DOCKER_TOKEN_USERNAME,
        "password": token,
    });
    if let Some(email) = email {
        entry["email"] = json!(email);
    }
    let mut auths = serde_json::Map::new();
    auths.insert(host.to_string(), entry);
    json!({ "auths": auths }).to_string()
}

/// Resolve a role from its mapping, or from a field named after the role
async fn resolve_role(
    mappings: &[KeyMapping],
    role: &'static str,
    section: &Section,
    vault: &dyn VaultProvider,
) -> Result<Option<String>, MaterializeError> {
    if let Some(mapping) = mappings.iter().find(|m| m.to == role) {
        return resolve_text(section, &mapping.from, vault).await.map(Some);
    }
    Ok(section.values.get(role).map(|field| field.value.clone()))
}

async fn resolve_text(
    section: &Section,
    name: &str,
    vault: &dyn VaultProvider,
) -> Result<String, MaterializeError> {
    let bytes = resolve(section, name, vault).await?;
    String::from_utf8(bytes).map_err(|_| MaterializeError::NotUtf8(name.to_string()))
}

/// Value fields first, then file attachments
async fn resolve(
    section: &Section,
    name: &str,
    vault: &dyn VaultProvider,
) -> Result<Vec<u8>, MaterializeError> {
    if let Some(field) = section.values.get(name) {
        return Ok(field.value.clone().into_bytes());
    }
    if let Some(file) = section.files.get(name) {
        return vault
            .file_content(file)
            .await
            .map_err(|source| MaterializeError::File {
                name: name.to_string(),
                source,
            });
    }
    Err(MaterializeError::MissingField(name.to_string()))
}
