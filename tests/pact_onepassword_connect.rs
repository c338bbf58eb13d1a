//! Pact contract tests for the 1Password Connect API
//!
//! These tests define the contract between the Vault Secret Controller and 1Password Connect.
//! They drive the real `OnePasswordConnect` client against a Pact mock server.

mod common;

use common::init_rustls;
use pact_consumer::prelude::*;
use serde_json::json;
use vault_secret_controller::config::VaultConfig;
use vault_secret_controller::provider::{OnePasswordConnect, VaultError, VaultProvider};

const TOKEN: &str = "test-token";
const VAULT_ID: &str = "abcdefghijklmnopqrstuvwxy1";
const ITEM_ID: &str = "zyxwvutsrqponmlkjihgfedcb2";

fn item_body() -> serde_json::Value {
    json!({
        "id": ITEM_ID,
        "title": "db",
        "vault": {"id": VAULT_ID},
        "category": "LOGIN",
        "updatedAt": "2024-05-01T10:00:00Z",
        "sections": [{"id": "sec1", "label": "prod"}],
        "fields": [
            {"id": "f1", "label": "username", "value": "app", "type": "STRING", "section": {"id": "sec1"}},
            {"id": "f2", "label": "password", "value": "s3cret", "type": "CONCEALED", "section": {"id": "sec1"}}
        ],
        "files": [
            {
                "id": "file1",
                "name": "key.json",
                "size": 17,
                "content_path": format!("/v1/vaults/{VAULT_ID}/items/{ITEM_ID}/files/file1/content"),
                "section": {"id": "sec1"}
            }
        ]
    })
}

fn client_for(mock_url: &str) -> OnePasswordConnect {
    let config = VaultConfig::new(mock_url, TOKEN);
    OnePasswordConnect::new(&config).expect("Failed to build client")
}

#[tokio::test]
async fn test_onepassword_get_item_by_id_contract() {
    init_rustls();
    let mut pact_builder = PactBuilder::new("Vault-Secret-Controller", "1Password-Connect");

    pact_builder.interaction("get an item by vault and item id", "", |mut i| {
        i.given("an item with a prod section exists");
        i.request
            .method("GET")
            .path(format!("/v1/vaults/{VAULT_ID}/items/{ITEM_ID}"))
            .header("authorization", format!("Bearer {TOKEN}"));
        i.response
            .status(200)
            .header("content-type", "application/json")
            .json_body(item_body());
        i
    });

    let mock_server = pact_builder.start_mock_server(None, None);
    let client = client_for(mock_server.url().as_str());

    let item = client
        .get_item(VAULT_ID, ITEM_ID)
        .await
        .expect("Failed to get item");

    let prod = item.section("prod").expect("prod section");
    assert_eq!(prod.values["username"].value, "app");
    assert_eq!(prod.values["password"].value, "s3cret");
    assert!(prod.last_modified.is_some());
    assert_eq!(prod.files["key.json"].item_id, ITEM_ID);
}

#[tokio::test]
async fn test_onepassword_resolves_names_contract() {
    init_rustls();
    let mut pact_builder = PactBuilder::new("Vault-Secret-Controller", "1Password-Connect");

    pact_builder.interaction("find a vault by name", "", |mut i| {
        i.given("a vault named platform exists");
        i.request
            .method("GET")
            .path("/v1/vaults")
            .query_param("filter", "name eq \"platform\"")
            .header("authorization", format!("Bearer {TOKEN}"));
        i.response
            .status(200)
            .header("content-type", "application/json")
            .json_body(json!([{"id": VAULT_ID, "name": "platform"}]));
        i
    });

    pact_builder.interaction("find an item by title", "", |mut i| {
        i.given("an item titled db exists in the platform vault");
        i.request
            .method("GET")
            .path(format!("/v1/vaults/{VAULT_ID}/items"))
            .query_param("filter", "title eq \"db\"")
            .header("authorization", format!("Bearer {TOKEN}"));
        i.response
            .status(200)
            .header("content-type", "application/json")
            .json_body(json!([{"id": ITEM_ID, "title": "db", "vault": {"id": VAULT_ID}}]));
        i
    });

    pact_builder.interaction("get the resolved item", "", |mut i| {
        i.given("an item with a prod section exists");
        i.request
            .method("GET")
            .path(format!("/v1/vaults/{VAULT_ID}/items/{ITEM_ID}"))
            .header("authorization", format!("Bearer {TOKEN}"));
        i.response
            .status(200)
            .header("content-type", "application/json")
            .json_body(item_body());
        i
    });

    let mock_server = pact_builder.start_mock_server(None, None);
    let client = client_for(mock_server.url().as_str());

    let field = client
        .get_key("platform", "db", "prod", "password")
        .await
        .expect("Failed to get key");

    assert_eq!(field.value, "s3cret");
}

#[tokio::test]
async fn test_onepassword_missing_item_contract() {
    init_rustls();
    let mut pact_builder = PactBuilder::new("Vault-Secret-Controller", "1Password-Connect");

    pact_builder.interaction("get an item that does not exist", "", |mut i| {
        i.given("the item does not exist");
        i.request
            .method("GET")
            .path(format!("/v1/vaults/{VAULT_ID}/items/{ITEM_ID}"))
            .header("authorization", format!("Bearer {TOKEN}"));
        i.response
            .status(404)
            .header("content-type", "application/json")
            .json_body(json!({"status": 404, "message": "item not found"}));
        i
    });

    let mock_server = pact_builder.start_mock_server(None, None);
    let client = client_for(mock_server.url().as_str());

    let err = client
        .get_item(VAULT_ID, ITEM_ID)
        .await
        .expect_err("missing item must fail");

    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_onepassword_server_error_contract() {
    init_rustls();
    let mut pact_builder = PactBuilder::new("Vault-Secret-Controller", "1Password-Connect");

    pact_builder.interaction("get an item while Connect is unhealthy", "", |mut i| {
        i.given("Connect cannot reach 1Password");
        i.request
            .method("GET")
            .path(format!("/v1/vaults/{VAULT_ID}/items/{ITEM_ID}"))
            .header("authorization", format!("Bearer {TOKEN}"));
        i.response
            .status(500)
            .header("content-type", "application/json")
            .json_body(json!({"status": 500, "message": "sync failed"}));
        i
    });

    let mock_server = pact_builder.start_mock_server(None, None);
    let client = client_for(mock_server.url().as_str());

    let err = client
        .get_item(VAULT_ID, ITEM_ID)
        .await
        .expect_err("server error must fail");

    assert!(matches!(err, VaultError::Http { status: 500, .. }));
}

#[tokio::test]
async fn test_onepassword_file_content_contract() {
    init_rustls();
    let mut pact_builder = PactBuilder::new("Vault-Secret-Controller", "1Password-Connect");

    pact_builder.interaction("get an item with a file attachment", "", |mut i| {
        i.given("an item with a prod section exists");
        i.request
            .method("GET")
            .path(format!("/v1/vaults/{VAULT_ID}/items/{ITEM_ID}"))
            .header("authorization", format!("Bearer {TOKEN}"));
        i.response
            .status(200)
            .header("content-type", "application/json")
            .json_body(item_body());
        i
    });

    pact_builder.interaction("download file content", "", |mut i| {
        i.given("an item with a prod section exists");
        i.request
            .method("GET")
            .path(format!(
                "/v1/vaults/{VAULT_ID}/items/{ITEM_ID}/files/file1/content"
            ))
            .header("authorization", format!("Bearer {TOKEN}"));
        i.response
            .status(200)
            .header("content-type", "application/octet-stream")
            .body("{\"type\":\"sa\"}");
        i
    });

    let mock_server = pact_builder.start_mock_server(None, None);
    let client = client_for(mock_server.url().as_str());

    let item = client
        .get_item(VAULT_ID, ITEM_ID)
        .await
        .expect("Failed to get item");
    let file = &item.section("prod").expect("prod section").files["key.json"];
    let content = client
        .file_content(file)
        .await
        .expect("Failed to download file");

    assert_eq!(content, b"{\"type\":\"sa\"}");
}
