//! # CRD Generator
//!
//! Generates the Kubernetes CustomResourceDefinition YAML for `VaultSecret` from the
//! Rust type definitions.
//!
//! ## Usage
//!
//! ```bash
//! # Generate CRD YAML
//! cargo run --bin crdgen > config/crd/vaultsecret.yaml
//!
//! # Generate and apply directly
//! cargo run --bin crdgen | kubectl apply -f -
//! ```

use kube::core::CustomResourceExt;
use vault_secret_controller::crd::VaultSecret;

fn main() -> Result<(), serde_yaml::Error> {
    print!("{}", serde_yaml::to_string(&VaultSecret::crd())?);
    Ok(())
}
