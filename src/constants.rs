//! # Constants
//!
//! Default values and well-known names used across the controller.
//! Every tunable here can be overridden through `ControllerConfig` / `ServerConfig`.

/// Default port for the metrics and probe HTTP server
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// Default server startup timeout in seconds
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Default server readiness poll interval in milliseconds
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;

/// Process-wide minimum interval between two passes of the same `VaultSecret` (seconds)
pub const MIN_REFRESH_INTERVAL_SECS: u64 = 60;

/// First value of the reconciliation error backoff (seconds)
pub const DEFAULT_BACKOFF_MIN_SECS: u64 = 60;

/// Cap of the reconciliation error backoff (seconds)
pub const DEFAULT_BACKOFF_MAX_SECS: u64 = 600;

/// Initial delay before restarting a watch stream that hit a 429 (milliseconds)
pub const DEFAULT_WATCH_BACKOFF_START_MS: u64 = 1000;

/// Cap for the watch stream 429 backoff (milliseconds)
pub const DEFAULT_WATCH_BACKOFF_MAX_MS: u64 = 30000;

/// Default watch restart delay after unknown errors (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_SECS: u64 = 5;

/// Default watch restart delay after the stream ends (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS: u64 = 1;

/// Default 1Password Connect endpoint (in-cluster service)
pub const DEFAULT_CONNECT_HOST: &str = "http://onepassword-connect:8080";

/// Default timeout for a single 1Password Connect request (seconds)
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Finalizer token attached to every managed `VaultSecret`
pub const FINALIZER: &str = "vaultsecrets.secret-management.octopilot.io/cleanup";

/// Field manager used for every write issued by the controller
pub const FIELD_MANAGER: &str = "vault-secret-controller";

/// Label stamped on every destination secret
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";

/// Value of `MANAGED_BY_LABEL`
pub const MANAGED_BY_VALUE: &str = "vault-secret-controller";

/// Annotation recording `<namespace>/<name>` of the owning `VaultSecret`
pub const OWNER_ANNOTATION: &str = "secret-management.octopilot.io/owner";

/// Secret type for opaque destination secrets
pub const SECRET_TYPE_OPAQUE: &str = "Opaque";

/// Secret type for registry credential destination secrets
pub const SECRET_TYPE_DOCKER_CONFIG_JSON: &str = "kubernetes.io/dockerconfigjson";

/// Data key holding the docker config blob
pub const DOCKER_CONFIG_JSON_KEY: &str = ".dockerconfigjson";

/// Username presented to registries that accept a raw token as password
pub const DOCKER_TOKEN_USERNAME: &str = "_json_key";
