//! Bootstrap credential resolution
//!
//! The operator provisions a secret named `<instance>-bootstrap-user` whose
//! `bootstrap_user` entry is a newline-separated list of `username:password`
//! lines. The bridge picks the line for its own bootstrap username and uses
//! it for basic authentication against the admin API.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

use crate::cluster::ClusterInstance;

/// Key of the credential blob inside the bootstrap secret
pub const BOOTSTRAP_USER_KEY: &str = "bootstrap_user";

/// Username the operator provisions for its own use
pub const DEFAULT_BOOTSTRAP_USERNAME: &str = "emqx_operator_controller";

/// Errors during credential resolution
#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("Bootstrap secret {secret} not found: {reason}")]
    NotFound { secret: String, reason: String },

    #[error("Bootstrap secret {0} does not contain the bootstrap user")]
    Malformed(String),
}

/// Username/password pair for the admin API
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

impl Credential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

// ============================================================================
// SBIO: Pure functions (no I/O)
// ============================================================================

/// Pick the entry for `username` out of a credential blob.
///
/// Lines are split at the first colon, so passwords may contain colons.
/// Only the first line whose key equals `username` is considered.
pub fn parse_bootstrap_user(blob: &str, username: &str) -> Option<Credential> {
    blob.split('\n').find_map(|line| {
        let (key, password) = line.split_once(':')?;
        (!key.is_empty() && key == username).then(|| Credential::new(key, password))
    })
}

// ============================================================================
// SBIO: I/O boundary
// ============================================================================

/// Read access to secrets held by the orchestration platform
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Data entries of the named secret. A failed lookup is
    /// [`CredentialError::NotFound`].
    async fn secret_data(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<BTreeMap<String, Vec<u8>>, CredentialError>;
}

/// Fetch and parse the bootstrap credential of `instance`
pub async fn resolve_bootstrap_credential(
    store: &dyn SecretStore,
    instance: &ClusterInstance,
    username: &str,
) -> Result<Credential, CredentialError> {
    let secret = instance.bootstrap_secret_name();
    let data = store.secret_data(instance.namespace(), &secret).await?;

    let blob = data
        .get(BOOTSTRAP_USER_KEY)
        .ok_or_else(|| CredentialError::Malformed(secret.clone()))?;

    let text = std::str::from_utf8(blob).map_err(|_| CredentialError::Malformed(secret.clone()))?;
    parse_bootstrap_user(text, username).ok_or(CredentialError::Malformed(secret))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::MockSecretStore;

    #[test]
    fn test_parse_single_entry() {
        let cred =
            parse_bootstrap_user("emqx_operator_controller:secret", DEFAULT_BOOTSTRAP_USERNAME)
                .unwrap();
        assert_eq!(cred, Credential::new("emqx_operator_controller", "secret"));
    }

    #[test]
    fn test_parse_keeps_colons_in_password() {
        let cred = parse_bootstrap_user(
            "emqx_operator_controller:pa:ss:word",
            DEFAULT_BOOTSTRAP_USERNAME,
        )
        .unwrap();
        assert_eq!(cred.password, "pa:ss:word");
    }

    #[test]
    fn test_parse_picks_matching_line() {
        let blob = "admin:public\nemqx_operator_controller:abc\nother:xyz";
        let cred = parse_bootstrap_user(blob, DEFAULT_BOOTSTRAP_USERNAME).unwrap();
        assert_eq!(cred.password, "abc");
    }

    #[test]
    fn test_parse_first_match_wins() {
        let blob = "emqx_operator_controller:first\nemqx_operator_controller:second";
        let cred = parse_bootstrap_user(blob, DEFAULT_BOOTSTRAP_USERNAME).unwrap();
        assert_eq!(cred.password, "first");
    }

    #[test]
    fn test_parse_no_matching_line() {
        assert!(
            parse_bootstrap_user("admin:public\nroot:root", DEFAULT_BOOTSTRAP_USERNAME).is_none()
        );
        assert!(parse_bootstrap_user("", DEFAULT_BOOTSTRAP_USERNAME).is_none());
        // Prefix of the key is not a match
        assert!(parse_bootstrap_user("emqx_operator:x", DEFAULT_BOOTSTRAP_USERNAME).is_none());
        // No colon at all
        assert!(
            parse_bootstrap_user("emqx_operator_controller", DEFAULT_BOOTSTRAP_USERNAME).is_none()
        );
    }

    #[test]
    fn test_parse_empty_key_never_matches() {
        assert!(parse_bootstrap_user(":password", "").is_none());
    }

    #[test]
    fn test_debug_redacts_password() {
        let cred = Credential::new("user", "hunter2");
        let printed = format!("{:?}", cred);
        assert!(printed.contains("user"));
        assert!(!printed.contains("hunter2"));
    }

    #[tokio::test]
    async fn test_resolve_from_store() {
        let instance = ClusterInstance::new("emqx", "broker", "emqx/emqx:4.4.14");
        let store = MockSecretStore::new().with_secret(
            "broker",
            "emqx-bootstrap-user",
            BOOTSTRAP_USER_KEY,
            "emqx_operator_controller:s3cret",
        );

        let cred = resolve_bootstrap_credential(&store, &instance, DEFAULT_BOOTSTRAP_USERNAME)
            .await
            .unwrap();
        assert_eq!(cred.password, "s3cret");
    }

    #[tokio::test]
    async fn test_resolve_missing_secret() {
        let instance = ClusterInstance::new("emqx", "broker", "emqx/emqx:4.4.14");
        let store = MockSecretStore::new();

        let result =
            resolve_bootstrap_credential(&store, &instance, DEFAULT_BOOTSTRAP_USERNAME).await;
        assert!(matches!(result, Err(CredentialError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_resolve_missing_key_is_malformed() {
        let instance = ClusterInstance::new("emqx", "broker", "emqx/emqx:4.4.14");
        let store = MockSecretStore::new().with_secret(
            "broker",
            "emqx-bootstrap-user",
            "other_key",
            "emqx_operator_controller:s3cret",
        );

        let result =
            resolve_bootstrap_credential(&store, &instance, DEFAULT_BOOTSTRAP_USERNAME).await;
        assert!(matches!(result, Err(CredentialError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_resolve_without_bootstrap_line_is_malformed() {
        let instance = ClusterInstance::new("emqx", "broker", "emqx/emqx:4.4.14");
        let store = MockSecretStore::new().with_secret(
            "broker",
            "emqx-bootstrap-user",
            BOOTSTRAP_USER_KEY,
            "admin:public",
        );

        let result =
            resolve_bootstrap_credential(&store, &instance, DEFAULT_BOOTSTRAP_USERNAME).await;
        assert!(
            matches!(result, Err(CredentialError::Malformed(name)) if name == "emqx-bootstrap-user")
        );
    }

    #[tokio::test]
    async fn test_resolve_non_utf8_blob_is_malformed() {
        let instance = ClusterInstance::new("emqx", "broker", "emqx/emqx:4.4.14");
        let store = MockSecretStore::new().with_secret(
            "broker",
            "emqx-bootstrap-user",
            BOOTSTRAP_USER_KEY,
            b"emqx_operator_controller:s3\xffcret",
        );

        let result =
            resolve_bootstrap_credential(&store, &instance, DEFAULT_BOOTSTRAP_USERNAME).await;
        assert!(matches!(result, Err(CredentialError::Malformed(_))));
    }
}
