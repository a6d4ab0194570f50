//! OAuth2 authentication for the Gmail API

use google_gmail1::{hyper_rustls, hyper_util, yup_oauth2, Gmail};
use std::env;
use std::path::Path;
use tracing::{debug, info};
use yup_oauth2::ApplicationSecret;

use crate::error::{FilterFoxError, Result};

/// Read/write access without permanent deletion. Covers label creation
/// and message modification.
pub const GMAIL_MODIFY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.modify";

/// Type alias for Gmail Hub to simplify type signatures
pub type GmailHub =
    Gmail<hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>>;

/// Resolve the OAuth2 client secret.
///
/// The credentials file wins when present; otherwise `GMAIL_CLIENT_ID` and
/// `GMAIL_CLIENT_SECRET` are used. Neither being available is a
/// configuration error, reported before any network call.
pub async fn resolve_application_secret(credentials_path: &Path) -> Result<ApplicationSecret> {
    if credentials_path.exists() {
        debug!("Reading OAuth2 client secret from {:?}", credentials_path);
        return yup_oauth2::read_application_secret(credentials_path)
            .await
            .map_err(|e| {
                FilterFoxError::ConfigError(format!(
                    "Failed to read credentials file {:?}: {}",
                    credentials_path, e
                ))
            });
    }

    load_credentials_from_env().map_err(|_| {
        FilterFoxError::ConfigError(format!(
            "Missing credentials file at {:?} (and GMAIL_CLIENT_ID/GMAIL_CLIENT_SECRET are not set)",
            credentials_path
        ))
    })
}

/// Initialize Gmail API hub with OAuth2 authentication
///
/// Uses the installed-app flow, which opens a browser on first use. The
/// resulting token is persisted to `token_cache_path` and refreshed
/// automatically afterwards.
pub async fn initialize_gmail_hub(
    credentials_path: &Path,
    token_cache_path: &Path,
) -> Result<GmailHub> {
    let secret = resolve_application_secret(credentials_path).await?;

    if let Some(parent) = token_cache_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let auth = yup_oauth2::InstalledFlowAuthenticator::builder(
        secret,
        yup_oauth2::InstalledFlowReturnMethod::HTTPRedirect,
    )
    .persist_tokens_to_disk(token_cache_path)
    .build()
    .await
    .map_err(|e| FilterFoxError::AuthError(format!("Failed to build authenticator: {}", e)))?;

    // Obtain the token up front so the browser flow happens before the run starts
    auth.token(&[GMAIL_MODIFY_SCOPE])
        .await
        .map_err(|e| FilterFoxError::AuthError(format!("Failed to obtain token: {}", e)))?;

    if token_cache_path.exists() {
        secure_token_file(token_cache_path).await?;
    }
    info!("Authenticated with Gmail API");

    let client = hyper_util::client::legacy::Client::builder(hyper_util::rt::TokioExecutor::new())
        .build(
            hyper_rustls::HttpsConnectorBuilder::new()
                .with_native_roots()
                .map_err(|e| FilterFoxError::AuthError(format!("Failed to load TLS roots: {}", e)))?
                .https_or_http()
                .enable_http1()
                .build(),
        );

    Ok(Gmail::new(client, auth))
}

/// Load OAuth2 credentials from environment variables
///
/// - `GMAIL_CLIENT_ID`: OAuth2 client ID
/// - `GMAIL_CLIENT_SECRET`: OAuth2 client secret
/// - `GMAIL_REDIRECT_URI`: optional, defaults to http://localhost:8080
pub fn load_credentials_from_env() -> Result<ApplicationSecret> {
    let client_id = env::var("GMAIL_CLIENT_ID")
        .map_err(|_| FilterFoxError::ConfigError("GMAIL_CLIENT_ID not set".to_string()))?;
    let client_secret = env::var("GMAIL_CLIENT_SECRET")
        .map_err(|_| FilterFoxError::ConfigError("GMAIL_CLIENT_SECRET not set".to_string()))?;
    let redirect_uri =
        env::var("GMAIL_REDIRECT_URI").unwrap_or_else(|_| "http://localhost:8080".to_string());

    Ok(ApplicationSecret {
        client_id,
        client_secret,
        auth_uri: "https://accounts.google.com/o/oauth2/auth".to_string(),
        token_uri: "https://oauth2.googleapis.com/token".to_string(),
        redirect_uris: vec![redirect_uri],
        ..Default::default()
    })
}

/// Restrict the token file to its owner (0600)
#[cfg(unix)]
pub async fn secure_token_file(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = tokio::fs::metadata(path).await?.permissions();
    perms.set_mode(0o600);
    tokio::fs::set_permissions(path, perms).await?;
    Ok(())
}

/// Windows relies on the profile directory ACLs
#[cfg(windows)]
pub async fn secure_token_file(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::NamedTempFile;

    fn clear_env() {
        env::remove_var("GMAIL_CLIENT_ID");
        env::remove_var("GMAIL_CLIENT_SECRET");
        env::remove_var("GMAIL_REDIRECT_URI");
    }

    #[tokio::test]
    async fn test_secure_token_file() {
        let temp_file = NamedTempFile::new().unwrap();
        tokio::fs::write(temp_file.path(), "token").await.unwrap();

        secure_token_file(temp_file.path()).await.unwrap();

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let metadata = tokio::fs::metadata(temp_file.path()).await.unwrap();
            assert_eq!(metadata.permissions().mode() & 0o777, 0o600);
        }
    }

    #[test]
    #[serial]
    fn test_load_credentials_from_env() {
        env::set_var("GMAIL_CLIENT_ID", "test-id");
        env::set_var("GMAIL_CLIENT_SECRET", "test-secret");
        env::set_var("GMAIL_REDIRECT_URI", "http://localhost:9999");

        let secret = load_credentials_from_env().unwrap();
        assert_eq!(secret.client_id, "test-id");
        assert_eq!(secret.client_secret, "test-secret");
        assert_eq!(secret.redirect_uris[0], "http://localhost:9999");

        clear_env();
    }

    #[tokio::test]
    #[serial]
    async fn test_missing_credentials_is_config_error() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("credentials.json");

        let err = resolve_application_secret(&missing).await.unwrap_err();
        assert!(matches!(err, FilterFoxError::ConfigError(_)));
        assert!(err.to_string().contains("Missing credentials file"));
    }

    #[tokio::test]
    #[serial]
    async fn test_env_credentials_used_when_file_missing() {
        env::set_var("GMAIL_CLIENT_ID", "env-id");
        env::set_var("GMAIL_CLIENT_SECRET", "env-secret");
        env::remove_var("GMAIL_REDIRECT_URI");

        let dir = tempfile::tempdir().unwrap();
        let secret = resolve_application_secret(&dir.path().join("credentials.json"))
            .await
            .unwrap();
        assert_eq!(secret.client_id, "env-id");
        assert_eq!(secret.redirect_uris[0], "http://localhost:8080");

        clear_env();
    }

    #[tokio::test]
    #[serial]
    async fn test_credentials_file_is_read() {
        clear_env();
        let credentials_json = r#"{
            "installed": {
                "client_id": "file-client-id",
                "project_id": "test-project",
                "auth_uri": "https://accounts.google.com/o/oauth2/auth",
                "token_uri": "https://oauth2.googleapis.com/token",
                "client_secret": "file-secret",
                "redirect_uris": ["http://localhost"]
            }
        }"#;
        let temp_file = NamedTempFile::new().unwrap();
        tokio::fs::write(temp_file.path(), credentials_json).await.unwrap();

        let secret = resolve_application_secret(temp_file.path()).await.unwrap();
        assert_eq!(secret.client_id, "file-client-id");
        assert_eq!(secret.client_secret, "file-secret");
    }
}
