use healthwatch_domain::config::{keys, BootstrapConfig};
use healthwatch_domain::model::SmtpCredentials;
use healthwatch_domain::services::decrypt_secret;
use healthwatch_domain::storage::ConfigStore;

use crate::worker::MonitorError;

/// Where the SMTP sender credentials come from. Values pinned in the
/// environment win; anything missing is read from the config table on every
/// tick so rotated passwords are picked up without a restart.
#[derive(Clone, Default)]
pub struct CredentialSource {
    username: Option<String>,
    password: Option<String>,
    decrypt_key: Option<String>,
}

impl CredentialSource {
    pub fn new(
        username: Option<String>,
        password: Option<String>,
        decrypt_key: Option<String>,
    ) -> Self {
        Self {
            username,
            password,
            decrypt_key,
        }
    }

    pub fn from_bootstrap(config: &BootstrapConfig) -> Self {
        Self::new(
            config.admin_email().map(str::to_string),
            config.admin_email_password().map(str::to_string),
            config.decrypt_key().map(str::to_string),
        )
    }

    pub async fn resolve(&self, config: &dyn ConfigStore) -> Result<SmtpCredentials, MonitorError> {
        let username = match &self.username {
            Some(value) => value.clone(),
            None => config
                .get(keys::ADMIN_EMAIL)
                .await
                .map_err(MonitorError::config_load("admin email"))?,
        };
        let stored_password = match &self.password {
            Some(value) => value.clone(),
            None => config
                .get(keys::ADMIN_EMAIL_PASSWORD)
                .await
                .map_err(MonitorError::config_load("admin email password"))?,
        };
        let password = match &self.decrypt_key {
            Some(key) => decrypt_secret(&stored_password, key.as_bytes())?,
            None => stored_password,
        };

        Ok(SmtpCredentials { username, password })
    }
}

impl std::fmt::Debug for CredentialSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialSource")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("decrypt_key", &self.decrypt_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
