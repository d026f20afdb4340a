//! LDAP connection factory
//!
//! Opens and binds ldap3 connections for the pool.

use async_trait::async_trait;
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings};
use tracing::{debug, info, warn};

use dirkeeper_directory::error::{DirectoryError, DirectoryResult};

use crate::config::SourceConfig;
use crate::pool::ConnectionFactory;

/// Result code returned by a bind with invalid credentials.
const RC_INVALID_CREDENTIALS: u32 = 49;

/// Opens bound LDAP connections for one source.
pub struct LdapConnectionFactory {
    url: String,
    bind_dn: String,
    bind_password: String,
    settings: LdapConnSettings,
}

impl LdapConnectionFactory {
    /// Build a factory from the source configuration.
    pub fn new(config: &SourceConfig) -> Self {
        let settings = LdapConnSettings::new()
            .set_conn_timeout(config.connection.connection_timeout())
            .set_starttls(config.use_starttls)
            .set_no_tls_verify(!config.tls.verify_certificate);

        Self {
            url: config.url(),
            bind_dn: config.bind_dn.clone(),
            bind_password: config.bind_password.clone().unwrap_or_default(),
            settings,
        }
    }

    /// The server URL connections are opened against.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ConnectionFactory for LdapConnectionFactory {
    type Connection = Ldap;

    async fn open(&self) -> DirectoryResult<Ldap> {
        debug!(url = %self.url, "Connecting to LDAP server");

        let (conn, mut ldap) = LdapConnAsync::with_settings(self.settings.clone(), &self.url)
            .await
            .map_err(|e| {
                DirectoryError::connection_failed_with_source(
                    format!("Failed to connect to LDAP server at {}", self.url),
                    e,
                )
            })?;

        ldap3::drive!(conn);

        debug!(bind_dn = %self.bind_dn, "Performing LDAP bind");

        let result = ldap
            .simple_bind(&self.bind_dn, &self.bind_password)
            .await
            .map_err(|e| {
                DirectoryError::connection_failed_with_source(
                    format!("LDAP bind failed for {}", self.bind_dn),
                    e,
                )
            })?;

        if result.rc == RC_INVALID_CREDENTIALS {
            return Err(DirectoryError::AuthenticationFailed);
        }
        if result.rc != 0 {
            return Err(DirectoryError::connection_failed(format!(
                "LDAP bind failed with code {}: {}",
                result.rc, result.text
            )));
        }

        info!(url = %self.url, "LDAP connection established");
        Ok(ldap)
    }

    fn is_alive(&self, connection: &mut Ldap) -> bool {
        !connection.is_closed()
    }

    async fn close(&self, mut connection: Ldap) {
        if connection.is_closed() {
            return;
        }
        if let Err(e) = connection.unbind().await {
            warn!(error = %e, "Error during LDAP unbind");
        }
    }
}

impl std::fmt::Debug for LdapConnectionFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LdapConnectionFactory")
            .field("url", &self.url)
            .field("bind_dn", &self.bind_dn)
            .finish_non_exhaustive()
    }
}
