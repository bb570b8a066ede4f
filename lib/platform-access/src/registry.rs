//! Name-keyed provider registry.
//!
//! Providers are built on first use: the first lookup discovers every
//! provider that has credentials, and concurrent first lookups share that
//! single initialization. Later lookups only read the cached table.

use crate::credentials::Credentials;
use crate::error::{ConfigurationError, RegistryError};
use crate::oidc::ProviderSettings;
use crate::provider::{Provider, ProviderKind, http_client};
use oauth_sidecar_core::ProviderName;
use rootcause::prelude::Report;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{info, instrument};

type ProviderTable = HashMap<ProviderName, Arc<dyn Provider>>;

/// Resolves provider names to initialized providers.
pub struct ProviderRegistry {
    credentials: Credentials,
    settings: ProviderSettings,
    providers: OnceCell<ProviderTable>,
}

impl ProviderRegistry {
    /// Creates a registry. No provider is contacted until the first lookup.
    #[must_use]
    pub fn new(credentials: Credentials, settings: ProviderSettings) -> Self {
        Self {
            credentials,
            settings,
            providers: OnceCell::new(),
        }
    }

    /// Creates an already initialized registry from ready providers.
    #[must_use]
    pub fn with_providers(providers: impl IntoIterator<Item = Arc<dyn Provider>>) -> Self {
        let table = providers
            .into_iter()
            .map(|provider| (provider.name().clone(), provider))
            .collect();
        Self {
            credentials: Credentials::new(),
            settings: ProviderSettings::default(),
            providers: OnceCell::new_with(Some(table)),
        }
    }

    /// Returns the provider registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is not a known provider, the provider
    /// has no credentials, or provider discovery fails.
    #[instrument(skip(self))]
    pub async fn get(&self, name: &str) -> Result<Arc<dyn Provider>, Report<RegistryError>> {
        let unknown = || {
            RegistryError::from(ConfigurationError::UnknownProvider {
                name: name.to_string(),
            })
        };
        let provider_name = name.parse::<ProviderName>().map_err(|_| unknown())?;
        if ProviderKind::find(provider_name.as_str()).is_none() {
            return Err(unknown().into());
        }

        let providers = match self.providers.get() {
            Some(providers) => providers,
            None => {
                if self.credentials.get(&provider_name).is_none() {
                    return Err(missing_credentials(provider_name).into());
                }
                self.providers.get_or_try_init(|| self.initialize()).await?
            }
        };

        providers
            .get(&provider_name)
            .cloned()
            .ok_or_else(|| missing_credentials(provider_name).into())
    }

    /// Returns true once the provider table has been built.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.providers.initialized()
    }

    async fn initialize(&self) -> Result<ProviderTable, Report<RegistryError>> {
        let http_client = http_client(self.settings.timeout()).map_err(RegistryError::from)?;

        let mut providers = ProviderTable::new();
        for kind in ProviderKind::ALL {
            let name = kind.name();
            let Some(credentials) = self.credentials.get(&name) else {
                continue;
            };
            let discovery_url = self
                .settings
                .discovery_url(&name)
                .unwrap_or_else(|| kind.default_discovery_url());

            let provider = kind
                .build(credentials, discovery_url, http_client.clone())
                .await
                .map_err(|report| {
                    report.context(RegistryError::Discovery {
                        provider: name.clone(),
                    })
                })?;

            info!(provider = %name, "provider initialized");
            providers.insert(name, provider);
        }

        Ok(providers)
    }
}

fn missing_credentials(provider: ProviderName) -> RegistryError {
    ConfigurationError::MissingCredentials { provider }.into()
}
