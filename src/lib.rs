// Serviço HTTP da integração Zoho CRM
// Expõe módulos e o router para uso em testes e no binário

pub mod auth;
pub mod config;
pub mod handlers;
pub mod utils;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use zoho_crm_oauth::{
    AuthResult, AuthorizationFlow, CapabilityCatalog, ClientCredentials, ConnectionProbe, RevocationService,
    ScopeResolver, SettingsStore, SettingsTokenStore, TokenManager, YamlSettingsFile, ZohoClient, ZohoEndpoints,
};

use crate::config::Settings;

/// Colaboradores compartilhados pelos handlers
pub struct AppState {
    pub settings: Settings,
    pub store: Arc<dyn SettingsStore>,
    pub catalog: CapabilityCatalog,
    pub resolver: ScopeResolver,
    pub flow: AuthorizationFlow,
    pub probe: ConnectionProbe,
    pub revocation: RevocationService,
}

impl AppState {
    /// Abre o settings store configurado e monta tudo com os hosts do domínio salvo
    pub fn from_settings(settings: Settings) -> AuthResult<Self> {
        let store: Arc<dyn SettingsStore> = Arc::new(YamlSettingsFile::open(&settings.zoho.settings_file)?);
        Self::build(settings, store, None)
    }

    /// `endpoints` substitui os hosts do domínio (mock server em testes)
    pub fn build(
        settings: Settings,
        store: Arc<dyn SettingsStore>,
        endpoints: Option<ZohoEndpoints>,
    ) -> AuthResult<Self> {
        let catalog = match &settings.zoho.catalog_path {
            Some(path) => CapabilityCatalog::from_path(path)?,
            None => CapabilityCatalog::builtin()?,
        };

        let resolver = match &settings.zoho.widened_groups {
            Some(groups) => ScopeResolver::with_widened_groups(groups.iter()),
            None => ScopeResolver::default(),
        };

        let strategy = settings
            .zoho
            .probe
            .to_strategy()
            .map_err(|e| zoho_crm_oauth::AuthError::config_error(e.to_string()))?;

        let credentials = ClientCredentials::from_settings(store.as_ref(), settings.zoho.redirect_uri.clone())?;
        let client = Arc::new(match endpoints {
            Some(endpoints) => ZohoClient::with_endpoints(credentials, endpoints)?,
            None => ZohoClient::new(credentials)?,
        });
        let tokens = Arc::new(TokenManager::new(Arc::new(SettingsTokenStore::new(store.clone()))));

        Ok(Self {
            flow: AuthorizationFlow::new(client.clone(), tokens.clone()),
            probe: ConnectionProbe::with_strategy(client.clone(), tokens.clone(), strategy),
            revocation: RevocationService::new(client, tokens),
            settings,
            store,
            catalog,
            resolver,
        })
    }
}

/// Router completo do serviço
pub fn create_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/auth/zoho", get(auth::start_consent))
        .route("/auth/zoho/callback", get(auth::handle_callback))
        .route("/auth/zoho/status", get(auth::connection_status))
        .route("/auth/zoho/revoke", post(auth::revoke_authorization))
        .route("/auth/zoho/scopes", get(auth::list_scopes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
