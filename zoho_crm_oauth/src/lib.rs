//! # Zoho CRM OAuth
//!
//! Ciclo de vida OAuth2 de uma integração com a API do Zoho CRM.
//!
//! ## Features
//!
//! - Catálogo de capacidades (grupo × leaf) e derivação da string de escopos
//! - URL de consentimento por domínio (`.com`, `.eu`, `.com.cn`, `.in`)
//! - Troca do grant code (uso único) e armazenamento do refresh token
//! - Teste de conexão (identidade ou registro descartável)
//! - Revogação do refresh token
//!
//! ## Exemplo
//!
//! ```no_run
//! use std::sync::Arc;
//! use zoho_crm_oauth::{
//!     AuthorizationFlow, CapabilityCatalog, CapabilitySelection, ClientCredentials,
//!     MemoryTokenStore, ScopeResolver, TokenManager, ZohoClient,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let catalog = CapabilityCatalog::builtin()?;
//!     let selection = CapabilitySelection::new().enable("modules", "leads");
//!     let scopes = ScopeResolver::default().resolve(&selection, &catalog);
//!
//!     let client = Arc::new(ZohoClient::new(ClientCredentials::from_env()?)?);
//!     let tokens = Arc::new(TokenManager::new(Arc::new(MemoryTokenStore::new())));
//!     let flow = AuthorizationFlow::new(client, tokens);
//!
//!     println!("Abra: {}", flow.build_consent_url(&scopes)?);
//!     Ok(())
//! }
//! ```

/// Consentimento, tokens, teste de conexão e revogação
pub mod auth;

/// Cliente HTTP do Zoho (accounts + API de dados)
pub mod client;

/// Credenciais e hosts por domínio
pub mod config;

/// Módulo de tratamento de erros
pub mod error;

pub mod scopes;

pub mod settings;

// Re-exportações para conveniência
pub use auth::{
    build_consent_url, AuthorizationFlow, AuthorizationState, ConnectionProbe, ConnectionState,
    MemoryTokenStore, ProbeStrategy, RevocationService, SettingsTokenStore, TokenManager, TokenRecord,
    TokenStore,
};
pub use client::ZohoClient;
pub use config::{ClientCredentials, ZohoDomain, ZohoEndpoints};
pub use error::{AuthError, AuthResult};
pub use scopes::{CapabilityCatalog, CapabilitySelection, ScopeResolver, ScopeString};
pub use settings::{MemorySettings, SettingChange, SettingsStore, YamlSettingsFile};
