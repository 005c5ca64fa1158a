//! Connection probe
//!
//! Verifica se o token armazenado ainda permite falar com a API do Zoho.
//! Falha de conectividade é um resultado esperado: nada aqui propaga erro.

use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

use crate::auth::token::TokenManager;
use crate::client::ZohoClient;
use crate::error::{AuthError, AuthResult};

/// Estado da integração, sempre recalculado (nunca persistido)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum ConnectionState {
    Unconfigured,
    AwaitingConsent,
    Connected,
    Failed(String),
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

/// Como a conectividade é testada
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeStrategy {
    /// Renova o access token e resolve o e-mail da conta no endpoint de identidade
    Identity,
    /// Cria um registro descartável em `module`, lê o status e sempre tenta apagá-lo
    RecordRoundTrip { module: String },
}

impl Default for ProbeStrategy {
    fn default() -> Self {
        ProbeStrategy::Identity
    }
}

impl ProbeStrategy {
    pub fn record_round_trip() -> Self {
        ProbeStrategy::RecordRoundTrip {
            module: "Leads".to_string(),
        }
    }
}

pub struct ConnectionProbe {
    client: Arc<ZohoClient>,
    tokens: Arc<TokenManager>,
    strategy: ProbeStrategy,
}

impl ConnectionProbe {
    pub fn new(client: Arc<ZohoClient>, tokens: Arc<TokenManager>) -> Self {
        Self::with_strategy(client, tokens, ProbeStrategy::default())
    }

    pub fn with_strategy(client: Arc<ZohoClient>, tokens: Arc<TokenManager>, strategy: ProbeStrategy) -> Self {
        Self {
            client,
            tokens,
            strategy,
        }
    }

    pub fn strategy(&self) -> &ProbeStrategy {
        &self.strategy
    }

    /// `true` se a integração está utilizável agora. Nunca falha.
    pub async fn check(&self) -> bool {
        self.connection_state().await.is_connected()
    }

    pub async fn connection_state(&self) -> ConnectionState {
        if !self.client.credentials().has_client_id() {
            return ConnectionState::Unconfigured;
        }

        match self.tokens.current().await {
            Ok(Some(_)) => {}
            Ok(None) => return ConnectionState::AwaitingConsent,
            Err(e) => {
                log::error!("❌ [Probe] Falha ao ler token armazenado: {}", e);
                return ConnectionState::Failed(e.to_string());
            }
        }

        match self.probe().await {
            Ok(()) => {
                log::info!("✅ [Probe] Conexão com o Zoho CRM verificada");
                ConnectionState::Connected
            }
            Err(AuthError::NotAuthorized) => ConnectionState::AwaitingConsent,
            Err(e) => {
                log::warn!("❌ [Probe] Teste de conexão falhou: {}", e);
                ConnectionState::Failed(e.to_string())
            }
        }
    }

    async fn probe(&self) -> AuthResult<()> {
        let access_token = self.tokens.live_access_token(&self.client).await?;

        match &self.strategy {
            ProbeStrategy::Identity => self.probe_identity(&access_token).await,
            ProbeStrategy::RecordRoundTrip { module } => self.probe_record(&access_token, module).await,
        }
    }

    async fn probe_identity(&self, access_token: &str) -> AuthResult<()> {
        match self.client.user_email(access_token).await? {
            Some(email) => {
                log::debug!("🔍 [Probe] Token pertence a {}", email);
                Ok(())
            }
            None => Err(AuthError::provider_rejected(
                "missing_identity",
                Some("endpoint de identidade não devolveu e-mail".to_string()),
            )),
        }
    }

    /// Registro de teste: adquirir, sempre tentar liberar, veredito independente da liberação
    async fn probe_record(&self, access_token: &str, module: &str) -> AuthResult<()> {
        let record = json!({
            "Last_Name": "Connection Test",
            "Company": "Zoho CRM Integration",
            "Description": "Registro temporário criado pelo teste de conexão",
        });

        let outcome = self.client.create_record(access_token, module, record).await?;

        if let Some(id) = outcome.id.as_deref() {
            if let Err(e) = self.client.delete_record(access_token, module, id).await {
                log::warn!("⚠️ [Probe] Não foi possível apagar o registro de teste {} em {}: {}", id, module, e);
            }
        }

        if outcome.is_success() {
            Ok(())
        } else {
            Err(AuthError::provider_rejected(
                outcome.code.unwrap_or_else(|| "record_not_created".to_string()),
                Some(format!("status do registro de teste: {}", outcome.status)),
            ))
        }
    }
}
