use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard, RwLock};

use crate::client::{TokenResponse, ZohoClient};
use crate::error::{AuthError, AuthResult};
use crate::settings::{keys, SettingChange, SettingsStore};

/// Margem de renovação antecipada do access token
const EXPIRY_MARGIN_SECS: i64 = 300;

/// Credencial delegada armazenada para a conta configurada
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub refresh_token: String,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl TokenRecord {
    pub fn new(refresh_token: impl Into<String>) -> Self {
        Self {
            refresh_token: refresh_token.into(),
            access_token: None,
            expires_at: None,
        }
    }

    /// Monta o registro a partir da resposta da troca do grant code.
    /// Sem `refresh_token` não há credencial de longa duração para guardar.
    pub fn from_exchange(response: &TokenResponse, now: DateTime<Utc>) -> AuthResult<Self> {
        let refresh_token = response
            .refresh_token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                AuthError::provider_rejected(
                    "missing_refresh_token",
                    Some("o Zoho não devolveu refresh_token (access_type=offline?)".to_string()),
                )
            })?;

        let record = Self::new(refresh_token);
        Ok(match response.access_token.clone() {
            Some(access) => record.with_access_token(access, response.expires_in, now),
            None => record,
        })
    }

    pub fn with_access_token(mut self, access_token: String, expires_in: Option<i64>, now: DateTime<Utc>) -> Self {
        self.access_token = Some(access_token);
        self.expires_at = expires_in.map(|secs| now + Duration::seconds(secs));
        self
    }

    /// Access token utilizável em `now`, já descontada a margem de renovação
    pub fn fresh_access_token(&self, now: DateTime<Utc>) -> Option<&str> {
        let token = self.access_token.as_deref()?;
        let expires_at = self.expires_at?;
        if now + Duration::seconds(EXPIRY_MARGIN_SECS) < expires_at {
            Some(token)
        } else {
            None
        }
    }
}

impl fmt::Debug for TokenRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRecord")
            .field("refresh_token", &"***")
            .field("access_token", &self.access_token.as_ref().map(|_| "***"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Persistência do token atual. Implementações não precisam de lock próprio:
/// o [`TokenManager`] serializa as escritas.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn read(&self) -> AuthResult<Option<TokenRecord>>;

    async fn write(&self, record: &TokenRecord) -> AuthResult<()>;

    async fn clear(&self) -> AuthResult<()>;
}

/// Token mantido apenas em memória
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    record: RwLock<Option<TokenRecord>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(record: TokenRecord) -> Self {
        Self {
            record: RwLock::new(Some(record)),
        }
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn read(&self) -> AuthResult<Option<TokenRecord>> {
        Ok(self.record.read().await.clone())
    }

    async fn write(&self, record: &TokenRecord) -> AuthResult<()> {
        *self.record.write().await = Some(record.clone());
        Ok(())
    }

    async fn clear(&self) -> AuthResult<()> {
        *self.record.write().await = None;
        Ok(())
    }
}

/// Token guardado no settings store, nas chaves `refresh_token`,
/// `access_token` e `access_token_expires_at`
pub struct SettingsTokenStore {
    settings: Arc<dyn SettingsStore>,
}

impl SettingsTokenStore {
    pub fn new(settings: Arc<dyn SettingsStore>) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl TokenStore for SettingsTokenStore {
    async fn read(&self) -> AuthResult<Option<TokenRecord>> {
        let refresh_token = match self.settings.get_string(keys::REFRESH_TOKEN) {
            Some(token) if !token.is_empty() => token,
            _ => return Ok(None),
        };

        let expires_at = self
            .settings
            .get_string(keys::ACCESS_TOKEN_EXPIRES_AT)
            .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
            .map(|dt| dt.with_timezone(&Utc));

        Ok(Some(TokenRecord {
            refresh_token,
            access_token: self
                .settings
                .get_string(keys::ACCESS_TOKEN)
                .filter(|t| !t.is_empty()),
            expires_at,
        }))
    }

    async fn write(&self, record: &TokenRecord) -> AuthResult<()> {
        let mut changes = vec![SettingChange::SetString(keys::REFRESH_TOKEN, record.refresh_token.clone())];

        match &record.access_token {
            Some(access) => {
                changes.push(SettingChange::SetString(keys::ACCESS_TOKEN, access.clone()));
                changes.push(match record.expires_at {
                    Some(expires_at) => SettingChange::SetString(keys::ACCESS_TOKEN_EXPIRES_AT, expires_at.to_rfc3339()),
                    None => SettingChange::Remove(keys::ACCESS_TOKEN_EXPIRES_AT),
                });
            }
            None => {
                changes.push(SettingChange::Remove(keys::ACCESS_TOKEN));
                changes.push(SettingChange::Remove(keys::ACCESS_TOKEN_EXPIRES_AT));
            }
        }

        self.settings.apply(&changes)
    }

    async fn clear(&self) -> AuthResult<()> {
        self.settings.apply(&[
            SettingChange::Remove(keys::ACCESS_TOKEN),
            SettingChange::Remove(keys::ACCESS_TOKEN_EXPIRES_AT),
            SettingChange::Remove(keys::REFRESH_TOKEN),
        ])
    }
}

/// Acesso exclusivo de escrita ao store, obtido por [`TokenManager::writer`]
pub struct TokenWriter<'a> {
    _guard: MutexGuard<'a, ()>,
    store: &'a dyn TokenStore,
}

impl TokenWriter<'_> {
    pub async fn read(&self) -> AuthResult<Option<TokenRecord>> {
        self.store.read().await
    }

    pub async fn write(&self, record: &TokenRecord) -> AuthResult<()> {
        self.store.write(record).await
    }

    pub async fn clear(&self) -> AuthResult<()> {
        self.store.clear().await
    }
}

/// Gerenciador do token armazenado: leituras livres, escritas serializadas
pub struct TokenManager {
    store: Arc<dyn TokenStore>,
    write_lock: Mutex<()>,
}

impl TokenManager {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    pub async fn current(&self) -> AuthResult<Option<TokenRecord>> {
        self.store.read().await
    }

    /// Falhas de leitura contam como "sem token"
    pub async fn has_token(&self) -> bool {
        matches!(self.store.read().await, Ok(Some(_)))
    }

    /// Aguarda a vez de escrever. Troca de código e revogação seguram o
    /// writer durante a chamada remota inteira.
    pub async fn writer(&self) -> TokenWriter<'_> {
        TokenWriter {
            _guard: self.write_lock.lock().await,
            store: self.store.as_ref(),
        }
    }

    /// Devolve um access token válido, renovando via refresh token se preciso.
    ///
    /// O registro renovado só é gravado se o refresh token armazenado ainda for
    /// o mesmo usado na renovação.
    pub async fn live_access_token(&self, client: &ZohoClient) -> AuthResult<String> {
        let record = self.current().await?.ok_or(AuthError::NotAuthorized)?;

        if let Some(token) = record.fresh_access_token(Utc::now()) {
            log::debug!("✅ [TokenManager] Access token em cache ainda válido");
            return Ok(token.to_string());
        }

        log::info!("🔄 [TokenManager] Renovando access token...");
        let response = client.refresh_access_token(&record.refresh_token).await?;
        let access_token = response.access_token.clone().ok_or_else(|| {
            AuthError::provider_rejected("invalid_token_response", Some("renovação sem access_token".to_string()))
        })?;

        let writer = self.writer().await;
        match writer.read().await? {
            Some(stored) if stored.refresh_token == record.refresh_token => {
                let renewed = stored.with_access_token(access_token.clone(), response.expires_in, Utc::now());
                writer.write(&renewed).await?;
                log::info!("✅ [TokenManager] Access token renovado e salvo");
            }
            _ => {
                log::warn!("⚠️ [TokenManager] Token mudou durante a renovação, descartando gravação");
            }
        }

        Ok(access_token)
    }
}
