use reqwest::StatusCode;
use std::sync::Arc;

use crate::auth::token::TokenManager;
use crate::client::ZohoClient;
use crate::error::{AuthError, AuthResult};

/// Revoga o refresh token no Zoho e só então limpa o armazenamento local
pub struct RevocationService {
    client: Arc<ZohoClient>,
    tokens: Arc<TokenManager>,
}

impl RevocationService {
    pub fn new(client: Arc<ZohoClient>, tokens: Arc<TokenManager>) -> Self {
        Self { client, tokens }
    }

    /// `true` apenas quando o Zoho confirmou (HTTP 200) e o token local foi apagado
    pub async fn revoke(&self) -> bool {
        match self.try_revoke().await {
            Ok(()) => true,
            Err(AuthError::NotAuthorized) => {
                log::info!("ℹ️ [Revoke] Nenhum token armazenado, nada a revogar");
                false
            }
            Err(e) => {
                log::warn!("❌ [Revoke] Revogação não confirmada, token mantido: {}", e);
                false
            }
        }
    }

    /// Como [`revoke`](Self::revoke), mas com o motivo da falha
    pub async fn try_revoke(&self) -> AuthResult<()> {
        let writer = self.tokens.writer().await;
        let record = writer.read().await?.ok_or(AuthError::NotAuthorized)?;

        log::info!("🔄 [Revoke] Revogando refresh token no Zoho...");
        let status = self.client.revoke_refresh_token(&record.refresh_token).await?;

        if status != StatusCode::OK {
            return Err(AuthError::transport_error(
                status.as_u16(),
                "revogação não confirmada pelo Zoho",
            ));
        }

        writer.clear().await?;
        log::info!("✅ [Revoke] Refresh token revogado e removido");
        Ok(())
    }
}
