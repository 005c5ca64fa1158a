use thiserror::Error;

/// Tipos de erro do ciclo de vida OAuth2 do Zoho CRM
#[derive(Error, Debug)]
pub enum AuthError {
    /// Client ID/Secret ausentes ou configuração inconsistente
    #[error("Configuração inválida: {0}")]
    ConfigError(String),

    #[error("Erro de rede: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// Resposta HTTP inesperada do provedor, sem erro OAuth reconhecível
    #[error("Erro de transporte (HTTP {status}): {body}")]
    TransportError { status: u16, body: String },

    /// Erro OAuth reportado pelo Zoho (ex: `invalid_code`, `invalid_client`)
    #[error("Zoho rejeitou a requisição: {code}{}", .description.as_deref().map(|d| format!(" ({})", d)).unwrap_or_default())]
    ProviderRejected {
        code: String,
        description: Option<String>,
    },

    #[error("Código de autorização já utilizado")]
    CodeAlreadyUsed,

    #[error("Integração não autorizada: nenhum refresh token armazenado")]
    NotAuthorized,

    #[error("Erro de armazenamento: {0}")]
    StoreError(String),

    #[error("Catálogo de escopos inválido: {0}")]
    CatalogError(String),

    #[error("Erro de parsing de URL: {0}")]
    UrlParseError(#[from] url::ParseError),

    #[error("Erro de IO: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Erro de serialização: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl AuthError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn store_error(msg: impl Into<String>) -> Self {
        Self::StoreError(msg.into())
    }

    pub fn catalog_error(msg: impl Into<String>) -> Self {
        Self::CatalogError(msg.into())
    }

    pub fn transport_error(status: u16, body: impl Into<String>) -> Self {
        Self::TransportError {
            status,
            body: body.into(),
        }
    }

    pub fn provider_rejected(code: impl Into<String>, description: Option<String>) -> Self {
        Self::ProviderRejected {
            code: code.into(),
            description,
        }
    }

    /// Falha de comunicação com o provedor (sempre recuperável)
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::NetworkError(_) | Self::TransportError { .. })
    }

    pub fn is_provider_rejected(&self) -> bool {
        matches!(self, Self::ProviderRejected { .. } | Self::CodeAlreadyUsed)
    }

    /// O usuário precisa passar novamente pela tela de consentimento
    pub fn requires_reconsent(&self) -> bool {
        match self {
            Self::CodeAlreadyUsed | Self::NotAuthorized => true,
            Self::ProviderRejected { code, .. } => matches!(
                code.as_str(),
                "invalid_code" | "invalid_grant" | "access_denied" | "missing_refresh_token"
            ),
            _ => false,
        }
    }
}

/// Tipo de resultado padrão para operações de autenticação
pub type AuthResult<T> = Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let used = AuthError::CodeAlreadyUsed;
        assert_eq!(used.to_string(), "Código de autorização já utilizado");

        let config = AuthError::config_error("client_id vazio");
        assert_eq!(config.to_string(), "Configuração inválida: client_id vazio");

        let store = AuthError::store_error("disco cheio");
        assert_eq!(store.to_string(), "Erro de armazenamento: disco cheio");

        let transport = AuthError::transport_error(503, "unavailable");
        assert_eq!(transport.to_string(), "Erro de transporte (HTTP 503): unavailable");
    }

    #[test]
    fn test_provider_rejected_display() {
        let bare = AuthError::provider_rejected("invalid_code", None);
        assert_eq!(bare.to_string(), "Zoho rejeitou a requisição: invalid_code");

        let described = AuthError::provider_rejected("invalid_client", Some("client desconhecido".into()));
        assert_eq!(
            described.to_string(),
            "Zoho rejeitou a requisição: invalid_client (client desconhecido)"
        );
    }

    #[test]
    fn test_classification() {
        assert!(AuthError::transport_error(500, "").is_transport());
        assert!(!AuthError::transport_error(500, "").is_provider_rejected());

        let rejected = AuthError::provider_rejected("invalid_code", None);
        assert!(rejected.is_provider_rejected());
        assert!(rejected.requires_reconsent());
        assert!(!rejected.is_transport());

        assert!(AuthError::CodeAlreadyUsed.requires_reconsent());
        assert!(AuthError::NotAuthorized.requires_reconsent());
        assert!(!AuthError::provider_rejected("invalid_client", None).requires_reconsent());
        assert!(!AuthError::store_error("x").requires_reconsent());
    }

    #[test]
    fn test_url_parse_error_from() {
        let url_error = url::Url::parse("not-a-valid-url").unwrap_err();
        let auth_error = AuthError::from(url_error);
        assert!(auth_error.to_string().contains("Erro de parsing de URL"));
    }

    #[test]
    fn test_serialization_error_from() {
        let parse_result: Result<serde_json::Value, _> = serde_json::from_str("{invalid json}");
        let auth_error = AuthError::from(parse_result.unwrap_err());
        assert!(auth_error.to_string().contains("Erro de serialização"));
    }
}
