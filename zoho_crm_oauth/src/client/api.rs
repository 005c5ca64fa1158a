use reqwest::{header::AUTHORIZATION, Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

use crate::config::{ClientCredentials, ZohoEndpoints};
use crate::error::{AuthError, AuthResult};

/// Resposta do endpoint `/oauth/v2/token`.
///
/// O Zoho responde HTTP 200 também para erros OAuth, com o campo `error`
/// preenchido, por isso tudo aqui é opcional.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub api_domain: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// Resultado da criação de um registro na API de dados
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordOutcome {
    /// `status` reportado para o registro (ex: `success`, `error`)
    pub status: String,
    pub code: Option<String>,
    /// ID do registro, quando o Zoho chegou a criá-lo
    pub id: Option<String>,
}

impl RecordOutcome {
    pub fn is_success(&self) -> bool {
        self.status.eq_ignore_ascii_case("success")
    }
}

/// Handle explícito para o Zoho: credenciais, hosts e transporte HTTP.
///
/// Construído uma vez e compartilhado (via `Arc`) por fluxo, probe e revogação.
#[derive(Debug, Clone)]
pub struct ZohoClient {
    http: Client,
    credentials: ClientCredentials,
    endpoints: ZohoEndpoints,
}

impl ZohoClient {
    /// Cria o cliente com os hosts do domínio das credenciais
    ///
    /// # Timeouts
    ///
    /// - Total: 30s
    /// - Connect: 5s
    pub fn new(credentials: ClientCredentials) -> AuthResult<Self> {
        let endpoints = credentials.endpoints();
        Self::with_endpoints(credentials, endpoints)
    }

    /// Cria o cliente apontando para hosts arbitrários (mock server em testes)
    pub fn with_endpoints(credentials: ClientCredentials, endpoints: ZohoEndpoints) -> AuthResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| AuthError::config_error(format!("Falha ao criar cliente HTTP: {}", e)))?;

        Ok(Self {
            http,
            credentials,
            endpoints,
        })
    }

    pub fn credentials(&self) -> &ClientCredentials {
        &self.credentials
    }

    pub fn endpoints(&self) -> &ZohoEndpoints {
        &self.endpoints
    }

    /// Troca o grant code por refresh/access token (`grant_type=authorization_code`)
    pub async fn exchange_grant_code(&self, code: &str) -> AuthResult<TokenResponse> {
        let params = [
            ("grant_type", "authorization_code"),
            ("client_id", self.credentials.client_id()),
            ("client_secret", self.credentials.client_secret()),
            ("redirect_uri", self.credentials.redirect_uri()),
            ("code", code),
        ];

        self.post_token_endpoint(&params).await
    }

    /// Gera um access token novo a partir do refresh token
    pub async fn refresh_access_token(&self, refresh_token: &str) -> AuthResult<TokenResponse> {
        let params = [
            ("grant_type", "refresh_token"),
            ("client_id", self.credentials.client_id()),
            ("client_secret", self.credentials.client_secret()),
            ("refresh_token", refresh_token),
        ];

        self.post_token_endpoint(&params).await
    }

    async fn post_token_endpoint(&self, params: &[(&str, &str)]) -> AuthResult<TokenResponse> {
        let url = self.endpoints.token_url();
        log::debug!("📤 [ZohoClient] POST {}", url);

        let response = self.http.post(&url).form(params).send().await?;
        let status = response.status();
        let body = response.text().await?;

        let parsed: Option<TokenResponse> = serde_json::from_str(&body).ok();

        if let Some(error) = parsed.as_ref().and_then(|r| r.error.clone()) {
            log::warn!("❌ [ZohoClient] Erro OAuth do Zoho: {} (HTTP {})", error, status);
            return Err(AuthError::provider_rejected(
                error,
                parsed.and_then(|r| r.error_description),
            ));
        }

        if !status.is_success() {
            return Err(AuthError::transport_error(status.as_u16(), body));
        }

        match parsed {
            Some(token) if token.access_token.is_some() => Ok(token),
            _ => Err(AuthError::provider_rejected(
                "invalid_token_response",
                Some(format!("resposta sem access_token: {}", body)),
            )),
        }
    }

    /// Revoga o refresh token. Devolve o status HTTP; quem chama decide o que é sucesso.
    pub async fn revoke_refresh_token(&self, refresh_token: &str) -> AuthResult<StatusCode> {
        let url = self.endpoints.revoke_url();
        log::debug!("📤 [ZohoClient] POST {}?token=…", url);

        let response = self
            .http
            .post(&url)
            .query(&[("token", refresh_token)])
            .send()
            .await?;

        Ok(response.status())
    }

    /// E-mail da conta dona do access token (endpoint de identidade do accounts)
    pub async fn user_email(&self, access_token: &str) -> AuthResult<Option<String>> {
        let response = self
            .http
            .get(self.endpoints.user_info_url())
            .header(AUTHORIZATION, Self::oauth_header(access_token))
            .send()
            .await?;

        let body: Value = Self::json_or_error(response).await?;

        Ok(body
            .get("Email")
            .or_else(|| body.get("email"))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|email| !email.is_empty())
            .map(str::to_string))
    }

    /// Cria um único registro em `module` e devolve o resultado por registro
    pub async fn create_record(&self, access_token: &str, module: &str, record: Value) -> AuthResult<RecordOutcome> {
        let response = self
            .http
            .post(self.endpoints.module_url(module))
            .header(AUTHORIZATION, Self::oauth_header(access_token))
            .json(&json!({ "data": [record] }))
            .send()
            .await?;

        let body: Value = Self::json_or_error(response).await?;
        let entry = body
            .get("data")
            .and_then(Value::as_array)
            .and_then(|items| items.first())
            .ok_or_else(|| AuthError::provider_rejected("invalid_record_response", Some(body.to_string())))?;

        Ok(RecordOutcome {
            status: entry
                .get("status")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            code: entry.get("code").and_then(Value::as_str).map(str::to_string),
            id: entry
                .get("details")
                .and_then(|d| d.get("id"))
                .and_then(|id| match id {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                }),
        })
    }

    pub async fn delete_record(&self, access_token: &str, module: &str, id: &str) -> AuthResult<()> {
        let response = self
            .http
            .delete(self.endpoints.module_url(module))
            .header(AUTHORIZATION, Self::oauth_header(access_token))
            .query(&[("ids", id)])
            .send()
            .await?;

        Self::json_or_error(response).await.map(|_| ())
    }

    fn oauth_header(access_token: &str) -> String {
        format!("Zoho-oauthtoken {}", access_token)
    }

    /// Converte respostas não-2xx em erro; erros OAuth (`code`/`error`) viram `ProviderRejected`
    async fn json_or_error(response: Response) -> AuthResult<Value> {
        let status = response.status();
        let body = response.text().await?;
        let parsed: Option<Value> = serde_json::from_str(&body).ok();

        if status.is_success() {
            return Ok(parsed.unwrap_or(Value::Null));
        }

        let provider_code = parsed.as_ref().and_then(|v| {
            v.get("code")
                .or_else(|| v.get("error"))
                .and_then(Value::as_str)
                .map(str::to_string)
        });

        match provider_code {
            Some(code) if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN => {
                let description = parsed
                    .as_ref()
                    .and_then(|v| v.get("message"))
                    .and_then(Value::as_str)
                    .map(str::to_string);
                Err(AuthError::provider_rejected(code, description))
            }
            _ => Err(AuthError::transport_error(status.as_u16(), body)),
        }
    }
}
