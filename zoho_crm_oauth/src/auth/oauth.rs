use chrono::Utc;
use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use url::Url;

use crate::auth::token::{TokenManager, TokenRecord};
use crate::client::ZohoClient;
use crate::config::{ClientCredentials, ZohoEndpoints};
use crate::error::{AuthError, AuthResult};
use crate::scopes::ScopeString;

/// Onde a integração está no fluxo de autorização
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationState {
    /// Client ID ainda não configurado
    NoCredentials,
    /// Credenciais presentes, nenhum token: falta o consentimento do usuário
    AwaitingConsent,
    /// Uma troca de grant code está em andamento
    Authorizing,
    Authorized,
}

/// Quantos grant codes recentes ficam lembrados para recusar callbacks duplicados
const REMEMBERED_CODES: usize = 64;

/// Grant codes já enviados ao Zoho, do mais antigo para o mais novo
#[derive(Debug, Default)]
struct UsedCodes {
    order: VecDeque<String>,
    seen: HashSet<String>,
}

impl UsedCodes {
    fn claim(&mut self, code: &str) -> bool {
        if !self.seen.insert(code.to_string()) {
            return false;
        }
        self.order.push_back(code.to_string());
        while self.order.len() > REMEMBERED_CODES {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        true
    }

    fn release(&mut self, code: &str) {
        if self.seen.remove(code) {
            self.order.retain(|c| c != code);
        }
    }
}

/// Reserva de um grant code durante a troca. Sem `keep()`, o código volta a
/// ficar disponível quando a reserva é descartada (falha de transporte ou
/// troca cancelada).
struct CodeClaim<'a> {
    codes: &'a Mutex<UsedCodes>,
    code: String,
    kept: bool,
}

impl CodeClaim<'_> {
    fn keep(&mut self) {
        self.kept = true;
    }
}

impl Drop for CodeClaim<'_> {
    fn drop(&mut self) {
        if self.kept {
            return;
        }
        if let Ok(mut codes) = self.codes.lock() {
            codes.release(&self.code);
            log::debug!("🔓 [OAuth] Grant code liberado para nova tentativa");
        }
    }
}

/// `Authorizing` vale enquanto este guard estiver vivo
struct ExchangeInProgress<'a>(&'a AtomicBool);

impl<'a> ExchangeInProgress<'a> {
    fn start(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for ExchangeInProgress<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Monta a URL de consentimento para o host de accounts do domínio das credenciais.
///
/// Determinística e sem efeitos colaterais; funciona mesmo sem credenciais
/// (quem chama verifica `has_client_id()` antes de redirecionar).
pub fn build_consent_url(credentials: &ClientCredentials, scopes: &ScopeString) -> AuthResult<Url> {
    consent_url_for(&credentials.endpoints(), credentials, scopes)
}

fn consent_url_for(endpoints: &ZohoEndpoints, credentials: &ClientCredentials, scopes: &ScopeString) -> AuthResult<Url> {
    let url = Url::parse_with_params(
        &endpoints.authorization_url(),
        &[
            ("prompt", "consent"),
            ("scope", scopes.as_str()),
            ("client_id", credentials.client_id()),
            ("response_type", "code"),
            ("access_type", "offline"),
            ("redirect_uri", credentials.redirect_uri()),
        ],
    )?;
    Ok(url)
}

/// Fluxo OAuth2 authorization-code do Zoho CRM
pub struct AuthorizationFlow {
    client: Arc<ZohoClient>,
    tokens: Arc<TokenManager>,
    used_codes: Mutex<UsedCodes>,
    exchanging: AtomicBool,
}

impl AuthorizationFlow {
    pub fn new(client: Arc<ZohoClient>, tokens: Arc<TokenManager>) -> Self {
        Self {
            client,
            tokens,
            used_codes: Mutex::new(UsedCodes::default()),
            exchanging: AtomicBool::new(false),
        }
    }

    pub fn credentials(&self) -> &ClientCredentials {
        self.client.credentials()
    }

    /// URL de consentimento usando os hosts do cliente (que podem ser customizados)
    pub fn build_consent_url(&self, scopes: &ScopeString) -> AuthResult<Url> {
        consent_url_for(self.client.endpoints(), self.client.credentials(), scopes)
    }

    pub async fn state(&self) -> AuthorizationState {
        if !self.credentials().has_client_id() {
            AuthorizationState::NoCredentials
        } else if self.exchanging.load(Ordering::SeqCst) {
            AuthorizationState::Authorizing
        } else if self.tokens.has_token().await {
            AuthorizationState::Authorized
        } else {
            AuthorizationState::AwaitingConsent
        }
    }

    /// Reserva o código. `None` se ele já tinha sido enviado ao Zoho.
    fn claim_code(&self, code: &str) -> AuthResult<Option<CodeClaim<'_>>> {
        let mut used = self
            .used_codes
            .lock()
            .map_err(|_| AuthError::store_error("lock de códigos usados envenenado"))?;

        Ok(used.claim(code).then(|| CodeClaim {
            codes: &self.used_codes,
            code: code.to_string(),
            kept: false,
        }))
    }

    /// Troca o grant code (uso único) por refresh/access token e persiste o resultado.
    ///
    /// Em qualquer falha o token armazenado fica intacto. Um código repetido é
    /// recusado localmente com [`AuthError::CodeAlreadyUsed`], sem chamada remota.
    /// Depois de uma falha de transporte (ou de um cancelamento) o mesmo código
    /// pode ser tentado de novo.
    pub async fn exchange_grant_code(&self, code: &str) -> AuthResult<TokenRecord> {
        self.credentials().validate()?;

        let code = code.trim();
        if code.is_empty() {
            return Err(AuthError::provider_rejected("invalid_code", Some("grant code vazio".to_string())));
        }

        let mut claim = match self.claim_code(code)? {
            Some(claim) => claim,
            None => {
                log::warn!("⚠️ [OAuth] Grant code repetido recusado (callback duplicado?)");
                return Err(AuthError::CodeAlreadyUsed);
            }
        };

        let writer = self.tokens.writer().await;
        let _in_progress = ExchangeInProgress::start(&self.exchanging);

        log::info!("🔄 [OAuth] Trocando grant code por tokens...");
        let result = match self.client.exchange_grant_code(code).await {
            Ok(response) => TokenRecord::from_exchange(&response, Utc::now()),
            Err(e) => Err(e),
        };

        match result {
            Ok(record) => {
                claim.keep();
                match writer.write(&record).await {
                    Ok(()) => {
                        log::info!("✅ [OAuth] Refresh token obtido e salvo");
                        Ok(record)
                    }
                    Err(e) => {
                        log::error!("❌ [OAuth] Token obtido mas não foi possível salvar: {}", e);
                        Err(e)
                    }
                }
            }
            Err(e) => {
                // O Zoho só consumiu o código se chegou a responder
                if !e.is_transport() {
                    claim.keep();
                }
                log::warn!("❌ [OAuth] Falha na troca do grant code: {}", e);
                Err(e)
            }
        }
    }
}
