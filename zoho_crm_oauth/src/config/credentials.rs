use dotenv::dotenv;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::{AuthError, AuthResult};
use crate::settings::{keys, SettingsStore};

/// Data center do Zoho onde a conta foi criada
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZohoDomain {
    #[default]
    Com,
    Eu,
    Cn,
    In,
}

impl ZohoDomain {
    pub fn accounts_host(&self) -> &'static str {
        match self {
            ZohoDomain::Com => "https://accounts.zoho.com",
            ZohoDomain::Eu => "https://accounts.zoho.eu",
            ZohoDomain::Cn => "https://accounts.zoho.com.cn",
            ZohoDomain::In => "https://accounts.zoho.in",
        }
    }

    pub fn api_host(&self) -> &'static str {
        match self {
            ZohoDomain::Com => "https://www.zohoapis.com",
            ZohoDomain::Eu => "https://www.zohoapis.eu",
            ZohoDomain::Cn => "https://www.zohoapis.com.cn",
            ZohoDomain::In => "https://www.zohoapis.in",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ZohoDomain::Com => "com",
            ZohoDomain::Eu => "eu",
            ZohoDomain::Cn => "cn",
            ZohoDomain::In => "in",
        }
    }
}

impl fmt::Display for ZohoDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ZohoDomain {
    type Err = AuthError;

    /// Aceita o código curto (`com`, `eu`, `cn`, `in`) ou a URL de accounts
    /// salva por versões antigas das configurações (`https://accounts.zoho.eu`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().trim_end_matches('/').to_lowercase();
        let suffix = normalized
            .strip_prefix("https://")
            .or_else(|| normalized.strip_prefix("http://"))
            .map(|host| host.trim_start_matches("accounts.zoho.").to_string())
            .unwrap_or(normalized);

        match suffix.as_str() {
            "com" | "us" => Ok(ZohoDomain::Com),
            "eu" => Ok(ZohoDomain::Eu),
            "cn" | "com.cn" => Ok(ZohoDomain::Cn),
            "in" => Ok(ZohoDomain::In),
            other => Err(AuthError::config_error(format!("Domínio Zoho desconhecido: {}", other))),
        }
    }
}

/// Hosts usados pelo cliente. Em produção derivam do domínio; em testes
/// apontam para um servidor mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZohoEndpoints {
    pub accounts_url: String,
    pub api_url: String,
}

impl ZohoEndpoints {
    pub fn for_domain(domain: ZohoDomain) -> Self {
        Self {
            accounts_url: domain.accounts_host().to_string(),
            api_url: domain.api_host().to_string(),
        }
    }

    pub fn custom(accounts_url: impl Into<String>, api_url: impl Into<String>) -> Self {
        Self {
            accounts_url: accounts_url.into().trim_end_matches('/').to_string(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn authorization_url(&self) -> String {
        format!("{}/oauth/v2/auth", self.accounts_url)
    }

    pub fn token_url(&self) -> String {
        format!("{}/oauth/v2/token", self.accounts_url)
    }

    pub fn revoke_url(&self) -> String {
        format!("{}/oauth/v2/token/revoke", self.accounts_url)
    }

    pub fn user_info_url(&self) -> String {
        format!("{}/oauth/user/info", self.accounts_url)
    }

    pub fn module_url(&self, module: &str) -> String {
        format!("{}/crm/v2/{}", self.api_url, module)
    }
}

/// Credenciais do client registrado no Zoho API Console.
///
/// Os campos são privados: colaboradores leem apenas o que precisam pelos
/// acessores abaixo. O secret só é visível dentro do crate.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ClientCredentials {
    client_id: String,
    client_secret: String,
    account_email: String,
    domain: ZohoDomain,
    redirect_uri: String,
}

impl ClientCredentials {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        account_email: impl Into<String>,
        domain: ZohoDomain,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into().trim().to_string(),
            client_secret: client_secret.into().trim().to_string(),
            account_email: account_email.into().trim().to_string(),
            domain,
            redirect_uri: redirect_uri.into().trim().to_string(),
        }
    }

    /// Carrega as credenciais das variáveis `ZOHO_*` (lendo `.env` se existir)
    pub fn from_env() -> AuthResult<Self> {
        if cfg!(not(test)) && Path::new(".env").exists() {
            dotenv().map_err(|e| AuthError::config_error(format!("Erro ao carregar .env: {}", e)))?;
        }

        let domain = match env::var("ZOHO_DOMAIN") {
            Ok(value) if !value.trim().is_empty() => value.parse()?,
            _ => ZohoDomain::default(),
        };

        let credentials = Self::new(
            env::var("ZOHO_CLIENT_ID").unwrap_or_default(),
            env::var("ZOHO_CLIENT_SECRET").unwrap_or_default(),
            env::var("ZOHO_CURRENT_USER_EMAIL").unwrap_or_default(),
            domain,
            env::var("ZOHO_REDIRECT_URI")
                .unwrap_or_else(|_| "http://localhost:8080/auth/zoho/callback".to_string()),
        );

        log::debug!("🔧 [Config] Credenciais carregadas do ambiente: {:?}", credentials);
        Ok(credentials)
    }

    /// Lê as credenciais do settings store. A redirect URI não é salva lá:
    /// ela pertence à aplicação hospedeira.
    pub fn from_settings(store: &dyn SettingsStore, redirect_uri: impl Into<String>) -> AuthResult<Self> {
        let domain = match store.get_string(keys::ZOHO_DOMAIN) {
            Some(value) if !value.trim().is_empty() => value.parse()?,
            _ => ZohoDomain::default(),
        };

        Ok(Self::new(
            store.get_string(keys::CLIENT_ID).unwrap_or_default(),
            store.get_string(keys::CLIENT_SECRET).unwrap_or_default(),
            store.get_string(keys::CURRENT_USER_EMAIL).unwrap_or_default(),
            domain,
            redirect_uri,
        ))
    }

    /// Persiste as credenciais no settings store (o papel do formulário de configuração)
    pub fn save_to(&self, store: &dyn SettingsStore) -> AuthResult<()> {
        store.set_string(keys::CLIENT_ID, &self.client_id)?;
        store.set_string(keys::CLIENT_SECRET, &self.client_secret)?;
        store.set_string(keys::CURRENT_USER_EMAIL, &self.account_email)?;
        store.set_string(keys::ZOHO_DOMAIN, self.domain.as_str())
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub(crate) fn client_secret(&self) -> &str {
        &self.client_secret
    }

    pub fn account_email(&self) -> &str {
        &self.account_email
    }

    pub fn domain(&self) -> ZohoDomain {
        self.domain
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    pub fn has_client_id(&self) -> bool {
        !self.client_id.is_empty()
    }

    pub fn has_client_secret(&self) -> bool {
        !self.client_secret.is_empty()
    }

    /// Garante que client_id e client_secret existem antes de falar com o provedor
    pub fn validate(&self) -> AuthResult<()> {
        if !self.has_client_id() {
            return Err(AuthError::config_error("client_id não configurado"));
        }
        if !self.has_client_secret() {
            return Err(AuthError::config_error("client_secret não configurado"));
        }
        Ok(())
    }

    pub fn endpoints(&self) -> ZohoEndpoints {
        ZohoEndpoints::for_domain(self.domain)
    }
}

impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &if self.has_client_secret() { "***" } else { "" })
            .field("account_email", &self.account_email)
            .field("domain", &self.domain)
            .field("redirect_uri", &self.redirect_uri)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::MemorySettings;

    #[test]
    fn test_domain_hosts() {
        assert_eq!(ZohoDomain::Com.accounts_host(), "https://accounts.zoho.com");
        assert_eq!(ZohoDomain::Eu.api_host(), "https://www.zohoapis.eu");
        assert_eq!(ZohoDomain::Cn.accounts_host(), "https://accounts.zoho.com.cn");
        assert_eq!(ZohoDomain::In.api_host(), "https://www.zohoapis.in");
    }

    #[test]
    fn test_domain_from_str() {
        assert_eq!("COM".parse::<ZohoDomain>().unwrap(), ZohoDomain::Com);
        assert_eq!("eu".parse::<ZohoDomain>().unwrap(), ZohoDomain::Eu);
        assert_eq!("https://accounts.zoho.com.cn/".parse::<ZohoDomain>().unwrap(), ZohoDomain::Cn);
        assert_eq!("https://accounts.zoho.in".parse::<ZohoDomain>().unwrap(), ZohoDomain::In);
        assert!("jp".parse::<ZohoDomain>().is_err());
    }

    #[test]
    fn test_validate() {
        let ok = ClientCredentials::new("id1", "sec1", "a@b.com", ZohoDomain::Com, "http://cb");
        assert!(ok.validate().is_ok());

        let no_id = ClientCredentials::new("", "sec1", "", ZohoDomain::Com, "");
        assert!(matches!(no_id.validate(), Err(AuthError::ConfigError(_))));
        assert!(!no_id.has_client_id());

        let no_secret = ClientCredentials::new("id1", "  ", "", ZohoDomain::Com, "");
        assert!(no_secret.has_client_id());
        assert!(matches!(no_secret.validate(), Err(AuthError::ConfigError(_))));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let creds = ClientCredentials::new("id1", "super-secret", "a@b.com", ZohoDomain::Eu, "http://cb");
        let debug = format!("{:?}", creds);
        assert!(debug.contains("id1"));
        assert!(!debug.contains("super-secret"));
    }

    #[test]
    fn test_from_env() {
        temp_env::with_vars(
            vec![
                ("ZOHO_CLIENT_ID", Some("env_id")),
                ("ZOHO_CLIENT_SECRET", Some("env_secret")),
                ("ZOHO_CURRENT_USER_EMAIL", Some("admin@example.com")),
                ("ZOHO_DOMAIN", Some("eu")),
                ("ZOHO_REDIRECT_URI", Some("https://example.com/cb")),
            ],
            || {
                let creds = ClientCredentials::from_env().unwrap();
                assert_eq!(creds.client_id(), "env_id");
                assert_eq!(creds.client_secret(), "env_secret");
                assert_eq!(creds.account_email(), "admin@example.com");
                assert_eq!(creds.domain(), ZohoDomain::Eu);
                assert_eq!(creds.redirect_uri(), "https://example.com/cb");
            },
        );
    }

    #[test]
    fn test_from_env_missing_vars() {
        temp_env::with_vars_unset(
            vec!["ZOHO_CLIENT_ID", "ZOHO_CLIENT_SECRET", "ZOHO_DOMAIN", "ZOHO_REDIRECT_URI"],
            || {
                let creds = ClientCredentials::from_env().unwrap();
                assert!(!creds.has_client_id());
                assert_eq!(creds.domain(), ZohoDomain::Com);
                assert!(creds.validate().is_err());
            },
        );
    }

    #[test]
    fn test_settings_round_trip() {
        let store = MemorySettings::new();
        let creds = ClientCredentials::new("id1", "sec1", "a@b.com", ZohoDomain::In, "http://ignored");
        creds.save_to(&store).unwrap();

        let loaded = ClientCredentials::from_settings(&store, "http://cb").unwrap();
        assert_eq!(loaded.client_id(), "id1");
        assert_eq!(loaded.client_secret(), "sec1");
        assert_eq!(loaded.domain(), ZohoDomain::In);
        assert_eq!(loaded.redirect_uri(), "http://cb");
    }

    #[test]
    fn test_endpoints() {
        let endpoints = ZohoEndpoints::custom("http://127.0.0.1:9000/", "http://127.0.0.1:9001");
        assert_eq!(endpoints.token_url(), "http://127.0.0.1:9000/oauth/v2/token");
        assert_eq!(endpoints.revoke_url(), "http://127.0.0.1:9000/oauth/v2/token/revoke");
        assert_eq!(endpoints.module_url("Leads"), "http://127.0.0.1:9001/crm/v2/Leads");
    }
}
