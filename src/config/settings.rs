use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use zoho_crm_oauth::ProbeStrategy;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub zoho: ZohoSettings,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ZohoSettings {
    /// Arquivo YAML do settings store (credenciais, flags de escopo, token)
    pub settings_file: PathBuf,
    /// Catálogo de escopos alternativo; sem ele usa o embutido
    #[serde(default)]
    pub catalog_path: Option<PathBuf>,
    pub redirect_uri: String,
    #[serde(default)]
    pub probe: ProbeSettings,
    /// Grupos renderizados como ALL; `None` mantém o padrão (modules, settings)
    #[serde(default)]
    pub widened_groups: Option<Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProbeSettings {
    /// `identity` ou `record`
    pub strategy: String,
    pub module: String,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            strategy: "identity".to_string(),
            module: "Leads".to_string(),
        }
    }
}

impl ProbeSettings {
    pub fn to_strategy(&self) -> Result<ProbeStrategy, ConfigError> {
        match self.strategy.trim().to_lowercase().as_str() {
            "identity" => Ok(ProbeStrategy::Identity),
            "record" => Ok(ProbeStrategy::RecordRoundTrip {
                module: self.module.clone(),
            }),
            other => Err(ConfigError::Message(format!(
                "zoho.probe.strategy desconhecida: {} (use identity ou record)",
                other
            ))),
        }
    }
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("zoho.settings_file", "zoho_settings.yml")?
            .set_default("zoho.redirect_uri", "http://localhost:8080/auth/zoho/callback")?
            // Arquivo de configuração base
            .add_source(File::with_name("config/default").required(false))
            // Arquivo específico do ambiente
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // ZOHO_INTEGRATION__SERVER__PORT=9000, ZOHO_INTEGRATION__ZOHO__REDIRECT_URI=...
            .add_source(Environment::with_prefix("ZOHO_INTEGRATION").separator("__"));

        let s = builder.build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_settings_to_strategy() {
        let identity = ProbeSettings::default();
        assert_eq!(identity.to_strategy().unwrap(), ProbeStrategy::Identity);

        let record = ProbeSettings {
            strategy: "Record".to_string(),
            module: "Contacts".to_string(),
        };
        assert_eq!(
            record.to_strategy().unwrap(),
            ProbeStrategy::RecordRoundTrip {
                module: "Contacts".to_string()
            }
        );

        let unknown = ProbeSettings {
            strategy: "ping".to_string(),
            module: String::new(),
        };
        assert!(unknown.to_strategy().is_err());
    }

    #[test]
    fn test_settings_defaults_deserialize() {
        let settings: Settings = Config::builder()
            .set_default("server.host", "127.0.0.1")
            .unwrap()
            .set_default("server.port", 3000)
            .unwrap()
            .set_default("zoho.settings_file", "/tmp/zoho.yml")
            .unwrap()
            .set_default("zoho.redirect_uri", "http://localhost:3000/auth/zoho/callback")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(settings.server.port, 3000);
        assert_eq!(settings.zoho.probe.strategy, "identity");
        assert!(settings.zoho.catalog_path.is_none());
        assert!(settings.zoho.widened_groups.is_none());
    }
}
