//! Settings store
//!
//! Armazenamento chave/valor das configurações da integração (credenciais,
//! flags de escopo e refresh token), sob um namespace fixo.

use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::error::{AuthError, AuthResult};

/// Namespace onde todas as chaves vivem
pub const NAMESPACE: &str = "zoho_crm_integration.settings";

/// Chaves conhecidas do settings store
pub mod keys {
    pub const CLIENT_ID: &str = "client_id";
    pub const CLIENT_SECRET: &str = "client_secret";
    pub const CURRENT_USER_EMAIL: &str = "current_user_email";
    pub const ZOHO_DOMAIN: &str = "zoho_domain";
    pub const REFRESH_TOKEN: &str = "refresh_token";
    pub const ACCESS_TOKEN: &str = "access_token";
    pub const ACCESS_TOKEN_EXPIRES_AT: &str = "access_token_expires_at";

    /// Chave da flag de uma capacidade: `{group}_{leaf}`
    pub fn capability(group: &str, leaf: &str) -> String {
        format!("{}_{}", group, leaf)
    }
}

/// Uma alteração de um lote aplicado por [`SettingsStore::apply`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingChange {
    SetString(&'static str, String),
    Remove(&'static str),
}

/// Colaborador externo que guarda strings e booleanos
pub trait SettingsStore: Send + Sync {
    fn get_string(&self, key: &str) -> Option<String>;

    /// Chaves ausentes valem `false`
    fn get_bool(&self, key: &str) -> bool;

    fn set_string(&self, key: &str, value: &str) -> AuthResult<()>;

    fn set_bool(&self, key: &str, value: bool) -> AuthResult<()>;

    fn remove(&self, key: &str) -> AuthResult<()>;

    /// Aplica o lote inteiro ou nada
    fn apply(&self, changes: &[SettingChange]) -> AuthResult<()>;
}

fn apply_to_mapping(values: &mut Mapping, changes: &[SettingChange]) {
    for change in changes {
        match change {
            SettingChange::SetString(key, value) => {
                values.insert(Value::String(key.to_string()), Value::String(value.clone()));
            }
            SettingChange::Remove(key) => {
                values.remove(*key);
            }
        }
    }
}

fn value_as_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_i64().map(|n| n != 0).unwrap_or(false),
        Value::String(s) => matches!(s.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        _ => false,
    }
}

fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn poisoned() -> AuthError {
    AuthError::store_error("lock do settings store envenenado")
}

/// Settings em memória (testes e execuções efêmeras)
#[derive(Debug, Default)]
pub struct MemorySettings {
    values: RwLock<BTreeMap<String, Value>>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemorySettings {
    fn get_string(&self, key: &str) -> Option<String> {
        let values = self.values.read().ok()?;
        values.get(key).and_then(value_as_string)
    }

    fn get_bool(&self, key: &str) -> bool {
        self.values
            .read()
            .ok()
            .and_then(|values| values.get(key).map(value_as_bool))
            .unwrap_or(false)
    }

    fn set_string(&self, key: &str, value: &str) -> AuthResult<()> {
        let mut values = self.values.write().map_err(|_| poisoned())?;
        values.insert(key.to_string(), Value::String(value.to_string()));
        Ok(())
    }

    fn set_bool(&self, key: &str, value: bool) -> AuthResult<()> {
        let mut values = self.values.write().map_err(|_| poisoned())?;
        values.insert(key.to_string(), Value::Bool(value));
        Ok(())
    }

    fn remove(&self, key: &str) -> AuthResult<()> {
        let mut values = self.values.write().map_err(|_| poisoned())?;
        values.remove(key);
        Ok(())
    }

    fn apply(&self, changes: &[SettingChange]) -> AuthResult<()> {
        let mut values = self.values.write().map_err(|_| poisoned())?;
        for change in changes {
            match change {
                SettingChange::SetString(key, value) => {
                    values.insert(key.to_string(), Value::String(value.clone()));
                }
                SettingChange::Remove(key) => {
                    values.remove(*key);
                }
            }
        }
        Ok(())
    }
}

/// Settings persistidos em um arquivo YAML.
///
/// O arquivo tem um único mapeamento de topo, [`NAMESPACE`], e é reescrito por
/// inteiro (arquivo temporário + rename) a cada alteração.
#[derive(Debug)]
pub struct YamlSettingsFile {
    path: PathBuf,
    values: RwLock<Mapping>,
}

impl YamlSettingsFile {
    /// Abre o arquivo; se ele não existir começa vazio e só cria no primeiro `set`
    pub fn open(path: impl AsRef<Path>) -> AuthResult<Self> {
        let path = path.as_ref().to_path_buf();

        let values = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            Self::parse(&raw)?
        } else {
            log::info!("🆕 [Settings] {} não existe, iniciando vazio", path.display());
            Mapping::new()
        };

        Ok(Self {
            path,
            values: RwLock::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parse(raw: &str) -> AuthResult<Mapping> {
        if raw.trim().is_empty() {
            return Ok(Mapping::new());
        }

        let document: Value = serde_yaml::from_str(raw)
            .map_err(|e| AuthError::store_error(format!("YAML de settings inválido: {}", e)))?;

        match document.get(NAMESPACE) {
            Some(Value::Mapping(values)) => Ok(values.clone()),
            Some(Value::Null) | None => Ok(Mapping::new()),
            Some(_) => Err(AuthError::store_error(format!("'{}' precisa ser um mapeamento", NAMESPACE))),
        }
    }

    fn persist(&self, values: &Mapping) -> AuthResult<()> {
        let mut document = Mapping::new();
        document.insert(Value::String(NAMESPACE.to_string()), Value::Mapping(values.clone()));

        let raw = serde_yaml::to_string(&document)
            .map_err(|e| AuthError::store_error(format!("Falha ao serializar settings: {}", e)))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let tmp = self.path.with_extension("yml.tmp");
        fs::write(&tmp, raw).map_err(|e| AuthError::store_error(format!("Falha ao gravar settings: {}", e)))?;
        fs::rename(&tmp, &self.path)
            .map_err(|e| AuthError::store_error(format!("Falha ao gravar settings: {}", e)))?;

        Ok(())
    }

    fn update(&self, apply: impl FnOnce(&mut Mapping)) -> AuthResult<()> {
        let mut values = self.values.write().map_err(|_| poisoned())?;
        let mut next = values.clone();
        apply(&mut next);
        self.persist(&next)?;
        *values = next;
        Ok(())
    }
}

impl SettingsStore for YamlSettingsFile {
    fn get_string(&self, key: &str) -> Option<String> {
        let values = self.values.read().ok()?;
        values.get(key).and_then(value_as_string)
    }

    fn get_bool(&self, key: &str) -> bool {
        self.values
            .read()
            .ok()
            .and_then(|values| values.get(key).map(value_as_bool))
            .unwrap_or(false)
    }

    fn set_string(&self, key: &str, value: &str) -> AuthResult<()> {
        self.update(|values| {
            values.insert(Value::String(key.to_string()), Value::String(value.to_string()));
        })
    }

    fn set_bool(&self, key: &str, value: bool) -> AuthResult<()> {
        self.update(|values| {
            values.insert(Value::String(key.to_string()), Value::Bool(value));
        })
    }

    fn remove(&self, key: &str) -> AuthResult<()> {
        self.update(|values| {
            values.remove(key);
        })
    }

    fn apply(&self, changes: &[SettingChange]) -> AuthResult<()> {
        self.update(|values| apply_to_mapping(values, changes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_settings() {
        let store = MemorySettings::new();
        assert_eq!(store.get_string(keys::CLIENT_ID), None);
        assert!(!store.get_bool("users_all"));

        store.set_string(keys::CLIENT_ID, "id1").unwrap();
        store.set_bool("users_all", true).unwrap();
        assert_eq!(store.get_string(keys::CLIENT_ID).as_deref(), Some("id1"));
        assert!(store.get_bool("users_all"));

        store.remove(keys::CLIENT_ID).unwrap();
        assert_eq!(store.get_string(keys::CLIENT_ID), None);
    }

    #[test]
    fn test_capability_key() {
        assert_eq!(keys::capability("modules", "leads"), "modules_leads");
    }

    #[test]
    fn test_yaml_settings_persist_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.yml");

        let store = YamlSettingsFile::open(&path).unwrap();
        assert!(!path.exists());

        store.set_string(keys::REFRESH_TOKEN, "1000.abc").unwrap();
        store.set_bool("modules_leads", true).unwrap();
        assert!(path.exists());

        let reloaded = YamlSettingsFile::open(&path).unwrap();
        assert_eq!(reloaded.get_string(keys::REFRESH_TOKEN).as_deref(), Some("1000.abc"));
        assert!(reloaded.get_bool("modules_leads"));

        reloaded.remove(keys::REFRESH_TOKEN).unwrap();
        let again = YamlSettingsFile::open(&path).unwrap();
        assert_eq!(again.get_string(keys::REFRESH_TOKEN), None);
    }

    #[test]
    fn test_yaml_settings_apply_batch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.yml");

        let store = YamlSettingsFile::open(&path).unwrap();
        store.set_string(keys::ACCESS_TOKEN, "old-access").unwrap();
        store
            .apply(&[
                SettingChange::SetString(keys::REFRESH_TOKEN, "1000.new".to_string()),
                SettingChange::Remove(keys::ACCESS_TOKEN),
            ])
            .unwrap();

        let reloaded = YamlSettingsFile::open(&path).unwrap();
        assert_eq!(reloaded.get_string(keys::REFRESH_TOKEN).as_deref(), Some("1000.new"));
        assert_eq!(reloaded.get_string(keys::ACCESS_TOKEN), None);
    }

    #[test]
    fn test_yaml_settings_failed_batch_changes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.yml");

        let store = YamlSettingsFile::open(&path).unwrap();
        store.set_string(keys::REFRESH_TOKEN, "old").unwrap();

        // O rename falha quando o destino vira diretório
        fs::remove_file(&path).unwrap();
        fs::create_dir(&path).unwrap();

        let err = store
            .apply(&[
                SettingChange::SetString(keys::REFRESH_TOKEN, "new".to_string()),
                SettingChange::SetString(keys::ACCESS_TOKEN, "new-access".to_string()),
            ])
            .unwrap_err();
        assert!(matches!(err, AuthError::StoreError(_)));
        assert_eq!(store.get_string(keys::REFRESH_TOKEN).as_deref(), Some("old"));
        assert_eq!(store.get_string(keys::ACCESS_TOKEN), None);
    }

    #[test]
    fn test_yaml_settings_legacy_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.yml");
        fs::write(
            &path,
            "zoho_crm_integration.settings:\n  users_all: 1\n  org_all: 0\n  settings_all: \"true\"\n",
        )
        .unwrap();

        let store = YamlSettingsFile::open(&path).unwrap();
        assert!(store.get_bool("users_all"));
        assert!(!store.get_bool("org_all"));
        assert!(store.get_bool("settings_all"));
    }

    #[test]
    fn test_yaml_settings_rejects_bad_namespace() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.yml");
        fs::write(&path, "zoho_crm_integration.settings: [1, 2]\n").unwrap();

        assert!(matches!(YamlSettingsFile::open(&path), Err(AuthError::StoreError(_))));
    }
}
