use serde_yaml::Value;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use crate::error::{AuthError, AuthResult};
use crate::settings::{keys, SettingsStore};

const BUILTIN_CATALOG: &str = include_str!("../../config/scopes.yml");

/// Um grupo de capacidades e suas folhas, na ordem declarada
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityGroup {
    pub name: String,
    pub leaves: Vec<String>,
}

/// Taxonomia estática de grupos → folhas. Imutável depois de carregada.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityCatalog {
    groups: Vec<CapabilityGroup>,
}

fn normalize_name(raw: &str, context: &str) -> AuthResult<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(AuthError::catalog_error(format!("nome vazio em {}", context)));
    }
    if !name.is_ascii() {
        return Err(AuthError::catalog_error(format!("nome não-ASCII em {}: {}", context, name)));
    }
    Ok(name.to_ascii_lowercase())
}

fn scalar_name(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

impl CapabilityCatalog {
    /// Catálogo embutido no binário (`config/scopes.yml`)
    pub fn builtin() -> AuthResult<Self> {
        Self::from_yaml_str(BUILTIN_CATALOG)
    }

    pub fn from_path(path: impl AsRef<Path>) -> AuthResult<Self> {
        let raw = fs::read_to_string(path.as_ref())?;
        log::debug!("📖 [Scopes] Catálogo carregado de {}", path.as_ref().display());
        Self::from_yaml_str(&raw)
    }

    /// Faz o parsing de um documento YAML `grupo: [folha, ...]` preservando a ordem
    pub fn from_yaml_str(raw: &str) -> AuthResult<Self> {
        let document: Value = serde_yaml::from_str(raw)
            .map_err(|e| AuthError::catalog_error(format!("YAML inválido: {}", e)))?;

        let mapping = match document {
            Value::Mapping(mapping) => mapping,
            Value::Null => return Ok(Self { groups: Vec::new() }),
            _ => return Err(AuthError::catalog_error("o documento precisa ser um mapeamento")),
        };

        let mut groups: Vec<CapabilityGroup> = Vec::with_capacity(mapping.len());

        for (raw_group, raw_leaves) in mapping {
            let group_name = scalar_name(&raw_group)
                .ok_or_else(|| AuthError::catalog_error("nome de grupo precisa ser escalar"))?;
            let group_name = normalize_name(&group_name, "grupo")?;

            let items = match raw_leaves {
                Value::Sequence(items) => items,
                Value::Null => Vec::new(),
                _ => {
                    return Err(AuthError::catalog_error(format!(
                        "o grupo '{}' precisa ser uma lista",
                        group_name
                    )))
                }
            };

            let mut seen = HashSet::new();
            let mut leaves = Vec::with_capacity(items.len());
            for item in &items {
                let leaf = scalar_name(item).ok_or_else(|| {
                    AuthError::catalog_error(format!("folha inválida no grupo '{}'", group_name))
                })?;
                let leaf = normalize_name(&leaf, &format!("grupo '{}'", group_name))?;
                if seen.insert(leaf.clone()) {
                    leaves.push(leaf);
                }
            }

            match groups.iter_mut().find(|g| g.name == group_name) {
                Some(existing) => {
                    for leaf in leaves {
                        if !existing.leaves.contains(&leaf) {
                            existing.leaves.push(leaf);
                        }
                    }
                }
                None => groups.push(CapabilityGroup {
                    name: group_name,
                    leaves,
                }),
            }
        }

        Ok(Self { groups })
    }

    pub fn groups(&self) -> &[CapabilityGroup] {
        &self.groups
    }

    pub fn group(&self, name: &str) -> Option<&CapabilityGroup> {
        let name = name.to_ascii_lowercase();
        self.groups.iter().find(|g| g.name == name)
    }

    pub fn contains(&self, group: &str, leaf: &str) -> bool {
        let leaf = leaf.to_ascii_lowercase();
        self.group(group).map(|g| g.leaves.contains(&leaf)).unwrap_or(false)
    }

    /// Todos os pares `(grupo, folha)` na ordem do catálogo
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.groups
            .iter()
            .flat_map(|g| g.leaves.iter().map(move |leaf| (g.name.as_str(), leaf.as_str())))
    }

    /// Chaves de configuração `{grupo}_{folha}`, uma por checkbox do formulário
    pub fn flattened_keys(&self) -> Vec<String> {
        self.pairs().map(|(group, leaf)| keys::capability(group, leaf)).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.iter().all(|g| g.leaves.is_empty())
    }
}

/// Flags habilitadas pelo administrador, por `(grupo, folha)`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilitySelection {
    flags: BTreeMap<(String, String), bool>,
}

impl CapabilitySelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, group: &str, leaf: &str, enabled: bool) {
        self.flags
            .insert((group.trim().to_ascii_lowercase(), leaf.trim().to_ascii_lowercase()), enabled);
    }

    pub fn enable(mut self, group: &str, leaf: &str) -> Self {
        self.set(group, leaf, true);
        self
    }

    pub fn is_enabled(&self, group: &str, leaf: &str) -> bool {
        self.flags
            .get(&(group.to_ascii_lowercase(), leaf.to_ascii_lowercase()))
            .copied()
            .unwrap_or(false)
    }

    /// Lê uma flag booleana por par do catálogo; chaves fora do catálogo nem são consultadas
    pub fn from_settings(store: &dyn SettingsStore, catalog: &CapabilityCatalog) -> Self {
        let mut selection = Self::new();
        for (group, leaf) in catalog.pairs() {
            selection.set(group, leaf, store.get_bool(&keys::capability(group, leaf)));
        }
        selection
    }

    /// Monta a seleção a partir de chaves `{grupo}_{folha}`. Chaves desconhecidas são ignoradas.
    pub fn from_flags<K: AsRef<str>>(
        catalog: &CapabilityCatalog,
        flags: impl IntoIterator<Item = (K, bool)>,
    ) -> Self {
        let mut selection = Self::new();
        for (key, enabled) in flags {
            let key = key.as_ref().trim().to_ascii_lowercase();
            match catalog.pairs().find(|(group, leaf)| keys::capability(group, leaf) == key) {
                Some((group, leaf)) => selection.set(group, leaf, enabled),
                None => log::debug!("🔎 [Scopes] Flag desconhecida ignorada: {}", key),
            }
        }
        selection
    }

    /// Grava todas as flags do catálogo no settings store
    pub fn save_to(&self, store: &dyn SettingsStore, catalog: &CapabilityCatalog) -> AuthResult<()> {
        for (group, leaf) in catalog.pairs() {
            store.set_bool(&keys::capability(group, leaf), self.is_enabled(group, leaf))?;
        }
        Ok(())
    }

    /// Chaves habilitadas, na ordem do catálogo
    pub fn enabled_keys(&self, catalog: &CapabilityCatalog) -> Vec<String> {
        catalog
            .pairs()
            .filter(|(group, leaf)| self.is_enabled(group, leaf))
            .map(|(group, leaf)| keys::capability(group, leaf))
            .collect()
    }
}
