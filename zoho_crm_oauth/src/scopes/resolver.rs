use std::fmt;

use super::catalog::{CapabilityCatalog, CapabilitySelection};

/// Prefixo de todos os escopos do Zoho CRM
pub const SCOPE_PREFIX: &str = "ZohoCRM";

/// Escopo exigido pela API em qualquer chamada autenticada
pub const BASELINE_SCOPE: &str = "ZohoCRM.aaaserver.profile.read";

/// Grupos que a API só aceita com granularidade `ALL`
pub const DEFAULT_WIDENED_GROUPS: [&str; 2] = ["modules", "settings"];

const ALL_LEAF: &str = "all";
const ALL_SUFFIX: &str = "ALL";

/// Valor do parâmetro `scope` da URL de consentimento
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopeString(String);

impl ScopeString {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.0.split(',').filter(|t| !t.is_empty())
    }

    pub fn contains(&self, token: &str) -> bool {
        self.tokens().any(|t| t == token)
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ScopeString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ScopeString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Converte flags de capacidade no escopo canônico da requisição de autorização
#[derive(Debug, Clone)]
pub struct ScopeResolver {
    widened_groups: Vec<String>,
}

impl Default for ScopeResolver {
    fn default() -> Self {
        Self::with_widened_groups(DEFAULT_WIDENED_GROUPS)
    }
}

impl ScopeResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_widened_groups<I, S>(groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            widened_groups: groups
                .into_iter()
                .map(|g| g.as_ref().trim().to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn widened_groups(&self) -> &[String] {
        &self.widened_groups
    }

    fn is_widened(&self, group: &str) -> bool {
        self.widened_groups.iter().any(|g| g == group)
    }

    /// Token de um par habilitado. `all` vira `ALL` em qualquer grupo; nos
    /// grupos alargados qualquer folha vira `ALL`.
    fn scope_token(&self, group: &str, leaf: &str) -> String {
        let leaf = if leaf == ALL_LEAF || self.is_widened(group) {
            ALL_SUFFIX
        } else {
            leaf
        };
        format!("{}.{}.{}", SCOPE_PREFIX, group, leaf)
    }

    /// Escopo final: baseline primeiro, depois os pares habilitados na ordem
    /// do catálogo, sem repetição. Nunca falha.
    pub fn resolve(&self, selection: &CapabilitySelection, catalog: &CapabilityCatalog) -> ScopeString {
        let mut tokens: Vec<String> = vec![BASELINE_SCOPE.to_string()];

        for (group, leaf) in catalog.pairs() {
            if !selection.is_enabled(group, leaf) {
                continue;
            }
            let token = self.scope_token(group, leaf);
            if !tokens.contains(&token) {
                tokens.push(token);
            }
        }

        let joined = tokens.join(",");
        let decoded = urlencoding::decode(&joined)
            .map(|s| s.into_owned())
            .unwrap_or(joined);

        ScopeString(decoded)
    }
}

/// Atalho para [`ScopeResolver::resolve`] com os grupos alargados padrão
pub fn resolve(selection: &CapabilitySelection, catalog: &CapabilityCatalog) -> ScopeString {
    ScopeResolver::default().resolve(selection, catalog)
}
