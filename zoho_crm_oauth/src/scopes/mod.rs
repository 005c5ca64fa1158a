//! Catálogo de capacidades e derivação de escopos OAuth2

pub mod catalog;
pub mod resolver;

pub use catalog::{CapabilityCatalog, CapabilityGroup, CapabilitySelection};
pub use resolver::{resolve, ScopeResolver, ScopeString, BASELINE_SCOPE, SCOPE_PREFIX};
