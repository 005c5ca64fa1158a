//! # Zoho CRM OAuth2 endpoints
//!
//! Superfície HTTP fina sobre o crate `zoho_crm_oauth`.
//!
//! ## Responsabilidades:
//! - Redirecionar o administrador para a tela de consentimento
//! - Receber o callback e trocar o grant code (uma única vez)
//! - Informar o estado da conexão
//! - Revogar a autorização
//! - Expor catálogo, flags habilitadas e escopo resultante para o formulário

pub mod handlers;

pub use handlers::{connection_status, handle_callback, list_scopes, revoke_authorization, start_consent};
