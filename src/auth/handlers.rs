//! Zoho OAuth2 HTTP Handlers
//!
//! Endpoints para iniciar, completar, verificar e revogar a autorização

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Redirect, Response},
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use zoho_crm_oauth::{AuthError, CapabilitySelection};

use crate::utils::logging::*;
use crate::utils::{truncate_safe, AppError, AppResult};
use crate::AppState;

/// Parâmetros do callback OAuth2
#[derive(Debug, Deserialize)]
pub struct OAuthCallbackParams {
    /// Grant code devolvido pelo Zoho
    code: Option<String>,
    /// Erro devolvido pelo Zoho (ex: `access_denied`)
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

/// GET /auth/zoho
///
/// Redireciona (303) para a tela de consentimento do Zoho com o escopo
/// derivado das flags salvas no settings store
pub async fn start_consent(State(state): State<Arc<AppState>>) -> AppResult<Redirect> {
    log_request_received("/auth/zoho", "GET");

    if !state.flow.credentials().has_client_id() {
        log_warning("⚠️  [OAuth] Client ID não configurado, consentimento indisponível");
        return Err(AppError::ConfigError("client_id não configurado".to_string()));
    }

    let selection = CapabilitySelection::from_settings(state.store.as_ref(), &state.catalog);
    let scopes = state.resolver.resolve(&selection, &state.catalog);
    let url = state.flow.build_consent_url(&scopes)?;

    log_info(&format!("↗️  [OAuth] Redirecionando para consentimento com escopo: {}", scopes));

    Ok(Redirect::to(url.as_str()))
}

/// GET /auth/zoho/callback?code=XXX
///
/// Troca o grant code (uso único) e persiste o refresh token
pub async fn handle_callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<OAuthCallbackParams>,
) -> AppResult<Json<Value>> {
    log_info("📥 [OAuth] Callback recebido");

    if let Some(error) = params.error {
        log_error(&format!("❌ [OAuth] Zoho recusou a autorização: {}", error));
        let detail = match params.error_description {
            Some(description) => format!("{} ({})", error, description),
            None => error,
        };
        return Err(AppError::ProviderRejected(detail));
    }

    let code = params
        .code
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| AppError::ValidationError("Missing code parameter".to_string()))?;

    log_info(&format!("🔑 [OAuth] Code recebido: {}...", truncate_safe(&code, 8)));

    let record = state.flow.exchange_grant_code(&code).await.map_err(|e| {
        log_error(&format!("❌ [OAuth] Falha ao trocar code: {}", e));
        AppError::from(e)
    })?;

    log_info("✅ [OAuth] Integração autorizada");

    Ok(Json(json!({
        "authorized": true,
        "authorization": state.flow.state().await,
        "access_token_expires_at": record.expires_at,
    })))
}

/// GET /auth/zoho/status
pub async fn connection_status(State(state): State<Arc<AppState>>) -> Json<Value> {
    log_integration_status_check();

    let connection = state.probe.connection_state().await;

    Json(json!({
        "connected": connection.is_connected(),
        "state": connection,
        "authorization": state.flow.state().await,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// POST /auth/zoho/revoke
///
/// `revoked: true` só quando o Zoho confirmou; sem confirmação o token fica e a resposta é 502
pub async fn revoke_authorization(State(state): State<Arc<AppState>>) -> Response {
    log_request_received("/auth/zoho/revoke", "POST");

    match state.revocation.try_revoke().await {
        Ok(()) => Json(json!({ "revoked": true })).into_response(),
        Err(AuthError::NotAuthorized) => Json(json!({
            "revoked": false,
            "reason": "no stored token",
        }))
        .into_response(),
        Err(e) if e.is_transport() => {
            log_warning(&format!("⚠️  [OAuth] Revogação não confirmada: {}", e));
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "revoked": false, "error": e.to_string() })),
            )
                .into_response()
        }
        Err(e) => AppError::from(e).into_response(),
    }
}

/// GET /auth/zoho/scopes
///
/// Dados do formulário de configuração: catálogo, flags habilitadas e escopo resultante
pub async fn list_scopes(State(state): State<Arc<AppState>>) -> Json<Value> {
    let selection = CapabilitySelection::from_settings(state.store.as_ref(), &state.catalog);
    let scopes = state.resolver.resolve(&selection, &state.catalog);

    let catalog: serde_json::Map<String, Value> = state
        .catalog
        .groups()
        .iter()
        .map(|g| (g.name.clone(), json!(g.leaves)))
        .collect();

    Json(json!({
        "catalog": catalog,
        "enabled": selection.enabled_keys(&state.catalog),
        "scope": scopes.as_str(),
    }))
}
