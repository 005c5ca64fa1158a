/// Zoho CRM Integration: serviço HTTP do ciclo de vida OAuth2
///
/// - `/auth/zoho` redireciona para o consentimento
/// - `/auth/zoho/callback` troca o grant code e salva o refresh token
/// - `/auth/zoho/status` testa a conexão
/// - `/auth/zoho/revoke` revoga a autorização
///
/// Credenciais, flags de escopo e tokens vivem no settings store YAML
/// (`zoho.settings_file`), que o formulário de configuração preenche.
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use zoho_crm_integration::{config::Settings, create_app, utils::logging::*, utils::AppError, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dotenv_loaded = dotenvy::dotenv().is_ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if !dotenv_loaded {
        tracing::debug!("Arquivo .env não encontrado - usando variáveis de ambiente do sistema");
    }

    // Carregar configurações
    let settings = Settings::new().map_err(|e| AppError::ConfigError(format!("Failed to load settings: {}", e)))?;

    log_config_loaded(&std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string()));

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let port = settings.server.port;

    let state = AppState::from_settings(settings)?;

    if state.flow.credentials().has_client_id() {
        log_info(&format!(
            "✅ Zoho OAuth configurado (domínio {}), autorização: {:?}",
            state.flow.credentials().domain(),
            state.flow.state().await
        ));
    } else {
        log_warning("⚠️  Client ID do Zoho não configurado: /auth/zoho vai responder 400 até o formulário ser salvo");
    }

    let app = create_app(Arc::new(state));

    let listener = TcpListener::bind(&addr).await?;

    log_server_startup(port);
    log_server_ready(&addr);

    // Graceful shutdown com signal handling
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    log_info("🛑 Server shut down gracefully");
    Ok(())
}

/// Signal handler para graceful shutdown
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log_error(&format!("Failed to install Ctrl+C handler: {}", e));
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log_error(&format!("Failed to install SIGTERM handler: {}", e));
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            log_info("🛑 Received Ctrl+C, shutting down gracefully...");
        },
        _ = terminate => {
            log_info("🛑 Received SIGTERM, shutting down gracefully...");
        }
    }
}
