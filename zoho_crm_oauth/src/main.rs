use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

use zoho_crm_oauth::settings::keys;
use zoho_crm_oauth::{
    AuthorizationFlow, CapabilityCatalog, CapabilitySelection, ClientCredentials, ConnectionProbe, ProbeStrategy,
    RevocationService, ScopeResolver, SettingsStore, SettingsTokenStore, TokenManager, YamlSettingsFile, ZohoClient,
    ZohoDomain,
};

/// Zoho CRM OAuth CLI - configura, autoriza, verifica e revoga a integração
#[derive(Parser)]
#[command(name = "zoho-oauth")]
#[command(version = "0.1.0")]
#[command(about = "CLI para o ciclo de vida OAuth2 da integração com o Zoho CRM", long_about = None)]
struct Cli {
    /// Arquivo YAML de settings (credenciais, flags de escopo e token)
    #[arg(short = 's', long, env = "ZOHO_SETTINGS_FILE", default_value = "zoho_settings.yml", global = true)]
    settings: PathBuf,

    /// Catálogo de escopos alternativo (YAML grupo -> folhas)
    #[arg(long, env = "ZOHO_SCOPES_CATALOG", global = true)]
    catalog: Option<PathBuf>,

    /// Redirect URI registrada no console do Zoho
    #[arg(
        long,
        env = "ZOHO_REDIRECT_URI",
        default_value = "http://localhost:8080/auth/zoho/callback",
        global = true
    )]
    redirect_uri: String,

    /// Formato de saída (json, pretty)
    #[arg(short = 'o', long, default_value = "pretty", global = true)]
    output: OutputFormat,

    /// Modo verbose para debug
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Comando a executar
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Debug, PartialEq)]
enum OutputFormat {
    Json,
    Pretty,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "pretty" => Ok(OutputFormat::Pretty),
            _ => Err(format!("Formato desconhecido: {}", s)),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
enum ProbeKind {
    Identity,
    Record,
}

impl std::str::FromStr for ProbeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "identity" => Ok(ProbeKind::Identity),
            "record" => Ok(ProbeKind::Record),
            _ => Err(format!("Estratégia desconhecida: {} (use identity ou record)", s)),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Mostra o catálogo, as flags habilitadas e a string de escopos resultante
    Scopes {
        /// Habilita flags `{grupo}_{folha}` (separadas por vírgula)
        #[arg(short = 'e', long, value_delimiter = ',')]
        enable: Vec<String>,

        /// Desabilita flags `{grupo}_{folha}` (separadas por vírgula)
        #[arg(short = 'd', long, value_delimiter = ',')]
        disable: Vec<String>,

        /// Grupos renderizados sempre como ALL (padrão: modules,settings)
        #[arg(long, value_delimiter = ',')]
        widen: Option<Vec<String>>,
    },

    /// Salva Client ID, Client Secret, e-mail e domínio no settings
    Configure {
        #[arg(long, env = "ZOHO_CLIENT_ID")]
        client_id: String,

        #[arg(long, env = "ZOHO_CLIENT_SECRET")]
        client_secret: String,

        /// E-mail da conta Zoho que vai autorizar
        #[arg(long, env = "ZOHO_CURRENT_USER_EMAIL", default_value = "")]
        email: String,

        /// Domínio do data center (com, eu, cn, in)
        #[arg(long, env = "ZOHO_DOMAIN", default_value = "com")]
        domain: ZohoDomain,
    },

    /// Gera a URL de consentimento
    ConsentUrl {
        /// Abre a URL no navegador padrão
        #[arg(long)]
        open: bool,
    },

    /// Troca o grant code recebido no callback pelo refresh token
    Exchange {
        #[arg(short = 'c', long)]
        code: String,
    },

    /// Testa a conexão com o Zoho usando o token armazenado
    Check {
        /// identity (padrão) ou record
        #[arg(long, default_value = "identity")]
        strategy: ProbeKind,

        /// Módulo usado pela estratégia record
        #[arg(long, default_value = "Leads")]
        module: String,
    },

    /// Mostra o estado da autorização sem chamar o Zoho
    Status,

    /// Revoga o refresh token e limpa o armazenamento local
    Revoke,
}

/// Estrutura para resposta padronizada
#[derive(serde::Serialize)]
struct CliResponse {
    success: bool,
    data: Option<serde_json::Value>,
    error: Option<String>,
}

impl CliResponse {
    fn success(data: serde_json::Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn error(msg: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg),
        }
    }
}

/// Colaboradores montados a partir do settings
struct CliContext {
    settings: Arc<dyn SettingsStore>,
    catalog: CapabilityCatalog,
    client: Arc<ZohoClient>,
    tokens: Arc<TokenManager>,
}

impl CliContext {
    fn load(cli: &Cli) -> anyhow::Result<Self> {
        let settings: Arc<dyn SettingsStore> = Arc::new(
            YamlSettingsFile::open(&cli.settings)
                .with_context(|| format!("Falha ao abrir settings {}", cli.settings.display()))?,
        );

        let catalog = match &cli.catalog {
            Some(path) => CapabilityCatalog::from_path(path)?,
            None => CapabilityCatalog::builtin()?,
        };

        let credentials = ClientCredentials::from_settings(settings.as_ref(), cli.redirect_uri.clone())?;
        let credentials = if credentials.has_client_id() {
            credentials
        } else {
            log::debug!("🔧 [CLI] Settings sem client_id, tentando variáveis de ambiente");
            ClientCredentials::from_env()?
        };

        let client = Arc::new(ZohoClient::new(credentials)?);
        let tokens = Arc::new(TokenManager::new(Arc::new(SettingsTokenStore::new(settings.clone()))));

        Ok(Self {
            settings,
            catalog,
            client,
            tokens,
        })
    }

    fn flow(&self) -> AuthorizationFlow {
        AuthorizationFlow::new(self.client.clone(), self.tokens.clone())
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Configura logging
    if cli.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("error")).init();
    }

    match execute_command(&cli).await {
        Ok(response) => {
            let exit_code = if response.success { 0 } else { 1 };
            output_response(response, &cli.output);
            std::process::exit(exit_code);
        }
        Err(e) => {
            eprintln!("❌ Erro: {:#}", e);
            std::process::exit(1);
        }
    }
}

async fn execute_command(cli: &Cli) -> anyhow::Result<CliResponse> {
    let ctx = CliContext::load(cli)?;

    match &cli.command {
        Commands::Scopes { enable, disable, widen } => {
            let mut selection = CapabilitySelection::from_settings(ctx.settings.as_ref(), &ctx.catalog);

            if !enable.is_empty() || !disable.is_empty() {
                let known = ctx.catalog.flattened_keys();
                if let Some(unknown) = enable
                    .iter()
                    .chain(disable.iter())
                    .find(|key| !known.contains(&key.trim().to_ascii_lowercase()))
                {
                    bail!("Flag desconhecida: {} (veja `zoho-oauth scopes`)", unknown);
                }

                for (group, leaf) in ctx.catalog.pairs() {
                    let key = keys::capability(group, leaf);
                    if enable.iter().any(|k| k.trim().eq_ignore_ascii_case(&key)) {
                        selection.set(group, leaf, true);
                    } else if disable.iter().any(|k| k.trim().eq_ignore_ascii_case(&key)) {
                        selection.set(group, leaf, false);
                    }
                }
                selection.save_to(ctx.settings.as_ref(), &ctx.catalog)?;
            }

            let resolver = match widen {
                Some(groups) => ScopeResolver::with_widened_groups(groups.iter()),
                None => ScopeResolver::default(),
            };
            let scopes = resolver.resolve(&selection, &ctx.catalog);

            let groups: serde_json::Map<String, serde_json::Value> = ctx
                .catalog
                .groups()
                .iter()
                .map(|g| (g.name.clone(), json!(g.leaves)))
                .collect();

            Ok(CliResponse::success(json!({
                "catalog": groups,
                "enabled": selection.enabled_keys(&ctx.catalog),
                "scope": scopes.as_str(),
            })))
        }

        Commands::Configure {
            client_id,
            client_secret,
            email,
            domain,
        } => {
            let credentials = ClientCredentials::new(
                client_id.as_str(),
                client_secret.as_str(),
                email.as_str(),
                *domain,
                cli.redirect_uri.as_str(),
            );
            credentials.validate()?;
            credentials.save_to(ctx.settings.as_ref())?;

            Ok(CliResponse::success(json!({
                "message": "Credenciais salvas",
                "client_id": credentials.client_id(),
                "domain": credentials.domain().as_str(),
                "settings": cli.settings.display().to_string(),
            })))
        }

        Commands::ConsentUrl { open } => {
            if !ctx.client.credentials().has_client_id() {
                bail!("Client ID não configurado. Rode `zoho-oauth configure` primeiro");
            }

            let selection = CapabilitySelection::from_settings(ctx.settings.as_ref(), &ctx.catalog);
            let scopes = ScopeResolver::default().resolve(&selection, &ctx.catalog);
            let url = ctx.flow().build_consent_url(&scopes)?;

            if *open {
                println!("🌐 Abrindo navegador para autorização...");
                if let Err(e) = webbrowser::open(url.as_str()) {
                    log::warn!("⚠️ [CLI] Não foi possível abrir o navegador: {}", e);
                }
            }

            Ok(CliResponse::success(json!({
                "url": url.as_str(),
                "scope": scopes.as_str(),
            })))
        }

        Commands::Exchange { code } => match ctx.flow().exchange_grant_code(code).await {
            Ok(record) => Ok(CliResponse::success(json!({
                "message": "Autorização concluída com sucesso!",
                "refresh_token_preview": preview(&record.refresh_token),
                "access_token_expires_at": record.expires_at,
            }))),
            Err(e) if e.requires_reconsent() => Ok(CliResponse::error(format!(
                "{}. Gere uma nova URL de consentimento com `zoho-oauth consent-url`",
                e
            ))),
            Err(e) => Ok(CliResponse::error(e.to_string())),
        },

        Commands::Check { strategy, module } => {
            let strategy = match strategy {
                ProbeKind::Identity => ProbeStrategy::Identity,
                ProbeKind::Record => ProbeStrategy::RecordRoundTrip { module: module.clone() },
            };
            let probe = ConnectionProbe::with_strategy(ctx.client.clone(), ctx.tokens.clone(), strategy);
            let state = probe.connection_state().await;

            Ok(CliResponse {
                success: state.is_connected(),
                data: Some(json!({ "connected": state.is_connected(), "connection": state })),
                error: None,
            })
        }

        Commands::Status => {
            let state = ctx.flow().state().await;
            let token = ctx.tokens.current().await?;

            Ok(CliResponse::success(json!({
                "authorization": state,
                "client_id_configured": ctx.client.credentials().has_client_id(),
                "domain": ctx.client.credentials().domain().as_str(),
                "access_token_expires_at": token.and_then(|t| t.expires_at),
            })))
        }

        Commands::Revoke => {
            let service = RevocationService::new(ctx.client.clone(), ctx.tokens.clone());
            match service.try_revoke().await {
                Ok(()) => Ok(CliResponse::success(json!({ "revoked": true }))),
                Err(e) => Ok(CliResponse::error(format!("Revogação não confirmada: {}", e))),
            }
        }
    }
}

fn preview(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 8 {
        return "***".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

fn output_response(response: CliResponse, format: &OutputFormat) {
    match format {
        OutputFormat::Json => match serde_json::to_string(&response) {
            Ok(raw) => println!("{}", raw),
            Err(e) => eprintln!("❌ Erro ao serializar resposta: {}", e),
        },
        OutputFormat::Pretty => {
            if let Some(data) = response.data {
                println!("{}", if response.success { "✅ Sucesso!" } else { "⚠️ Falhou" });
                println!(
                    "{}",
                    serde_json::to_string_pretty(&data).unwrap_or_else(|_| data.to_string())
                );
            }
            if let Some(error) = response.error {
                eprintln!("❌ Erro: {}", error);
            }
        }
    }
}
