use anyhow::anyhow;
use boxoffice::api::*;
use boxoffice::application_impl::*;
use boxoffice::application_port::*;
use boxoffice::domain_model::*;
use boxoffice::domain_port::*;
use boxoffice::infra_file::*;
use boxoffice::infra_http::*;
use boxoffice::infra_memory::*;
use boxoffice::infra_redis::*;
use boxoffice::logger::*;
use boxoffice::settings::*;
use serde::Serialize;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let logger = Logger::new_bootstrap();

    let project_settings = parse_settings(cli.settings.as_deref())?;
    debug!(?project_settings);
    let logger_config = LogConfig {
        filter: project_settings.log.filter.clone(),
    };
    logger.reload_from_config(&logger_config)?;

    let transport: Arc<dyn HttpTransport> =
        Arc::new(ReqwestTransport::new(project_settings.http.timeout())?);
    let store = open_store(&project_settings.store).await?;
    let session = Arc::new(
        SessionClient::restore(transport, store, project_settings.session_config()).await?,
    );
    let endpoints = project_settings.endpoints();

    let result = run(cli.command, session.clone(), &endpoints).await;
    if let Err(e) = &result {
        if e.is_not_authenticated() {
            error!("session is no longer valid, run `boxoffice login` again");
        }
    }
    result.map_err(|e| anyhow!(e))
}

async fn open_store(settings: &Store) -> anyhow::Result<Arc<dyn CredentialStore>> {
    let store: Arc<dyn CredentialStore> = match settings.backend {
        StoreBackend::Memory => Arc::new(MemoryCredentialStore::new()),
        StoreBackend::File => {
            let path = settings
                .path
                .as_deref()
                .ok_or_else(|| anyhow!("store.path is required for the file backend"))?;
            Arc::new(FileCredentialStore::new(path))
        }
        StoreBackend::Redis => {
            let url = settings
                .redis_url
                .as_deref()
                .ok_or_else(|| anyhow!("store.redis_url is required for the redis backend"))?;
            Arc::new(RedisCredentialStore::connect(url, settings.prefix.clone()).await?)
        }
    };
    Ok(store)
}

async fn run(
    command: Command,
    session: Arc<SessionClient>,
    endpoints: &ServiceEndpoints,
) -> Result<(), SessionError> {
    match command {
        Command::Login { email, password } => {
            let response = session.login(LoginInput { email, password }).await?;
            print_json(&response.principal())
        }
        Command::Signup {
            email,
            password,
            name,
        } => {
            let response = session
                .signup(SignupInput {
                    email,
                    password,
                    name,
                })
                .await?;
            print_json(&response.principal())
        }
        Command::Logout => session.logout().await,
        Command::Whoami => {
            let state = session.state();
            if !state.is_authenticated() {
                println!("not logged in");
                return Ok(());
            }
            print_json(&state.principal)
        }
        Command::Profile => {
            let Some(principal) = session.principal() else {
                println!("not logged in");
                return Ok(());
            };
            print_json(&session.get_user(principal.id).await?)
        }
        Command::Sessions => {
            let Some(principal) = session.principal() else {
                println!("not logged in");
                return Ok(());
            };
            let sessions = AccountApi::new(session, endpoints)
                .active_sessions(principal.id)
                .await?;
            for active in sessions {
                let marker = if active.is_current == Some(true) { " *" } else { "" };
                println!(
                    "{:>6}  {:<30} expires {}{}",
                    active.id,
                    active.device_info.as_deref().unwrap_or("-"),
                    active
                        .expires_at
                        .map(|t| t.to_string())
                        .unwrap_or_else(|| "-".to_owned()),
                    marker
                );
            }
            Ok(())
        }
        Command::Events => {
            let events = InventoryApi::new(session, endpoints).list_events().await?;
            for event in events {
                println!(
                    "{:>6}  {:<40} {:>6} left",
                    event.id,
                    event.name,
                    event.available_tickets.unwrap_or_default()
                );
            }
            Ok(())
        }
        Command::Bookings => {
            let orders = BookingApi::new(session, endpoints).my_bookings().await?;
            for order in orders {
                println!(
                    "{:>6}  event {:<6} x{:<3} {:?}",
                    order.order_id, order.event_id, order.quantity, order.status
                );
            }
            Ok(())
        }
        Command::Get { url } => {
            let response = session.send(HttpRequest::get(url)).await?;
            if !response.is_success() {
                return Err(SessionError::Status(response));
            }
            println!("{}", response.body);
            Ok(())
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), SessionError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
