use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use client_registry::config::{DEFAULT_API_URL, DEFAULT_SESSION_DB, DEFAULT_TIMEOUT_SECS};
use client_registry::cep::DEFAULT_CEP_URL;
use client_registry::{
    can, navigate, normalize_one, post_login_target, ApiClient, Capability, CepClient,
    ClientAction, ClientForm, ClientRecord, Config, FormError, FormMode, Navigation, Session,
    SqliteStore,
};

#[derive(Parser)]
#[command(name = "client-registry", version, about = "Client registry back office")]
struct Cli {
    /// Backend base URL
    #[arg(long, env = "CLIENT_REGISTRY_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,

    /// Postal lookup base URL
    #[arg(long, env = "CLIENT_REGISTRY_CEP_URL", default_value = DEFAULT_CEP_URL)]
    cep_url: String,

    /// Request timeout in seconds
    #[arg(long, env = "CLIENT_REGISTRY_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout_secs: u64,

    /// Where the session is persisted
    #[arg(long, env = "CLIENT_REGISTRY_SESSION_DB", default_value = DEFAULT_SESSION_DB)]
    session_db: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log in and store the session
    Login {
        username: String,
        #[arg(long, env = "CLIENT_REGISTRY_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Forget the stored session
    Logout,
    /// Show the logged-in user
    Whoami,
    /// List clients
    List,
    /// Show one client
    Show { id: String },
    /// Create a client from a JSON file
    Create {
        #[arg(long)]
        file: PathBuf,
    },
    /// Replace a client from a JSON file
    Update {
        id: String,
        #[arg(long)]
        file: PathBuf,
    },
    /// Delete a client
    Delete { id: String },
    /// Look up an address by postal code
    Cep { code: String },
}

impl Cli {
    fn config(&self) -> Config {
        Config::default()
            .with_api_url(&self.api_url)
            .with_cep_url(&self.cep_url)
            .with_timeout(Duration::from_secs(self.timeout_secs))
            .with_session_db(self.session_db.clone())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config();

    let store = SqliteStore::open(&config.session_db)
        .with_context(|| format!("Failed to open session store {:?}", config.session_db))?;
    let session = Arc::new(Session::new(store));
    let api = ApiClient::new(&config, Arc::clone(&session)).context("Failed to build API client")?;
    let cep = CepClient::new(&config.cep_url, config.timeout).context("Failed to build CEP client")?;

    match cli.command {
        Command::Login { username, password } => run_login(&api, &username, &password).await,
        Command::Logout => {
            api.logout();
            println!("✓ Logged out");
            Ok(())
        }
        Command::Whoami => run_whoami(&api),
        Command::List => run_list(&api).await,
        Command::Show { id } => run_show(&api, &id).await,
        Command::Create { file } => run_save(&api, &cep, FormMode::Create, &file).await,
        Command::Update { id, file } => run_save(&api, &cep, FormMode::Edit(id), &file).await,
        Command::Delete { id } => run_delete(&api, &id).await,
        Command::Cep { code } => run_cep(&cep, &code).await,
    }
}

/// Gate a route the way the UI would before rendering it.
fn enter(api: &ApiClient<SqliteStore>, path: &str) -> Result<()> {
    match navigate(api.session(), path) {
        Navigation::Allow => Ok(()),
        Navigation::RedirectToLogin { session_expired: true, .. } => {
            bail!("Your session has expired. Please log in again.")
        }
        Navigation::RedirectToLogin { .. } => bail!("Please log in first (client-registry login <user>)"),
        Navigation::RedirectToHome => bail!("You do not have access to {}", path),
    }
}

async fn run_login(api: &ApiClient<SqliteStore>, username: &str, password: &str) -> Result<()> {
    match api.login(username, password).await {
        Ok(user) => {
            println!("✓ Logged in as {}", user.display_name());
            let target = post_login_target(api.session().take_redirect().as_deref());
            println!("  Continue at {}", target);
            Ok(())
        }
        Err(e) => {
            let message = e
                .backend_message()
                .map(str::to_string)
                .unwrap_or_else(|| e.to_string());
            bail!("Login failed: {}", message)
        }
    }
}

fn run_whoami(api: &ApiClient<SqliteStore>) -> Result<()> {
    let ctx = api.session().context();
    if !ctx.is_authenticated() {
        println!("Not logged in");
        return Ok(());
    }
    let name = ctx.current_user().map(|u| u.display_name()).unwrap_or("User");
    println!("{} ({})", name, if ctx.is_admin() { "admin" } else { "user" });
    if ctx.session_expired {
        println!("⚠️  Session expired, log in again");
    }
    Ok(())
}

async fn run_list(api: &ApiClient<SqliteStore>) -> Result<()> {
    enter(api, "/")?;
    let rows = match api.at("/").list_summaries().await {
        Ok(rows) => rows,
        Err(e) => bail!(ClientAction::List.user_message(&e)),
    };

    println!("{:<8} {:<30} {:<16} {:<18} {}", "ID", "NAME", "CPF", "PHONE", "EMAIL");
    for row in &rows {
        println!(
            "{:<8} {:<30} {:<16} {:<18} {}",
            row.id.as_deref().unwrap_or("-"),
            row.name,
            row.document_id,
            row.phone,
            row.email
        );
    }
    println!("\n✓ {} client(s)", rows.len());
    Ok(())
}

async fn run_show(api: &ApiClient<SqliteStore>, id: &str) -> Result<()> {
    let path = format!("/clients/{}", id);
    enter(api, &path)?;
    let record = match api.at(&path).get_client(id).await {
        Ok(record) => record,
        Err(e) => bail!(ClientAction::Load.user_message(&e)),
    };

    let form = ClientForm::load(FormMode::View(id.to_string()), record);
    print_record(form.record());
    Ok(())
}

fn print_record(record: &ClientRecord) {
    let address = &record.address;
    println!("Name:    {}", record.name);
    println!("CPF:     {}", record.document_id);
    println!("Address: {}, {}", address.street, address.neighborhood);
    println!("         {} - {} {}", address.city, address.state, address.postal_code);
    if !address.complement.is_empty() {
        println!("         {}", address.complement);
    }
    for phone in &record.phones {
        println!("Phone:   {} ({})", phone.number, phone.phone_type.as_wire());
    }
    for email in &record.emails {
        println!("Email:   {}", email);
    }
}

async fn run_save(
    api: &ApiClient<SqliteStore>,
    cep: &CepClient,
    mode: FormMode,
    file: &Path,
) -> Result<()> {
    let (path, action) = match &mode {
        FormMode::Edit(id) => (format!("/clients/edit/{}", id), ClientAction::Update),
        _ => ("/clients/new".to_string(), ClientAction::Create),
    };
    enter(api, &path)?;

    let raw = std::fs::read_to_string(file).with_context(|| format!("Failed to read {:?}", file))?;
    let value: serde_json::Value =
        serde_json::from_str(&raw).with_context(|| format!("{:?} is not valid JSON", file))?;

    let mut form = ClientForm::load(mode.clone(), normalize_one(value));

    // Fill a missing street from the postal code, like the form does on typing
    if form.record().address.street.is_empty() {
        let postal_code = form.record().address.postal_code.clone();
        if let Some(ticket) = form.set_cep(&postal_code) {
            let outcome = cep.resolve(&ticket).await;
            form.apply_cep_lookup(&ticket, outcome);
        }
    }

    let payload = match form.submit(&api.session().context()) {
        Ok(payload) => payload,
        Err(FormError::Invalid(errors)) => {
            eprintln!("❌ The client has invalid fields:");
            for (field, message) in errors.iter() {
                eprintln!("   {}: {}", field, message);
            }
            bail!("Fix the fields above and try again");
        }
        Err(e) => bail!(e.to_string()),
    };

    let api = api.at(&path);
    let saved = match &mode {
        FormMode::Edit(id) => api.update_client(id, &payload).await,
        _ => api.create_client(&payload).await,
    };
    match saved {
        Ok(record) => {
            println!("✓ Saved client {}", record.id.as_deref().unwrap_or("(no id returned)"));
            Ok(())
        }
        Err(e) => bail!(action.user_message(&e)),
    }
}

async fn run_delete(api: &ApiClient<SqliteStore>, id: &str) -> Result<()> {
    let path = format!("/clients/{}", id);
    enter(api, &path)?;
    if !can(&api.session().context(), Capability::Delete) {
        bail!(Capability::Delete.denied_message());
    }

    match api.at(&path).delete_client(id).await {
        Ok(()) => {
            println!("✓ Client {} deleted", id);
            Ok(())
        }
        Err(e) => bail!(ClientAction::Delete.user_message(&e)),
    }
}

async fn run_cep(cep: &CepClient, code: &str) -> Result<()> {
    let address = cep.lookup(code).await.context("Postal lookup failed")?;
    println!("{}, {}", address.street, address.neighborhood);
    println!("{} - {}", address.city, address.state);
    if !address.complement.is_empty() {
        println!("{}", address.complement);
    }
    Ok(())
}
