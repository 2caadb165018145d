use std::error::Error;
use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use zendesk_viewer::TicketRef;
use zendesk_viewer::details::TicketDetails;
use zendesk_viewer::model::{Ticket, TicketWithPeople, User};
use zendesk_viewer::pager::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, TicketPager};
use zendesk_viewer::zendesk::{
    ConfigError, ENV_EMAIL, ENV_SUBDOMAIN, ENV_TOKEN, ZendeskClient, ZendeskConfig,
    token_from_env,
};

#[cfg(feature = "web")]
use zendesk_viewer::web::{WebConfig, serve};

#[derive(Parser, Debug)]
#[command(name = "zendesk-viewer", about = "Browse the tickets of a Zendesk account", version)]
pub struct Cli {
    /// Emit JSON instead of human-readable tables.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct ZendeskArgs {
    /// Zendesk subdomain, as in https://{subdomain}.zendesk.com.
    #[arg(long, env = ENV_SUBDOMAIN)]
    subdomain: Option<String>,
    /// Agent email used for API token authentication.
    #[arg(long, env = ENV_EMAIL)]
    email: Option<String>,
    /// Zendesk API token.
    #[arg(long, env = ENV_TOKEN, hide_env_values = true)]
    token: Option<String>,
    /// Talk to this API root instead of the subdomain's (sandboxes, local mocks).
    #[arg(long)]
    api_root: Option<String>,
}

impl ZendeskArgs {
    fn resolve(self) -> Result<ZendeskConfig, ConfigError> {
        let email = self.email.ok_or(ConfigError::MissingEnv(ENV_EMAIL))?;
        let token = self
            .token
            .filter(|token| !token.trim().is_empty())
            .or_else(token_from_env)
            .ok_or(ConfigError::MissingEnv(ENV_TOKEN))?;
        match self.api_root {
            Some(root) => ZendeskConfig::with_api_root(&root, email, token),
            None => {
                let subdomain = self
                    .subdomain
                    .ok_or(ConfigError::MissingEnv(ENV_SUBDOMAIN))?;
                ZendeskConfig::new(&subdomain, email, token)
            }
        }
    }
}

fn page_size_in_range(raw: &str) -> Result<usize, String> {
    let value: usize = raw.parse().map_err(|_| format!("{raw:?} is not a number"))?;
    if (1..=MAX_PAGE_SIZE).contains(&value) {
        Ok(value)
    } else {
        Err(format!("page size must be between 1 and {MAX_PAGE_SIZE}"))
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the ticket viewer web app.
    #[cfg(feature = "web")]
    Serve {
        #[command(flatten)]
        zendesk: ZendeskArgs,
        /// Address to listen on.
        #[arg(long, default_value = "127.0.0.1:5000")]
        addr: SocketAddr,
        /// Tickets shown per batch.
        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE, value_parser = page_size_in_range)]
        page_size: usize,
        /// Directory served under /static (holds the wasm controller bundle).
        #[arg(long, default_value = "static")]
        static_dir: PathBuf,
    },
    /// List one batch of tickets.
    Tickets {
        #[command(flatten)]
        zendesk: ZendeskArgs,
        /// Tickets per batch.
        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE, value_parser = page_size_in_range)]
        page_size: usize,
        /// Number of batches to skip forward before printing.
        #[arg(long, default_value_t = 0)]
        skip: usize,
    },
    /// Show one ticket with its requester and assignee.
    Ticket {
        #[command(flatten)]
        zendesk: ZendeskArgs,
        /// Ticket API URL or numeric ticket ID.
        ticket: String,
    },
}

pub async fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    match cli.command {
        #[cfg(feature = "web")]
        Command::Serve {
            zendesk,
            addr,
            page_size,
            static_dir,
        } => {
            init_tracing("info");
            let mut config = WebConfig::new(zendesk.resolve()?);
            config.addr = addr;
            config.page_size = page_size;
            config.static_dir = static_dir;
            serve(config).await?;
            Ok(())
        }
        Command::Tickets {
            zendesk,
            page_size,
            skip,
        } => {
            init_tracing("warn");
            handle_tickets(zendesk.resolve()?, page_size, skip, cli.json).await
        }
        Command::Ticket { zendesk, ticket } => {
            init_tracing("warn");
            handle_ticket(zendesk.resolve()?, &ticket, cli.json).await
        }
    }
}

fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn handle_tickets(
    config: ZendeskConfig,
    page_size: usize,
    skip: usize,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    let mut pager = TicketPager::new(ZendeskClient::new(config), page_size);
    let mut batch = pager.current_batch().await?;
    for _ in 0..skip {
        batch = pager.goto_next_batch().await?;
    }

    if as_json {
        println!("{}", serde_json::to_string_pretty(&batch)?);
    } else {
        print_ticket_table(&batch);
    }
    Ok(())
}

async fn handle_ticket(
    config: ZendeskConfig,
    query: &str,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    let raw = match query.trim().parse::<u64>() {
        Ok(id) => format!("{}/tickets/{id}.json", config.api_root()),
        Err(_) => query.to_string(),
    };
    let reference = TicketRef::parse(&raw)?;
    let details = TicketDetails::new(ZendeskClient::new(config));
    let found = details.get_ticket(&reference).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&found)?);
    } else {
        print_ticket(&found);
    }
    Ok(())
}

fn print_ticket_table(rows: &[Ticket]) {
    if rows.is_empty() {
        println!("No tickets in this batch.");
        return;
    }
    let status_width = rows
        .iter()
        .map(|ticket| ticket.status.as_deref().unwrap_or("-").len())
        .max()
        .unwrap_or(0)
        .max("STATUS".len());
    let id_width = rows
        .iter()
        .map(|ticket| ticket.id.to_string().len())
        .max()
        .unwrap_or(0)
        .max("ID".len());
    println!(
        "{:>id_width$}  {:<status_width$}  {}",
        "ID", "STATUS", "SUBJECT"
    );
    println!(
        "{:->id_width$}  {:-<status_width$}  {}",
        "", "", "-------"
    );
    for ticket in rows {
        println!(
            "{:>id_width$}  {:<status_width$}  {}",
            ticket.id,
            ticket.status.as_deref().unwrap_or("-"),
            ticket.subject_or_placeholder()
        );
    }
}

fn print_ticket(found: &TicketWithPeople) {
    let ticket = &found.ticket;
    println!("Ticket #{}: {}", ticket.id, ticket.subject_or_placeholder());
    println!(
        "Status: {}  Priority: {}  Type: {}",
        ticket.status.as_deref().unwrap_or("-"),
        ticket.priority.as_deref().unwrap_or("-"),
        ticket.ticket_type.as_deref().unwrap_or("-")
    );
    if let Some(created) = &ticket.created_at {
        println!("Created: {created}");
    }
    if let Some(updated) = &ticket.updated_at {
        println!("Updated: {updated}");
    }
    if !ticket.tags.is_empty() {
        println!("Tags: {}", ticket.tags.join(", "));
    }
    println!("Requester: {}", describe_user(found.requester.as_ref(), "unknown"));
    println!("Assignee: {}", describe_user(found.assignee.as_ref(), "unassigned"));
    if let Some(description) = ticket.description.as_deref().map(str::trim) {
        if !description.is_empty() {
            println!("\nDescription:");
            println!("{description}");
        }
    }
}

fn describe_user(user: Option<&User>, missing: &str) -> String {
    match user {
        Some(user) => match &user.email {
            Some(email) => format!("{} <{email}>", user.name),
            None => user.name.clone(),
        },
        None => missing.to_string(),
    }
}
