use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use facility_sla_engine::rules::{FileRuleSource, RuleRepository};
use reqwest::{Client, Response};
use serde_json::json;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "fm-sla-cli")]
#[command(about = "Facility SLA engine CLI", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    endpoint: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a ticket
    Create {
        #[arg(short, long)]
        category: String,

        #[arg(short, long, default_value = "")]
        subcategory: String,

        #[arg(short, long, default_value = "")]
        description: String,

        #[arg(short, long, default_value = "P3")]
        priority: String,

        #[arg(short = 't', long)]
        ticket_type: Option<String>,

        #[arg(short = 'i', long)]
        issue_type: Option<String>,
    },

    /// List tickets
    List {
        #[arg(short, long, default_value = "0")]
        page: u32,

        #[arg(short = 's', long, default_value = "20")]
        page_size: u32,

        #[arg(short = 'a', long)]
        active_only: bool,
    },

    /// Get ticket details
    Get {
        #[arg(value_name = "TICKET_ID")]
        id: String,
    },

    /// Change a ticket's status (Open, WIP, Resolved, Closed, Lapsed)
    Status {
        #[arg(value_name = "TICKET_ID")]
        id: String,

        #[arg(value_name = "STATUS")]
        status: String,
    },

    /// Escalate a ticket one level
    Escalate {
        #[arg(value_name = "TICKET_ID")]
        id: String,
    },

    /// Show SLA status of a ticket
    Sla {
        #[arg(value_name = "TICKET_ID")]
        id: String,
    },

    /// Show the per-level escalation timeline of a ticket
    Path {
        #[arg(value_name = "TICKET_ID")]
        id: String,
    },

    /// List escalation rules
    Rules {
        #[arg(short, long)]
        category: Option<String>,
    },

    /// Ask the server to reload its rule source
    ReloadRules,

    /// Run one automatic escalation cycle now
    Evaluate,

    /// Normalize a rule file locally and report rejected records
    ValidateRules {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Check server health
    Health,
}

async fn print_body(response: Response) -> anyhow::Result<()> {
    let status = response.status();
    let body: serde_json::Value = response
        .json()
        .await
        .context("server returned a non-JSON body")?;
    println!("{}", serde_json::to_string_pretty(&body)?);

    if !status.is_success() {
        bail!("request failed with status {}", status);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let client = Client::new();
    let endpoint = cli.endpoint.trim_end_matches('/');

    let response = match cli.command {
        Commands::ValidateRules { file } => return validate_rules(file).await,

        Commands::Create {
            category,
            subcategory,
            description,
            priority,
            ticket_type,
            issue_type,
        } => {
            client
                .post(format!("{}/v1/tickets", endpoint))
                .json(&json!({
                    "category": category,
                    "subcategory": subcategory,
                    "description": description,
                    "priority": priority,
                    "ticket_type": ticket_type,
                    "issue_type": issue_type,
                }))
                .send()
                .await?
        }

        Commands::List {
            page,
            page_size,
            active_only,
        } => {
            let mut url = format!("{}/v1/tickets?page={}&page_size={}", endpoint, page, page_size);
            if active_only {
                url.push_str("&active_only=true");
            }
            client.get(&url).send().await?
        }

        Commands::Get { id } => client.get(format!("{}/v1/tickets/{}", endpoint, id)).send().await?,

        Commands::Status { id, status } => {
            client
                .put(format!("{}/v1/tickets/{}/status", endpoint, id))
                .json(&json!({ "status": status }))
                .send()
                .await?
        }

        Commands::Escalate { id } => {
            client
                .post(format!("{}/v1/tickets/{}/escalate", endpoint, id))
                .send()
                .await?
        }

        Commands::Sla { id } => {
            client
                .get(format!("{}/v1/tickets/{}/sla", endpoint, id))
                .send()
                .await?
        }

        Commands::Path { id } => {
            client
                .get(format!("{}/v1/tickets/{}/escalation-path", endpoint, id))
                .send()
                .await?
        }

        Commands::Rules { category } => {
            let mut request = client.get(format!("{}/v1/rules", endpoint));
            if let Some(category) = category {
                request = request.query(&[("category", category)]);
            }
            request.send().await?
        }

        Commands::ReloadRules => {
            client
                .post(format!("{}/v1/rules/reload", endpoint))
                .send()
                .await?
        }

        Commands::Evaluate => {
            client
                .post(format!("{}/v1/escalation/evaluate", endpoint))
                .send()
                .await?
        }

        Commands::Health => client.get(format!("{}/health", endpoint)).send().await?,
    };

    print_body(response).await
}

async fn validate_rules(file: PathBuf) -> anyhow::Result<()> {
    let source = FileRuleSource::new(&file);
    let (repository, report) = RuleRepository::load(&source)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;

    println!("{}", serde_json::to_string_pretty(&report)?);

    let inactive = repository.len() - repository.active_rules().len();
    println!(
        "{} rules loaded ({} inactive), {} records rejected",
        report.loaded,
        inactive,
        report.skipped.len()
    );

    if !report.skipped.is_empty() {
        bail!("{} rule records were rejected", report.skipped.len());
    }
    Ok(())
}
