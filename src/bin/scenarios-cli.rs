use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "scenarios-cli")]
#[command(about = "Drive and inspect the async scenarios server", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[arg(short, long, default_value = "CHANGE_ME_IN_PRODUCTION")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a batch of pokemon in one request
    Create {
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Schedule a deferred insert
    FireAndForget {
        #[arg(long)]
        name: Option<String>,
    },
    /// Publish under a deadline
    Publish {
        #[arg(long)]
        timeout_ms: Option<u64>,
        #[arg(long, default_value = "group")]
        group: String,
        #[arg(long, default_value = "hello")]
        message: String,
    },
    /// Publish until the server shuts down
    PublishCancellable {
        #[arg(long, default_value = "group")]
        group: String,
        #[arg(long, default_value = "hello")]
        message: String,
    },
    /// Number of stored pokemon
    Count,
    /// Server status
    Status,
    /// Race outcomes and pending timers
    Races,
    /// Background jobs and scopes
    Background,
    /// Recent background failures
    Failures,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let request_id = Uuid::new_v4().to_string();
    let mut headers = HeaderMap::new();
    headers.insert("x-request-id", HeaderValue::from_str(&request_id)?);

    let request = match cli.command {
        Commands::Create { names } => {
            let results: Vec<Value> = names
                .into_iter()
                .map(|name| serde_json::json!({ "name": name }))
                .collect();
            client
                .post(format!("{}/pokemon", cli.url))
                .json(&serde_json::json!({ "results": results }))
        }
        Commands::FireAndForget { name } => {
            let mut query = Vec::new();
            if let Some(name) = name {
                query.push(("name", name));
            }
            client.get(format!("{}/fire-and-forget", cli.url)).query(&query)
        }
        Commands::Publish {
            timeout_ms,
            group,
            message,
        } => {
            let mut query = vec![("group", group), ("message", message)];
            if let Some(ms) = timeout_ms {
                query.push(("timeout_ms", ms.to_string()));
            }
            client.get(format!("{}/publish", cli.url)).query(&query)
        }
        Commands::PublishCancellable { group, message } => client
            .get(format!("{}/publish/cancellable", cli.url))
            .query(&[("group", group), ("message", message)]),
        Commands::Count => client.get(format!("{}/pokemon/count", cli.url)),
        admin => {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
            );
            let path = match admin {
                Commands::Status => "status",
                Commands::Races => "races",
                Commands::Background => "background",
                _ => "failures",
            };
            client.get(format!("{}/admin/{}", cli.url, path))
        }
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    let body = match serde_json::from_str::<Value>(&text) {
        Ok(json) => serde_json::to_string_pretty(&json)?,
        Err(_) => text,
    };

    if status.is_success() {
        println!("{}", body);
    } else {
        eprintln!("Error: server returned status {}", status);
        eprintln!("Response: {}", body);
    }
    Ok(())
}
