mod client;

use anyhow::Result;
use clap::{Parser, Subcommand};
use client::ApiClient;
use serde_json::json;

#[derive(Parser, Debug)]
#[command(name = "ldf-ctl", version)]
#[command(about = "Administrative client for the LDF control plane")]
struct Cli {
    /// Base URL of the ldf-server instance.
    #[arg(long, env = "LDF_SERVER", default_value = "http://127.0.0.1:8080")]
    server: String,

    /// Bearer token to authenticate with.
    #[arg(long, env = "LDF_TOKEN")]
    token: Option<String>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check server and storage health.
    Healthz,
    /// Show the identity behind the current token.
    Whoami,
    #[command(subcommand)]
    Distribution(DistributionCmd),
    #[command(subcommand)]
    Component(ComponentCmd),
    #[command(subcommand)]
    Source(SourceCmd),
    #[command(subcommand)]
    Download(DownloadCmd),
    #[command(subcommand)]
    Setting(SettingCmd),
    #[command(subcommand)]
    Mirror(MirrorCmd),
    /// Preview what a version filter expression would include or exclude.
    FilterPreview {
        filter: String,
        versions: Vec<String>,
    },
    /// Wipe all tenant data. Requires root and the literal confirmation phrase.
    AdminReset,
}

#[derive(Subcommand, Debug)]
enum DistributionCmd {
    List,
    Get { id: String },
    Create {
        name: String,
        version: String,
        #[arg(long)]
        visibility: Option<String>,
    },
    Update {
        id: String,
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        visibility: Option<String>,
    },
    Delete { id: String },
    Logs { id: String },
}

#[derive(Subcommand, Debug)]
enum ComponentCmd {
    List,
    Get { id: String },
    Create {
        name: String,
        category: String,
        display_name: String,
    },
    Delete { id: String },
}

#[derive(Subcommand, Debug)]
enum SourceCmd {
    List,
    Get { id: String },
    Create {
        name: String,
        url: String,
        /// One of: release, git, directory.
        retrieval_method: String,
        #[arg(long)]
        forge_type: Option<String>,
        #[arg(long)]
        version_filter: Option<String>,
    },
    Delete { id: String },
    /// Trigger (or coalesce onto) a version sync job.
    Sync {
        id: String,
        #[arg(long)]
        force: bool,
    },
    Versions {
        id: String,
        #[arg(long, default_value_t = 50)]
        limit: i64,
        #[arg(long, default_value_t = 0)]
        offset: i64,
    },
}

#[derive(Subcommand, Debug)]
enum DownloadCmd {
    /// Plan the download jobs needed to materialize a distribution.
    Plan { distribution_id: String },
    /// Delete every download job for a distribution.
    Flush { distribution_id: String },
    Cancel { id: String },
    Retry { id: String },
    /// Get a presigned URL for an uploaded artifact.
    Presign {
        distribution_id: String,
        path: String,
    },
}

#[derive(Subcommand, Debug)]
enum SettingCmd {
    List,
    Get {
        key: String,
        #[arg(long)]
        reveal: bool,
    },
    Set { key: String, value: String },
}

#[derive(Subcommand, Debug)]
enum MirrorCmd {
    List,
    Create {
        url_prefix: String,
        mirror_url: String,
        #[arg(long, default_value_t = 0)]
        priority: i32,
    },
    Delete { id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = ApiClient::new(cli.server.clone(), cli.token.clone());

    let result = match cli.cmd {
        Commands::Healthz => client.get("/healthz").await,
        Commands::Whoami => client.get("/v1/me").await,
        Commands::Distribution(cmd) => run_distribution(&client, cmd).await,
        Commands::Component(cmd) => run_component(&client, cmd).await,
        Commands::Source(cmd) => run_source(&client, cmd).await,
        Commands::Download(cmd) => run_download(&client, cmd).await,
        Commands::Setting(cmd) => run_setting(&client, cmd).await,
        Commands::Mirror(cmd) => run_mirror(&client, cmd).await,
        Commands::FilterPreview { filter, versions } => {
            client
                .post("/v1/filters/preview", json!({ "filter": filter, "versions": versions }))
                .await
        }
        Commands::AdminReset => {
            client
                .post("/v1/admin/reset", json!({ "confirm": "RESET_DATABASE" }))
                .await
        }
    }?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn run_distribution(client: &ApiClient, cmd: DistributionCmd) -> Result<serde_json::Value> {
    match cmd {
        DistributionCmd::List => client.get("/v1/distributions").await,
        DistributionCmd::Get { id } => client.get(&format!("/v1/distributions/{id}")).await,
        DistributionCmd::Create { name, version, visibility } => {
            client
                .post("/v1/distributions", json!({ "name": name, "version": version, "visibility": visibility }))
                .await
        }
        DistributionCmd::Update { id, status, name, visibility } => {
            client
                .patch(
                    &format!("/v1/distributions/{id}"),
                    json!({ "status": status, "name": name, "visibility": visibility }),
                )
                .await
        }
        DistributionCmd::Delete { id } => client.delete(&format!("/v1/distributions/{id}")).await,
        DistributionCmd::Logs { id } => client.get(&format!("/v1/distributions/{id}/logs")).await,
    }
}

async fn run_component(client: &ApiClient, cmd: ComponentCmd) -> Result<serde_json::Value> {
    match cmd {
        ComponentCmd::List => client.get("/v1/components").await,
        ComponentCmd::Get { id } => client.get(&format!("/v1/components/{id}")).await,
        ComponentCmd::Create { name, category, display_name } => {
            client
                .post(
                    "/v1/components",
                    json!({ "name": name, "category": category, "display_name": display_name }),
                )
                .await
        }
        ComponentCmd::Delete { id } => client.delete(&format!("/v1/components/{id}")).await,
    }
}

async fn run_source(client: &ApiClient, cmd: SourceCmd) -> Result<serde_json::Value> {
    match cmd {
        SourceCmd::List => client.get("/v1/sources").await,
        SourceCmd::Get { id } => client.get(&format!("/v1/sources/{id}")).await,
        SourceCmd::Create { name, url, retrieval_method, forge_type, version_filter } => {
            client
                .post(
                    "/v1/sources",
                    json!({
                        "name": name,
                        "url": url,
                        "retrieval_method": retrieval_method,
                        "forge_type": forge_type,
                        "version_filter": version_filter.unwrap_or_default(),
                    }),
                )
                .await
        }
        SourceCmd::Delete { id } => client.delete(&format!("/v1/sources/{id}")).await,
        SourceCmd::Sync { id, force } => {
            client
                .post(&format!("/v1/sources/{id}/sync"), json!({ "force": force }))
                .await
        }
        SourceCmd::Versions { id, limit, offset } => {
            client
                .get(&format!("/v1/sources/{id}/versions?limit={limit}&offset={offset}"))
                .await
        }
    }
}

async fn run_download(client: &ApiClient, cmd: DownloadCmd) -> Result<serde_json::Value> {
    match cmd {
        DownloadCmd::Plan { distribution_id } => {
            client
                .post(&format!("/v1/distributions/{distribution_id}/downloads"), json!({}))
                .await
        }
        DownloadCmd::Flush { distribution_id } => {
            client
                .delete_with_body(
                    &format!("/v1/distributions/{distribution_id}/downloads"),
                    json!({ "confirm": "FLUSH_DOWNLOADS" }),
                )
                .await
        }
        DownloadCmd::Cancel { id } => client.post(&format!("/v1/downloads/{id}/cancel"), json!({})).await,
        DownloadCmd::Retry { id } => client.post(&format!("/v1/downloads/{id}/retry"), json!({})).await,
        DownloadCmd::Presign { distribution_id, path } => {
            client
                .get(&format!(
                    "/v1/distributions/{distribution_id}/artifacts/presign?path={path}"
                ))
                .await
        }
    }
}

async fn run_setting(client: &ApiClient, cmd: SettingCmd) -> Result<serde_json::Value> {
    match cmd {
        SettingCmd::List => client.get("/v1/settings").await,
        SettingCmd::Get { key, reveal } => client.get(&format!("/v1/settings/{key}?reveal={reveal}")).await,
        SettingCmd::Set { key, value } => client.put(&format!("/v1/settings/{key}"), json!({ "value": value })).await,
    }
}

async fn run_mirror(client: &ApiClient, cmd: MirrorCmd) -> Result<serde_json::Value> {
    match cmd {
        MirrorCmd::List => client.get("/v1/mirrors").await,
        MirrorCmd::Create { url_prefix, mirror_url, priority } => {
            client
                .post(
                    "/v1/mirrors",
                    json!({ "url_prefix": url_prefix, "mirror_url": mirror_url, "priority": priority }),
                )
                .await
        }
        MirrorCmd::Delete { id } => client.delete(&format!("/v1/mirrors/{id}")).await,
    }
}
