use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ledger_core::{parse_candidate, Blockchain, Payload};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "ledger-cli")]
#[command(about = "CLI client for the proof-of-work ledger node")]
struct Cli {
    /// Node base URL (e.g. http://127.0.0.1:8080)
    #[arg(long, global = true, env = "LEDGER_NODE", default_value = "http://127.0.0.1:8080")]
    node: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the node's full chain
    Blocks,
    /// Print the node's tip height, hash and difficulty
    Tip,
    /// Ask the node to mine a block carrying DATA
    Mine {
        /// Block payload as JSON; bare text is sent as a JSON string
        #[arg(long)]
        data: String,
    },
    /// Offer a candidate chain from a JSON file to the node
    Push {
        #[arg(long)]
        file: PathBuf,
    },
    /// Validate a chain file locally without contacting a node
    Validate {
        #[arg(long)]
        file: PathBuf,
    },
}

#[derive(Serialize)]
struct MineRequest {
    data: Payload,
}

fn read_json(path: &Path) -> Result<serde_json::Value> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

async fn print_response(res: reqwest::Response) -> Result<()> {
    let status = res.status();
    let body = res.text().await?;
    println!("status: {}", status);
    match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{body}"),
    }
    if !status.is_success() {
        bail!("node answered {status}");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let node = cli.node.trim_end_matches('/');

    match cli.cmd {
        Command::Blocks => {
            let res = client.get(format!("{node}/api/blocks")).send().await?;
            print_response(res).await?;
        }
        Command::Tip => {
            let res = client.get(format!("{node}/api/blocks/tip")).send().await?;
            print_response(res).await?;
        }
        Command::Mine { data } => {
            let data = serde_json::from_str(&data).unwrap_or(Payload::String(data));
            debug!(%data, "mining");
            let res = client
                .post(format!("{node}/api/mine"))
                .json(&MineRequest { data })
                .send()
                .await?;
            print_response(res).await?;
        }
        Command::Push { file } => {
            let chain = read_json(&file)?;
            let res = client
                .post(format!("{node}/api/chain"))
                .json(&chain)
                .send()
                .await?;
            print_response(res).await?;
        }
        Command::Validate { file } => {
            let blocks = parse_candidate(read_json(&file)?)?;
            Blockchain::validate_chain(&blocks)?;
            println!("valid: {} blocks", blocks.len());
        }
    }
    Ok(())
}
