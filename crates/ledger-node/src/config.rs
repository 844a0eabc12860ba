use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "ledger-node")]
#[command(about = "Proof-of-work ledger node")]
pub struct Args {
    /// Address to listen on, e.g. 127.0.0.1:8080
    #[arg(long, env = "LEDGER_LISTEN", default_value = "127.0.0.1:8080")]
    pub listen: SocketAddr,

    /// Data directory for sled
    #[arg(long, env = "LEDGER_DATA_DIR", default_value = "./data")]
    pub data_dir: PathBuf,

    /// Peer base URL to sync from on start and broadcast to after mining.
    /// Repeatable.
    #[arg(long = "peer", env = "LEDGER_PEERS", value_delimiter = ',')]
    pub peers: Vec<String>,
}
