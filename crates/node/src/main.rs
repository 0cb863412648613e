// node/src/main.rs
use clap::{Parser, Subcommand};
use networking::PeerAddress;
use node::{logging, runtime, wallet, NodeConfig, NodeRuntime};

#[derive(Parser)]
#[command(name = "powchain-node")]
#[command(about = "Proof-of-work gossip ledger node", version, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a node and run until Ctrl-C
    Start {
        /// Configuration file path
        #[arg(short, long, default_value = "./config.toml")]
        config: String,

        /// Override listen address
        #[arg(long)]
        listen: Option<String>,

        /// Override listen port
        #[arg(short, long)]
        port: Option<u16>,

        /// Peer to join through (ip:port)
        #[arg(short, long)]
        bootstrap: Option<String>,

        /// Override wallet key file
        #[arg(short, long)]
        key_file: Option<String>,
    },

    /// Write a default configuration file
    Init {
        /// Output path
        #[arg(short, long, default_value = "./config.toml")]
        output: String,
    },

    /// Generate a key pair
    Keygen {
        /// Output path
        #[arg(short, long)]
        output: String,
    },

    /// Sign and send one transaction to a running node
    Send {
        /// Target node (ip:port)
        #[arg(long)]
        peer: String,

        /// Wallet key file of the sender
        #[arg(short, long)]
        key_file: String,

        /// Recipient public key or identifier
        #[arg(short, long)]
        recipient: String,

        #[arg(short, long)]
        amount: f64,
    },

    /// Run three local nodes through a join, mine and sync scenario
    Demo {
        #[arg(long, default_value = "3")]
        difficulty: usize,

        /// First node's port; 0 picks ephemeral ports
        #[arg(long, default_value = "5000")]
        base_port: u16,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Start {
            config,
            listen,
            port,
            bootstrap,
            key_file,
        } => {
            let mut node_config = NodeConfig::load_or_default(&config)?;
            if let Some(listen) = listen {
                node_config.network.listen_addr = listen;
            }
            if let Some(port) = port {
                node_config.network.port = port;
            }
            if bootstrap.is_some() {
                node_config.network.bootstrap = bootstrap;
            }
            if key_file.is_some() {
                node_config.wallet.key_file = key_file;
            }
            logging::init_logging(&node_config.logging, cli.debug);
            tracing::info!("Loaded configuration from {}", config);
            start_node(node_config).await?;
        }
        Commands::Init { output } => {
            init_logging_default(cli.debug);
            NodeConfig::default().to_file(&output)?;
            tracing::info!("Default configuration written to {}", output);
        }
        Commands::Keygen { output } => {
            init_logging_default(cli.debug);
            let keypair = blockchain_crypto::KeyPair::generate()?;
            wallet::save_keypair(&keypair, &output)?;
            println!("Key pair written to {}", output);
            println!("{}", keypair.public_key().to_pem());
        }
        Commands::Send {
            peer,
            key_file,
            recipient,
            amount,
        } => {
            init_logging_default(cli.debug);
            let peer: PeerAddress = peer.parse()?;
            let keypair = wallet::load_keypair(&key_file)?;
            let network = NodeConfig::default().network;
            let tx = runtime::send_transaction(&network, &peer, &keypair, &recipient, amount).await?;
            println!("{}", tx);
        }
        Commands::Demo {
            difficulty,
            base_port,
        } => {
            init_logging_default(cli.debug);
            runtime::run_demo(difficulty, base_port).await?;
        }
    }

    Ok(())
}

fn init_logging_default(debug: bool) {
    logging::init_logging(&NodeConfig::default().logging, debug);
}

async fn start_node(config: NodeConfig) -> anyhow::Result<()> {
    let runtime = NodeRuntime::start(config).await?;

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    tracing::info!("Received shutdown signal");

    println!("{}", runtime.chain_report());
    runtime.shutdown().await;
    tracing::info!("Node stopped gracefully");
    Ok(())
}
