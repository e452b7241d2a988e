use clap::Parser;
use server::network::{Server, ServerConfig};

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Address to bind the listener to
    #[clap(short = 'H', long, default_value = "0.0.0.0")]
    host: String,
    /// Port to listen on
    #[clap(short, long, default_value_t = shared::DEFAULT_PORT)]
    port: u16,
    /// Board width/height in cells
    #[clap(long, default_value_t = shared::DEFAULT_GRID_SIZE)]
    grid_size: i32,
    /// Number of special cells rolled at round start
    #[clap(long, default_value_t = shared::DEFAULT_SPECIAL_CELLS)]
    special_cells: usize,
    /// Maximum concurrent players
    #[clap(long, default_value_t = shared::DEFAULT_MAX_PLAYERS)]
    max_players: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let config = ServerConfig {
        grid_size: args.grid_size,
        special_cells: args.special_cells,
        max_clients: args.max_players,
    };

    let server = Server::bind(&format!("{}:{}", args.host, args.port), config).await?;
    server.run().await
}
