//! Terminal chat client.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin tsunagi-client -- --token <token> --nickname bob --room alice
//! ```

use clap::Parser;
use tsunagi_client::Args;
use tsunagi_shared::logger::setup_logger;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    setup_logger(env!("CARGO_BIN_NAME"), &args.log_level);

    if let Err(e) = tsunagi_client::run(args).await {
        tracing::error!("Client error: {}", e);
        std::process::exit(1);
    }
}
