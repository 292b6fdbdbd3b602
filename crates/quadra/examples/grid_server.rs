//! Runs a Quadra server hosting the built-in grid game.
//!
//! ```sh
//! cargo run --example grid_server
//! ```
//!
//! Connect with any client speaking the length-prefixed JSON protocol;
//! `RUST_LOG=debug` shows every dispatch.

use quadra::{init_tracing, QuadraServer};
use quadra_game::testkit::{GridBuilder, GridRules};

#[tokio::main]
async fn main() -> Result<(), quadra::QuadraError> {
    init_tracing();

    let server = QuadraServer::<GridBuilder, GridRules>::builder()
        .bind("127.0.0.1:7878")
        .build(GridBuilder, GridRules::new())
        .await?;

    println!("listening on {}", server.local_addr().map(|a| a.to_string()).unwrap_or_default());
    server.run().await
}
