//! Thin stdin → stdout wrapper around the request handler.
//!
//! Reads one JSON request from standard input and prints the response
//! envelope. Serving over HTTP (or anything else) is a transport concern
//! that lives outside this crate.

use std::io::Read;

use force_layout::{EngineConfig, RequestHandler};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let mut raw = String::new();
    if let Err(e) = std::io::stdin().read_to_string(&mut raw) {
        eprintln!("failed to read request from stdin: {e}");
        std::process::exit(1);
    }

    let handler = RequestHandler::new(EngineConfig::load());
    let response = handler.handle(&raw).await;

    match serde_json::to_string(&response) {
        Ok(body) => println!("{body}"),
        Err(e) => {
            eprintln!("failed to encode response: {e}");
            std::process::exit(1);
        }
    }
}
