//! VCon Labeler - headless annotation-session engine
//!
//! Main entry point; speaks JSON lines over stdin/stdout.

use labeler_lib::run;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        tracing::error!("Labeler error: {:#}", e);
        std::process::exit(1);
    }
}
