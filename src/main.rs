//! aab-repack - APK to App Bundle repackager.
//!
//! This binary decodes a compiled APK, reassembles it into bundle modules,
//! builds an App Bundle through the external bundler and signs the result.

use std::process;

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::init();

    // Run CLI and get exit code
    let exit_code = match aab_repack::cli::run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    };

    process::exit(exit_code);
}
