//! Command line interface for the repackager.

mod args;

pub use args::Args;

use crate::error::Result;
use crate::repack::Repacker;

/// Main CLI entry point
pub async fn run() -> Result<i32> {
    let args = Args::parse_args();
    let ctx = args.into_context()?;

    let repacker = Repacker::new(ctx);

    // Ctrl-C cancels between steps; the workspace is still cleaned up.
    let cancel = repacker.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("interrupt received, cancelling after the current step");
            cancel.cancel();
        }
    });

    let output = repacker.run().await?;
    log::info!("done: {}", output.display());
    Ok(0)
}
