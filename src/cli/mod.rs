use std::io::Write;

use clap::Parser;
use tracing::debug;

use gsindex::auth::{Authenticator, GoogleAuth};
use gsindex::index::{IndexUpdater, Indexer};

#[derive(Parser)]
#[command(name = "gsindex")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Regenerate directory index pages for a Google Storage location", long_about = None)]
pub struct Cli {
    /// Location whose indexes are updated, e.g. gs://bucket/dir
    pub location: String,

    /// Allow an interactive login if no cached credential is usable
    #[arg(long)]
    pub interactive: bool,
}

pub async fn execute(cli: Cli) -> i32 {
    let authenticator = GoogleAuth::new();
    let updater = Indexer::new();

    run_update(
        &authenticator,
        &updater,
        cli.interactive,
        &cli.location,
        &mut std::io::stdout(),
        &mut std::io::stderr(),
    )
    .await
}

/// Authenticate, then update the indexes at `location`.
///
/// Either failure is terminal: the error is reported on `err` and the
/// returned exit code is 1. The updater is never invoked when
/// authentication fails. On success exactly `Update successful!` is written
/// to `out` and the exit code is 0.
pub async fn run_update<A, U>(
    authenticator: &A,
    updater: &U,
    interactive: bool,
    location: &str,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> i32
where
    A: Authenticator,
    U: IndexUpdater,
{
    let client = match authenticator.client(interactive).await {
        Ok(client) => client,
        Err(e) => {
            let _ = writeln!(err, "Authentication failed: {}", e);
            return 1;
        }
    };
    debug!("authenticated");

    if let Err(e) = updater.update(&client, location).await {
        let _ = writeln!(err, "Updating indexes failed: {}", e);
        return 1;
    }

    let _ = writeln!(out, "Update successful!");
    0
}
