//! Announce command: periodically advertise an address to a group.

use rgap_core::Announcer;
use tracing::info;

use crate::cli::AnnounceArgs;
use crate::error::CliError;

/// Run the announce command
pub async fn run_announce(args: AnnounceArgs) -> Result<(), CliError> {
    if args.interval.is_zero() {
        return Err(CliError::InvalidArgument(
            "interval must be positive".to_string(),
        ));
    }

    let announcer = Announcer::bind(args.psk, args.address, args.to, args.interval).await?;

    if args.once {
        announcer.send_once().await?;
        info!(address = %args.address, destination = %args.to, "sent announcement");
        return Ok(());
    }

    announcer
        .run(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await;
    Ok(())
}
