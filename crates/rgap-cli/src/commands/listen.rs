//! Listen command: wires UDP sources to groups and groups to outputs.
//!
//! Every source feeds every group; each group keeps only what verifies
//! under its own key. A group that fails to build or a source that fails to
//! bind is logged and skipped so the rest keep running.

use std::sync::Arc;

use rgap_core::{Announcement, Group, ListenerConfig, UdpSource};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::cli::ListenArgs;
use crate::error::CliError;
use crate::output::{build_sink, OutputSink};

/// Run the listen command until Ctrl+C
pub async fn run_listen(args: ListenArgs) -> Result<(), CliError> {
    if args.interval.is_zero() {
        return Err(CliError::InvalidArgument(
            "interval must be positive".to_string(),
        ));
    }

    let config = ListenerConfig::load(&args.config).await?;

    if config.listen.is_empty() {
        return Err(CliError::InvalidArgument(
            "config has no listen addresses".to_string(),
        ));
    }

    let groups = Arc::new(build_groups(&config));
    if groups.is_empty() {
        return Err(CliError::Other("no usable groups configured".to_string()));
    }

    let mut sinks = config
        .outputs
        .iter()
        .map(build_sink)
        .collect::<Result<Vec<_>, _>>()?;
    if sinks.is_empty() {
        warn!("no outputs configured; membership will only be tracked");
    }

    for group in groups.iter() {
        group.start();
    }

    let mut sources = start_sources(&config, &groups);
    if sources.is_empty() {
        stop_groups(&groups).await;
        return Err(CliError::Other("no UDP source could be started".to_string()));
    }

    let mut ticker = interval(args.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        groups = groups.len(),
        sources = sources.len(),
        outputs = sinks.len(),
        "listener running (press Ctrl+C to stop)"
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => publish(&groups, &mut sinks),
        }
    }

    info!("shutting down");
    for source in sources.iter_mut() {
        source.stop().await;
    }
    stop_groups(&groups).await;
    Ok(())
}

fn build_groups(config: &ListenerConfig) -> Vec<Group> {
    config
        .groups
        .iter()
        .filter_map(|group_config| match Group::from_config(group_config) {
            Ok(group) => Some(group),
            Err(e) => {
                error!(group = group_config.id, error = %e, "skipping group");
                None
            }
        })
        .collect()
}

fn start_sources(config: &ListenerConfig, groups: &Arc<Vec<Group>>) -> Vec<UdpSource> {
    let mut sources = Vec::new();

    for address in &config.listen {
        let targets = Arc::clone(groups);
        let mut source = UdpSource::new(address.clone(), address.clone(), move |label, ann| {
            dispatch(&targets, label, ann)
        });

        match source.start() {
            Ok(()) => sources.push(source),
            Err(e) => error!(address = %address, error = %e, "skipping source"),
        }
    }

    sources
}

/// Offer one announcement to every group. Runs inside the receive loop.
pub(crate) fn dispatch(groups: &[Group], label: &str, announcement: &Announcement) {
    for group in groups {
        if let Err(e) = group.ingest(announcement) {
            error!(group = group.id(), source = label, error = %e, "verification failed");
        }
    }
}

/// Push each ready group's live entries to every sink.
pub(crate) fn publish(groups: &[Group], sinks: &mut [Box<dyn OutputSink>]) {
    for group in groups {
        if !group.ready() {
            debug!(group = group.id(), "group not ready; withholding output");
            continue;
        }

        let entries = group.list();
        for sink in sinks.iter_mut() {
            if let Err(e) = sink.publish(group.id(), &entries) {
                warn!(group = group.id(), error = %e, "output failed");
            }
        }
    }
}

async fn stop_groups(groups: &[Group]) {
    for group in groups {
        group.stop().await;
    }
}
