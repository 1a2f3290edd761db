//! `fieldlink serve`: run the station over a live stream of envelopes and
//! print every published event as a JSON line.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::{debug, info, warn};

use fieldlink_core::LiveEvent;

use crate::adapters::Outcome;
use crate::cli::{GlobalOpts, ServeArgs};
use crate::error::CliError;

type Input = Box<dyn AsyncRead + Unpin + Send>;

async fn open_input(path: Option<&Path>) -> Result<Input, CliError> {
    match path {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .map_err(|source| CliError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
            Ok(Box::new(file))
        }
        None => Ok(Box::new(tokio::io::stdin())),
    }
}

fn write_line(line: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{line}")?;
    stdout.flush()
}

/// Print events until every sender is gone.
async fn print_events(mut events: BroadcastStream<Arc<LiveEvent>>) {
    while let Some(next) = events.next().await {
        let event = match next {
            Ok(event) => event,
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                warn!(skipped, "event printer fell behind");
                continue;
            }
        };
        let line = match serde_json::to_string(event.as_ref()) {
            Ok(line) => line,
            Err(e) => {
                warn!(event = event.name(), error = %e, "event not serializable");
                continue;
            }
        };
        if let Err(e) = write_line(&line) {
            warn!(error = %e, "stdout closed, no longer printing events");
            break;
        }
    }
}

fn log_outcome(line: usize, outcome: &Outcome) {
    match outcome {
        Outcome::Targets(report) => debug!(
            line,
            submitted = report.submitted,
            accepted = report.accepted,
            event = report.event.unwrap_or("-"),
            "targets ingested"
        ),
        Outcome::Sensors(record) => debug!(line, id = record.id, "sensor reading ingested"),
        Outcome::Cleared(report) => info!(
            line,
            detections = report.records.detections,
            sensors = report.records.sensors,
            images = report.images,
            "history cleared"
        ),
    }
}

pub async fn handle(args: ServeArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = super::load_config(global)?;
    let (station, publisher) = super::build_station(&cfg)?;

    let printer = tokio::spawn(print_events(publisher.subscribe_stream()));
    drop(publisher);

    let mut lines = BufReader::new(open_input(args.input.as_deref()).await?).lines();
    station.start().await?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut line_no = 0usize;
    let mut failed = 0usize;
    loop {
        let next = tokio::select! {
            biased;
            _ = &mut ctrl_c => {
                info!("interrupted");
                break;
            }
            next = lines.next_line() => next,
        };
        let Some(line) = next? else { break };
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }

        match super::process_line(&station, line_no, &line).await {
            Ok(outcome) => log_outcome(line_no, &outcome),
            Err(e) => {
                failed += 1;
                warn!(line = line_no, error = %e, "envelope skipped");
            }
        }
    }

    station.shutdown().await;
    // Dropping the last sender lets the printer drain and exit.
    drop(station);
    if let Err(e) = printer.await {
        warn!(error = %e, "event printer ended abnormally");
    }

    info!(lines = line_no, failed, "input closed, station stopped");
    Ok(())
}
