//! `fieldlink replay`: run a recorded upload file through a station and
//! report what it ended up showing.

use serde::Serialize;
use tabled::Tabled;
use tracing::info;

use fieldlink_core::{DetectionPayload, ThroughputSnapshot};

use crate::adapters::Outcome;
use crate::cli::{GlobalOpts, ReplayArgs};
use crate::error::CliError;
use crate::output;

#[derive(Debug, Default, Serialize)]
struct ReplayTotals {
    envelopes: usize,
    detections_submitted: usize,
    detections_accepted: usize,
    sensor_readings: usize,
    clears: usize,
}

impl ReplayTotals {
    fn count(&mut self, outcome: &Outcome) {
        self.envelopes += 1;
        match outcome {
            Outcome::Targets(report) => {
                self.detections_submitted += report.submitted;
                self.detections_accepted += report.accepted;
            }
            Outcome::Sensors(_) => self.sensor_readings += 1,
            Outcome::Cleared(_) => self.clears += 1,
        }
    }
}

#[derive(Debug, Serialize)]
struct ReplaySummary {
    totals: ReplayTotals,
    recent_detections: Vec<DetectionPayload>,
    throughput: ThroughputSnapshot,
}

#[derive(Tabled)]
struct DetectionRow {
    #[tabled(rename = "Time (UTC)")]
    time: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Details")]
    details: String,
    #[tabled(rename = "Image")]
    image: String,
}

impl From<&DetectionPayload> for DetectionRow {
    fn from(d: &DetectionPayload) -> Self {
        Self {
            time: output::format_epoch(d.ts),
            kind: d.kind.clone(),
            details: output::compact_cell(&serde_json::Value::Object(d.details.clone())),
            image: d.image_url.clone(),
        }
    }
}

fn render_summary(summary: &ReplaySummary) -> String {
    let rows: Vec<DetectionRow> = summary.recent_detections.iter().map(Into::into).collect();
    let t = &summary.totals;
    let tp = &summary.throughput;
    format!(
        "{}\n\n\
         Envelopes:  {} ({} detections submitted, {} accepted, {} sensor readings)\n\
         Throughput: AQSA {:.2} kbps, TAIP {:.2} kbps over {}s",
        output::render_table(&rows, "No recent detections."),
        t.envelopes,
        t.detections_submitted,
        t.detections_accepted,
        t.sensor_readings,
        tp.aqsa_kbps,
        tp.taip_kbps,
        tp.window_sec,
    )
}

pub async fn handle(args: ReplayArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = super::load_config(global)?;
    let (station, _publisher) = super::build_station(&cfg)?;

    let input = tokio::fs::read_to_string(&args.file)
        .await
        .map_err(|source| CliError::Read {
            path: args.file.clone(),
            source,
        })?;

    let mut totals = ReplayTotals::default();
    for (idx, line) in input.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let outcome = super::process_line(&station, idx + 1, line).await?;
        totals.count(&outcome);
    }
    info!(
        envelopes = totals.envelopes,
        accepted = totals.detections_accepted,
        "replay finished"
    );

    let summary = ReplaySummary {
        recent_detections: station.recent_detections(args.limit).await?,
        throughput: station.throughput(),
        totals,
    };
    let rendered = output::render(args.output, &summary, render_summary)?;
    output::print_output(&rendered, global.quiet);
    Ok(())
}
