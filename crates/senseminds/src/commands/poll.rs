//! `poll`: one REST poll cycle, printed as a list of the events it produced.

use serde::Serialize;
use tabled::Tabled;
use tokio::sync::mpsc;

use senseminds_core::{RealtimeConfig, RealtimeService};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

use super::util::{self, EventRecord};

#[derive(Tabled)]
struct PollRow {
    #[tabled(rename = "Event")]
    event: String,
    #[tabled(rename = "Summary")]
    summary: String,
}

#[derive(Serialize)]
struct Polled {
    #[serde(flatten)]
    record: EventRecord,
    #[serde(skip)]
    summary: String,
}

pub async fn handle(config: RealtimeConfig, global: &GlobalOpts) -> Result<(), CliError> {
    let api_url = config.api_url.to_string();
    let service = RealtimeService::new(config)?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    util::tap_all(&service, &tx);
    drop(tx);

    service.poll_once().await;

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    if events.is_empty() {
        return Err(CliError::ConnectionFailed {
            url: api_url,
            source: "every endpoint failed; rerun with -v for details".into(),
        });
    }

    let polled: Vec<Polled> = events
        .iter()
        .map(|event| Polled {
            record: EventRecord::from(event),
            summary: util::summarize(event),
        })
        .collect();
    let out = output::render_list(
        &global.output,
        &polled,
        |p| PollRow {
            event: p.record.event.to_string(),
            summary: p.summary.clone(),
        },
        |p| p.record.event.to_string(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
