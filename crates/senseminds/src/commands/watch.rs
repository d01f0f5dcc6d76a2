//! `watch`: stream realtime events until interrupted.

use std::time::Duration;

use chrono::Local;
use tokio::sync::mpsc;
use tracing::{debug, info};

use senseminds_core::{Event, RealtimeConfig, RealtimeService};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output::{self, Tone};

use super::util::{self, EventRecord};

pub async fn handle(
    config: RealtimeConfig,
    args: WatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let filter = util::parse_kinds(&args.events)?;
    let service = RealtimeService::new(config)?;
    let color = output::should_color(&global.color);

    let (tx, mut rx) = mpsc::unbounded_channel();
    util::tap_all(&service, &tx);
    drop(tx);

    if !global.quiet {
        eprintln!(
            "Watching {} (Ctrl-C to stop)",
            service.config().realtime_url
        );
    }
    service.initialize();

    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);
    let deadline = expire(args.duration);
    tokio::pin!(deadline);

    let mut shown = 0usize;
    loop {
        let event = tokio::select! {
            _ = &mut interrupt => {
                info!("interrupted");
                break;
            }
            () = &mut deadline => {
                debug!("watch duration elapsed");
                break;
            }
            next = rx.recv() => match next {
                Some(event) => event,
                None => break,
            },
        };

        if !filter.is_empty() && !filter.contains(&event.kind()) {
            continue;
        }
        shown += 1;
        output::print_output(&render_event(&event, &global.output, color)?, global.quiet);
    }

    service.disconnect().await;
    if !global.quiet {
        eprintln!("{shown} events");
    }
    Ok(())
}

async fn expire(after: Option<Duration>) {
    match after {
        Some(after) => tokio::time::sleep(after).await,
        None => std::future::pending().await,
    }
}

fn render_event(event: &Event, format: &OutputFormat, color: bool) -> Result<String, CliError> {
    match format {
        OutputFormat::Table => {
            let kind: &'static str = event.kind().into();
            Ok(format!(
                "{}  {}  {}",
                output::paint(&Local::now().format("%H:%M:%S").to_string(), Tone::Muted, color),
                output::paint(&format!("{kind:<20}"), util::tone(event), color),
                util::summarize(event),
            ))
        }
        OutputFormat::Json => output::render_json_pretty(&EventRecord::from(event)),
        OutputFormat::JsonCompact => output::render_json_compact(&EventRecord::from(event)),
        OutputFormat::Yaml => Ok(format!(
            "---\n{}",
            output::render_yaml(&EventRecord::from(event))?
        )),
        OutputFormat::Plain => Ok(format!(
            "{}\t{}",
            event.kind(),
            event.payload_json()
        )),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use senseminds_core::ConnectionStatus;

    use super::*;

    #[test]
    fn plain_line_is_kind_tab_payload() {
        let line = render_event(
            &Event::Status(json!({ "ok": true })),
            &OutputFormat::Plain,
            false,
        )
        .unwrap();
        assert_eq!(line, "status\t{\"ok\":true}");
    }

    #[test]
    fn compact_json_line_is_an_event_record() {
        let line = render_event(
            &Event::ConnectionStatus(ConnectionStatus::websocket()),
            &OutputFormat::JsonCompact,
            false,
        )
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["event"], "connection_status");
        assert_eq!(value["data"]["mode"], "websocket");
    }

    #[test]
    fn table_line_names_the_kind() {
        let line = render_event(
            &Event::ConnectionStatus(ConnectionStatus::websocket()),
            &OutputFormat::Table,
            false,
        )
        .unwrap();
        assert!(line.contains("connection_status"));
        assert!(line.ends_with("websocket"));
    }
}
