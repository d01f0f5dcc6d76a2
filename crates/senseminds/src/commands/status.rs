//! `status`: connect, let the connection settle, report diagnostics.

use std::time::Duration;

use tracing::debug;

use senseminds_core::{ConnectionState, Diagnostics, RealtimeConfig, RealtimeService};

use crate::cli::{GlobalOpts, StatusArgs};
use crate::error::CliError;
use crate::output::{self, Tone};

pub async fn handle(
    config: RealtimeConfig,
    args: StatusArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let service = RealtimeService::new(config)?;
    service.initialize();

    let settled = settle(&service, args.wait).await;
    if !settled {
        debug!(wait = ?args.wait, "connection still settling");
    }
    let diagnostics = service.diagnostics();
    service.disconnect().await;

    let color = output::should_color(&global.color);
    let out = output::render_single(
        &global.output,
        &diagnostics,
        |d| detail(d, color),
        |d| d.state.to_string(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

/// Wait until the service is connected or polling. Returns `false` on
/// timeout.
async fn settle(service: &RealtimeService, wait: Duration) -> bool {
    let mut state = service.watch_state();
    let reached = async {
        loop {
            if matches!(
                *state.borrow_and_update(),
                ConnectionState::Connected | ConnectionState::Fallback
            ) {
                return;
            }
            if state.changed().await.is_err() {
                return;
            }
        }
    };
    tokio::time::timeout(wait, reached).await.is_ok()
}

fn detail(d: &Diagnostics, color: bool) -> String {
    let tone = match d.state {
        ConnectionState::Connected => Tone::Good,
        ConnectionState::Fallback => Tone::Warn,
        ConnectionState::Connecting | ConnectionState::Disconnected => Tone::Bad,
    };
    output::detail_block(&[
        ("State", output::paint(&d.state.to_string(), tone, color)),
        ("Endpoint", d.endpoint.clone()),
        (
            "Reconnect attempts",
            format!("{}/{}", d.reconnect_attempts, d.max_reconnect_attempts),
        ),
        (
            "Fallback polling",
            if d.fallback_active { "active" } else { "inactive" }.into(),
        ),
    ])
}
