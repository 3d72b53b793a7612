//! `ibk simulate`: one scripted session lifecycle against the paper broker.
//!
//! Start, connect and wait out the confirmation window, ask the broker for
//! its clock, disconnect, close. Every observed status and session event is
//! printed as `key=value` lines on stdout.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use ibk_config::{LoadedConfig, SessionConfig};
use ibk_connection::ConnectionStatus;
use ibk_session::SessionEvent;
use ibk_testkit::script::{canned_broker, NEXT_VALID_ID};
use ibk_testkit::{fast_config, next_within, wait_until, PaperTransport, SessionHarness};
use tracing::info;

pub fn run(loaded: Option<&LoadedConfig>, timeout: Duration) -> Result<()> {
    let config = match loaded {
        Some(loaded) => {
            println!("config_hash={}", loaded.config_hash);
            loaded.session().clone()
        }
        None => fast_config(),
    };
    print_config(&config);

    let harness = SessionHarness::start(PaperTransport::with_reactor(canned_broker), &config)
        .context("session start failed")?;
    let mut events = harness.session.subscribe_events();
    print_status(harness.session.status());

    harness.connect(timeout)?;
    print_status(harness.session.status());

    let ids = harness.session.requests().ids();
    if !wait_until(timeout, || ids.peek() >= NEXT_VALID_ID) {
        bail!("broker never announced the next valid id");
    }
    println!("next_valid_id={}", ids.peek());

    let mut clock = harness.session.current_time();
    match next_within(&mut clock, timeout) {
        Some(Ok(at)) => println!("current_time={}", at.to_rfc3339()),
        Some(Err(err)) => return Err(err).context("current time request failed"),
        None => bail!("no current time within {} ms", timeout.as_millis()),
    }

    harness.disconnect(timeout)?;
    print_status(harness.session.status());

    while let Ok(event) = events.try_recv() {
        print_event(&event)?;
    }

    harness.session.close();
    println!("sent_requests={}", harness.transport.sent().len());
    info!("simulation finished");
    Ok(())
}

fn print_config(config: &SessionConfig) {
    println!("endpoint={}:{} client_id={}", config.host, config.port, config.client_id);
    println!("connection_delay_ms={}", config.connection_delay_ms);
}

fn print_status(status: ConnectionStatus) {
    println!("status={status}");
}

fn print_event(event: &SessionEvent) -> Result<()> {
    println!("event={}", serde_json::to_string(event)?);
    Ok(())
}
