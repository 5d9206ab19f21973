//! Periodic flush driver.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};

use glossa_model::WorkbenchResponse;

use crate::client::Client;

/// Default flush cadence: ten flushes per second, so bursts of cell edits
/// coalesce into one request per program per tick.
pub const DEFAULT_FLUSH_PERIOD: Duration = Duration::from_millis(100);

/// Drive a shared [`Client`] until `inbound` closes.
///
/// Flushes pending conversion batches every `period` and feeds each inbound
/// frame through [`Client::handle_frame`]; responses the engine does not
/// consume are forwarded to `events` for the host to present. Undecodable
/// frames are logged and skipped.
pub async fn drive(
    client: Arc<Mutex<Client>>,
    mut inbound: mpsc::Receiver<String>,
    events: mpsc::Sender<WorkbenchResponse>,
    period: Duration,
) {
    let mut ticks = tokio::time::interval(period);
    ticks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = ticks.tick() => client.lock().await.flush(),
            frame = inbound.recv() => match frame {
                Some(frame) => {
                    let handled = client.lock().await.handle_frame(&frame);
                    match handled {
                        Ok(Some(event)) => {
                            let _ = events.send(event).await;
                        }
                        Ok(None) => {}
                        Err(err) => log::warn!("ignoring inbound frame: {err}"),
                    }
                }
                None => break,
            },
        }
    }
}
