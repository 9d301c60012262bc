// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Shuttlecraft Contributors

// Desktop notifications for supervisor events

use notify_rust::{Notification, Timeout};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use shuttlecraft_common::HostEvent;

/// Show a user-facing alert
pub fn show_alert(title: &str, message: &str) {
    if let Err(e) = Notification::new()
        .summary(title)
        .body(message)
        .icon("dialog-error")
        .timeout(Timeout::Milliseconds(10000))
        .show()
    {
        warn!("Failed to show notification: {}", e);
    }
}

/// Log every supervisor event; alerts are also shown on the desktop when enabled
pub async fn watch_events(mut rx: broadcast::Receiver<HostEvent>, desktop_notifications: bool) {
    loop {
        match rx.recv().await {
            Ok(HostEvent::StateChanged { name, state, .. }) => {
                info!("Host '{}' is now {}", name, state);
            }
            Ok(HostEvent::Alert { title, message, .. }) => {
                warn!("{}: {}", title, message);
                if desktop_notifications {
                    // notify-rust blocks on the session bus
                    tokio::task::spawn_blocking(move || show_alert(&title, &message));
                }
            }
            Ok(HostEvent::Output { .. }) | Ok(HostEvent::Heartbeat { .. }) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                debug!("Event logger lagged, skipped {} event(s)", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
