// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Shuttlecraft Contributors

//! Server-Sent Events listener for real-time host state updates

use anyhow::{Context, Result};
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};

use crate::{create_daemon_client, DaemonClientConfig, HostEvent};

/// Event listener for the daemon SSE stream
pub struct EventListener {
    config: DaemonClientConfig,
}

impl EventListener {
    pub fn new(config: DaemonClientConfig) -> Self {
        Self { config }
    }

    /// Start listening to daemon events.
    /// Reconnects with exponential backoff if the stream drops.
    pub fn listen(&self) -> mpsc::Receiver<HostEvent> {
        let (tx, rx) = mpsc::channel(100);

        let config = self.config.clone();
        tokio::spawn(async move {
            let mut backoff = Duration::from_secs(1);
            let max_backoff = Duration::from_secs(30);

            loop {
                match stream_events(&config, tx.clone()).await {
                    Ok(()) => backoff = Duration::from_secs(1),
                    Err(e) => tracing::warn!("Event stream error: {:#}", e),
                }

                if tx.is_closed() {
                    break;
                }

                sleep(backoff).await;
                backoff = (backoff * 2).min(max_backoff);
            }
        });

        rx
    }
}

async fn stream_events(config: &DaemonClientConfig, tx: mpsc::Sender<HostEvent>) -> Result<()> {
    let url = format!("{}/api/events", config.daemon_base_url());
    let client = create_daemon_client(config)?;

    let response = client
        .get(&url)
        .send()
        .await
        .context("Failed to connect to event stream")?;

    if !response.status().is_success() {
        anyhow::bail!("Event stream request failed: {}", response.status());
    }

    let mut stream = response.bytes_stream();
    let mut buffer = String::new();

    while let Some(chunk) = stream.next().await {
        let bytes = chunk.context("Error reading event stream")?;
        let Ok(text) = std::str::from_utf8(&bytes) else {
            continue;
        };
        buffer.push_str(text);

        while let Some(pos) = buffer.find("\n\n") {
            let message: String = buffer.drain(..pos + 2).collect();

            if let Some(event) = parse_sse_message(&message) {
                if tx.send(event).await.is_err() {
                    tracing::debug!("Receiver dropped, stopping event listener");
                    return Ok(());
                }
            }
        }
    }

    Ok(())
}

/// Parse one SSE message (`data: {json}` lines) into a HostEvent
pub fn parse_sse_message(message: &str) -> Option<HostEvent> {
    for line in message.lines() {
        let Some(data) = line.strip_prefix("data:") else {
            continue;
        };
        let data = data.trim();
        if data.is_empty() {
            continue;
        }
        match serde_json::from_str::<HostEvent>(data) {
            Ok(event) => return Some(event),
            Err(e) => tracing::warn!("Failed to parse SSE event: {} (error: {})", data, e),
        }
    }
    None
}
