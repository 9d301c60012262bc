// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Shuttlecraft Contributors

//! Maps sshuttle/ssh output to connection state transitions.

/// Maximum length (in characters) of the excerpt carried by an error transition
pub const MAX_EXCERPT_CHARS: usize = 250;

// Lowercase; matched case-insensitively
const SUCCESS_PATTERNS: &[&str] = &[
    "connected to server",
    "connected to master",
    "client: connected",
];

const ERROR_PATTERNS: &[&str] = &[
    "fatal:",
    "error:",
    "ssh: connect to host",
    "connection refused",
    "permission denied",
    "traceback (most recent call last):",
];

/// State change implied by a chunk of tunnel output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// The tunnel is up
    Connected,
    /// The tool hit a fatal error; carries a display excerpt
    Error(String),
}

/// Decode a raw output chunk. Invalid bytes become U+FFFD so the rest of
/// the chunk is still classified; blank chunks are dropped.
pub fn decode_chunk(bytes: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(bytes);
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// Classify a chunk of output. Success wins over error when both match.
pub fn classify(text: &str) -> Option<Transition> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let lowered = text.to_lowercase();

    if SUCCESS_PATTERNS.iter().any(|p| lowered.contains(p)) {
        return Some(Transition::Connected);
    }

    if ERROR_PATTERNS.iter().any(|p| lowered.contains(p)) {
        return Some(Transition::Error(excerpt(text)));
    }

    None
}

fn excerpt(text: &str) -> String {
    text.chars().take(MAX_EXCERPT_CHARS).collect()
}
