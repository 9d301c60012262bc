// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Shuttlecraft Contributors

// Error types for Shuttlecraft

use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Host not found: {0}")]
    HostNotFound(Uuid),

    #[error("Supervisor unavailable: {0}")]
    Supervisor(String),
}

pub type Result<T> = std::result::Result<T, Error>;
