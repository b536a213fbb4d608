// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The node-bus error taxonomy (spec §4.1, §7).
//!
//! Every RPC-shaped failure a bus client or server can produce collapses
//! into one of these variants. Conversions to and from [`tonic::Status`]
//! keep the taxonomy stable across the wire.

use thiserror::Error;

/// Unified error taxonomy shared by every node-bus operation.
#[derive(Debug, Clone, Error)]
pub enum BusError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    #[error("bad arguments: {0}")]
    BadArgs(String),
    #[error("service busy: {0}")]
    ServiceBusy(String),
    #[error("cancelled: {0}")]
    Cancelled(String),
}

impl BusError {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transport(_) => "TRANSPORT",
            Self::NotFound(_) => "NOT_FOUND",
            Self::TypeMismatch(_) => "TYPE_MISMATCH",
            Self::BadArgs(_) => "BAD_ARGS",
            Self::ServiceBusy(_) => "SERVICE_BUSY",
            Self::Cancelled(_) => "CANCELLED",
        }
    }

    /// Convert to the [`tonic::Status`] a server handler should return.
    pub fn to_status(&self) -> tonic::Status {
        let code = match self {
            Self::Transport(_) => tonic::Code::Unavailable,
            Self::NotFound(_) => tonic::Code::NotFound,
            Self::TypeMismatch(_) => tonic::Code::InvalidArgument,
            Self::BadArgs(_) => tonic::Code::InvalidArgument,
            Self::ServiceBusy(_) => tonic::Code::ResourceExhausted,
            Self::Cancelled(_) => tonic::Code::Cancelled,
        };
        tonic::Status::new(code, self.to_string())
    }
}

impl From<tonic::Status> for BusError {
    fn from(status: tonic::Status) -> Self {
        let msg = status.message().to_owned();
        match status.code() {
            tonic::Code::NotFound => Self::NotFound(msg),
            tonic::Code::InvalidArgument => Self::BadArgs(msg),
            tonic::Code::ResourceExhausted | tonic::Code::FailedPrecondition => {
                Self::ServiceBusy(msg)
            }
            tonic::Code::Cancelled | tonic::Code::DeadlineExceeded => Self::Cancelled(msg),
            _ => Self::Transport(msg),
        }
    }
}

impl From<tonic::transport::Error> for BusError {
    fn from(err: tonic::transport::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_roundtrip_preserves_variant_kind() {
        let err = BusError::NotFound("robot 3".into());
        let status = err.to_status();
        let back: BusError = status.into();
        assert_eq!(back.as_str(), "NOT_FOUND");
    }

    #[test]
    fn unclassified_status_becomes_transport() {
        let status = tonic::Status::new(tonic::Code::Unknown, "boom");
        let err: BusError = status.into();
        assert_eq!(err.as_str(), "TRANSPORT");
    }
}
