// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed attribute storage shared by every agent's published address space
//! (spec §4.1): readable/writable scalar or array values, with value-change
//! subscriptions delivered as a broadcast stream.

use std::collections::HashMap;
use std::fmt;
use std::pin::Pin;

use tokio::sync::{broadcast, mpsc, RwLock};
use tokio_stream::wrappers::ReceiverStream;
use tonic::Status;

use crate::proto;

/// A boxed gRPC response stream, as returned by every `SubscribeAttribute`
/// server-streaming RPC.
pub type AttrStream = Pin<Box<dyn tokio_stream::Stream<Item = Result<proto::AttrValue, Status>> + Send + 'static>>;

/// One of the node-bus's fixed set of attribute value types.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Bool(bool),
    U16(u16),
    U32(u32),
    U64(u64),
    Str(String),
    Bytes(Vec<u8>),
    StrArray(Vec<String>),
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::U16(v) => write!(f, "{v}"),
            Self::U32(v) => write!(f, "{v}"),
            Self::U64(v) => write!(f, "{v}"),
            Self::Str(v) => write!(f, "{v}"),
            Self::Bytes(v) => write!(f, "<{} bytes>", v.len()),
            Self::StrArray(v) => write!(f, "[{}]", v.join(", ")),
        }
    }
}

impl From<AttrValue> for proto::AttrValue {
    fn from(v: AttrValue) -> Self {
        use proto::attr_value::Kind;
        let kind = match v {
            AttrValue::Bool(b) => Kind::B(b),
            AttrValue::U16(n) => Kind::U16(n as u32),
            AttrValue::U32(n) => Kind::U32(n),
            AttrValue::U64(n) => Kind::U64(n),
            AttrValue::Str(s) => Kind::S(s),
            AttrValue::Bytes(b) => Kind::By(b),
            AttrValue::StrArray(values) => Kind::Sa(proto::StringArray { values }),
        };
        proto::AttrValue { kind: Some(kind) }
    }
}

impl TryFrom<proto::AttrValue> for AttrValue {
    type Error = crate::BusError;

    fn try_from(v: proto::AttrValue) -> Result<Self, Self::Error> {
        use proto::attr_value::Kind;
        match v.kind {
            Some(Kind::B(b)) => Ok(Self::Bool(b)),
            Some(Kind::U16(n)) => Ok(Self::U16(n as u16)),
            Some(Kind::U32(n)) => Ok(Self::U32(n)),
            Some(Kind::U64(n)) => Ok(Self::U64(n)),
            Some(Kind::S(s)) => Ok(Self::Str(s)),
            Some(Kind::By(b)) => Ok(Self::Bytes(b)),
            Some(Kind::Sa(sa)) => Ok(Self::StrArray(sa.values)),
            None => Err(crate::BusError::TypeMismatch("empty attribute value".into())),
        }
    }
}

/// A table of named attributes, backing one published object instance.
///
/// Reads/writes go through an async `RwLock`; every write is broadcast to
/// subscribers as `(name, new_value)`, matching the node bus's `subscribe`
/// contract (spec §4.1).
pub struct AttributeTable {
    values: RwLock<HashMap<String, AttrValue>>,
    changes: broadcast::Sender<(String, AttrValue)>,
}

impl Default for AttributeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl AttributeTable {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(256);
        Self { values: RwLock::new(HashMap::new()), changes }
    }

    /// Seed an attribute's initial value without publishing a change
    /// notification (used at object-instance construction time).
    pub async fn seed(&self, name: impl Into<String>, value: AttrValue) {
        self.values.write().await.insert(name.into(), value);
    }

    pub async fn read(&self, name: &str) -> Option<AttrValue> {
        self.values.read().await.get(name).cloned()
    }

    /// Write an attribute and publish the change to subscribers.
    pub async fn write(&self, name: impl Into<String>, value: AttrValue) {
        let name = name.into();
        self.values.write().await.insert(name.clone(), value.clone());
        // No subscribers is not an error — the value is still durably stored.
        let _ = self.changes.send((name, value));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<(String, AttrValue)> {
        self.changes.subscribe()
    }

    /// Build a gRPC response stream filtered to a single attribute name, for
    /// a `SubscribeAttribute` handler. Spawns a forwarding task so a slow or
    /// disconnected gRPC client can never block a `write()` (spec §4.1
    /// "subscribe ... producing async notifications").
    pub fn subscribe_stream(&self, attribute: String) -> AttrStream {
        let rx = self.changes.subscribe();
        let (tx, receiver) = mpsc::channel(16);
        tokio::spawn(async move {
            let mut rx = rx;
            loop {
                match rx.recv().await {
                    Ok((name, value)) if name == attribute => {
                        if tx.send(Ok(value.into())).await.is_err() {
                            break;
                        }
                    }
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        Box::pin(ReceiverStream::new(receiver))
    }
}
