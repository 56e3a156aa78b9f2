//! Transmit protocol message types.
//!
//! One request, one reply. Both are canonical CBOR maps with integer keys;
//! unknown keys are ignored so later protocol versions can add fields.

use std::fmt;
use std::time::Duration;

use ciborium::value::Value;
use docanchor_core::canonical::{decode_value, encode_canonical, key, MapReader};
use docanchor_core::{CoreDocument, CoreDocumentWire, CoreError};

use crate::error::{P2PError, Result};

/// Current protocol version.
pub const PROTOCOL_VERSION: u64 = 1;

/// Map keys of a transmit request.
pub mod message_keys {
    pub const VERSION: u64 = 0;
    pub const DOCUMENT: u64 = 1;
    pub const TIMEOUT_MS: u64 = 2;
}

/// Map keys of a transmit reply.
pub mod reply_keys {
    pub const VERSION: u64 = 0;
    pub const STATUS: u64 = 1;
    pub const DOCUMENT: u64 = 2;
    pub const STAGE: u64 = 3;
    pub const CODE: u64 = 4;
    pub const MESSAGE: u64 = 5;
}

const STATUS_ACCEPTED: u64 = 0;
const STATUS_REJECTED: u64 = 1;

/// Receive pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PipelineStage {
    /// Payload type known and payload decodable.
    Envelope = 1,
    /// Identity and id widths.
    Identity = 2,
    /// Signatures against registered keys.
    Signature = 3,
    /// Storage.
    Persistence = 4,
    /// Building the accepted copy.
    Reply = 5,
}

impl PipelineStage {
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(n: u8) -> Option<Self> {
        match n {
            1 => Some(PipelineStage::Envelope),
            2 => Some(PipelineStage::Identity),
            3 => Some(PipelineStage::Signature),
            4 => Some(PipelineStage::Persistence),
            5 => Some(PipelineStage::Reply),
            _ => None,
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Envelope => "envelope",
            PipelineStage::Identity => "identity",
            PipelineStage::Signature => "signature",
            PipelineStage::Persistence => "persistence",
            PipelineStage::Reply => "reply",
        };
        f.write_str(name)
    }
}

/// Error codes carried in a rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ErrorCode {
    /// Unknown/unspecified error.
    Unknown = 0,
    /// Envelope or frame does not decode.
    MalformedEnvelope = 1,
    /// Payload type is not registered.
    UnrecognizedType = 2,
    /// Required data is absent.
    MissingData = 3,
    /// A fixed-width id has the wrong width.
    InvalidLength = 4,
    /// A signature is missing or invalid.
    SignatureVerification = 5,
    /// The identity registry failed.
    Registry = 6,
    /// The store refused the document.
    Storage = 7,
    /// The request deadline passed.
    DeadlineExceeded = 8,
    /// Internal error on peer.
    Internal = 9,
}

impl ErrorCode {
    pub fn to_u16(self) -> u16 {
        self as u16
    }

    /// Unrecognized codes read as `Unknown`.
    pub fn from_u16(n: u16) -> Self {
        match n {
            1 => ErrorCode::MalformedEnvelope,
            2 => ErrorCode::UnrecognizedType,
            3 => ErrorCode::MissingData,
            4 => ErrorCode::InvalidLength,
            5 => ErrorCode::SignatureVerification,
            6 => ErrorCode::Registry,
            7 => ErrorCode::Storage,
            8 => ErrorCode::DeadlineExceeded,
            9 => ErrorCode::Internal,
            _ => ErrorCode::Unknown,
        }
    }

    /// Classify a core error.
    pub fn from_core(err: &CoreError) -> Self {
        match err {
            CoreError::Decode(_) => ErrorCode::MalformedEnvelope,
            CoreError::UnrecognizedType(_) => ErrorCode::UnrecognizedType,
            CoreError::NilDocument | CoreError::MissingData(_) => ErrorCode::MissingData,
            CoreError::InvalidLength { .. } => ErrorCode::InvalidLength,
            CoreError::SignatureVerification(_) => ErrorCode::SignatureVerification,
            _ => ErrorCode::Internal,
        }
    }
}

/// Why and where the receive pipeline stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageFailure {
    pub stage: PipelineStage,
    pub code: ErrorCode,
    pub message: String,
}

impl StageFailure {
    pub fn new(stage: PipelineStage, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            stage,
            code,
            message: message.into(),
        }
    }

    /// A failure caused by a core error at `stage`.
    pub fn from_core(stage: PipelineStage, err: &CoreError) -> Self {
        Self::new(stage, ErrorCode::from_core(err), err.to_string())
    }
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} stage failed ({:?}): {}", self.stage, self.code, self.message)
    }
}

/// A transmit request: one document and the sender's deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct P2PMessage {
    /// The document as received, before any validation.
    pub document: CoreDocumentWire,
    pub timeout: Duration,
}

impl P2PMessage {
    pub fn new(document: &CoreDocument, timeout: Duration) -> Self {
        Self {
            document: CoreDocumentWire::from(document),
            timeout,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
        encode_canonical(&Value::Map(vec![
            (key(message_keys::VERSION), Value::Integer(PROTOCOL_VERSION.into())),
            (key(message_keys::DOCUMENT), self.document.to_value()),
            (key(message_keys::TIMEOUT_MS), Value::Integer(timeout_ms.into())),
        ]))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let value = decode_value(bytes)?;
        let map = MapReader::new(&value, "transmit request")?;
        check_version(map.uint(message_keys::VERSION, "version")?)?;

        let document = map
            .get(message_keys::DOCUMENT)
            .ok_or_else(|| P2PError::Codec("transmit request: missing document".into()))?;

        Ok(Self {
            document: CoreDocumentWire::from_value(document)?,
            timeout: Duration::from_millis(map.uint(message_keys::TIMEOUT_MS, "timeout")?),
        })
    }
}

/// The receiver's answer to a transmit request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum P2PReply {
    /// Stored; carries the receiver's copy.
    Accepted(CoreDocument),
    /// Refused at some stage.
    Rejected(StageFailure),
}

impl P2PReply {
    pub fn rejected(stage: PipelineStage, code: ErrorCode, message: impl Into<String>) -> Self {
        P2PReply::Rejected(StageFailure::new(stage, code, message))
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut entries = vec![(
            key(reply_keys::VERSION),
            Value::Integer(PROTOCOL_VERSION.into()),
        )];
        match self {
            P2PReply::Accepted(doc) => {
                entries.push((key(reply_keys::STATUS), Value::Integer(STATUS_ACCEPTED.into())));
                entries.push((
                    key(reply_keys::DOCUMENT),
                    CoreDocumentWire::from(doc).to_value(),
                ));
            }
            P2PReply::Rejected(failure) => {
                entries.push((key(reply_keys::STATUS), Value::Integer(STATUS_REJECTED.into())));
                entries.push((
                    key(reply_keys::STAGE),
                    Value::Integer(failure.stage.to_u8().into()),
                ));
                entries.push((
                    key(reply_keys::CODE),
                    Value::Integer(failure.code.to_u16().into()),
                ));
                entries.push((key(reply_keys::MESSAGE), Value::Text(failure.message.clone())));
            }
        }
        encode_canonical(&Value::Map(entries))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let value = decode_value(bytes)?;
        let map = MapReader::new(&value, "transmit reply")?;
        check_version(map.uint(reply_keys::VERSION, "version")?)?;

        match map.uint(reply_keys::STATUS, "status")? {
            STATUS_ACCEPTED => {
                let document = map
                    .get(reply_keys::DOCUMENT)
                    .ok_or_else(|| P2PError::Codec("transmit reply: missing document".into()))?;
                let wire = CoreDocumentWire::from_value(document)?;
                Ok(P2PReply::Accepted(CoreDocument::try_from(wire)?))
            }
            STATUS_REJECTED => {
                let stage = u8::try_from(map.uint(reply_keys::STAGE, "stage")?)
                    .ok()
                    .and_then(PipelineStage::from_u8)
                    .ok_or_else(|| P2PError::Codec("transmit reply: unknown stage".into()))?;
                let code = u16::try_from(map.uint(reply_keys::CODE, "code")?)
                    .map(ErrorCode::from_u16)
                    .unwrap_or(ErrorCode::Unknown);
                let message = map.text_or_empty(reply_keys::MESSAGE, "message")?.to_string();
                Ok(P2PReply::Rejected(StageFailure {
                    stage,
                    code,
                    message,
                }))
            }
            other => Err(P2PError::Codec(format!(
                "transmit reply: unknown status {}",
                other
            ))),
        }
    }
}

fn check_version(peer: u64) -> Result<()> {
    if peer != PROTOCOL_VERSION {
        return Err(P2PError::VersionMismatch {
            local: PROTOCOL_VERSION,
            peer,
        });
    }
    Ok(())
}
