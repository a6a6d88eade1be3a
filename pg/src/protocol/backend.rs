//! Backend (server to client) messages.

use std::fmt;

use bytes::{BufMut, BytesMut};
use serde::Serialize;
use tracing::trace;

use super::framing::{
    FrameConfig, Framing, Message, MessageTag, fmt_dump, put_cstring, read_cstring, split_frame,
};
use super::Direction;
use crate::error::{CodecError, CodecResult};

/// Backend tag bytes.
pub mod tag {
    pub const PARAMETER_MOP_HIGH_WATER_MARK: u8 = b'k';
    pub const WROTE_XLOG: u8 = b'x';
    pub const COMMAND_COMPLETE: u8 = b'C';
    pub const READY_FOR_QUERY: u8 = b'Z';
}

/// MOP high-water mark.
///
/// Wire format:
/// - 'k' (1 byte) - message type
/// - high-water mark (8 bytes, big-endian, unsigned)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ParameterMopHighWaterMark {
    pub high_water_mark: u64,
}

impl Message for ParameterMopHighWaterMark {
    const TAG: MessageTag =
        MessageTag::backend(tag::PARAMETER_MOP_HIGH_WATER_MARK, Framing::FixedSize(8));
    const NAME: &'static str = "ParameterMopHighWaterMark";

    fn encode_payload(&self, buf: &mut BytesMut) {
        buf.put_u64(self.high_water_mark);
    }

    fn decode_payload(src: &[u8]) -> CodecResult<Self> {
        let bytes: [u8; 8] = src
            .try_into()
            .map_err(|_| CodecError::malformed(Self::NAME, "too short"))?;
        Ok(Self {
            high_water_mark: u64::from_be_bytes(bytes),
        })
    }
}

/// Xlog write notification.
///
/// Wire format:
/// - 'x' (1 byte) - message type
/// - value (1 byte)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct WroteXlog {
    #[serde(rename = "WroteXlog")]
    value: u8,
}

impl WroteXlog {
    pub fn new(value: u8) -> Self {
        Self { value }
    }

    pub fn value(&self) -> u8 {
        self.value
    }
}

impl Message for WroteXlog {
    const TAG: MessageTag = MessageTag::backend(tag::WROTE_XLOG, Framing::FixedSize(1));
    const NAME: &'static str = "WroteXlog";

    fn encode_payload(&self, buf: &mut BytesMut) {
        buf.put_u8(self.value);
    }

    fn decode_payload(src: &[u8]) -> CodecResult<Self> {
        match src {
            [value] => Ok(Self { value: *value }),
            _ => Err(CodecError::malformed(Self::NAME, "too short")),
        }
    }
}

/// Completion of one SQL command.
///
/// Wire format:
/// - 'C' (1 byte) - message type
/// - length (4 bytes)
/// - command tag (null-terminated), e.g. `SELECT 1`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CommandComplete {
    pub command_tag: String,
}

impl CommandComplete {
    pub fn new(command_tag: impl Into<String>) -> Self {
        Self {
            command_tag: command_tag.into(),
        }
    }
}

impl Message for CommandComplete {
    const TAG: MessageTag = MessageTag::backend(tag::COMMAND_COMPLETE, Framing::LengthPrefixed);
    const NAME: &'static str = "CommandComplete";

    fn encode_payload(&self, buf: &mut BytesMut) {
        put_cstring(buf, &self.command_tag);
    }

    fn decode_payload(src: &[u8]) -> CodecResult<Self> {
        Ok(Self {
            command_tag: read_cstring(Self::NAME, src)?,
        })
    }
}

/// Transaction status reported by `ReadyForQuery`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TransactionStatus {
    /// 'I'
    Idle,
    /// 'T'
    InBlock,
    /// 'E'
    Failed,
}

impl TransactionStatus {
    pub fn as_byte(self) -> u8 {
        match self {
            TransactionStatus::Idle => b'I',
            TransactionStatus::InBlock => b'T',
            TransactionStatus::Failed => b'E',
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'I' => Some(TransactionStatus::Idle),
            b'T' => Some(TransactionStatus::InBlock),
            b'E' => Some(TransactionStatus::Failed),
            _ => None,
        }
    }
}

/// Server is ready for the next query.
///
/// Wire format:
/// - 'Z' (1 byte) - message type
/// - length (4 bytes) - always 5
/// - status (1 byte): 'I', 'T' or 'E'
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReadyForQuery {
    pub tx_status: TransactionStatus,
}

impl Message for ReadyForQuery {
    const TAG: MessageTag = MessageTag::backend(tag::READY_FOR_QUERY, Framing::LengthPrefixed);
    const NAME: &'static str = "ReadyForQuery";

    fn encode_payload(&self, buf: &mut BytesMut) {
        buf.put_u8(self.tx_status.as_byte());
    }

    fn decode_payload(src: &[u8]) -> CodecResult<Self> {
        let [status] = src else {
            return Err(CodecError::malformed(
                Self::NAME,
                format!("expected 1 payload byte, have {}", src.len()),
            ));
        };
        let tx_status = TransactionStatus::from_byte(*status).ok_or_else(|| {
            CodecError::malformed(Self::NAME, format!("invalid status 0x{status:02x}"))
        })?;
        Ok(Self { tx_status })
    }
}

/// Any backend message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "Type")]
pub enum BackendMessage {
    ParameterMopHighWaterMark(ParameterMopHighWaterMark),
    WroteXlog(WroteXlog),
    CommandComplete(CommandComplete),
    ReadyForQuery(ReadyForQuery),
}

impl BackendMessage {
    /// Framing of a backend tag, `None` if the tag is unknown.
    pub fn framing_of(tag: u8) -> Option<Framing> {
        match tag {
            tag::PARAMETER_MOP_HIGH_WATER_MARK => Some(ParameterMopHighWaterMark::TAG.framing),
            tag::WROTE_XLOG => Some(WroteXlog::TAG.framing),
            tag::COMMAND_COMPLETE => Some(CommandComplete::TAG.framing),
            tag::READY_FOR_QUERY => Some(ReadyForQuery::TAG.framing),
            _ => None,
        }
    }

    pub fn tag(&self) -> MessageTag {
        match self {
            BackendMessage::ParameterMopHighWaterMark(_) => ParameterMopHighWaterMark::TAG,
            BackendMessage::WroteXlog(_) => WroteXlog::TAG,
            BackendMessage::CommandComplete(_) => CommandComplete::TAG,
            BackendMessage::ReadyForQuery(_) => ReadyForQuery::TAG,
        }
    }

    /// Decode a payload separated from its envelope by the caller.
    pub fn decode(tag: u8, payload: &[u8]) -> CodecResult<Self> {
        match tag {
            tag::PARAMETER_MOP_HIGH_WATER_MARK => {
                ParameterMopHighWaterMark::decode(payload).map(Self::ParameterMopHighWaterMark)
            }
            tag::WROTE_XLOG => WroteXlog::decode(payload).map(Self::WroteXlog),
            tag::COMMAND_COMPLETE => CommandComplete::decode(payload).map(Self::CommandComplete),
            tag::READY_FOR_QUERY => ReadyForQuery::decode(payload).map(Self::ReadyForQuery),
            _ => Err(CodecError::UnknownMessageType {
                direction: Direction::Backend,
                tag,
            }),
        }
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        match self {
            BackendMessage::ParameterMopHighWaterMark(m) => m.encode(buf),
            BackendMessage::WroteXlog(m) => m.encode(buf),
            BackendMessage::CommandComplete(m) => m.encode(buf),
            BackendMessage::ReadyForQuery(m) => m.encode(buf),
        }
    }

    /// Parse one message from the front of `src`; see
    /// [`FrontendMessage::parse_frame`](super::FrontendMessage::parse_frame).
    pub fn parse_frame(src: &[u8], config: &FrameConfig) -> CodecResult<Option<(Self, usize)>> {
        let Some(frame) = split_frame(Direction::Backend, src, config, Self::framing_of)? else {
            return Ok(None);
        };
        let msg = Self::decode(frame.tag, frame.payload)?;
        trace!(%msg, "parsed backend frame");
        Ok(Some((msg, frame.len)))
    }
}

impl fmt::Display for BackendMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_dump(self, f)
    }
}

macro_rules! impl_from_message {
    ($($kind:ident),* $(,)?) => {
        $(
            impl From<$kind> for BackendMessage {
                fn from(msg: $kind) -> Self {
                    BackendMessage::$kind(msg)
                }
            }
        )*
    };
}

impl_from_message!(ParameterMopHighWaterMark, WroteXlog, CommandComplete, ReadyForQuery);
