//! Frontend (client to server) messages.

use std::fmt;

use bytes::BytesMut;
use serde::Serialize;
use tracing::trace;

use super::framing::{
    FrameConfig, Framing, Message, MessageTag, expect_empty, fmt_dump, put_cstring, read_cstring,
    split_frame,
};
use super::Direction;
use crate::error::{CodecError, CodecResult};

/// Frontend tag bytes.
pub mod tag {
    pub const MPP_QUERY: u8 = b'W';
    pub const QUERY: u8 = b'Q';
    pub const SYNC: u8 = b'S';
    pub const TERMINATE: u8 = b'X';
}

/// MPP query text.
///
/// Wire format:
/// - 'W' (1 byte) - message type
/// - length (4 bytes)
/// - query string (null-terminated)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct MppQuery {
    pub string: String,
}

impl MppQuery {
    pub fn new(string: impl Into<String>) -> Self {
        Self { string: string.into() }
    }
}

impl Message for MppQuery {
    const TAG: MessageTag = MessageTag::frontend(tag::MPP_QUERY, Framing::LengthPrefixed);
    const NAME: &'static str = "MPPQuery";

    fn encode_payload(&self, buf: &mut BytesMut) {
        put_cstring(buf, &self.string);
    }

    fn decode_payload(src: &[u8]) -> CodecResult<Self> {
        Ok(Self {
            string: read_cstring(Self::NAME, src)?,
        })
    }
}

/// Simple query.
///
/// Wire format:
/// - 'Q' (1 byte) - message type
/// - length (4 bytes)
/// - query string (null-terminated)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Query {
    pub string: String,
}

impl Query {
    pub fn new(string: impl Into<String>) -> Self {
        Self { string: string.into() }
    }
}

impl Message for Query {
    const TAG: MessageTag = MessageTag::frontend(tag::QUERY, Framing::LengthPrefixed);
    const NAME: &'static str = "Query";

    fn encode_payload(&self, buf: &mut BytesMut) {
        put_cstring(buf, &self.string);
    }

    fn decode_payload(src: &[u8]) -> CodecResult<Self> {
        Ok(Self {
            string: read_cstring(Self::NAME, src)?,
        })
    }
}

/// End of an extended-query pipeline. Encodes as `S 0 0 0 4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Sync;

impl Message for Sync {
    const TAG: MessageTag = MessageTag::frontend(tag::SYNC, Framing::LengthPrefixed);
    const NAME: &'static str = "Sync";

    fn encode_payload(&self, _buf: &mut BytesMut) {}

    fn decode_payload(src: &[u8]) -> CodecResult<Self> {
        expect_empty(Self::NAME, src)?;
        Ok(Sync)
    }
}

/// Connection close. Encodes as `X 0 0 0 4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Terminate;

impl Message for Terminate {
    const TAG: MessageTag = MessageTag::frontend(tag::TERMINATE, Framing::LengthPrefixed);
    const NAME: &'static str = "Terminate";

    fn encode_payload(&self, _buf: &mut BytesMut) {}

    fn decode_payload(src: &[u8]) -> CodecResult<Self> {
        expect_empty(Self::NAME, src)?;
        Ok(Terminate)
    }
}

/// Any frontend message.
///
/// `Display` renders the JSON debug dump, e.g.
/// `{"Type":"MPPQuery","String":"select 1"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "Type")]
pub enum FrontendMessage {
    #[serde(rename = "MPPQuery")]
    MppQuery(MppQuery),
    Query(Query),
    Sync(Sync),
    Terminate(Terminate),
}

impl FrontendMessage {
    /// Framing of a frontend tag, `None` if the tag is unknown.
    pub fn framing_of(tag: u8) -> Option<Framing> {
        match tag {
            tag::MPP_QUERY => Some(MppQuery::TAG.framing),
            tag::QUERY => Some(Query::TAG.framing),
            tag::SYNC => Some(Sync::TAG.framing),
            tag::TERMINATE => Some(Terminate::TAG.framing),
            _ => None,
        }
    }

    pub fn tag(&self) -> MessageTag {
        match self {
            FrontendMessage::MppQuery(_) => MppQuery::TAG,
            FrontendMessage::Query(_) => Query::TAG,
            FrontendMessage::Sync(_) => Sync::TAG,
            FrontendMessage::Terminate(_) => Terminate::TAG,
        }
    }

    /// Decode a payload separated from its envelope by the caller.
    pub fn decode(tag: u8, payload: &[u8]) -> CodecResult<Self> {
        match tag {
            tag::MPP_QUERY => MppQuery::decode(payload).map(Self::MppQuery),
            tag::QUERY => Query::decode(payload).map(Self::Query),
            tag::SYNC => Sync::decode(payload).map(Self::Sync),
            tag::TERMINATE => Terminate::decode(payload).map(Self::Terminate),
            _ => Err(CodecError::UnknownMessageType {
                direction: Direction::Frontend,
                tag,
            }),
        }
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        match self {
            FrontendMessage::MppQuery(m) => m.encode(buf),
            FrontendMessage::Query(m) => m.encode(buf),
            FrontendMessage::Sync(m) => m.encode(buf),
            FrontendMessage::Terminate(m) => m.encode(buf),
        }
    }

    /// Parse one message from the front of `src`.
    ///
    /// Returns `Ok(None)` if `src` does not yet hold a complete frame, or the
    /// message and the number of bytes it occupied.
    pub fn parse_frame(src: &[u8], config: &FrameConfig) -> CodecResult<Option<(Self, usize)>> {
        let Some(frame) = split_frame(Direction::Frontend, src, config, Self::framing_of)? else {
            return Ok(None);
        };
        let msg = Self::decode(frame.tag, frame.payload)?;
        trace!(%msg, "parsed frontend frame");
        Ok(Some((msg, frame.len)))
    }
}

impl fmt::Display for FrontendMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_dump(self, f)
    }
}

macro_rules! impl_from_message {
    ($($kind:ident),* $(,)?) => {
        $(
            impl From<$kind> for FrontendMessage {
                fn from(msg: $kind) -> Self {
                    FrontendMessage::$kind(msg)
                }
            }
        )*
    };
}

impl_from_message!(MppQuery, Query, Sync, Terminate);

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_mpp_query_wire() {
        let mut buf = BytesMut::new();
        MppQuery::new("select 1").encode(&mut buf);
        assert_eq!(buf[0], b'W');
        assert_eq!(i32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]), 4 + 9);
        assert_eq!(&buf[5..], b"select 1\0");
        assert_eq!(MppQuery::decode(&buf[5..]).unwrap(), MppQuery::new("select 1"));
    }

    #[test]
    fn test_mpp_query_misplaced_terminator() {
        let err = MppQuery::decode(b"sel\0ect\0").unwrap_err();
        assert!(matches!(err, CodecError::MalformedMessage { kind: "MPPQuery", .. }));
        assert!(MppQuery::decode(b"select").is_err());
    }

    #[test]
    fn test_empty_messages() {
        let mut buf = BytesMut::new();
        Sync.encode(&mut buf);
        Terminate.encode(&mut buf);
        assert_eq!(buf.as_ref(), &[b'S', 0, 0, 0, 4, b'X', 0, 0, 0, 4]);
        assert!(Sync::decode(b"x").is_err());
    }

    #[test]
    fn test_dump() {
        let msg = FrontendMessage::from(MppQuery::new("select 1"));
        assert_eq!(msg.to_string(), r#"{"Type":"MPPQuery","String":"select 1"}"#);
        assert_eq!(FrontendMessage::Sync(Sync).to_string(), r#"{"Type":"Sync"}"#);
    }

    #[test]
    fn test_decode_unknown_tag() {
        let err = FrontendMessage::decode(b'k', &[]).unwrap_err();
        assert!(matches!(
            err,
            CodecError::UnknownMessageType {
                direction: Direction::Frontend,
                tag: b'k'
            }
        ));
    }

    #[test]
    fn test_parse_frames_in_sequence() {
        let mut buf = BytesMut::new();
        Query::new("select 1").encode(&mut buf);
        Sync.encode(&mut buf);

        let config = FrameConfig::default();
        let (first, used) = FrontendMessage::parse_frame(&buf, &config).unwrap().unwrap();
        assert_eq!(first, FrontendMessage::Query(Query::new("select 1")));
        let (second, rest) = FrontendMessage::parse_frame(&buf[used..], &config).unwrap().unwrap();
        assert_eq!(second, FrontendMessage::Sync(Sync));
        assert_eq!(used + rest, buf.len());
    }
}
