//! Envelope framing across every message kind.

use bytes::BytesMut;
use pgwire_codec::protocol::backend::{
    CommandComplete, ParameterMopHighWaterMark, ReadyForQuery, TransactionStatus, WroteXlog,
};
use pgwire_codec::protocol::frontend::{self, MppQuery, Query, Terminate};
use pgwire_codec::protocol::{Direction, Framing, Message};
use pgwire_codec::{BackendMessage, CodecError, FrameConfig, FrontendMessage};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn encoded<M: Message>(msg: &M) -> BytesMut {
    let mut buf = BytesMut::new();
    msg.encode(&mut buf);
    buf
}

fn length_field(buf: &[u8]) -> usize {
    i32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]) as usize
}

#[test]
fn test_length_prefixed_length_counts_itself() {
    let buf = encoded(&Query::new("select 1"));
    assert_eq!(length_field(&buf), buf.len() - 1);
    assert_eq!(length_field(&buf), 4 + "select 1\0".len());

    let buf = encoded(&CommandComplete::new("INSERT 0 1"));
    assert_eq!(length_field(&buf), 4 + "INSERT 0 1\0".len());

    let buf = encoded(&Terminate);
    assert_eq!(length_field(&buf), 4);
}

#[test]
fn test_fixed_size_has_no_length_field() {
    assert_eq!(ParameterMopHighWaterMark::TAG.framing, Framing::FixedSize(8));
    assert_eq!(WroteXlog::TAG.framing, Framing::FixedSize(1));

    let buf = encoded(&ParameterMopHighWaterMark { high_water_mark: 300 });
    assert_eq!(buf.as_ref(), &[b'k', 0, 0, 0, 0, 0, 0, 1, 44]);
    assert_eq!(
        ParameterMopHighWaterMark::decode(&buf[1..]).unwrap().high_water_mark,
        300
    );
}

#[test]
fn test_fixed_size_too_short() {
    assert!(matches!(
        WroteXlog::decode(&[]),
        Err(CodecError::MalformedMessage { kind: "WroteXlog", .. })
    ));
    assert!(matches!(
        ParameterMopHighWaterMark::decode(&[1, 2, 3]),
        Err(CodecError::MalformedMessage { .. })
    ));
    assert_eq!(WroteXlog::decode(&[5]).unwrap().value(), 5);
}

#[test]
fn test_directions() {
    assert_eq!(MppQuery::TAG.direction, Direction::Frontend);
    assert_eq!(frontend::Sync::TAG.direction, Direction::Frontend);
    assert_eq!(WroteXlog::TAG.direction, Direction::Backend);
    assert_eq!(ReadyForQuery::TAG.direction, Direction::Backend);

    // A backend tag is not a frontend message, and vice versa.
    assert!(FrontendMessage::framing_of(b'x').is_none());
    assert!(BackendMessage::framing_of(b'W').is_none());
}

#[test]
fn test_mpp_query_terminator_position() {
    assert_eq!(MppQuery::decode(b"abc\0").unwrap().string, "abc");
    assert!(MppQuery::decode(b"abc\0\0").is_err());
    assert!(MppQuery::decode(b"\0abc").is_err());
    assert!(MppQuery::decode(b"").is_err());
}

#[test]
fn test_frontend_stream() {
    let messages = vec![
        FrontendMessage::from(MppQuery::new("select * from t")),
        FrontendMessage::from(Query::new("")),
        FrontendMessage::from(frontend::Sync),
        FrontendMessage::from(Terminate),
    ];
    let mut buf = BytesMut::new();
    for msg in &messages {
        msg.encode(&mut buf);
    }

    let config = FrameConfig::default();
    let mut offset = 0;
    let mut parsed = Vec::new();
    while let Some((msg, used)) = FrontendMessage::parse_frame(&buf[offset..], &config).unwrap() {
        assert_eq!(msg.tag().byte, buf[offset]);
        parsed.push(msg);
        offset += used;
    }
    assert_eq!(offset, buf.len());
    assert_eq!(parsed, messages);
}

#[test]
fn test_partial_frames_need_more_bytes() {
    let buf = encoded(&CommandComplete::new("SELECT 12"));
    let config = FrameConfig::default();
    for cut in 0..buf.len() {
        assert!(BackendMessage::parse_frame(&buf[..cut], &config).unwrap().is_none());
    }
    let (msg, used) = BackendMessage::parse_frame(&buf, &config).unwrap().unwrap();
    assert_eq!(msg, BackendMessage::CommandComplete(CommandComplete::new("SELECT 12")));
    assert_eq!(used, buf.len());
}

#[test]
fn test_oversized_frame_rejected() {
    let buf = encoded(&Query::new("x".repeat(64)));
    let config = FrameConfig::default().with_max_message_size(16);
    assert!(matches!(
        FrontendMessage::parse_frame(&buf, &config),
        Err(CodecError::MalformedMessage { kind: "frame", .. })
    ));
}

#[test]
fn test_unknown_tags() {
    let config = FrameConfig::default();
    assert!(matches!(
        BackendMessage::parse_frame(b"?", &config),
        Err(CodecError::UnknownMessageType {
            direction: Direction::Backend,
            tag: b'?'
        })
    ));
    assert!(matches!(
        FrontendMessage::decode(b'Z', &[b'I']),
        Err(CodecError::UnknownMessageType { .. })
    ));
}

#[test]
fn test_debug_dumps() {
    let cases: Vec<(String, &str)> = vec![
        (
            FrontendMessage::from(MppQuery::new("q")).to_string(),
            r#"{"Type":"MPPQuery","String":"q"}"#,
        ),
        (
            FrontendMessage::from(Terminate).to_string(),
            r#"{"Type":"Terminate"}"#,
        ),
        (
            BackendMessage::from(CommandComplete::new("SELECT 1")).to_string(),
            r#"{"Type":"CommandComplete","CommandTag":"SELECT 1"}"#,
        ),
        (
            BackendMessage::from(ReadyForQuery {
                tx_status: TransactionStatus::Idle,
            })
            .to_string(),
            r#"{"Type":"ReadyForQuery","TxStatus":"Idle"}"#,
        ),
    ];
    for (dump, expected) in cases {
        assert_eq!(dump, expected);
    }
}

fn backend_message() -> impl Strategy<Value = BackendMessage> {
    prop_oneof![
        any::<u64>().prop_map(|high_water_mark| {
            BackendMessage::from(ParameterMopHighWaterMark { high_water_mark })
        }),
        any::<u8>().prop_map(|v| BackendMessage::from(WroteXlog::new(v))),
        "[^\\x00]{0,40}".prop_map(|tag| BackendMessage::from(CommandComplete::new(tag))),
        prop_oneof![
            Just(TransactionStatus::Idle),
            Just(TransactionStatus::InBlock),
            Just(TransactionStatus::Failed),
        ]
        .prop_map(|tx_status| BackendMessage::from(ReadyForQuery { tx_status })),
    ]
}

fn frontend_message() -> impl Strategy<Value = FrontendMessage> {
    prop_oneof![
        "[^\\x00]{0,40}".prop_map(|s| FrontendMessage::from(MppQuery::new(s))),
        "[^\\x00]{0,40}".prop_map(|s| FrontendMessage::from(Query::new(s))),
        Just(FrontendMessage::from(frontend::Sync)),
        Just(FrontendMessage::from(Terminate)),
    ]
}

proptest! {
    #[test]
    fn prop_backend_round_trip(messages in prop::collection::vec(backend_message(), 1..8)) {
        let mut buf = BytesMut::new();
        for msg in &messages {
            msg.encode(&mut buf);
        }
        let config = FrameConfig::default();
        let mut offset = 0;
        let mut parsed = Vec::new();
        while let Some((msg, used)) =
            BackendMessage::parse_frame(&buf[offset..], &config).unwrap()
        {
            parsed.push(msg);
            offset += used;
        }
        prop_assert_eq!(offset, buf.len());
        prop_assert_eq!(parsed, messages);
    }

    #[test]
    fn prop_frontend_length_field(msg in frontend_message()) {
        let mut buf = BytesMut::new();
        msg.encode(&mut buf);
        prop_assert_eq!(length_field(&buf), buf.len() - 1);
        prop_assert_eq!(FrontendMessage::decode(buf[0], &buf[5..]).unwrap(), msg);
    }
}
