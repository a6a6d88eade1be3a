//! PostgreSQL wire message envelopes.
//!
//! Pure buffer transforms: encoding appends to a `BytesMut`, decoding reads
//! a borrowed slice. No I/O happens here.

pub mod backend;
pub mod framing;
pub mod frontend;

pub use backend::{
    BackendMessage, CommandComplete, ParameterMopHighWaterMark, ReadyForQuery, TransactionStatus,
    WroteXlog,
};
pub use framing::{
    DEFAULT_MAX_MESSAGE_SIZE, Direction, FrameConfig, Framing, Message, MessageTag, decode_message,
    encode_message,
};
pub use frontend::{FrontendMessage, MppQuery, Query, Terminate};
