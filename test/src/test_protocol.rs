use std::time::Duration;

use tilesync_shared::{
    ByteReader, ByteWrite, ConstByteLength, HandlerContext, HandlerError, HandlerResult,
    HandlerReturn, Message, MessageDirection, Protocol, ProtocolPlugin, Serde, SerdeErr,
    SyncState,
};

pub const CHAT_ID: u16 = 16;
pub const PING_ID: u16 = 17;
pub const HEIGHT_QUERY_ID: u16 = 18;
pub const HEIGHT_REPLY_ID: u16 = 19;
pub const SLOW_QUERY_ID: u16 = 20;
pub const SLOW_REPLY_ID: u16 = 21;

/// Free text, relayed between clients
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chat {
    pub text: String,
}

impl Chat {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
        }
    }
}

impl Serde for Chat {
    fn ser(&self, writer: &mut dyn ByteWrite) {
        self.text.ser(writer);
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        Ok(Self {
            text: String::de(reader)?,
        })
    }

    fn byte_length(&self) -> u32 {
        self.text.byte_length()
    }
}

impl Message for Chat {}

/// Acknowledged by the server; a zero value is refused with status 7
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ping {
    pub value: u32,
}

impl Serde for Ping {
    fn ser(&self, writer: &mut dyn ByteWrite) {
        self.value.ser(writer);
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        Ok(Self {
            value: u32::de(reader)?,
        })
    }

    fn byte_length(&self) -> u32 {
        Self::const_byte_length()
    }
}

impl ConstByteLength for Ping {
    fn const_byte_length() -> u32 {
        4
    }
}

impl Message for Ping {}

/// Asks the server how many snapshots it has applied for a tile
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeightQuery {
    pub x: i32,
    pub y: i32,
}

impl Serde for HeightQuery {
    fn ser(&self, writer: &mut dyn ByteWrite) {
        self.x.ser(writer);
        self.y.ser(writer);
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        Ok(Self {
            x: i32::de(reader)?,
            y: i32::de(reader)?,
        })
    }

    fn byte_length(&self) -> u32 {
        8
    }
}

impl Message for HeightQuery {}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeightReply {
    pub height: u32,
}

impl Serde for HeightReply {
    fn ser(&self, writer: &mut dyn ByteWrite) {
        self.height.ser(writer);
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        Ok(Self {
            height: u32::de(reader)?,
        })
    }

    fn byte_length(&self) -> u32 {
        4
    }
}

impl Message for HeightReply {}

/// Answered by the application through a `RequestEvent`, or never
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlowQuery {
    pub token: u64,
}

impl Serde for SlowQuery {
    fn ser(&self, writer: &mut dyn ByteWrite) {
        self.token.ser(writer);
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        Ok(Self {
            token: u64::de(reader)?,
        })
    }

    fn byte_length(&self) -> u32 {
        8
    }
}

impl Message for SlowQuery {}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlowReply {
    pub token: u64,
}

impl Serde for SlowReply {
    fn ser(&self, writer: &mut dyn ByteWrite) {
        self.token.ser(writer);
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        Ok(Self {
            token: u64::de(reader)?,
        })
    }

    fn byte_length(&self) -> u32 {
        8
    }
}

impl Message for SlowReply {}

fn handle_ping(_state: &mut SyncState, _context: &mut HandlerContext, ping: Ping) -> HandlerReturn {
    if ping.value == 0 {
        return Ok(HandlerResult::Status(7));
    }
    Ok(HandlerResult::Done)
}

fn handle_height_query(
    _state: &mut SyncState,
    _context: &mut HandlerContext,
    query: HeightQuery,
) -> Result<HeightReply, HandlerError> {
    if query.x < 0 || query.y < 0 {
        return Err("tile outside the map".into());
    }
    Ok(HeightReply {
        height: (query.x * 100 + query.y) as u32,
    })
}

/// The request/response pairs, registered as one unit
pub struct RequestsPlugin;

impl ProtocolPlugin for RequestsPlugin {
    fn build(&self, protocol: &mut Protocol) {
        protocol
            .add_request_handler::<HeightQuery, HeightReply, _>(
                HEIGHT_QUERY_ID,
                HEIGHT_REPLY_ID,
                MessageDirection::FromClient,
                handle_height_query,
            )
            .add_request::<SlowQuery, SlowReply>(
                SLOW_QUERY_ID,
                SLOW_REPLY_ID,
                MessageDirection::FromClient,
            );
    }
}

/// Every class, the test messages and a short tick
pub fn protocol() -> Protocol {
    Protocol::builder()
        .tick_interval(Duration::from_millis(10))
        .add_all_resource_classes()
        .add_message::<Chat>(CHAT_ID, MessageDirection::FromEither)
        .add_handler::<Ping, _>(PING_ID, MessageDirection::FromClient, handle_ping)
        .add_plugin(RequestsPlugin)
        .build()
}
