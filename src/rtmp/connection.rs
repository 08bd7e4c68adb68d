use crate::config::PublishConfig;
use crate::error::{FlvError, Result, RtmpError};
use crate::flv::flv_tag::{split_record, FlvTag};
use crate::flv::flv_tag_header::{FlvTagHeader, TagType};
use crate::rtmp::poller::{self, RawHandle};
use crate::rtmp::url::RtmpUrl;
use bytes::{BufMut, Bytes, BytesMut};
use log::{debug, info, log, trace, warn, Level};
use rml_rtmp::chunk_io::{ChunkDeserializer, ChunkSerializer};
use rml_rtmp::handshake::{Handshake, HandshakeProcessResult, PeerType};
use rml_rtmp::messages::{MessagePayload, RtmpMessage, UserControlEventType};
use rml_rtmp::rml_amf0::Amf0Value;
use rml_rtmp::time::RtmpTimestamp;
use std::collections::{HashMap, VecDeque};
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

const READ_BUFFER_SIZE: usize = 16 * 1024;
const SET_CHUNK_SIZE_TYPE_ID: u8 = 1;

/// Outbound side of a publishing session, as seen by the stream loop.
pub trait Connection {
    /// Sends one finished FLV record and returns the number of record bytes
    /// consumed. A failed write is final, nothing is retried.
    fn write_record(&mut self, record: &[u8]) -> Result<usize>;

    /// Whether inbound data is waiting. Never blocks.
    fn poll_readable(&mut self) -> Result<bool>;

    /// Reads and handles exactly one inbound protocol message.
    fn read_and_dispatch_one(&mut self) -> Result<()>;
}

/// A command received from the server.
#[derive(Debug, Clone)]
struct Command {
    name: String,
    transaction_id: f64,
    arguments: Vec<Amf0Value>,
}

impl Command {
    /// First AMF object among the arguments, where `_error` and `onStatus`
    /// carry level/code/description.
    fn info(&self) -> Option<&HashMap<String, Amf0Value>> {
        self.arguments.iter().find_map(|value| match value {
            Amf0Value::Object(properties) => Some(properties),
            _ => None,
        })
    }

    fn info_field(&self, key: &str) -> Option<&str> {
        match self.info()?.get(key)? {
            Amf0Value::Utf8String(value) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Status objects carry level `error`; some servers send `_error` there.
    fn is_error_status(&self) -> bool {
        matches!(self.info_field("level"), Some("error") | Some("_error"))
    }

    /// Classifies a command received while waiting for `publish` to start.
    ///
    /// Any `_error` ends the wait, whatever its transaction id: servers reply
    /// to `publish` with transaction 0.
    fn publish_reply(&self) -> PublishReply {
        match self.name.as_str() {
            "_error" => PublishReply::Rejected(self.describe()),
            "onStatus" if self.is_error_status() => PublishReply::Rejected(self.describe()),
            "onStatus" if self.info_field("code") == Some("NetStream.Publish.Start") => {
                PublishReply::Started
            }
            _ => PublishReply::Pending,
        }
    }

    fn describe(&self) -> String {
        match (self.info_field("code"), self.info_field("description")) {
            (Some(code), Some(description)) => format!("{code}: {description}"),
            (Some(code), None) => code.to_string(),
            (None, Some(description)) => description.to_string(),
            (None, None) => self.name.clone(),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum PublishReply {
    Started,
    Rejected(String),
    Pending,
}

/// Publishing RTMP client over a blocking TCP stream.
///
/// `connect` runs the whole setup (handshake, `connect`, `releaseStream`,
/// `FCPublish`, `createStream`, `publish`) and returns once the server reported
/// `NetStream.Publish.Start`. Dropping the connection unpublishes the stream and
/// shuts the socket down.
pub struct RtmpConnection {
    stream: TcpStream,
    url: RtmpUrl,
    serializer: ChunkSerializer,
    deserializer: ChunkDeserializer,
    read_buf: Vec<u8>,
    pending: VecDeque<MessagePayload>,
    transaction_id: f64,
    stream_id: u32,
    bytes_received: u64,
    bytes_acknowledged: u64,
    ack_window: Option<u32>,
    /// Set once the handshake completed.
    established: bool,
    publishing: bool,
    closed: bool,
}

impl RtmpConnection {
    pub fn connect(url: &RtmpUrl, config: &PublishConfig) -> Result<Self> {
        info!("Connecting to {}", url.tc_url());
        let stream = connect_tcp(&url.address(), config.timeout)?;
        let mut connection = Self::with_stream(stream, url.clone());

        let remaining = connection.handshake()?;
        connection.established = true;
        decode_into(&mut connection.deserializer, &mut connection.pending, &remaining)?;

        connection.set_chunk_size(config.chunk_size)?;
        connection.send_connect(&config.flash_version)?;
        connection.create_stream()?;
        connection.publish()?;

        Ok(connection)
    }

    fn with_stream(stream: TcpStream, url: RtmpUrl) -> Self {
        Self {
            stream,
            url,
            serializer: ChunkSerializer::new(),
            deserializer: ChunkDeserializer::new(),
            read_buf: vec![0; READ_BUFFER_SIZE],
            pending: VecDeque::new(),
            transaction_id: 0.0,
            stream_id: 0,
            bytes_received: 0,
            bytes_acknowledged: 0,
            ack_window: None,
            established: false,
            publishing: false,
            closed: false,
        }
    }

    /// Level of the disconnect line: only a session that got past the
    /// handshake was ever announced as connected.
    fn lifecycle_level(&self) -> Level {
        if self.established {
            Level::Info
        } else {
            Level::Debug
        }
    }

    pub fn url(&self) -> &RtmpUrl {
        &self.url
    }

    /// Message stream id assigned by `createStream`.
    pub fn stream_id(&self) -> u32 {
        self.stream_id
    }

    pub fn bytes_received(&self) -> u64 {
        self.bytes_received
    }

    #[cfg(unix)]
    pub fn raw_handle(&self) -> RawHandle {
        use std::os::unix::io::AsRawFd;
        self.stream.as_raw_fd()
    }

    #[cfg(windows)]
    pub fn raw_handle(&self) -> RawHandle {
        use std::os::windows::io::AsRawSocket;
        self.stream.as_raw_socket()
    }

    fn handshake(&mut self) -> Result<Vec<u8>, RtmpError> {
        let mut handshake = Handshake::new(PeerType::Client);
        let p0_and_p1 = handshake
            .generate_outbound_p0_and_p1()
            .map_err(|e| RtmpError::Handshake(format!("{e:?}")))?;
        self.stream.write_all(&p0_and_p1).map_err(RtmpError::Write)?;

        loop {
            let n = self.read_some("handshake")?;
            match handshake.process_bytes(&self.read_buf[..n]) {
                Ok(HandshakeProcessResult::InProgress { response_bytes }) => {
                    if !response_bytes.is_empty() {
                        self.stream.write_all(&response_bytes).map_err(RtmpError::Write)?;
                    }
                }
                Ok(HandshakeProcessResult::Completed {
                    response_bytes,
                    remaining_bytes,
                }) => {
                    if !response_bytes.is_empty() {
                        self.stream.write_all(&response_bytes).map_err(RtmpError::Write)?;
                    }
                    debug!("RTMP handshake completed");
                    return Ok(remaining_bytes);
                }
                Err(e) => return Err(RtmpError::Handshake(format!("{e:?}"))),
            }
        }
    }

    fn set_chunk_size(&mut self, chunk_size: u32) -> Result<(), RtmpError> {
        let packet = self
            .serializer
            .set_max_chunk_size(chunk_size, RtmpTimestamp { value: 0 })
            .map_err(|e| RtmpError::Serialize(format!("{e:?}")))?;
        self.stream.write_all(&packet.bytes).map_err(RtmpError::Write)?;
        debug!("Outbound chunk size set to {chunk_size}");
        Ok(())
    }

    fn send_connect(&mut self, flash_version: &str) -> Result<(), RtmpError> {
        let mut properties: HashMap<String, Amf0Value> = HashMap::new();
        properties.insert("app".to_string(), Amf0Value::Utf8String(self.url.app.clone()));
        properties.insert("type".to_string(), Amf0Value::Utf8String("nonprivate".to_string()));
        properties.insert("flashVer".to_string(), Amf0Value::Utf8String(flash_version.to_string()));
        properties.insert("tcUrl".to_string(), Amf0Value::Utf8String(self.url.tc_url()));

        let transaction_id = self.send_command("connect", Amf0Value::Object(properties), Vec::new(), 0)?;
        let result = self.await_result("connect", transaction_id)?;
        info!("Connected to {} ({})", self.url.tc_url(), result.describe());
        Ok(())
    }

    fn create_stream(&mut self) -> Result<(), RtmpError> {
        let key = Amf0Value::Utf8String(self.url.stream_key.clone());
        // no reply is awaited for these two, servers that do not know them stay silent
        self.send_command("releaseStream", Amf0Value::Null, vec![key.clone()], 0)?;
        self.send_command("FCPublish", Amf0Value::Null, vec![key], 0)?;

        let transaction_id = self.send_command("createStream", Amf0Value::Null, Vec::new(), 0)?;
        let result = self.await_result("createStream", transaction_id)?;
        let stream_id = result
            .arguments
            .iter()
            .find_map(|value| match value {
                Amf0Value::Number(id) => Some(*id as u32),
                _ => None,
            })
            .ok_or_else(|| RtmpError::Rejected {
                command: "createStream".to_string(),
                description: "reply carries no stream id".to_string(),
            })?;
        self.stream_id = stream_id;
        debug!("Created stream {stream_id}");
        Ok(())
    }

    fn publish(&mut self) -> Result<(), RtmpError> {
        let arguments = vec![
            Amf0Value::Utf8String(self.url.stream_key.clone()),
            Amf0Value::Utf8String("live".to_string()),
        ];
        self.send_command("publish", Amf0Value::Null, arguments, self.stream_id)?;

        loop {
            let command = self.next_command("publish")?;
            match command.publish_reply() {
                PublishReply::Started => {
                    self.publishing = true;
                    info!(
                        "Publishing '{}' on stream {}",
                        self.url.stream_key, self.stream_id
                    );
                    return Ok(());
                }
                PublishReply::Rejected(description) => {
                    return Err(RtmpError::Rejected {
                        command: "publish".to_string(),
                        description,
                    });
                }
                PublishReply::Pending => log_command(&command),
            }
        }
    }

    /// Best-effort `FCUnpublish` + `deleteStream`, then shuts the socket down.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if self.publishing {
            self.publishing = false;
            let key = Amf0Value::Utf8String(self.url.stream_key.clone());
            let stream_id = Amf0Value::Number(self.stream_id as f64);
            if let Err(e) = self
                .send_command("FCUnpublish", Amf0Value::Null, vec![key], 0)
                .and_then(|_| self.send_command("deleteStream", Amf0Value::Null, vec![stream_id], 0))
            {
                debug!("Failed to unpublish stream (expected if the peer is gone): {e}");
            } else {
                debug!("Unpublished stream {}", self.stream_id);
            }
        }

        if let Err(e) = self.stream.shutdown(Shutdown::Both) {
            debug!("Socket shutdown error (expected if already closed): {e:?}");
        }
        log!(self.lifecycle_level(), "Disconnected from {}", self.url.tc_url());
    }

    fn send_command(
        &mut self,
        name: &str,
        command_object: Amf0Value,
        arguments: Vec<Amf0Value>,
        stream_id: u32,
    ) -> Result<f64, RtmpError> {
        self.transaction_id += 1.0;
        let transaction_id = self.transaction_id;
        let message = RtmpMessage::Amf0Command {
            command_name: name.to_string(),
            transaction_id,
            command_object,
            additional_arguments: arguments,
        };
        self.send_message(message, stream_id)?;
        trace!("Sent {name} (transaction {transaction_id})");
        Ok(transaction_id)
    }

    fn send_message(&mut self, message: RtmpMessage, stream_id: u32) -> Result<(), RtmpError> {
        let payload = message
            .into_message_payload(RtmpTimestamp { value: 0 }, stream_id)
            .map_err(|e| RtmpError::Serialize(format!("{e:?}")))?;
        self.send_payload(&payload)
    }

    fn send_payload(&mut self, payload: &MessagePayload) -> Result<(), RtmpError> {
        let packet = self
            .serializer
            .serialize(payload, false, false)
            .map_err(|e| RtmpError::Serialize(format!("{e:?}")))?;
        self.stream.write_all(&packet.bytes).map_err(RtmpError::Write)
    }

    /// One blocking read into `read_buf`, bounded by the socket timeout.
    fn read_some(&mut self, what: &'static str) -> Result<usize, RtmpError> {
        loop {
            match self.stream.read(&mut self.read_buf) {
                Ok(0) => return Err(RtmpError::ConnectionClosed),
                Ok(n) => {
                    self.bytes_received += n as u64;
                    return Ok(n);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e)
                    if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) =>
                {
                    return Err(RtmpError::TimedOut(what))
                }
                Err(e) => return Err(RtmpError::Read(e)),
            }
        }
    }

    /// Reads once and queues every complete message the bytes finish.
    fn fill(&mut self, what: &'static str) -> Result<(), RtmpError> {
        let n = self.read_some(what)?;
        decode_into(&mut self.deserializer, &mut self.pending, &self.read_buf[..n])?;
        self.acknowledge_if_due()
    }

    fn acknowledge_if_due(&mut self) -> Result<(), RtmpError> {
        let Some(window) = self.ack_window else {
            return Ok(());
        };
        if window == 0 || self.bytes_received - self.bytes_acknowledged < window as u64 {
            return Ok(());
        }
        // the sequence number wraps like the protocol's 32-bit counter
        let sequence_number = self.bytes_received as u32;
        self.send_message(RtmpMessage::Acknowledgement { sequence_number }, 0)?;
        self.bytes_acknowledged = self.bytes_received;
        trace!("Acknowledged {} bytes", self.bytes_received);
        Ok(())
    }

    /// Next command from the server, handling control messages on the way.
    fn next_command(&mut self, what: &'static str) -> Result<Command, RtmpError> {
        loop {
            let Some(payload) = self.pending.pop_front() else {
                self.fill(what)?;
                continue;
            };
            let message = payload
                .to_rtmp_message()
                .map_err(|e| RtmpError::Deserialize(format!("{e:?}")))?;
            match message {
                RtmpMessage::Amf0Command {
                    command_name,
                    transaction_id,
                    additional_arguments,
                    ..
                } => {
                    return Ok(Command {
                        name: command_name,
                        transaction_id,
                        arguments: additional_arguments,
                    })
                }
                other => self.handle_control(other, payload.type_id)?,
            }
        }
    }

    fn await_result(&mut self, what: &'static str, transaction_id: f64) -> Result<Command, RtmpError> {
        loop {
            let command = self.next_command(what)?;
            match command.name.as_str() {
                "_result" if command.transaction_id == transaction_id => return Ok(command),
                "_error" if command.transaction_id == transaction_id => {
                    return Err(RtmpError::Rejected {
                        command: what.to_string(),
                        description: command.describe(),
                    })
                }
                _ => log_command(&command),
            }
        }
    }

    fn dispatch(&mut self, payload: MessagePayload) -> Result<(), RtmpError> {
        let type_id = payload.type_id;
        let message = payload
            .to_rtmp_message()
            .map_err(|e| RtmpError::Deserialize(format!("{e:?}")))?;
        match message {
            RtmpMessage::Amf0Command {
                command_name,
                transaction_id,
                additional_arguments,
                ..
            } => {
                let command = Command {
                    name: command_name,
                    transaction_id,
                    arguments: additional_arguments,
                };
                if command.name == "_error" || command.is_error_status() {
                    warn!("Server reported an error: {}", command.describe());
                } else {
                    log_command(&command);
                }
                Ok(())
            }
            other => self.handle_control(other, type_id),
        }
    }

    /// Keep-alive and flow-control bookkeeping.
    fn handle_control(&mut self, message: RtmpMessage, type_id: u8) -> Result<(), RtmpError> {
        match message {
            RtmpMessage::SetChunkSize { size } => {
                // already applied to the deserializer while decoding
                debug!("Peer chunk size is now {size}");
            }
            RtmpMessage::WindowAcknowledgement { size } => {
                debug!("Acknowledgement window set to {size} bytes");
                self.ack_window = Some(size);
            }
            RtmpMessage::SetPeerBandwidth { size, .. } => {
                debug!("Peer bandwidth set to {size} bytes");
            }
            RtmpMessage::Acknowledgement { sequence_number } => {
                trace!("Peer acknowledged {sequence_number} bytes");
            }
            RtmpMessage::UserControl {
                event_type: UserControlEventType::PingRequest,
                timestamp,
                ..
            } => {
                let timestamp = timestamp.unwrap_or(RtmpTimestamp { value: 0 });
                debug!("Answering ping {}", timestamp.value);
                self.send_message(
                    RtmpMessage::UserControl {
                        event_type: UserControlEventType::PingResponse,
                        stream_id: None,
                        buffer_length: None,
                        timestamp: Some(timestamp),
                    },
                    0,
                )?;
            }
            RtmpMessage::UserControl { stream_id, .. } => {
                debug!("User control event for stream {stream_id:?}");
            }
            RtmpMessage::Amf0Data { values } => {
                debug!("Ignoring data message with {} values", values.len());
            }
            _ => debug!("Ignoring message of type {type_id}"),
        }
        Ok(())
    }
}

impl Connection for RtmpConnection {
    fn write_record(&mut self, record: &[u8]) -> Result<usize> {
        let payload = record_to_message_payload(record, self.stream_id)?;
        self.send_payload(&payload)?;
        trace!(
            "Sent message type {} ({} bytes) at {} ms",
            payload.type_id,
            payload.data.len(),
            payload.timestamp.value
        );
        Ok(record.len())
    }

    fn poll_readable(&mut self) -> Result<bool> {
        if !self.pending.is_empty() {
            return Ok(true);
        }
        Ok(poller::poll_readable(self.raw_handle()).map_err(RtmpError::Poll)?)
    }

    fn read_and_dispatch_one(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            self.fill("inbound message")?;
        }
        // a partial chunk completes no message yet
        if let Some(payload) = self.pending.pop_front() {
            self.dispatch(payload)?;
        }
        Ok(())
    }
}

impl Drop for RtmpConnection {
    fn drop(&mut self) {
        self.close();
    }
}

fn connect_tcp(address: &str, timeout: Duration) -> Result<TcpStream, RtmpError> {
    let connect_error = |source: io::Error| RtmpError::Connect {
        address: address.to_string(),
        source,
    };

    let mut last_error = None;
    for addr in address.to_socket_addrs().map_err(connect_error)? {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => {
                stream.set_nodelay(true).map_err(connect_error)?;
                stream.set_read_timeout(Some(timeout)).map_err(connect_error)?;
                stream.set_write_timeout(Some(timeout)).map_err(connect_error)?;
                debug!("TCP connection established to {addr}");
                return Ok(stream);
            }
            Err(e) => {
                debug!("Failed to connect to {addr}: {e}");
                last_error = Some(e);
            }
        }
    }
    Err(connect_error(last_error.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::NotFound, "address resolved to nothing")
    })))
}

/// Feeds `bytes` to the deserializer and queues every message it completes.
///
/// A peer `SetChunkSize` takes effect before the chunks behind it are parsed.
fn decode_into(
    deserializer: &mut ChunkDeserializer,
    pending: &mut VecDeque<MessagePayload>,
    bytes: &[u8],
) -> Result<(), RtmpError> {
    let mut input = bytes;
    loop {
        let message = deserializer
            .get_next_message(input)
            .map_err(|e| RtmpError::Deserialize(format!("{e:?}")))?;
        let Some(message) = message else {
            return Ok(());
        };
        if message.type_id == SET_CHUNK_SIZE_TYPE_ID && message.data.len() >= 4 {
            let size = u32::from_be_bytes([message.data[0], message.data[1], message.data[2], message.data[3]])
                & 0x7FFF_FFFF;
            deserializer
                .set_max_chunk_size(size as usize)
                .map_err(|e| RtmpError::Deserialize(format!("{e:?}")))?;
        }
        pending.push_back(message);
        input = &[];
    }
}

fn log_command(command: &Command) {
    debug!(
        "Received {} (transaction {}): {}",
        command.name,
        command.transaction_id,
        command.describe()
    );
}

/// Turns one FLV tag into the RTMP message that carries it: the tag type
/// becomes the message type, the full 32-bit timestamp the message timestamp.
pub fn flv_tag_to_message_payload(flv_tag: FlvTag, message_stream_id: u32) -> MessagePayload {
    let data = if flv_tag.header.tag_type == TagType::ScriptData.as_u8() {
        wrap_metadata(&flv_tag.data)
    } else {
        flv_tag.data
    };
    message_payload(&flv_tag.header, data, message_stream_id)
}

/// Same as [`flv_tag_to_message_payload`] for a finished record, copying the
/// payload once.
pub fn record_to_message_payload(
    record: &[u8],
    message_stream_id: u32,
) -> Result<MessagePayload, FlvError> {
    let (header, data) = split_record(record)?;
    let data = if header.tag_type == TagType::ScriptData.as_u8() {
        wrap_metadata(data)
    } else {
        Bytes::copy_from_slice(data)
    };
    Ok(message_payload(&header, data, message_stream_id))
}

fn message_payload(header: &FlvTagHeader, data: Bytes, message_stream_id: u32) -> MessagePayload {
    MessagePayload {
        timestamp: RtmpTimestamp {
            value: header.full_timestamp(),
        },
        type_id: header.tag_type,
        message_stream_id,
        data,
    }
}

/// Script data goes out as `@setDataFrame` followed by the original values.
fn wrap_metadata(data: &[u8]) -> Bytes {
    let s = "@setDataFrame";

    let mut bytes = BytesMut::with_capacity(3 + s.len() + data.len());

    bytes.put_u8(0x02);
    bytes.put_u16(s.len() as u16);
    bytes.put(s.as_bytes());

    bytes.put_slice(data);

    bytes.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amf0::{self, AmfValue};
    use crate::flv::tag_builder::TagBuilder;

    fn record(tag_type: TagType, timestamp: u32, payload: &[u8]) -> FlvTag {
        let mut builder = TagBuilder::new();
        builder.begin_tag(tag_type, timestamp);
        builder.append_payload(payload).unwrap();
        builder.finish_tag().unwrap();
        FlvTag::from_record(builder.record()).unwrap()
    }

    #[test]
    fn test_video_record_to_message() {
        let payload = flv_tag_to_message_payload(record(TagType::Video, 0x0100_0010, &[0x17, 1]), 1);
        assert_eq!(payload.type_id, 9);
        assert_eq!(payload.message_stream_id, 1);
        assert_eq!(payload.timestamp.value, 0x0100_0010);
        assert_eq!(&payload.data[..], &[0x17, 1]);
    }

    #[test]
    fn test_record_and_tag_give_same_message() {
        let mut builder = TagBuilder::new();
        builder.begin_tag(TagType::Audio, 0x0300_0020);
        builder.append_payload(&[0xAF, 1, 0x21, 0x10]).unwrap();
        builder.finish_tag().unwrap();

        let from_record = record_to_message_payload(builder.record(), 2).unwrap();
        let from_tag = flv_tag_to_message_payload(FlvTag::from_record(builder.record()).unwrap(), 2);
        assert_eq!(from_record.type_id, 8);
        assert_eq!(from_record.timestamp.value, 0x0300_0020);
        assert_eq!(from_record.type_id, from_tag.type_id);
        assert_eq!(from_record.timestamp.value, from_tag.timestamp.value);
        assert_eq!(from_record.data, from_tag.data);

        assert!(matches!(
            record_to_message_payload(&builder.record()[..10], 2),
            Err(FlvError::TruncatedRecord(10))
        ));
    }

    #[test]
    fn test_metadata_is_wrapped_in_set_data_frame() {
        let mut body = BytesMut::new();
        amf0::encode_metadata(&mut body, "onMetaData", &[("width", AmfValue::Number(640.0))]).unwrap();
        let payload = flv_tag_to_message_payload(record(TagType::ScriptData, 0, &body), 5);
        assert_eq!(payload.type_id, 18);

        let mut data = payload.data.clone();
        assert_eq!(
            amf0::read_value(&mut data).unwrap(),
            AmfValue::String("@setDataFrame".into())
        );
        assert_eq!(&data[..], &body[..]);
    }

    #[test]
    fn test_command_describe_uses_status_object() {
        let mut info = HashMap::new();
        info.insert("level".to_string(), Amf0Value::Utf8String("error".into()));
        info.insert("code".to_string(), Amf0Value::Utf8String("NetStream.Publish.BadName".into()));
        info.insert("description".to_string(), Amf0Value::Utf8String("Stream already publishing".into()));
        let command = Command {
            name: "onStatus".to_string(),
            transaction_id: 0.0,
            arguments: vec![Amf0Value::Object(info)],
        };
        assert_eq!(command.info_field("level"), Some("error"));
        assert_eq!(
            command.describe(),
            "NetStream.Publish.BadName: Stream already publishing"
        );
    }

    fn status(name: &str, level: &str, code: &str) -> Command {
        let mut info = HashMap::new();
        info.insert("level".to_string(), Amf0Value::Utf8String(level.into()));
        info.insert("code".to_string(), Amf0Value::Utf8String(code.into()));
        Command {
            name: name.to_string(),
            transaction_id: 0.0,
            arguments: vec![Amf0Value::Object(info)],
        }
    }

    #[test]
    fn test_publish_reply_classification() {
        assert_eq!(
            status("onStatus", "status", "NetStream.Publish.Start").publish_reply(),
            PublishReply::Started
        );
        assert_eq!(
            status("onStatus", "status", "NetStream.Play.Reset").publish_reply(),
            PublishReply::Pending
        );
        assert_eq!(
            status("onStatus", "error", "NetStream.Publish.BadName").publish_reply(),
            PublishReply::Rejected("NetStream.Publish.BadName".to_string())
        );
        // rejection with transaction 0 and level `_error`
        assert_eq!(
            status("_error", "_error", "NetStream.Publish.BadName").publish_reply(),
            PublishReply::Rejected("NetStream.Publish.BadName".to_string())
        );
        assert_eq!(
            status("onStatus", "_error", "NetStream.Publish.Denied").publish_reply(),
            PublishReply::Rejected("NetStream.Publish.Denied".to_string())
        );
        assert_eq!(
            status("onBWDone", "status", "").publish_reply(),
            PublishReply::Pending
        );
    }

    #[test]
    fn test_disconnect_logged_at_info_only_after_handshake() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let stream = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let url = RtmpUrl::parse("rtmp://127.0.0.1/live/key").unwrap();

        let mut connection = RtmpConnection::with_stream(stream, url);
        assert_eq!(connection.lifecycle_level(), Level::Debug);
        connection.established = true;
        assert_eq!(connection.lifecycle_level(), Level::Info);

        connection.close();
        assert!(connection.closed);
        // idempotent, Drop calls it again
        connection.close();
    }

    #[test]
    fn test_handshake_failure_is_protocol_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = std::thread::spawn(move || {
            // hang up without answering the handshake
            let (stream, _) = listener.accept().unwrap();
            drop(stream);
        });

        let url = RtmpUrl::parse(&format!("rtmp://127.0.0.1:{port}/live/key")).unwrap();
        let config = PublishConfig::new().set_timeout(Duration::from_secs(2));
        let result = RtmpConnection::connect(&url, &config);
        server.join().unwrap();
        assert!(matches!(
            result,
            Err(crate::error::Error::Protocol(
                RtmpError::ConnectionClosed | RtmpError::Read(_) | RtmpError::Write(_)
            ))
        ));
    }

    #[test]
    fn test_connect_to_closed_port_is_protocol_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let url = RtmpUrl::parse(&format!("rtmp://127.0.0.1:{port}/live/key")).unwrap();
        let config = PublishConfig::new().set_timeout(Duration::from_secs(1));
        assert!(matches!(
            RtmpConnection::connect(&url, &config),
            Err(crate::error::Error::Protocol(RtmpError::Connect { .. }))
        ));
    }
}
