//! Blocking client for the search service.

use std::fmt;
use std::io::{Read, Write};
use std::path::Path;
use std::time::Duration;

use bytes::BytesMut;
use ipcsearch_frame::command::{self, command_name};
use ipcsearch_frame::{MessageReader, MessageWriter};
use ipcsearch_transport::{connect_with_timeout, instance_path, IpcStream};
use tracing::debug;

use crate::error::{ProtoError, Result};
use crate::pipe::PipeStream;
use crate::pooled::PooledStream;
use crate::property::PropertyId;
use crate::request::SearchRequest;
use crate::result_list::ResultList;

/// Reply of `FIND_PROPERTY_FROM_NAME` for a name the service does not know.
const PROPERTY_NOT_FOUND: u32 = u32::MAX;

/// Version of the running service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceVersion {
    pub major: u32,
    pub minor: u32,
    pub revision: u32,
    pub build: u32,
}

impl fmt::Display for ServiceVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}.{}", self.major, self.minor, self.revision, self.build)
    }
}

/// Name of a `GET_TARGET_MACHINE` reply.
pub fn machine_name(machine: u32) -> Option<&'static str> {
    match machine {
        1 => Some("x86"),
        2 => Some("x64"),
        3 => Some("arm"),
        4 => Some("arm64"),
        _ => None,
    }
}

/// One connection to the service.
///
/// Requests are strictly sequential: a search borrows the client until its
/// result list is dropped, so a second request cannot start while a
/// response is still being read. Dropping a list early drains the unread
/// part of its response.
pub struct Client<R, W> {
    reader: MessageReader<R>,
    writer: MessageWriter<W>,
}

impl Client<IpcStream, IpcStream> {
    /// Connect to the service instance, waiting up to `timeout` for it.
    pub fn connect(instance: Option<&str>, timeout: Duration) -> Result<Self> {
        Self::connect_path(instance_path(instance), timeout)
    }

    /// Connect to a pipe or socket at an explicit path.
    pub fn connect_path(path: impl AsRef<Path>, timeout: Duration) -> Result<Self> {
        let stream = connect_with_timeout(path, timeout)?;
        let reader = stream.try_clone()?;
        Ok(Self::new(reader, stream))
    }
}

impl<R: Read, W: Write> Client<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self::from_parts(MessageReader::new(reader), MessageWriter::new(writer))
    }

    pub fn from_parts(reader: MessageReader<R>, writer: MessageWriter<W>) -> Self {
        Self { reader, writer }
    }

    pub fn into_parts(self) -> (MessageReader<R>, MessageWriter<W>) {
        (self.reader, self.writer)
    }

    /// Run a search and read the result-list header.
    ///
    /// Items are decoded as they are pulled from the pipe; each one can be
    /// read once.
    pub fn search(&mut self, request: &SearchRequest) -> Result<ResultList<PipeStream<'_, R>>> {
        self.send_search(request)?;
        let stream = PipeStream::new(&mut self.reader, request.flags.is_64bit());
        Ok(ResultList::open(stream)?)
    }

    /// Run a search whose items can be revisited in any order with
    /// [`ResultList::seek_to_index`].
    pub fn search_pooled(
        &mut self,
        request: &SearchRequest,
    ) -> Result<ResultList<PooledStream<PipeStream<'_, R>>>> {
        self.send_search(request)?;
        let stream = PipeStream::new(&mut self.reader, request.flags.is_64bit());
        Ok(ResultList::open(PooledStream::new(stream))?)
    }

    fn send_search(&mut self, request: &SearchRequest) -> Result<()> {
        let mut payload = BytesMut::with_capacity(request.encoded_len());
        request.encode(&mut payload)?;
        debug!(
            text = %request.text,
            flags = request.flags.bits(),
            offset = request.viewport_offset,
            count = request.viewport_count,
            properties = request.properties.len(),
            "sending search"
        );
        self.writer.send(command::SEARCH, &payload)?;
        Ok(())
    }

    /// Version of the IPC protocol the service speaks.
    pub fn ipc_version(&mut self) -> Result<u32> {
        self.query_u32(command::GET_IPC_PIPE_VERSION, &[])
    }

    pub fn version(&mut self) -> Result<ServiceVersion> {
        Ok(ServiceVersion {
            major: self.query_u32(command::GET_MAJOR_VERSION, &[])?,
            minor: self.query_u32(command::GET_MINOR_VERSION, &[])?,
            revision: self.query_u32(command::GET_REVISION, &[])?,
            build: self.query_u32(command::GET_BUILD_NUMBER, &[])?,
        })
    }

    /// Machine type the service was built for; see [`machine_name`].
    pub fn target_machine(&mut self) -> Result<u32> {
        self.query_u32(command::GET_TARGET_MACHINE, &[])
    }

    /// Whether the service has finished loading its index.
    pub fn is_db_loaded(&mut self) -> Result<bool> {
        Ok(self.query_u32(command::IS_DB_LOADED, &[])? != 0)
    }

    /// Resolve a property by its canonical name.
    pub fn find_property(&mut self, name: &str) -> Result<Option<PropertyId>> {
        let id = self.query_u32(command::FIND_PROPERTY_FROM_NAME, name.as_bytes())?;
        Ok((id != PROPERTY_NOT_FOUND).then_some(PropertyId(id)))
    }

    fn query_u32(&mut self, code: u32, payload: &[u8]) -> Result<u32> {
        self.writer.send(code, payload)?;
        let reply = self.reader.read_response()?;
        let bytes: [u8; 4] = reply
            .as_ref()
            .try_into()
            .map_err(|_| ProtoError::UnexpectedPayload {
                command: command_name(code),
                expected: 4,
                got: reply.len(),
            })?;
        let value = u32::from_le_bytes(bytes);
        debug!(command = command_name(code), value, "scalar reply");
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use bytes::BufMut;
    use ipcsearch_frame::{encode_message, FrameError, ResponseCode};

    use super::*;
    use crate::property::{PropertyRequest, PropertyValue};
    use crate::request::SearchFlags;

    fn replies(messages: &[(u32, &[u8])]) -> Cursor<Vec<u8>> {
        let mut wire = BytesMut::new();
        for (code, payload) in messages {
            encode_message(*code, payload, &mut wire).expect("message should encode");
        }
        Cursor::new(wire.to_vec())
    }

    fn sent(client: Client<Cursor<Vec<u8>>, Vec<u8>>) -> Vec<(u32, Vec<u8>)> {
        let (_, writer) = client.into_parts();
        let mut reader = MessageReader::new(Cursor::new(writer.into_inner()));
        let mut out = Vec::new();
        while let Ok(message) = reader.read_message() {
            out.push((message.code, message.payload.to_vec()));
        }
        out
    }

    #[test]
    fn version_queries_four_commands() {
        let input = replies(&[
            (ResponseCode::OK, &1u32.to_le_bytes()),
            (ResponseCode::OK, &5u32.to_le_bytes()),
            (ResponseCode::OK, &0u32.to_le_bytes()),
            (ResponseCode::OK, &1400u32.to_le_bytes()),
        ]);
        let mut client = Client::new(input, Vec::new());
        let version = client.version().expect("version should succeed");
        assert_eq!(version.to_string(), "1.5.0.1400");

        let codes: Vec<u32> = sent(client).into_iter().map(|(code, _)| code).collect();
        assert_eq!(codes, vec![1, 2, 3, 4]);
    }

    #[test]
    fn find_property_sends_name_and_maps_not_found() {
        let input = replies(&[
            (ResponseCode::OK, &42u32.to_le_bytes()),
            (ResponseCode::OK, &u32::MAX.to_le_bytes()),
        ]);
        let mut client = Client::new(input, Vec::new());
        assert_eq!(
            client.find_property("Camera Model").unwrap(),
            Some(PropertyId(42))
        );
        assert_eq!(client.find_property("nope").unwrap(), None);

        let messages = sent(client);
        assert_eq!(messages[0], (6, b"Camera Model".to_vec()));
    }

    #[test]
    fn wrong_reply_size() {
        let input = replies(&[(ResponseCode::OK, &[1, 0])]);
        let mut client = Client::new(input, Vec::new());
        let err = client.is_db_loaded().unwrap_err();
        assert!(matches!(
            err,
            ProtoError::UnexpectedPayload {
                command: "IS_DB_LOADED",
                expected: 4,
                got: 2
            }
        ));
    }

    #[test]
    fn failure_status_is_a_frame_error() {
        let input = replies(&[(ResponseCode::ERROR_INVALID_COMMAND, &[])]);
        let mut client = Client::new(input, Vec::new());
        let err = client.target_machine().unwrap_err();
        assert!(matches!(
            err.frame_error(),
            Some(FrameError::Response(ResponseCode::InvalidCommand))
        ));
    }

    #[test]
    fn search_reads_chunked_response_and_next_request_follows() {
        let mut body = BytesMut::new();
        body.put_u32_le(0);
        body.put_u64_le(0);
        body.put_u64_le(2);
        body.put_u8(0);
        body.put_u8(1);
        body.put_u32_le(PropertyId::SIZE.0);
        body.put_u32_le(0);
        body.put_u8(5);
        body.put_u8(0);
        body.put_u64_le(1024);
        body.put_u8(0);
        body.put_u64_le(2048);
        let (head, tail) = body.split_at(20);

        let input = replies(&[
            (ResponseCode::OK_MORE_DATA, head),
            (ResponseCode::OK, tail),
            (ResponseCode::OK, &1u32.to_le_bytes()),
        ]);
        let mut client = Client::new(input, Vec::new());
        let request = SearchRequest::new("foo")
            .flags(SearchFlags::SIZE_T_64BIT)
            .viewport(0, 2)
            .property(PropertyRequest::raw(PropertyId::SIZE));

        let mut list = client.search(&request).expect("search should succeed");
        let sizes: Vec<u64> = list
            .collect_items()
            .expect("items should decode")
            .iter()
            .filter_map(|item| item.values[0].as_u64())
            .collect();
        assert_eq!(sizes, vec![1024, 2048]);
        list.finish().expect("response should drain");

        assert!(client.is_db_loaded().unwrap());
        let messages = sent(client);
        assert_eq!(messages[0].0, command::SEARCH);
        assert_eq!(messages.len(), 2);
    }

    #[test]
    fn unread_items_are_drained_by_finish() {
        let mut body = BytesMut::new();
        body.put_u32_le(0);
        body.put_u64_le(0);
        body.put_u64_le(3);
        body.put_u8(0);
        body.put_u8(1);
        body.put_u32_le(PropertyId::SIZE.0);
        body.put_u32_le(0);
        body.put_u8(5);
        for size in [1u64, 2, 3] {
            body.put_u8(0);
            body.put_u64_le(size);
        }
        let (head, tail) = body.split_at(30);
        let input = replies(&[
            (ResponseCode::OK_MORE_DATA, head),
            (ResponseCode::OK, tail),
            (ResponseCode::OK, &9u32.to_le_bytes()),
        ]);
        let mut client = Client::new(input, Vec::new());
        let request = SearchRequest::new("x")
            .flags(SearchFlags::SIZE_T_64BIT)
            .property(PropertyRequest::raw(PropertyId::SIZE));

        let mut list = client.search_pooled(&request).expect("search should succeed");
        assert_eq!(list.item_at(1).unwrap().values[0], PropertyValue::Uint64(2));
        list.finish().expect("response should drain");

        assert_eq!(client.ipc_version().unwrap(), 9);
    }

    #[test]
    fn dropped_list_leaves_connection_usable() {
        let mut body = BytesMut::new();
        body.put_u32_le(0);
        body.put_u64_le(0);
        body.put_u64_le(3);
        body.put_u8(0);
        body.put_u8(1);
        body.put_u32_le(PropertyId::SIZE.0);
        body.put_u32_le(0);
        body.put_u8(5);
        for size in [1u64, 2, 3] {
            body.put_u8(0);
            body.put_u64_le(size);
        }
        let (head, tail) = body.split_at(40);
        let input = replies(&[
            (ResponseCode::OK_MORE_DATA, head),
            (ResponseCode::OK, tail),
            (ResponseCode::OK, &1u32.to_le_bytes()),
        ]);
        let mut client = Client::new(input, Vec::new());
        let request = SearchRequest::new("x")
            .flags(SearchFlags::SIZE_T_64BIT)
            .property(PropertyRequest::raw(PropertyId::SIZE));

        {
            let mut list = client.search(&request).expect("search should succeed");
            let first = list.next_item().expect("first item should decode");
            assert_eq!(first.values[0], PropertyValue::Uint64(1));
        }

        assert!(client.is_db_loaded().unwrap());
    }

    #[test]
    fn machine_names() {
        assert_eq!(machine_name(2), Some("x64"));
        assert_eq!(machine_name(0), None);
    }
}
