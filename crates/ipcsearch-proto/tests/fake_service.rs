#![cfg(unix)]

use std::os::unix::net::UnixListener;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use bytes::{BufMut, BytesMut};
use ipcsearch_frame::{command, encode_len_vlq, MessageReader, MessageWriter, ResponseCode};
use ipcsearch_proto::{
    Client, HighlightedText, ItemFlags, PropertyId, PropertyRequest, PropertyValue, ProtoError,
    SearchFlags, SearchRequest, SortKey, ValueType,
};
use ipcsearch_transport::TransportError;

fn temp_socket(tag: &str) -> (PathBuf, PathBuf) {
    let dir = std::env::temp_dir().join(format!(
        "ipcsearch-proto-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    let sock = dir.join("service.sock");
    (dir, sock)
}

fn put_str(buf: &mut BytesMut, s: &str) {
    encode_len_vlq(s.len() as u64, Some(buf));
    buf.put_slice(s.as_bytes());
}

/// Response body for a NAME (highlighted) + SIZE (uint64) search over
/// `rows`.
fn name_size_response(rows: &[(&str, u64)]) -> BytesMut {
    let mut body = BytesMut::new();
    body.put_u32_le(0x3);
    body.put_u64_le(0);
    body.put_u64_le(rows.len() as u64);
    body.put_u64_le(0);
    body.put_u64_le(rows.len() as u64);
    encode_len_vlq(0, Some(&mut body));
    encode_len_vlq(2, Some(&mut body));
    body.put_u32_le(PropertyId::NAME.0);
    body.put_u32_le(0x2);
    body.put_u8(ValueType::Pstring.as_u8());
    body.put_u32_le(PropertyId::SIZE.0);
    body.put_u32_le(0);
    body.put_u8(ValueType::Uint64.as_u8());
    for (name, size) in rows {
        body.put_u8(0);
        put_str(&mut body, name);
        body.put_u64_le(*size);
    }
    body
}

/// Send `body` as a multi-message response of `chunk`-byte pieces.
fn send_chunked<W: std::io::Write>(writer: &mut MessageWriter<W>, body: &[u8], chunk: usize) {
    let pieces: Vec<&[u8]> = body.chunks(chunk).collect();
    for (i, piece) in pieces.iter().enumerate() {
        let code = if i + 1 == pieces.len() {
            ResponseCode::OK
        } else {
            ResponseCode::OK_MORE_DATA
        };
        writer.send(code, piece).expect("reply should send");
    }
}

fn foo_request() -> SearchRequest {
    SearchRequest::new("foo")
        .flags(SearchFlags::SIZE_T_64BIT)
        .viewport(0, 2)
        .sort_by(SortKey::ascending(PropertyId::NAME))
        .property(PropertyRequest::highlighted(PropertyId::NAME))
        .property(PropertyRequest::raw(PropertyId::SIZE))
}

#[test]
fn search_end_to_end_over_socket() {
    let (dir, sock) = temp_socket("e2e");
    let listener = UnixListener::bind(&sock).expect("listener should bind");

    let server = thread::spawn(move || {
        let (stream, _) = listener.accept().expect("listener should accept");
        let mut reader = MessageReader::new(stream.try_clone().expect("stream should clone"));
        let mut writer = MessageWriter::new(stream);

        let message = reader.read_message().expect("search should arrive");
        assert_eq!(message.code, command::SEARCH);
        let mut expected = BytesMut::new();
        foo_request()
            .encode(&mut expected)
            .expect("request should encode");
        assert_eq!(message.payload.as_ref(), expected.as_ref());

        let body = name_size_response(&[("f*oo*.txt", 1024), ("foo2.txt", 2048)]);
        send_chunked(&mut writer, &body, 7);

        let message = reader.read_message().expect("second request should arrive");
        assert_eq!(message.code, command::IS_DB_LOADED);
        writer
            .send(ResponseCode::OK, &1u32.to_le_bytes())
            .expect("reply should send");
    });

    let mut client =
        Client::connect_path(&sock, Duration::from_secs(2)).expect("client should connect");
    let mut list = client.search(&foo_request()).expect("search should start");
    assert_eq!(list.folder_count(), Some(0));
    assert_eq!(list.file_count(), Some(2));
    assert_eq!(list.viewport_count(), 2);

    let items = list.collect_items().expect("items should decode");
    list.finish().expect("response should drain");
    let rows: Vec<(String, u64)> = items
        .iter()
        .map(|item| {
            (
                item.values[0].as_str().unwrap_or_default().to_string(),
                item.values[1].as_u64().unwrap_or_default(),
            )
        })
        .collect();
    assert_eq!(
        rows,
        vec![("f*oo*.txt".to_string(), 1024), ("foo2.txt".to_string(), 2048)]
    );
    assert_eq!(
        items[0].values[0],
        PropertyValue::Highlighted(HighlightedText("f*oo*.txt".to_string()))
    );
    assert_eq!(items[0].flags, ItemFlags::empty());

    assert!(client.is_db_loaded().expect("query should succeed"));
    server.join().expect("server thread should complete");
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn pooled_search_seeks_without_requery() {
    let (dir, sock) = temp_socket("pooled");
    let listener = UnixListener::bind(&sock).expect("listener should bind");
    let rows: Vec<(String, u64)> = (0..200).map(|i| (format!("file-{i}.bin"), i * 7)).collect();
    let server_rows = rows.clone();

    let server = thread::spawn(move || {
        let (stream, _) = listener.accept().expect("listener should accept");
        let mut reader = MessageReader::new(stream.try_clone().expect("stream should clone"));
        let mut writer = MessageWriter::new(stream);
        reader.read_message().expect("search should arrive");
        let refs: Vec<(&str, u64)> = server_rows.iter().map(|(n, s)| (n.as_str(), *s)).collect();
        send_chunked(&mut writer, &name_size_response(&refs), 333);
        // the client must not send a second search
        assert!(reader.read_message().is_err());
    });

    let mut client =
        Client::connect_path(&sock, Duration::from_secs(2)).expect("client should connect");
    let request = foo_request().viewport(0, 200);
    let mut list = client.search_pooled(&request).expect("search should start");

    for i in [150u64, 10, 199, 0, 75] {
        let item = list.item_at(i).expect("item should decode");
        let (name, size) = &rows[i as usize];
        assert_eq!(item.values[0].as_str(), Some(name.as_str()));
        assert_eq!(item.values[1].as_u64(), Some(*size));
    }
    list.finish().expect("response should drain");
    drop(client);

    server.join().expect("server thread should complete");
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn failure_status_surfaces_as_error() {
    let (dir, sock) = temp_socket("status");
    let listener = UnixListener::bind(&sock).expect("listener should bind");

    let server = thread::spawn(move || {
        let (stream, _) = listener.accept().expect("listener should accept");
        let mut reader = MessageReader::new(stream.try_clone().expect("stream should clone"));
        let mut writer = MessageWriter::new(stream);
        reader.read_message().expect("search should arrive");
        writer
            .send(ResponseCode::ERROR_OUT_OF_MEMORY, &[])
            .expect("reply should send");
    });

    let mut client =
        Client::connect_path(&sock, Duration::from_secs(2)).expect("client should connect");
    let err = client.search(&foo_request()).err().expect("search should fail");
    assert!(matches!(
        err.frame_error(),
        Some(ipcsearch_frame::FrameError::Response(ResponseCode::OutOfMemory))
    ));

    server.join().expect("server thread should complete");
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn disconnect_mid_response_is_sticky() {
    let (dir, sock) = temp_socket("disconnect");
    let listener = UnixListener::bind(&sock).expect("listener should bind");

    let server = thread::spawn(move || {
        let (stream, _) = listener.accept().expect("listener should accept");
        let mut reader = MessageReader::new(stream.try_clone().expect("stream should clone"));
        let mut writer = MessageWriter::new(stream);
        reader.read_message().expect("search should arrive");
        let body = name_size_response(&[("a", 1), ("b", 2)]);
        writer
            .send(ResponseCode::OK_MORE_DATA, &body[..body.len() - 4])
            .expect("reply should send");
    });

    let mut client =
        Client::connect_path(&sock, Duration::from_secs(2)).expect("client should connect");
    let mut list = client.search(&foo_request()).expect("header should decode");
    server.join().expect("server thread should complete");

    let err = list.collect_items().expect_err("items should fail");
    assert!(matches!(
        err.frame_error(),
        Some(ipcsearch_frame::FrameError::ConnectionClosed)
    ));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn missing_service_is_not_running() {
    let (dir, sock) = temp_socket("missing");
    let err = match Client::connect_path(&sock, Duration::from_millis(60)) {
        Ok(_) => panic!("connect should fail"),
        Err(err) => err,
    };
    assert!(matches!(
        err,
        ProtoError::Transport(TransportError::NotRunning { .. })
            | ProtoError::Transport(TransportError::Timeout { .. })
    ));
    let _ = std::fs::remove_dir_all(&dir);
}
