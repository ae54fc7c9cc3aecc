#![cfg(all(unix, feature = "cli"))]

use std::os::unix::net::UnixListener;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::thread::{self, JoinHandle};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use ipcsearch_frame::{
    command, encode_len_vlq, get_len_vlq, MessageReader, MessageWriter, ResponseCode,
};

const INSTANCE: &str = "cli-test";

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "ipcsearch-cli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn put_str(buf: &mut BytesMut, s: &str) {
    encode_len_vlq(s.len() as u64, Some(buf));
    buf.put_slice(s.as_bytes());
}

/// Echo the requested properties back and answer with `count` results
/// named `match-<i>.txt`, sized `i * 100`. Properties other than name,
/// path and size are declared as an unknown wire type.
fn search_response(payload: &[u8], count: u64) -> BytesMut {
    // skip flags, text, viewport and sort keys of the request
    let mut p = Bytes::copy_from_slice(payload);
    let flags = p.get_u32_le();
    let text_len = get_len_vlq(&mut p, u64::MAX).expect("text length");
    p.advance(text_len as usize);
    let offset = p.get_u64_le();
    p.get_u64_le();
    let sorts = get_len_vlq(&mut p, u64::MAX).expect("sort count");
    p.advance(sorts as usize * 8);
    let props = get_len_vlq(&mut p, u64::MAX).expect("property count");
    let requests: Vec<(u32, u32)> = (0..props)
        .map(|_| (p.get_u32_le(), p.get_u32_le()))
        .collect();
    assert_eq!(flags & 0x4000, 0x4000, "client should send 64-bit sizes");

    let mut body = BytesMut::new();
    body.put_u32_le(0x3);
    body.put_u64_le(1);
    body.put_u64_le(count - 1);
    body.put_u64_le(offset);
    body.put_u64_le(count);
    encode_len_vlq(0, Some(&mut body));
    encode_len_vlq(requests.len() as u64, Some(&mut body));
    for (id, req_flags) in &requests {
        body.put_u32_le(*id);
        body.put_u32_le(*req_flags);
        let value_type = match id {
            0 | 1 => 8,
            2 => 5,
            _ => 200,
        };
        body.put_u8(value_type);
    }
    for i in 0..count {
        body.put_u8(if i == 0 { 1 } else { 0 });
        for (id, req_flags) in &requests {
            if req_flags & 0x3 != 0 || *id <= 1 {
                let text = if *id == 1 {
                    "/data".to_string()
                } else {
                    format!("match-{i}.txt")
                };
                put_str(&mut body, &text);
            } else if *id == 2 {
                body.put_u64_le(i * 100);
            }
        }
    }
    body
}

/// Serve one connection, answering every request until the client hangs up.
fn spawn_service(dir: &Path, count: u64) -> JoinHandle<Vec<u32>> {
    let sock = dir.join(format!("Everything IPC ({INSTANCE}).sock"));
    let listener = UnixListener::bind(&sock).expect("listener should bind");
    thread::spawn(move || {
        let (stream, _) = listener.accept().expect("listener should accept");
        let mut reader = MessageReader::new(stream.try_clone().expect("stream should clone"));
        let mut writer = MessageWriter::new(stream);
        let mut seen = Vec::new();
        while let Ok(message) = reader.read_message() {
            seen.push(message.code);
            let reply: Vec<u8> = match message.code {
                command::SEARCH => {
                    let body = search_response(&message.payload, count);
                    let pieces: Vec<&[u8]> = body.chunks(64).collect();
                    for (i, piece) in pieces.iter().enumerate() {
                        let code = if i + 1 == pieces.len() {
                            ResponseCode::OK
                        } else {
                            ResponseCode::OK_MORE_DATA
                        };
                        writer.send(code, piece).expect("reply should send");
                    }
                    continue;
                }
                command::FIND_PROPERTY_FROM_NAME => u32::MAX.to_le_bytes().to_vec(),
                command::GET_IPC_PIPE_VERSION => 3u32.to_le_bytes().to_vec(),
                command::GET_MAJOR_VERSION => 1u32.to_le_bytes().to_vec(),
                command::GET_MINOR_VERSION => 5u32.to_le_bytes().to_vec(),
                command::GET_REVISION => 0u32.to_le_bytes().to_vec(),
                command::GET_BUILD_NUMBER => 1400u32.to_le_bytes().to_vec(),
                command::GET_TARGET_MACHINE => 2u32.to_le_bytes().to_vec(),
                command::IS_DB_LOADED => 1u32.to_le_bytes().to_vec(),
                _ => {
                    writer
                        .send(ResponseCode::ERROR_INVALID_COMMAND, &[])
                        .expect("reply should send");
                    continue;
                }
            };
            writer
                .send(ResponseCode::OK, &reply)
                .expect("reply should send");
        }
        seen
    })
}

fn run_cli(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_ipcsearch"))
        .env("IPCSEARCH_SOCKET_DIR", dir)
        .env("IPCSEARCH_INSTANCE", INSTANCE)
        .env("IPCSEARCH_TIMEOUT", "2s")
        .args(args)
        .output()
        .expect("ipcsearch should run")
}

#[test]
fn search_prints_json_rows_and_totals() {
    let dir = unique_temp_dir("search");
    let service = spawn_service(&dir, 3);

    let output = run_cli(
        &dir,
        &["--format", "json", "search", "match", "--columns", "name,size"],
    );
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let out: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    assert_eq!(out["totals"]["folders"], 1);
    assert_eq!(out["totals"]["files"], 2);
    let items = out["items"].as_array().expect("items should be an array");
    assert_eq!(items.len(), 3);
    assert_eq!(items[0]["folder"], true);
    assert_eq!(items[2]["name"], "match-2.txt");
    assert_eq!(items[2]["size"], 200);

    assert_eq!(service.join().expect("service should finish"), vec![command::SEARCH]);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn search_at_prints_requested_indexes_in_order() {
    let dir = unique_temp_dir("at");
    let service = spawn_service(&dir, 50);

    let output = run_cli(
        &dir,
        &[
            "--format", "raw", "search", "match", "--columns", "name,size", "--at", "42,3,42",
        ],
    );
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(
        lines,
        vec!["match-42.txt\t4200", "match-3.txt\t300", "match-42.txt\t4200"]
    );

    // one search, no re-query
    assert_eq!(service.join().expect("service should finish"), vec![command::SEARCH]);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn unknown_wire_type_degrades_to_empty_cell() {
    let dir = unique_temp_dir("unknown");
    let service = spawn_service(&dir, 2);

    let output = run_cli(
        &dir,
        &["--format", "json", "search", "match", "--columns", "name,99,size"],
    );
    assert!(output.status.success());
    let out: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    assert_eq!(out["items"][1]["99"], serde_json::Value::Null);
    assert_eq!(out["items"][1]["size"], 100);
    assert!(output.stderr.is_empty(), "warnings stay hidden by default");

    service.join().expect("service should finish");
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn unknown_column_is_a_usage_error() {
    let dir = unique_temp_dir("column");
    let service = spawn_service(&dir, 1);

    let output = run_cli(&dir, &["search", "match", "--columns", "name,Bogus Thing"]);
    assert_eq!(output.status.code(), Some(64));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unknown property: Bogus Thing"));

    assert_eq!(
        service.join().expect("service should finish"),
        vec![command::FIND_PROPERTY_FROM_NAME]
    );
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn info_reports_service_version() {
    let dir = unique_temp_dir("info");
    let service = spawn_service(&dir, 1);

    let output = run_cli(&dir, &["--format", "json", "info"]);
    assert!(output.status.success());
    let out: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    assert_eq!(out["service_version"], "1.5.0.1400");
    assert_eq!(out["ipc_version"], 3);
    assert_eq!(out["target_machine"], "x64");
    assert_eq!(out["db_loaded"], true);

    service.join().expect("service should finish");
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn missing_service_exits_with_no_service() {
    let dir = unique_temp_dir("missing");
    let output = Command::new(env!("CARGO_BIN_EXE_ipcsearch"))
        .env("IPCSEARCH_SOCKET_DIR", &dir)
        .args(["search", "foo", "--instance", "absent", "--timeout", "100ms"])
        .output()
        .expect("ipcsearch should run");

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.starts_with("error: connect failed: search service is not running"));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn version_prints_package_version() {
    let output = Command::new(env!("CARGO_BIN_EXE_ipcsearch"))
        .arg("version")
        .output()
        .expect("ipcsearch should run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), format!("ipcsearch {}", env!("CARGO_PKG_VERSION")));
}
