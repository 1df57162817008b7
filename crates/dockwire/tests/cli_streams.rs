#![cfg(all(unix, feature = "cli"))]

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use dockwire::frame::{encode_frame, encode_raw_frame, StreamKind};

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/dwcli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn attach_body() -> Vec<u8> {
    let mut buf = bytes::BytesMut::new();
    encode_frame(StreamKind::Stdout, b"hello\n", &mut buf).unwrap();
    encode_frame(StreamKind::Stderr, b"oops\n", &mut buf).unwrap();
    encode_raw_frame(7, b"ignored", &mut buf).unwrap();
    encode_frame(StreamKind::Stdin, b"typed\n", &mut buf).unwrap();
    encode_frame(StreamKind::Stdout, b"bye\n", &mut buf).unwrap();
    let mut body = buf.to_vec();
    // Cut-off frame: header promises 32 bytes, two arrive.
    body.extend_from_slice(&[1, 0, 0, 0, 0, 0, 0, 32, b'x', b'y']);
    body
}

fn write_fixture(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).expect("fixture should be writable");
    path
}

fn dockwire(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_dockwire"))
        .arg("--log-level")
        .arg("error")
        .args(args)
        .output()
        .expect("dockwire should run")
}

fn stdout_lines(output: &Output) -> Vec<String> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::to_string)
        .collect()
}

#[test]
fn demux_prints_selected_streams_in_wire_order() {
    let dir = unique_temp_dir("demux");
    let input = write_fixture(&dir, "attach.bin", &attach_body());

    let output = dockwire(&[
        "--format",
        "json",
        "demux",
        "--input",
        input.to_str().unwrap(),
        "--streams",
        "stdout,stderr",
    ]);

    assert!(output.status.success(), "{output:?}");
    let lines = stdout_lines(&output);
    assert_eq!(lines.len(), 3, "{lines:?}");

    let frames: Vec<serde_json::Value> = lines
        .iter()
        .map(|line| serde_json::from_str(line).expect("each line should be json"))
        .collect();
    assert_eq!(frames[0]["stream"], "stdout");
    assert_eq!(frames[0]["payload"], "hello\n");
    assert_eq!(frames[1]["stream"], "stderr");
    assert_eq!(frames[1]["payload_size"], 5);
    assert_eq!(frames[2]["payload"], "bye\n");

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn demux_raw_format_restores_process_streams() {
    let dir = unique_temp_dir("raw");
    let input = write_fixture(&dir, "attach.bin", &attach_body());

    let output = dockwire(&[
        "--format",
        "raw",
        "demux",
        "--input",
        input.to_str().unwrap(),
        "--streams",
        "stdout,stderr",
    ]);

    assert!(output.status.success());
    assert_eq!(output.stdout, b"hello\nbye\n");
    assert_eq!(output.stderr, b"oops\n");

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn demux_count_stops_after_n_frames() {
    let dir = unique_temp_dir("count");
    let input = write_fixture(&dir, "attach.bin", &attach_body());

    let output = dockwire(&[
        "--format",
        "pretty",
        "demux",
        "--input",
        input.to_str().unwrap(),
        "--count",
        "2",
    ]);

    assert!(output.status.success());
    let lines = stdout_lines(&output);
    assert_eq!(lines, vec!["stdout size=6 payload=hello", "stderr size=5 payload=oops"]);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn demux_reads_body_from_stdin() {
    let mut child = Command::new(env!("CARGO_BIN_EXE_dockwire"))
        .args(["--log-level", "error", "--format", "raw", "demux", "--streams", "stdin"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("demux should start");

    {
        let mut stdin = child.stdin.take().expect("stdin should be piped");
        stdin.write_all(&attach_body()).unwrap();
    }

    let output = child.wait_with_output().expect("demux should finish");
    assert!(output.status.success());
    assert_eq!(output.stdout, b"typed\n");
}

#[test]
fn demux_missing_input_fails() {
    let output = dockwire(&["demux", "--input", "/nonexistent/dockwire/attach.bin"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("cannot open"));
}

#[test]
fn progress_in_band_error_exits_60() {
    let dir = unique_temp_dir("build");
    let input = write_fixture(
        &dir,
        "build.json",
        br#"{"stream":"Step 1/2 : FROM alpine\n"}
{"stream":"Step 2/2 : RUN false\n"}
{"errorDetail":{"code":1,"message":"returned a non-zero code: 1"},"error":"returned a non-zero code: 1"}
"#,
    );

    let output = dockwire(&[
        "--format",
        "json",
        "progress",
        "--kind",
        "build",
        "--input",
        input.to_str().unwrap(),
    ]);

    assert_eq!(output.status.code(), Some(60));
    let lines = stdout_lines(&output);
    assert_eq!(lines.len(), 3);
    let last: serde_json::Value = serde_json::from_str(&lines[2]).unwrap();
    assert_eq!(last["kind"], "build");
    assert_eq!(last["error"], "returned a non-zero code: 1");
    assert!(String::from_utf8_lossy(&output.stderr).contains("1 error record"));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn progress_events_without_separators() {
    let dir = unique_temp_dir("events");
    let input = write_fixture(
        &dir,
        "events.json",
        br#"{"Type":"container","Action":"start","Actor":{"ID":"abc","Attributes":{"name":"web"}}}{"Type":"network","Action":"connect","Actor":{"ID":"n1","Attributes":{}}} {"Type":"container","Act"#,
    );

    let output = dockwire(&[
        "--format",
        "pretty",
        "progress",
        "--kind",
        "events",
        "--input",
        input.to_str().unwrap(),
    ]);

    assert!(output.status.success(), "{output:?}");
    assert_eq!(
        stdout_lines(&output),
        vec![
            "[events] container start abc (web)",
            "[events] network connect n1",
        ]
    );

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn progress_decode_failure_exits_60() {
    let dir = unique_temp_dir("decode");
    let input = write_fixture(&dir, "pull.json", br#"{"status":"Pulling"}{"status":42}"#);

    let output = dockwire(&[
        "--format",
        "json",
        "progress",
        "--kind",
        "pull",
        "--input",
        input.to_str().unwrap(),
    ]);

    assert_eq!(output.status.code(), Some(60));
    assert_eq!(stdout_lines(&output).len(), 1);
    assert!(String::from_utf8_lossy(&output.stderr).contains("pull stream failed"));

    let _ = std::fs::remove_dir_all(&dir);
}
