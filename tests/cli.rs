use std::io::{ErrorKind, Write};
use std::net::TcpListener;
use std::process::Command;

fn flvcast() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_flvcast"));
    command.env("RUST_LOG", "off");
    command
}

#[test]
fn test_bad_signature_fails_before_connecting() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let port = listener.local_addr().unwrap().port();

    let mut input = tempfile::NamedTempFile::new().unwrap();
    input.write_all(b"NOT AN FLV FILE AT ALL").unwrap();
    input.flush().unwrap();

    let status = flvcast()
        .arg(input.path())
        .arg(format!("rtmp://127.0.0.1:{port}/live/test"))
        .status()
        .unwrap();
    assert!(!status.success());

    match listener.accept() {
        Err(e) => assert_eq!(e.kind(), ErrorKind::WouldBlock),
        Ok(_) => panic!("a rejected input must not open a connection"),
    }
}

#[test]
fn test_missing_input_fails() {
    let status = flvcast()
        .arg("/nonexistent/input.flv")
        .arg("rtmp://127.0.0.1:1/live/test")
        .status()
        .unwrap();
    assert!(!status.success());
}

#[test]
fn test_wrong_argument_count_fails() {
    let output = flvcast().arg("only-one-argument.flv").output().unwrap();
    assert!(!output.status.success());
    assert!(!output.stderr.is_empty());
}

#[cfg(feature = "ffmpeg")]
#[test]
fn test_generators_reject_zero_rates() {
    let cases: [(&str, &[&str]); 3] = [
        (env!("CARGO_BIN_EXE_testpattern"), &["--fps", "0"]),
        (env!("CARGO_BIN_EXE_waveform"), &["--fps", "0"]),
        (env!("CARGO_BIN_EXE_waveform"), &["--sample-rate", "0"]),
    ];
    for (binary, args) in cases {
        let output = Command::new(binary)
            .env("RUST_LOG", "off")
            .arg("rtmp://127.0.0.1:1/live/test")
            .args(args)
            .output()
            .unwrap();
        // usage errors exit with 2 before any encoder or socket is opened
        assert_eq!(output.status.code(), Some(2), "{binary} {args:?}");
        assert!(String::from_utf8_lossy(&output.stderr).contains(args[0]));
    }
}
