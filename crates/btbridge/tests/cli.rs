#![cfg(all(unix, feature = "cli"))]

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use btbridge_pdu::{PduReader, PduWriter, ReceivedPdu};
use btbridge_transport::UnixSocketListener;

const AVRCP: u8 = 0x08;

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/btbcli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn wait_for_path(path: &Path, timeout: Duration) {
    let start = Instant::now();
    while !path.exists() {
        if start.elapsed() >= timeout {
            panic!("{} never appeared", path.display());
        }
        thread::sleep(Duration::from_millis(25));
    }
}

fn payload(mut pdu: ReceivedPdu) -> Vec<u8> {
    let remaining = pdu.remaining();
    pdu.take(remaining).unwrap().to_vec()
}

fn btbridge() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_btbridge"));
    command
        .env_remove("BTBRIDGE_BACKEND")
        .env_remove("BTBRIDGE_DAEMON_SOCKET")
        .arg("--log-level")
        .arg("error");
    command
}

/// Accept one client and answer every AVRCP command with `reply(opcode)`
/// until it hangs up. Returns what was received.
fn fake_daemon(
    listener: UnixSocketListener,
    reply: impl Fn(u8) -> (u8, Vec<u8>) + Send + 'static,
) -> thread::JoinHandle<Vec<(u8, u8, Vec<u8>)>> {
    thread::spawn(move || {
        let stream = listener.accept().unwrap();
        let mut reader = PduReader::new(stream.try_clone().unwrap());
        let mut writer = PduWriter::new(stream);
        let mut seen = Vec::new();
        while let Ok(pdu) = reader.read_pdu() {
            let (service, opcode) = (pdu.service(), pdu.opcode());
            seen.push((service, opcode, payload(pdu)));
            let (reply_opcode, body) = reply(opcode);
            if writer.send(service, reply_opcode, &body).is_err() {
                break;
            }
        }
        seen
    })
}

#[test]
fn set_volume_reaches_daemon_and_reports_success() {
    let dir = unique_temp_dir("volume");
    let daemon_path = dir.join("bt.sock");
    let daemon = fake_daemon(UnixSocketListener::bind(&daemon_path).unwrap(), |opcode| {
        (opcode, Vec::new())
    });

    let output = btbridge()
        .args(["--format", "json", "avrcp", "set-volume", "50", "--daemon"])
        .arg(&daemon_path)
        .output()
        .expect("set-volume should run");

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(r#""command":"set_volume","status":"success""#));
    assert_eq!(daemon.join().unwrap(), vec![(AVRCP, 0x0a, vec![50])]);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn daemon_error_response_exits_with_failure() {
    let dir = unique_temp_dir("busy");
    let daemon_path = dir.join("bt.sock");
    let daemon = fake_daemon(UnixSocketListener::bind(&daemon_path).unwrap(), |_| {
        (0x00, vec![0x04])
    });

    let output = btbridge()
        .args(["avrcp", "play-status", "--status", "paused", "--duration", "1000", "--daemon"])
        .arg(&daemon_path)
        .output()
        .expect("play-status should run");

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("get_play_status_rsp failed: busy"));
    let seen = daemon.join().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!((seen[0].0, seen[0].1), (AVRCP, 0x01));
    assert_eq!(seen[0].2[0], 0x02);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn missing_daemon_is_a_transport_error() {
    let dir = unique_temp_dir("missing");
    let output = btbridge()
        .args(["avrcp", "set-volume", "10", "--daemon"])
        .arg(dir.join("absent.sock"))
        .output()
        .expect("set-volume should run");

    assert_eq!(output.status.code(), Some(3));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn unknown_backend_is_a_usage_error() {
    let output = btbridge()
        .args(["avrcp", "set-volume", "10", "--backend", "simulator"])
        .output()
        .expect("set-volume should run");

    assert_eq!(output.status.code(), Some(64));
    assert!(String::from_utf8_lossy(&output.stderr).contains("simulator"));
}

#[test]
fn monitor_prints_notifications_until_count() {
    let dir = unique_temp_dir("monitor");
    let daemon_path = dir.join("bt.sock");
    let listener = UnixSocketListener::bind(&daemon_path).unwrap();
    let daemon = thread::spawn(move || {
        let stream = listener.accept().unwrap();
        let mut writer = PduWriter::new(stream);
        // Repeat until the monitor has its handler installed and hangs up.
        for _ in 0..100 {
            if writer.send(AVRCP, 0x8b, &[30, 13]).is_err() {
                break;
            }
            thread::sleep(Duration::from_millis(50));
        }
    });

    let output = btbridge()
        .args(["--format", "json", "monitor", "--count", "1", "--daemon"])
        .arg(&daemon_path)
        .stdin(Stdio::null())
        .output()
        .expect("monitor should run");

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(r#""notification":"volume_change""#));
    assert!(stdout.contains(r#""volume":30"#));
    daemon.join().unwrap();
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn forwarded_requests_run_in_the_serving_process() {
    let dir = unique_temp_dir("serve");
    let daemon_path = dir.join("bt.sock");
    let host_path = dir.join("host.sock");
    let daemon = fake_daemon(UnixSocketListener::bind(&daemon_path).unwrap(), |opcode| {
        (opcode, Vec::new())
    });

    let mut server = btbridge()
        .arg("serve")
        .arg(&host_path)
        .arg("--daemon")
        .arg(&daemon_path)
        .args(["--max-clients", "2"])
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .expect("serve should start");
    wait_for_path(&host_path, Duration::from_secs(3));

    let played = btbridge()
        .args(["--format", "json", "forward", "play-status"])
        .arg(&host_path)
        .args(["--status", "playing", "--duration", "1000", "--position", "10"])
        .output()
        .expect("forward play-status should run");
    assert!(played.status.success(), "stderr: {}", String::from_utf8_lossy(&played.stderr));
    assert!(String::from_utf8_lossy(&played.stdout)
        .contains(r#""command":"send_play_status","status":"success""#));

    let scanned = btbridge()
        .args(["forward", "le-scan"])
        .arg(&host_path)
        .args(["--uuid", "0000180d-0000-1000-8000-00805f9b34fb"])
        .output()
        .expect("forward le-scan should run");
    assert_eq!(scanned.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&scanned.stderr).contains("start_le_scan failed: unsupported"));

    let status = server.wait().expect("serve should exit");
    assert!(status.success());

    let seen = daemon.join().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0], (AVRCP, 0x01, vec![0x01, 0xe8, 0x03, 0, 0, 10, 0, 0, 0]));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn version_prints_package_version() {
    let output = btbridge().arg("version").output().expect("version should run");
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        format!("btbridge {}", env!("CARGO_PKG_VERSION"))
    );
}

#[test]
fn extended_version_lists_link_protocol() {
    let output = btbridge()
        .args(["version", "--extended"])
        .output()
        .expect("version should run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("name: btbridge"));
    assert!(stdout.contains("link_protocol: btbridge/1.0"));
}
