//! Configuration driving the set of running readers.

use std::io::Write;
use std::net::{TcpListener, TcpStream};
use std::path::Path;
use std::time::Duration;

use telehub::config::HubConfig;
use telehub::frame::{CodecFacts, Datacode, DecodedFrame, NodeEncoding, Value};
use telehub::hub::Hub;
use telehub::reader::{frame_queue, FrameReceiver, LoopConfig};

fn config(json: &str) -> HubConfig {
    HubConfig::parse(Path::new("test.json"), json).expect("test config should parse")
}

fn fast() -> LoopConfig {
    LoopConfig {
        tick: Duration::from_millis(2),
    }
}

fn free_port() -> u16 {
    let listener = TcpListener::bind(("127.0.0.1", 0)).expect("ephemeral bind should work");
    listener.local_addr().expect("bound address").port()
}

fn send_and_receive(port: u16, payload: &[u8], rx: &FrameReceiver) -> DecodedFrame {
    let mut stream = TcpStream::connect(("127.0.0.1", port)).expect("reader should be listening");
    stream.write_all(payload).expect("payload should be written");
    drop(stream);
    rx.recv_timeout(Duration::from_secs(5))
        .expect("frame should arrive")
}

#[test]
fn unusable_readers_are_skipped() {
    let (tx, _rx) = frame_queue();
    let mut hub = Hub::new(tx, fast());
    hub.apply(&config(
        r#"{"readers": {
            "net": {"type": "socket", "init": {"port": 0}},
            "bad": {"type": "serial", "init": {"port": "/dev/telehub-missing"}},
            "broken": {"type": "bus", "init": {"bus": "one"}},
            "idle": {"runtime": {"pause": "all"}}
        }}"#,
    ));
    assert_eq!(hub.reader_names(), vec!["net"]);
    hub.shutdown();
    assert!(hub.is_empty());
}

#[test]
fn removed_reader_is_stopped() {
    let (tx, _rx) = frame_queue();
    let mut hub = Hub::new(tx, fast());
    hub.apply(&config(
        r#"{"readers": {"a": {"type": "socket", "init": {"port": 0}},
                        "b": {"type": "socket", "init": {"port": 0}}}}"#,
    ));
    assert_eq!(hub.len(), 2);

    hub.apply(&config(r#"{"readers": {"b": {"type": "socket", "init": {"port": 0}}}}"#));
    assert_eq!(hub.reader_names(), vec!["b"]);
}

#[test]
fn node_table_follows_configuration() {
    let (tx, _rx) = frame_queue();
    let mut hub = Hub::new(tx, fast());
    hub.apply(&config(r#"{"nodes": {"5": {"datacode": "b"}}}"#));
    assert_eq!(
        hub.nodes().node_encoding(5),
        Some(NodeEncoding::Single(Datacode::I8))
    );

    hub.apply(&config(r#"{"nodes": {"6": {"datacodes": ["h", "L"]}}}"#));
    assert_eq!(hub.nodes().node_encoding(5), None);
    assert!(hub.nodes().node_encoding(6).is_some());
}

#[test]
fn runtime_settings_reach_running_reader() {
    let port = free_port();
    let (tx, rx) = frame_queue();
    let mut hub = Hub::new(tx, fast());
    let base = format!(
        r#"{{"readers": {{"net": {{"type": "socket", "init": {{"port": {port}}}}}}},
            "nodes": {{"20": {{"datacode": "H"}}}}}}"#
    );
    hub.apply(&config(&base));

    let frame = send_and_receive(port, b"20 1 1\r\n", &rx);
    assert_eq!(frame.reader, "net");
    assert_eq!(frame.values, vec![Value::Int(257)]);

    let timestamped = format!(
        r#"{{"readers": {{"net": {{"type": "socket", "init": {{"port": {port}}},
                                   "runtime": {{"timestamped": true}}}}}}}}"#
    );
    hub.apply(&config(&timestamped));
    assert_eq!(hub.reader_names(), vec!["net"]);
    // Settings are applied at the loop's next iteration boundary.
    std::thread::sleep(Duration::from_millis(50));

    let frame = send_and_receive(port, b"1600000000 20 1 1\r\n", &rx);
    assert_eq!(frame.timestamp, 1_600_000_000.0);
    // The node table entry was dropped with the reload.
    assert_eq!(frame.values, vec![Value::Int(1), Value::Int(1)]);
    hub.shutdown();
}
