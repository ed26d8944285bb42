#![cfg(unix)]

use std::path::PathBuf;
use std::time::Duration;

use flowd_adapter::{Adapter, AdapterConfig, AdapterError, RetryPolicy, RunOutcome};
use flowd_frame::{FlowdCodec, Frame};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};

const STEP: Duration = Duration::from_secs(10);

fn temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/flowd-adapter-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("probe bind");
    listener.local_addr().expect("probe addr").port()
}

fn quick_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 200,
        delay: Duration::from_millis(25),
        warn_after: 100,
    }
}

type RunTask = JoinHandle<flowd_adapter::Result<RunOutcome>>;

/// Start the adapter and return the bound input ports plus the run task.
async fn launch(config: AdapterConfig) -> (Vec<u16>, RunTask) {
    let wiring = Adapter::new(config).start().await.expect("adapter should start");
    let ports = wiring
        .bound_inputs()
        .iter()
        .filter_map(|input| input.address.port())
        .collect();
    (ports, tokio::spawn(wiring.run()))
}

async fn accept_output(listener: &TcpListener) -> FramedRead<TcpStream, FlowdCodec> {
    let (stream, _) = tokio::time::timeout(STEP, listener.accept())
        .await
        .expect("adapter should dial the output in time")
        .expect("accept should succeed");
    FramedRead::new(stream, FlowdCodec::new())
}

async fn connect_input(port: u16) -> FramedWrite<TcpStream, FlowdCodec> {
    let stream = TcpStream::connect(("127.0.0.1", port))
        .await
        .expect("input should accept");
    FramedWrite::new(stream, FlowdCodec::new())
}

async fn next_frame(frames: &mut FramedRead<TcpStream, FlowdCodec>) -> Frame {
    tokio::time::timeout(STEP, frames.next())
        .await
        .expect("frame should arrive in time")
        .expect("stream should not end")
        .expect("frame should decode")
}

async fn finish(run: RunTask) -> flowd_adapter::Result<RunOutcome> {
    tokio::time::timeout(STEP, run)
        .await
        .expect("adapter should stop in time")
        .expect("adapter task should not panic")
}

#[tokio::test]
async fn frames_flow_in_order_with_port_rewrite() {
    let out = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let out_port = out.local_addr().unwrap().port();
    let mut config = AdapterConfig::new(["cat"])
        .with_input("tcp://127.0.0.1:0#in")
        .with_output(format!("tcp://127.0.0.1:{out_port}#in>b"));
    config.retry = quick_retry();

    let (ports, run) = launch(config).await;
    let mut output = accept_output(&out).await;
    let mut input = connect_input(ports[0]).await;

    for i in 0..25 {
        input
            .send(Frame::data("Seq", "in", format!("msg-{i}")))
            .await
            .expect("send should succeed");
    }
    for i in 0..25 {
        let frame = next_frame(&mut output).await;
        assert_eq!(frame.port, "b");
        assert_eq!(frame.body.as_ref(), format!("msg-{i}").as_bytes());
    }

    // Closing the only (ephemeral) input ends stdin, so cat exits.
    drop(input);
    let outcome = finish(run).await.expect("adapter should succeed");
    assert_eq!(outcome.code(), Some(0));
    assert!(output.next().await.is_none(), "output closed at shutdown");
}

#[tokio::test]
async fn wrong_port_frames_are_dropped() {
    let out = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let out_port = out.local_addr().unwrap().port();
    let mut config = AdapterConfig::new(["cat"])
        .with_input("tcp://127.0.0.1:0#in")
        .with_output(format!("tcp://127.0.0.1:{out_port}#in"));
    config.retry = quick_retry();

    let (ports, run) = launch(config).await;
    let mut output = accept_output(&out).await;
    let mut input = connect_input(ports[0]).await;

    input.send(Frame::data("X", "in", "first")).await.unwrap();
    input.send(Frame::data("X", "elsewhere", "stray")).await.unwrap();
    input.send(Frame::data("X", "in", "second")).await.unwrap();

    assert_eq!(next_frame(&mut output).await.body.as_ref(), b"first");
    assert_eq!(next_frame(&mut output).await.body.as_ref(), b"second");

    drop(input);
    finish(run).await.expect("adapter should succeed");
}

#[tokio::test]
async fn initial_packet_precedes_network_frames() {
    let out = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let out_port = out.local_addr().unwrap().port();
    let mut config = AdapterConfig::new(["cat"])
        .with_input("tcp://127.0.0.1:0#in")
        .with_output(format!("tcp://127.0.0.1:{out_port}#in"))
        .with_iip("in:configured");
    config.retry = quick_retry();

    let (ports, run) = launch(config).await;
    let mut output = accept_output(&out).await;
    let mut input = connect_input(ports[0]).await;
    input.send(Frame::data("X", "in", "network")).await.unwrap();

    let first = next_frame(&mut output).await;
    assert!(first.is_iip());
    assert_eq!(first.body.as_ref(), b"configured");
    let second = next_frame(&mut output).await;
    assert_eq!(second.body.as_ref(), b"network");

    drop(input);
    finish(run).await.expect("adapter should succeed");
}

#[tokio::test]
async fn large_initial_packets_reach_an_echoing_component() {
    let out = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let out_port = out.local_addr().unwrap().port();
    let payloads: Vec<String> = (0..4)
        .map(|i| format!("{i}{}", "x".repeat(120 * 1024)))
        .collect();
    let mut config = AdapterConfig::new(["cat"])
        .with_output(format!("tcp://127.0.0.1:{out_port}#CONF"));
    for payload in &payloads {
        config = config.with_iip(format!("CONF:{payload}"));
    }
    config.retry = quick_retry();

    let (_, run) = launch(config).await;
    let mut output = accept_output(&out).await;
    for payload in &payloads {
        let frame = next_frame(&mut output).await;
        assert!(frame.is_iip());
        assert_eq!(frame.port, "CONF");
        assert_eq!(frame.body.as_ref(), payload.as_bytes());
    }

    // No inputs: stdin closes after the IIPs, so cat exits on its own.
    let outcome = finish(run).await.expect("adapter should succeed");
    assert_eq!(outcome.code(), Some(0));
}

#[tokio::test]
async fn unroutable_frame_stops_adapter() {
    let out = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let out_port = out.local_addr().unwrap().port();
    let mut config = AdapterConfig::new(["cat"])
        .with_input("tcp://127.0.0.1:0#in")
        .with_output(format!("tcp://127.0.0.1:{out_port}#other"));
    config.retry = quick_retry();

    let (ports, run) = launch(config).await;
    let mut output = accept_output(&out).await;
    let mut input = connect_input(ports[0]).await;
    input.send(Frame::data("X", "in", "nowhere")).await.unwrap();

    let err = finish(run).await.expect_err("adapter should fail");
    assert!(matches!(err, AdapterError::UnroutableFrame(ref port) if port == "in"));
    let end = tokio::time::timeout(STEP, output.next())
        .await
        .expect("output should close in time");
    assert!(end.is_none(), "output connection closed");
}

#[tokio::test]
async fn fixed_port_input_relistens_after_disconnect() {
    let out = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let out_port = out.local_addr().unwrap().port();
    let in_port = free_port();
    let mut config = AdapterConfig::new(["cat"])
        .with_input(format!("tcp://127.0.0.1:{in_port}#in"))
        .with_output(format!("tcp://127.0.0.1:{out_port}#in"));
    config.retry = quick_retry();

    let (_, run) = launch(config).await;
    let mut output = accept_output(&out).await;

    let mut first = connect_input(in_port).await;
    first.send(Frame::data("X", "in", "from-first")).await.unwrap();
    assert_eq!(next_frame(&mut output).await.body.as_ref(), b"from-first");
    drop(first);

    let mut second = None;
    for _ in 0..100 {
        match TcpStream::connect(("127.0.0.1", in_port)).await {
            Ok(stream) => {
                second = Some(FramedWrite::new(stream, FlowdCodec::new()));
                break;
            }
            Err(_) => tokio::time::sleep(Duration::from_millis(20)).await,
        }
    }
    let mut second = second.expect("input should listen again");
    second.send(Frame::data("X", "in", "from-second")).await.unwrap();
    assert_eq!(next_frame(&mut output).await.body.as_ref(), b"from-second");

    run.abort();
}

#[tokio::test]
async fn ephemeral_input_does_not_relisten() {
    let out = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let out_port = out.local_addr().unwrap().port();
    // Keep the component alive after its stdin closes.
    let mut config = AdapterConfig::new(["sh", "-c", "cat; sleep 5"])
        .with_input("tcp://127.0.0.1:0#in")
        .with_output(format!("tcp://127.0.0.1:{out_port}#in"));
    config.retry = quick_retry();

    let (ports, run) = launch(config).await;
    let mut output = accept_output(&out).await;
    let mut input = connect_input(ports[0]).await;
    input.send(Frame::data("X", "in", "once")).await.unwrap();
    assert_eq!(next_frame(&mut output).await.body.as_ref(), b"once");
    drop(input);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(
        TcpStream::connect(("127.0.0.1", ports[0])).await.is_err(),
        "ephemeral input must not accept a second peer"
    );
    assert!(!run.is_finished());
    run.abort();
}

#[tokio::test]
async fn subprocess_waits_for_slow_output() {
    let dir = temp_dir("barrier");
    let marker = dir.join("started");
    let out_port = free_port();
    let mut config = AdapterConfig::new([
        "sh".to_string(),
        "-c".to_string(),
        "touch \"$0\"; exec cat".to_string(),
        marker.display().to_string(),
    ])
    .with_output(format!("tcp://127.0.0.1:{out_port}#out"));
    config.retry = quick_retry();

    let (_, run) = launch(config).await;
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(!marker.exists(), "subprocess must not start before outputs connect");

    let out = TcpListener::bind(("127.0.0.1", out_port)).await.unwrap();
    let _output = accept_output(&out).await;

    let mut started = false;
    for _ in 0..250 {
        if marker.exists() {
            started = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(started, "subprocess should start once every endpoint is up");

    // No inputs: stdin closes right away and cat exits.
    finish(run).await.expect("adapter should succeed");
    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn ready_timeout_names_pending_output() {
    let mut config = AdapterConfig::new(["cat"])
        .with_output(format!("tcp://127.0.0.1:{}#out", free_port()));
    config.retry = quick_retry();
    config.ready_timeout = Some(Duration::from_millis(200));

    let err = Adapter::new(config).run().await.expect_err("barrier should time out");
    match err {
        AdapterError::ReadyTimeout { pending, .. } => assert_eq!(pending, ["output out"]),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn dial_gives_up_after_policy() {
    let mut config = AdapterConfig::new(["cat"])
        .with_output(format!("tcp://127.0.0.1:{}#out", free_port()));
    config.retry = RetryPolicy {
        max_attempts: 3,
        delay: Duration::from_millis(10),
        warn_after: 1,
    };

    let err = Adapter::new(config).run().await.expect_err("dial should give up");
    assert!(matches!(
        err,
        AdapterError::DialExhausted { ref port, attempts: 3, .. } if port == "out"
    ));
}

#[tokio::test]
async fn configuration_errors_surface_at_start() {
    let config = AdapterConfig::new(["cat"]).with_input("tcp://127.0.0.1:0");
    assert!(matches!(
        Adapter::new(config).start().await,
        Err(AdapterError::Config(_))
    ));

    let config = AdapterConfig::default().with_input("tcp://127.0.0.1:0#in");
    assert!(matches!(
        Adapter::new(config).start().await,
        Err(AdapterError::Config(_))
    ));
}

#[tokio::test]
async fn subprocess_exit_code_is_reported() {
    let config = AdapterConfig::new(["sh", "-c", "exit 7"]);
    let outcome = Adapter::new(config).run().await.expect("run should succeed");
    assert_eq!(outcome.code(), Some(7));
}

#[tokio::test]
async fn missing_program_is_a_spawn_error() {
    let config = AdapterConfig::new(["/nonexistent/flowd-component"]);
    assert!(matches!(
        Adapter::new(config).run().await,
        Err(AdapterError::Spawn { .. })
    ));
}

#[tokio::test]
async fn unix_socket_input() {
    let dir = temp_dir("unix");
    let sock = dir.join("in.sock");
    let out = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let out_port = out.local_addr().unwrap().port();
    let mut config = AdapterConfig::new(["cat"])
        .with_input(format!("unix://{}#in", sock.display()))
        .with_output(format!("tcp://127.0.0.1:{out_port}#in>next"));
    config.retry = quick_retry();

    let (_, run) = launch(config).await;
    let mut output = accept_output(&out).await;
    let stream = tokio::net::UnixStream::connect(&sock).await.unwrap();
    let mut input = FramedWrite::new(stream, FlowdCodec::new());
    input.send(Frame::data("X", "in", "over unix")).await.unwrap();

    let frame = next_frame(&mut output).await;
    assert_eq!(frame.port, "next");
    assert_eq!(frame.body.as_ref(), b"over unix");

    run.abort();
    let _ = run.await;
    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn unix_path_input_relistens_after_disconnect() {
    let dir = temp_dir("unix-relisten");
    let sock = dir.join("in.sock");
    let out = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let out_port = out.local_addr().unwrap().port();
    let mut config = AdapterConfig::new(["cat"])
        .with_input(format!("unix://{}#in", sock.display()))
        .with_output(format!("tcp://127.0.0.1:{out_port}#in"));
    config.retry = quick_retry();

    let (_, run) = launch(config).await;
    let mut output = accept_output(&out).await;

    for round in 0..2 {
        let mut stream = None;
        for _ in 0..100 {
            match tokio::net::UnixStream::connect(&sock).await {
                Ok(s) => {
                    stream = Some(s);
                    break;
                }
                Err(_) => tokio::time::sleep(Duration::from_millis(20)).await,
            }
        }
        let stream = stream.expect("unix input should be listening");
        let mut input = FramedWrite::new(stream, FlowdCodec::new());
        let body = format!("r{round}");
        input.send(Frame::data("X", "in", body.clone())).await.unwrap();
        assert_eq!(next_frame(&mut output).await.body.as_ref(), body.as_bytes());
        drop(input);
    }

    run.abort();
    let _ = run.await;
    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn malformed_input_closes_only_that_endpoint() {
    let out_a = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let out_b = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let mut config = AdapterConfig::new(["cat"])
        .with_input("tcp://127.0.0.1:0#a")
        .with_input("tcp://127.0.0.1:0#b")
        .with_output(format!("tcp://127.0.0.1:{}#a", out_a.local_addr().unwrap().port()))
        .with_output(format!("tcp://127.0.0.1:{}#b", out_b.local_addr().unwrap().port()));
    config.retry = quick_retry();

    let (ports, run) = launch(config).await;
    // Output dials run concurrently; accept both.
    let (_output_a, mut output_b) = tokio::join!(accept_output(&out_a), accept_output(&out_b));

    let mut bad = TcpStream::connect(("127.0.0.1", ports[0])).await.unwrap();
    let mut good = connect_input(ports[1]).await;
    bad.write_all(b"this is not a frame\r\n\r\n").await.unwrap();

    // The adapter drops the bad peer.
    let mut buf = [0u8; 1];
    let read = tokio::time::timeout(STEP, bad.read(&mut buf)).await.unwrap();
    assert!(matches!(read, Ok(0) | Err(_)));

    good.send(Frame::data("X", "b", "still flowing")).await.unwrap();
    assert_eq!(next_frame(&mut output_b).await.body.as_ref(), b"still flowing");

    run.abort();
}

#[tokio::test]
async fn raw_mode_copies_bytes() {
    let out = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let out_port = out.local_addr().unwrap().port();
    let mut config = AdapterConfig::new(["cat"])
        .with_input("tcp://127.0.0.1:0#in")
        .with_output(format!("tcp://127.0.0.1:{out_port}#out"));
    config.retry = quick_retry();
    config.in_framing = false;
    config.out_framing = false;

    let (ports, run) = launch(config).await;
    let (mut output, _) = tokio::time::timeout(STEP, out.accept()).await.unwrap().unwrap();
    let mut input = TcpStream::connect(("127.0.0.1", ports[0])).await.unwrap();
    input.write_all(b"unframed bytes").await.unwrap();
    drop(input);

    let mut received = Vec::new();
    tokio::time::timeout(STEP, output.read_to_end(&mut received))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(received, b"unframed bytes");
    finish(run).await.expect("adapter should succeed");
}
