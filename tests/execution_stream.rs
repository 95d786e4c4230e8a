use std::net::SocketAddr;
use std::time::Duration;

use ags_client::client::SandboxClient;
use ags_client::config::{AgsConfig, E2bConfig};
use ags_client::AgsError;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

const FIRST: &str = "{\"type\":\"stdout\",\"text\":\"step 1\"}\n";
const SECOND: &str = "{\"type\":\"stdout\",\"text\":\"step 2\"}\n";

/// How the server ends the response after the first line.
#[derive(Clone, Copy)]
enum Ending {
    /// Pause, send the second line, close the chunked body properly
    SlowSecondLine(Duration),
    /// Drop the connection in the middle of the body
    Abort,
}

async fn read_request(socket: &mut TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = socket.read(&mut chunk).await.unwrap();
        assert!(n > 0, "client closed before sending a request");
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_lowercase();
    let content_length = head
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .map(|v| v.trim().parse::<usize>().unwrap())
        .unwrap_or(0);
    while buf.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

fn chunk(line: &str) -> String {
    format!("{:x}\r\n{}\r\n", line.len(), line)
}

async fn streaming_server(ending: Ending) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        read_request(&mut socket).await;

        socket
            .write_all(
                b"HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ntransfer-encoding: chunked\r\nconnection: close\r\n\r\n",
            )
            .await
            .unwrap();
        socket.write_all(chunk(FIRST).as_bytes()).await.unwrap();
        socket.flush().await.unwrap();

        match ending {
            Ending::SlowSecondLine(pause) => {
                tokio::time::sleep(pause).await;
                socket.write_all(chunk(SECOND).as_bytes()).await.unwrap();
                socket.write_all(b"0\r\n\r\n").await.unwrap();
                socket.flush().await.unwrap();
            }
            Ending::Abort => {
                // Promise a chunk, deliver half of it, then hang up
                socket.write_all(b"40\r\n{\"type\":").await.unwrap();
                socket.flush().await.unwrap();
            }
        }
        let _ = socket.shutdown().await;
    });

    addr
}

fn client_for(addr: SocketAddr) -> SandboxClient {
    let url = format!("http://{}", addr);
    let mut config = AgsConfig {
        backend: "e2b".to_string(),
        e2b: E2bConfig {
            api_key: "test-key".to_string(),
            api_url: Some(url.clone()),
            execute_url: Some(url),
            ..E2bConfig::default()
        },
        ..AgsConfig::default()
    };
    config.http.timeout_seconds = 1;
    SandboxClient::from_config(&config).unwrap()
}

#[tokio::test]
async fn long_running_execution_outlives_request_timeout() {
    let addr = streaming_server(Ending::SlowSecondLine(Duration::from_millis(1500))).await;
    let client = client_for(addr);

    let result = client
        .execute("sbx-1", "import time; print(1); time.sleep(1.5); print(2)", "python")
        .await
        .unwrap();

    assert_eq!(result.stdout, vec!["step 1", "step 2"]);
    assert!(result.error.is_none());
}

#[tokio::test]
async fn broken_stream_fails_with_partial_output() {
    let addr = streaming_server(Ending::Abort).await;
    let client = client_for(addr);

    let err = client.execute("sbx-1", "print(1)", "python").await.unwrap_err();

    assert!(matches!(err.root(), AgsError::StreamInterrupted { .. }));
    assert!(err.to_string().starts_with("failed to execute code: "));
    let partial = err.partial_output().unwrap();
    assert_eq!(partial.stdout, vec!["step 1"]);
}
