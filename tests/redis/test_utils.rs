use std::{
    collections::VecDeque,
    io,
    net::SocketAddr,
    path::PathBuf,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
    time::Duration,
};

use redis_aof::{
    commands::{command_table, CommandRegistry},
    config::{Config, FsyncPolicy},
    server::Server,
};
use tempfile::TempDir;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWriteExt, ReadBuf},
    net::{TcpListener, TcpStream},
    task::JoinHandle,
    time::timeout,
};

/// A running server listening on a loopback port, with its append-only
/// file in a temporary directory.
pub struct TestEnv {
    pub server: Arc<Server>,
    pub address: SocketAddr,
    directory: TempDir,
    handle: JoinHandle<()>,
}

impl TestEnv {
    pub async fn start() -> Self {
        Self::start_with(command_table(), FsyncPolicy::EverySec).await
    }

    pub async fn start_with(registry: CommandRegistry, appendfsync: FsyncPolicy) -> Self {
        let directory = tempfile::tempdir().unwrap();
        let config = Self::config(directory.path().join("appendonly.aof"), appendfsync);

        let server = Arc::new(Server::with_registry(config, registry).await.unwrap());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();

        let serving = Arc::clone(&server);
        let handle = tokio::spawn(async move {
            let _ = serving.serve(listener).await;
        });

        Self {
            server,
            address,
            directory,
            handle,
        }
    }

    pub fn config(appendfilename: PathBuf, appendfsync: FsyncPolicy) -> Config {
        Config {
            addr: "127.0.0.1:0".to_string(),
            appendfilename,
            appendfsync,
            ..Config::default()
        }
    }

    pub fn aof_path(&self) -> PathBuf {
        self.directory.path().join("appendonly.aof")
    }

    pub async fn aof_contents(&self) -> Vec<u8> {
        tokio::fs::read(self.aof_path()).await.unwrap()
    }

    /// Opens a second server over the same append-only file, replaying it.
    pub async fn reopen(&self, registry: CommandRegistry) -> Server {
        let config = Self::config(self.aof_path(), FsyncPolicy::No);
        Server::with_registry(config, registry).await.unwrap()
    }

    pub async fn connect(&self) -> TcpStream {
        TcpStream::connect(self.address).await.unwrap()
    }
}

impl Drop for TestEnv {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Test utilities for talking to the server over a socket
pub struct TestUtils;

impl TestUtils {
    /// Sends raw request bytes and asserts the exact reply bytes.
    pub async fn send_and_expect(client: &mut TcpStream, request: &[u8], expected: &[u8]) {
        client.write_all(request).await.unwrap();
        client.flush().await.unwrap();

        Self::expect_reply(client, expected).await;
    }

    pub async fn expect_reply(client: &mut TcpStream, expected: &[u8]) {
        let mut reply = vec![0; expected.len()];

        timeout(Duration::from_secs(2), client.read_exact(&mut reply))
            .await
            .expect("timed out waiting for reply")
            .unwrap();

        assert_eq!(
            String::from_utf8_lossy(&reply),
            String::from_utf8_lossy(expected),
            "reply to request"
        );
    }

    /// Asserts the server closed the connection.
    pub async fn expect_closed(client: &mut TcpStream) {
        let mut buffer = [0; 64];

        let read = timeout(Duration::from_secs(2), client.read(&mut buffer))
            .await
            .expect("timed out waiting for the connection to close");

        match read {
            Ok(0) => {}
            Ok(n) => panic!(
                "expected closed connection, got {:?}",
                String::from_utf8_lossy(&buffer[..n])
            ),
            Err(e) if e.kind() == io::ErrorKind::ConnectionReset => {}
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    pub fn multibulk(arguments: &[&str]) -> Vec<u8> {
        let mut encoded = format!("*{}\r\n", arguments.len()).into_bytes();

        for argument in arguments {
            encoded.extend_from_slice(format!("${}\r\n", argument.len()).as_bytes());
            encoded.extend_from_slice(argument.as_bytes());
            encoded.extend_from_slice(b"\r\n");
        }

        encoded
    }
}

/// Delivers a byte stream in pre-cut chunks, one chunk per read.
pub struct ChunkedReader {
    chunks: VecDeque<Vec<u8>>,
}

impl ChunkedReader {
    pub fn new(data: &[u8], cuts: &[usize]) -> Self {
        let mut chunks = VecDeque::new();
        let mut start = 0;

        for &cut in cuts {
            if cut > start && cut < data.len() {
                chunks.push_back(data[start..cut].to_vec());
                start = cut;
            }
        }

        if start < data.len() {
            chunks.push_back(data[start..].to_vec());
        }

        Self { chunks }
    }
}

impl AsyncRead for ChunkedReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if let Some(mut chunk) = self.chunks.pop_front() {
            let n = chunk.len().min(buf.remaining());
            buf.put_slice(&chunk[..n]);

            if n < chunk.len() {
                self.chunks.push_front(chunk.split_off(n));
            }
        }

        Poll::Ready(Ok(()))
    }
}
