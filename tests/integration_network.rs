//! Integration tests for the TCP line transport

use slabcache::command::CommandProcessor;
use slabcache::network::{LineServer, END_MARKER};
use slabcache::{CacheConfig, ServerConfig, SlabCache};
use std::net::SocketAddr;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{timeout, Duration};

/// Helper to start a test server on a random port
async fn start_test_server(name: &str) -> (SlabCache, SocketAddr) {
    let cache = SlabCache::from_config(CacheConfig::new(name, 64)).expect("Failed to open cache");
    let processor = CommandProcessor::new(cache.clone());

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("No local addr");

    let config = ServerConfig {
        bind_addr: addr,
        max_connections: 10,
    };
    let server = LineServer::new(config, processor);

    tokio::spawn(async move {
        let _ = server.serve_on(listener).await;
    });

    (cache, addr)
}

struct Client {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Client {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = timeout(Duration::from_secs(1), TcpStream::connect(addr))
            .await
            .expect("Connect timed out")
            .expect("Failed to connect");
        let (reader, writer) = stream.into_split();
        Self {
            reader: BufReader::new(reader),
            writer,
        }
    }

    async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{}\n", line).as_bytes())
            .await
            .expect("Failed to write");
    }

    async fn read_line(&mut self) -> String {
        let mut line = String::new();
        timeout(Duration::from_secs(1), self.reader.read_line(&mut line))
            .await
            .expect("Read timed out")
            .expect("Failed to read");
        line.trim_end().to_string()
    }

    async fn request(&mut self, line: &str) -> String {
        self.send(line).await;
        self.read_line().await
    }

    async fn request_block(&mut self, line: &str) -> Vec<String> {
        self.send(line).await;
        let mut lines = Vec::new();
        loop {
            let line = self.read_line().await;
            if line == END_MARKER {
                break;
            }
            lines.push(line);
        }
        lines
    }
}

#[tokio::test]
async fn test_commands_over_tcp() {
    let (_cache, addr) = start_test_server("tcp_commands").await;
    let mut client = Client::connect(addr).await;

    assert_eq!(client.request("alloc object_one").await, "OK 0");
    assert_eq!(client.request("alloc object two").await, "OK 1");
    assert_eq!(client.request("access 1").await, "OK 1");
    assert_eq!(client.request("free 0").await, "OK freed 0");
    assert_eq!(client.request("free 0").await, "ERR not_found: Object 0 not found");
    assert_eq!(client.request("free zero").await, "ERR parse: invalid id");
    assert_eq!(client.request("launch").await, "ERR parse: unknown command");

    let report = client.request_block("stats").await;
    assert_eq!(report[0], "Slab Cache Statistics");
    assert!(report.contains(&"Currently active: 1".to_string()));
    assert!(report.iter().any(|l| l.starts_with("  [1] data='object two'")));

    assert_eq!(client.request("freeall").await, "OK freed 1");
}

#[tokio::test]
async fn test_clients_share_one_cache() {
    let (cache, addr) = start_test_server("tcp_shared").await;

    let mut first = Client::connect(addr).await;
    let mut second = Client::connect(addr).await;

    assert_eq!(first.request("alloc from_first").await, "OK 0");
    assert_eq!(second.request("alloc from_second").await, "OK 1");
    assert_eq!(second.request("access 0").await, "OK 1");
    assert_eq!(first.request("free 1").await, "OK freed 1");

    let stats = cache.stats().expect("stats failed");
    assert_eq!(stats.total_allocated, 2);
    assert_eq!(stats.total_freed, 1);
}

#[tokio::test]
async fn test_concurrent_clients_get_unique_ids() {
    let (cache, addr) = start_test_server("tcp_concurrent").await;

    let mut tasks = Vec::new();
    for t in 0..4 {
        tasks.push(tokio::spawn(async move {
            let mut client = Client::connect(addr).await;
            let mut ids = Vec::new();
            for i in 0..25 {
                let reply = client.request(&format!("alloc c{}-{}", t, i)).await;
                let id: u64 = reply
                    .strip_prefix("OK ")
                    .and_then(|s| s.parse().ok())
                    .expect("Expected OK <id>");
                ids.push(id);
            }
            ids
        }));
    }

    let mut all = Vec::new();
    for task in tasks {
        all.extend(task.await.expect("client task panicked"));
    }
    all.sort_unstable();
    all.dedup();
    assert_eq!(all.len(), 100);
    assert_eq!(cache.stats().expect("stats failed").active_count, 100);
}

#[tokio::test]
async fn test_quit_closes_connection() {
    let (_cache, addr) = start_test_server("tcp_quit").await;
    let mut client = Client::connect(addr).await;

    assert_eq!(client.request("alloc a").await, "OK 0");
    client.send("quit").await;

    let mut rest = String::new();
    let read = timeout(Duration::from_secs(1), client.reader.read_line(&mut rest))
        .await
        .expect("Read timed out")
        .expect("Failed to read");
    assert_eq!(read, 0);
}
