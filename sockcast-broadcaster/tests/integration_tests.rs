use sockcast_broadcaster::{
    BindOps, BroadcasterError, Endpoint, Listener, Meta, SocketServer, SocketServerOptions,
    SystemBindOps,
};
use std::io;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use tempfile::tempdir;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::net::{TcpStream, UnixStream};

async fn wait_for_clients(server: &SocketServer, expected: usize) {
    for _ in 0..100 {
        if server.client_count().await == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("expected {} connected clients", expected);
}

async fn read_line<R: AsyncRead + Unpin>(reader: &mut BufReader<R>) -> String {
    let mut line = String::new();
    tokio::time::timeout(Duration::from_secs(2), reader.read_line(&mut line))
        .await
        .expect("timed out waiting for a line")
        .unwrap();
    line
}

/// Wraps the real primitives and records which ones ran.
#[derive(Default)]
struct RecordingOps {
    calls: Mutex<Vec<&'static str>>,
}

impl BindOps for RecordingOps {
    type Listener = Listener;

    async fn probe(&self, endpoint: &Endpoint) -> io::Result<()> {
        self.calls.lock().unwrap().push("probe");
        SystemBindOps.probe(endpoint).await
    }

    async fn remove(&self, path: &Path) -> io::Result<()> {
        self.calls.lock().unwrap().push("remove");
        SystemBindOps.remove(path).await
    }

    async fn listen(&self, endpoint: &Endpoint) -> io::Result<Listener> {
        self.calls.lock().unwrap().push("listen");
        SystemBindOps.listen(endpoint).await
    }
}

#[tokio::test]
async fn test_server_lifecycle() {
    let temp_dir = tempdir().unwrap();
    let socket_path = temp_dir.path().join("test.sock");

    let server = SocketServer::new(SocketServerOptions::new(Endpoint::path(&socket_path)));

    server.start().await.unwrap();
    assert!(socket_path.exists());
    assert!(server.is_running().await);

    server.stop().await.unwrap();
    assert!(!socket_path.exists());
    assert!(!server.is_running().await);
}

#[tokio::test]
async fn test_start_twice_fails() {
    let temp_dir = tempdir().unwrap();
    let socket_path = temp_dir.path().join("twice.sock");

    let server = SocketServer::new(SocketServerOptions::new(Endpoint::path(&socket_path)));
    server.start().await.unwrap();

    assert!(matches!(server.start().await, Err(BroadcasterError::AlreadyRunning)));
    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_stale_socket_file_is_replaced() {
    let temp_dir = tempdir().unwrap();
    let socket_path = temp_dir.path().join("stale.sock");

    // A dead server leaves its socket file behind.
    drop(std::os::unix::net::UnixListener::bind(&socket_path).unwrap());
    assert!(socket_path.exists());

    let ops = RecordingOps::default();
    let server = SocketServer::new(SocketServerOptions::new(Endpoint::path(&socket_path)));
    server.start_with(&ops).await.unwrap();
    assert_eq!(*ops.calls.lock().unwrap(), vec!["probe", "remove", "listen"]);

    let client = UnixStream::connect(&socket_path).await.unwrap();
    wait_for_clients(&server, 1).await;
    drop(client);

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_live_socket_is_not_taken_over() {
    let temp_dir = tempdir().unwrap();
    let socket_path = temp_dir.path().join("live.sock");

    let first = SocketServer::new(SocketServerOptions::new(Endpoint::path(&socket_path)));
    first.start().await.unwrap();

    let second = SocketServer::new(SocketServerOptions::new(Endpoint::path(&socket_path)));
    let err = second.start().await.unwrap_err();
    assert!(matches!(err, BroadcasterError::Bind { .. }));
    drop(second);

    // The first server's socket survives and still serves. Its only
    // earlier client was the second server's probe (id 1).
    assert!(socket_path.exists());
    let client = UnixStream::connect(&socket_path).await.unwrap();
    for _ in 0..100 {
        if first.registry().ids().await == vec![2] {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(first.registry().ids().await, vec![2]);

    let mut reader = BufReader::new(client);
    first.log("info", "still here", None).await;
    assert_eq!(read_line(&mut reader).await, "info: still here. \n");

    first.stop().await.unwrap();
}

#[tokio::test]
async fn test_socket_permissions_are_owner_only() {
    use std::os::unix::fs::PermissionsExt;

    let temp_dir = tempdir().unwrap();
    let socket_path = temp_dir.path().join("perm.sock");

    let server = SocketServer::new(SocketServerOptions::new(Endpoint::path(&socket_path)));
    server.start().await.unwrap();

    let mode = std::fs::metadata(&socket_path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_broadcast_to_multiple_clients() {
    let temp_dir = tempdir().unwrap();
    let socket_path = temp_dir.path().join("multi.sock");

    let server = SocketServer::new(SocketServerOptions::new(Endpoint::path(&socket_path)));
    server.start().await.unwrap();

    let client1 = UnixStream::connect(&socket_path).await.unwrap();
    let client2 = UnixStream::connect(&socket_path).await.unwrap();
    wait_for_clients(&server, 2).await;

    let mut logged = server.subscribe_logged();
    let delivery = server
        .log("debug", "message", Some(Meta::object([("a", 123)])))
        .await;
    assert!(delivery.is_success());
    assert_eq!(delivery.targets(), 2);
    assert_eq!(logged.recv().await.unwrap().targets, 2);

    let mut reader1 = BufReader::new(client1);
    let mut reader2 = BufReader::new(client2);
    assert_eq!(read_line(&mut reader1).await, "debug: message. {a: 123}\n");
    assert_eq!(read_line(&mut reader2).await, "debug: message. {a: 123}\n");

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_disconnected_client_is_dropped_from_broadcasts() {
    let temp_dir = tempdir().unwrap();
    let socket_path = temp_dir.path().join("disconnect.sock");

    let server = SocketServer::new(SocketServerOptions::new(Endpoint::path(&socket_path)));
    server.start().await.unwrap();

    let staying = UnixStream::connect(&socket_path).await.unwrap();
    let leaving = UnixStream::connect(&socket_path).await.unwrap();
    wait_for_clients(&server, 2).await;

    drop(leaving);
    wait_for_clients(&server, 1).await;

    let delivery = server.log("debug", "message 2", None).await;
    assert_eq!(delivery.targets(), 1);
    assert!(delivery.is_success());

    let mut reader = BufReader::new(staying);
    assert_eq!(read_line(&mut reader).await, "debug: message 2. \n");

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_tcp_endpoint_skips_removal() {
    let ops = RecordingOps::default();
    let server = SocketServer::new(SocketServerOptions::new(Endpoint::tcp("127.0.0.1:0")));
    server.start_with(&ops).await.unwrap();
    assert_eq!(*ops.calls.lock().unwrap(), vec!["probe", "listen"]);

    let addr = server.local_addr().await.unwrap();
    let addr = addr.strip_prefix("tcp://").unwrap().to_string();
    let client = TcpStream::connect(addr).await.unwrap();
    wait_for_clients(&server, 1).await;

    server.log("info", "over tcp", None).await;
    let mut reader = BufReader::new(client);
    assert_eq!(read_line(&mut reader).await, "info: over tcp. \n");

    server.stop().await.unwrap();
}
