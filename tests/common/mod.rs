#![allow(dead_code)]

use solar_relay::ws::{create_router, AppState, Hub};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub struct TestServer {
    pub addr: SocketAddr,
    pub hub: Arc<Hub>,
    pub state: Arc<AppState>,
    pub shutdown: watch::Sender<bool>,
    pub static_dir: PathBuf,
    remove_static_dir: bool,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
        if self.remove_static_dir {
            std::fs::remove_dir_all(&self.static_dir).ok();
        }
    }
}

/// Creates a static directory holding a minimal root document
pub fn create_static_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "solar-relay-test-{}-{}-{}",
        tag,
        std::process::id(),
        uuid::Uuid::new_v4()
    ));
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("index.html"), "<html><body>dashboard</body></html>").unwrap();
    dir
}

/// Starts the relay router on an ephemeral port
pub async fn spawn_server(max_connections: usize) -> TestServer {
    spawn_server_with_assets(max_connections, create_static_dir("server"), true).await
}

/// Starts the relay router serving the dashboard shipped in `frontend/`
pub async fn spawn_server_with_frontend() -> TestServer {
    let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("frontend");
    spawn_server_with_assets(10, dir, false).await
}

async fn spawn_server_with_assets(
    max_connections: usize,
    static_dir: PathBuf,
    remove_static_dir: bool,
) -> TestServer {
    let hub = Arc::new(Hub::default());
    let (shutdown, shutdown_rx) = watch::channel(false);

    let state = Arc::new(AppState::new(hub.clone(), max_connections, shutdown_rx));
    let app = create_router(state.clone(), &static_dir);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer {
        addr,
        hub,
        state,
        shutdown,
        static_dir,
        remove_static_dir,
        handle,
    }
}

/// Waits until the hub reports the expected number of sessions
pub async fn wait_for_sessions(hub: &Hub, expected: usize) {
    for _ in 0..100 {
        if hub.session_count() == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "expected {} sessions, hub has {}",
        expected,
        hub.session_count()
    );
}
