//! Shared harness for integration tests: a real server on an ephemeral port.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use quotes::{api, Outcome, Router, Server, SharedStore, SqliteStore};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub struct TestServer {
    pub addr: SocketAddr,
    stop: Option<oneshot::Sender<()>>,
    handle: JoinHandle<Outcome>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Simulates the termination signal without waiting for the outcome.
    pub fn signal(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }

    /// Signals (if not done yet) and waits for the server to finish.
    pub async fn shutdown(mut self) -> Outcome {
        self.signal();
        self.handle.await.expect("server task panicked")
    }
}

pub async fn bind() -> Server {
    Server::bind("127.0.0.1:0").await.expect("bind ephemeral port")
}

pub async fn spawn(router: Router, grace: Duration) -> TestServer {
    spawn_server(bind().await.grace_period(grace), router)
}

pub fn spawn_server(server: Server, router: Router) -> TestServer {
    let addr = server.local_addr();
    let (tx, rx) = oneshot::channel::<()>();

    let handle = tokio::spawn(async move {
        server
            .serve_with_shutdown(router, async {
                let _ = rx.await;
            })
            .await
    });

    TestServer { addr, stop: Some(tx), handle }
}

#[allow(dead_code)]
pub fn memory_store() -> SharedStore {
    Arc::new(SqliteStore::in_memory().expect("open in-memory sqlite"))
}

#[allow(dead_code)]
pub async fn spawn_api(store: SharedStore) -> TestServer {
    spawn(api::routes(store), Duration::from_secs(5)).await
}

#[allow(dead_code)]
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(10))
        .build()
        .expect("build http client")
}
