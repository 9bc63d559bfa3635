//! Test harness: a live server on an ephemeral port, hosted on a
//! background thread with its own current-thread runtime.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use bv_server::{serve, BlockStore};
use tokio::net::TcpListener;

/// A running server instance. The thread serves sessions until the test
/// process exits.
pub struct TestServer {
    /// Port the server is listening on.
    pub port: u16,
    /// The server's store directory.
    pub root: PathBuf,
}

impl TestServer {
    /// Open (or format) a store under `root` and start serving it.
    pub fn spawn(root: PathBuf) -> Self {
        let (port_tx, port_rx) = std::sync::mpsc::channel();

        let store_root = root.clone();
        std::thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("test runtime");

            runtime.block_on(async move {
                let mut store = BlockStore::open_or_format(&store_root).expect("open store");
                let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
                let port = listener.local_addr().expect("local addr").port();
                port_tx.send(port).expect("report port");

                let _ = serve(listener, &mut store).await;
            });
        });

        let port = port_rx.recv().expect("server did not start");
        Self { port, root }
    }

    pub fn data_path(&self) -> PathBuf {
        self.root.join("data")
    }

    pub fn aead_path(&self) -> PathBuf {
        self.root.join("aead")
    }

    pub fn tree_path(&self) -> PathBuf {
        self.root.join("tree")
    }
}

/// Poll `cond` until it holds or the timeout expires.
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if cond() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}
