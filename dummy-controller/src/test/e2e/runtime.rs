use std::{thread::JoinHandle, time::Duration};

use clap::Parser;
use rama::{error::BoxError, net::address::SocketAddress};
use tokio::sync::oneshot;

use crate::Args;

/// A dummy controller running on its own thread,
/// bound to a random loopback port.
pub(super) struct Runtime {
    addr: SocketAddress,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<Result<(), BoxError>>>,
}

impl Runtime {
    #[inline(always)]
    pub fn addr(&self) -> SocketAddress {
        self.addr
    }

    #[inline(always)]
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// Trigger the shutdown signal, as SIGTERM would,
    /// and wait for the controller to exit.
    pub async fn shutdown(mut self) -> Result<(), BoxError> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        let handle = self.handle.take().unwrap();
        tokio::task::spawn_blocking(move || handle.join().unwrap())
            .await
            .unwrap()
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

pub(super) fn args(extra_args: &[&str]) -> Args {
    let mut argv: Vec<&str> = vec![crate::utils::env::project_name(), "--graceful", "0.42"];
    if !extra_args.contains(&"--bind") {
        argv.extend(["--bind", "127.0.0.1:0"]);
    }
    argv.extend(extra_args);
    Args::try_parse_from(argv).unwrap()
}

pub(super) async fn spawn_with_args(extra_args: &[&str]) -> Runtime {
    let args = args(extra_args);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let (addr_tx, addr_rx) = oneshot::channel();

    let handle = std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let shutdown_signal = async move {
            let _ = shutdown_rx.await;
        };
        rt.block_on(crate::run_with_args(shutdown_signal, args, Some(addr_tx)))
    });

    let addr = tokio::time::timeout(Duration::from_secs(30), addr_rx)
        .await
        .unwrap()
        .unwrap();
    assert!(addr.ip_addr.is_loopback());

    Runtime {
        addr,
        shutdown_tx: Some(shutdown_tx),
        handle: Some(handle),
    }
}

/// Run the controller in-place, expecting it to fail before it serves.
pub(super) async fn run_expect_startup_error(extra_args: &[&str]) -> BoxError {
    let args = args(extra_args);
    let (addr_tx, addr_rx) = oneshot::channel();

    let err = crate::run_with_args(std::future::pending::<()>(), args, Some(addr_tx))
        .await
        .unwrap_err();

    // never bound, so the address was never published
    assert!(addr_rx.await.is_err());

    err
}
