use tokio::sync::watch;

/// Resolve once shutdown has been requested
///
/// A dropped sender never resolves this, so a receiver whose owner went away
/// keeps running until something else stops it.
pub async fn wait_for_shutdown(shutdown_rx: &mut watch::Receiver<bool>) {
    let closed = shutdown_rx.wait_for(|stop| *stop).await.is_err();
    if closed {
        std::future::pending::<()>().await;
    }
}

pub fn is_shutdown(shutdown_rx: &watch::Receiver<bool>) -> bool {
    *shutdown_rx.borrow()
}
