//! Cancellation flag fed by an arbitrary shutdown future.

use std::future::Future;

use tokio::sync::watch;

/// Cloneable view of a one-way "stop" flag.
///
/// The flag flips once the signal future given to [`Shutdown::on`] completes
/// and stays set.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    /// Sets the flag when `signal` resolves.
    ///
    /// Must be called within a Tokio runtime.
    pub fn on<F>(signal: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (tx, rx) = watch::channel(false);
        tokio::spawn(async move {
            signal.await;
            let _ = tx.send(true);
        });
        Self { rx }
    }

    /// A flag that never flips.
    pub fn never() -> Self {
        Self::on(std::future::pending())
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the flag is set.
    pub async fn triggered(&mut self) {
        if self.rx.wait_for(|stop| *stop).await.is_err() {
            // Signal task gone without firing
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_flag_flips_on_signal() {
        let (tx, rx) = oneshot::channel::<()>();
        let mut shutdown = Shutdown::on(async move {
            let _ = rx.await;
        });
        assert!(!shutdown.is_triggered());

        tx.send(()).unwrap();
        shutdown.triggered().await;

        assert!(shutdown.is_triggered());
        assert!(shutdown.clone().is_triggered());
    }

    #[tokio::test]
    async fn test_never_stays_clear() {
        let mut shutdown = Shutdown::never();

        let waited = tokio::time::timeout(Duration::from_millis(20), shutdown.triggered()).await;

        assert!(waited.is_err());
        assert!(!shutdown.is_triggered());
    }
}
