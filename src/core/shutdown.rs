use tokio::signal;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Interrupt {
    CtrlC,
    Terminate,
}

/// Resolves on Ctrl+C or SIGTERM, saying which one arrived.
pub(crate) async fn interrupt_signal() -> Interrupt {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let interrupt = tokio::select! {
        _ = ctrl_c => Interrupt::CtrlC,
        _ = terminate => Interrupt::Terminate,
    };

    tracing::info!(?interrupt, "interrupt received");
    interrupt
}

/// Spawns a watcher that forwards every interrupt until the receiver is dropped.
pub(crate) fn interrupts() -> mpsc::UnboundedReceiver<Interrupt> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                interrupt = interrupt_signal() => {
                    if tx.send(interrupt).is_err() {
                        break;
                    }
                }
                _ = tx.closed() => break,
            }
        }
        tracing::debug!("interrupt watcher stopped");
    });
    rx
}
