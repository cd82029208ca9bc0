use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicIsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use waitgroup::WaitGroup;

use crate::error::{Error, Result};

/// One queued action. Applying a description and starting transports
/// happen as operations so they execute serially, in order, off the
/// caller's task.
pub(crate) struct Operation(
    pub Box<dyn (FnMut() -> Pin<Box<dyn Future<Output = ()> + Send + 'static>>) + Send + Sync>,
);

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation").finish()
    }
}

/// Operations is a serialized task executor.
pub(crate) struct Operations {
    length: Arc<AtomicIsize>,
    ops_tx: mpsc::UnboundedSender<Operation>,
    close_tx: mpsc::Sender<()>,
}

impl Operations {
    pub(crate) fn new() -> Self {
        let length = Arc::new(AtomicIsize::new(0));
        let (ops_tx, ops_rx) = mpsc::unbounded_channel();
        let (close_tx, close_rx) = mpsc::channel(1);
        let l = Arc::clone(&length);
        tokio::spawn(async move {
            Operations::start(l, ops_rx, close_rx).await;
        });

        Operations {
            length,
            ops_tx,
            close_tx,
        }
    }

    /// Adds a new action to be executed after every already-queued one.
    pub(crate) async fn enqueue(&self, op: Operation) -> Result<()> {
        self.ops_tx
            .send(op)
            .map_err(|_| Error::ErrConnectionClosed)?;
        self.length.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Checks if there are tasks in the queue.
    pub(crate) async fn is_empty(&self) -> bool {
        self.length.load(Ordering::SeqCst) == 0
    }

    /// Blocks until all currently enqueued operations finished
    /// executing. For more complex synchronization, use enqueue
    /// directly.
    pub(crate) async fn done(&self) {
        let wg = WaitGroup::new();
        let mut w = Some(wg.worker());
        let _ = self
            .enqueue(Operation(Box::new(move || {
                let _d = w.take();
                Box::pin(async {})
            })))
            .await;
        wg.wait().await;
    }

    async fn start(
        length: Arc<AtomicIsize>,
        mut ops_rx: mpsc::UnboundedReceiver<Operation>,
        mut close_rx: mpsc::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                _ = close_rx.recv() => {
                    break;
                }
                result = ops_rx.recv() => {
                    if let Some(mut f) = result {
                        f.0().await;
                        length.fetch_sub(1, Ordering::SeqCst);
                    } else {
                        break;
                    }
                }
            }
        }
    }

    pub(crate) async fn close(&self) -> Result<()> {
        self.close_tx
            .send(())
            .await
            .map_err(|_| Error::ErrConnectionClosed)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[tokio::test]
    async fn test_operations_run_in_order() {
        let ops = Operations::new();
        let out = Arc::new(tokio::sync::Mutex::new(Vec::<u32>::new()));

        for i in 0..5u32 {
            let out = Arc::clone(&out);
            ops.enqueue(Operation(Box::new(move || {
                let out = Arc::clone(&out);
                Box::pin(async move {
                    out.lock().await.push(i);
                })
            })))
            .await
            .expect("enqueue");
        }

        ops.done().await;
        assert_eq!(&*out.lock().await, &[0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_operations_close_stops_execution() {
        let ops = Operations::new();
        let count = Arc::new(AtomicU32::new(0));

        ops.done().await;
        ops.close().await.expect("close");
        // Give the executor a moment to observe the close signal.
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        let count2 = Arc::clone(&count);
        let _ = ops
            .enqueue(Operation(Box::new(move || {
                let count2 = Arc::clone(&count2);
                Box::pin(async move {
                    count2.fetch_add(1, Ordering::SeqCst);
                })
            })))
            .await;

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
