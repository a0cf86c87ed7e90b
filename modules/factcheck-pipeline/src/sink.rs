use tokio::sync::mpsc;

use factcheck_common::{FactCheckError, PipelineEvent};

/// Create the single-producer event channel for one run. The orchestrator
/// holds the sink; the HTTP body or CLI writer drains the receiver.
pub fn event_channel(capacity: usize) -> (EventSink, mpsc::Receiver<PipelineEvent>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (EventSink { tx }, rx)
}

/// Sending half of the event channel.
///
/// A failed emit means the receiver is gone: the caller disconnected and the
/// run should stop at the current checkpoint.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::Sender<PipelineEvent>,
}

impl EventSink {
    pub async fn emit(&self, event: PipelineEvent) -> Result<(), FactCheckError> {
        self.tx
            .send(event)
            .await
            .map_err(|_| FactCheckError::Cancelled)
    }

    pub async fn status(&self, message: impl Into<String>) -> Result<(), FactCheckError> {
        self.emit(PipelineEvent::status(message)).await
    }

    /// Checkpoint without emitting.
    pub fn ensure_open(&self) -> Result<(), FactCheckError> {
        if self.tx.is_closed() {
            Err(FactCheckError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emits_in_order() {
        let (sink, mut rx) = event_channel(4);
        sink.status("one").await.unwrap();
        sink.emit(PipelineEvent::Complete).await.unwrap();
        drop(sink);

        assert_eq!(rx.recv().await, Some(PipelineEvent::status("one")));
        assert_eq!(rx.recv().await, Some(PipelineEvent::Complete));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn dropped_receiver_cancels() {
        let (sink, rx) = event_channel(4);
        drop(rx);

        assert_eq!(sink.ensure_open(), Err(FactCheckError::Cancelled));
        assert_eq!(sink.status("late").await, Err(FactCheckError::Cancelled));
    }
}
