use crate::{ErrorKind, Result, ResultSet};
use flume::{Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

/// Sending half of a one-shot response channel, held by whoever executes the
/// command.
///
/// `set` consumes the responder, a second resolution cannot be expressed.
/// A responder dropped without being set resolves its sink with
/// [`ErrorKind::WorkerGone`], so a waiting caller always wakes up.
#[derive(Debug)]
pub struct Responder {
    sender: Option<Sender<Result<ResultSet>>>,
}

impl Responder {
    pub fn set(mut self, result: Result<ResultSet>) {
        if let Some(sender) = self.sender.take() {
            if sender.send(result).is_err() {
                log::debug!("Response discarded, the caller stopped waiting for it");
            }
        }
    }
}

impl Drop for Responder {
    fn drop(&mut self) {
        if let Some(sender) = self.sender.take() {
            let _ = sender.send(Err(ErrorKind::WorkerGone.into()));
        }
    }
}

/// Receiving half of a one-shot response channel, handed to the caller that
/// submitted a command.
///
/// Dropping the sink is allowed at any time: the command still runs and its
/// result is discarded.
#[derive(Debug)]
pub struct ResponseSink {
    sequence: u64,
    receiver: Receiver<Result<ResultSet>>,
}

impl ResponseSink {
    pub fn channel(sequence: u64) -> (Responder, ResponseSink) {
        let (sender, receiver) = flume::bounded(1);
        (
            Responder {
                sender: Some(sender),
            },
            ResponseSink { sequence, receiver },
        )
    }

    /// Position of the command in the dispatcher's queue, from 0.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Whether the result is available, `wait` will not block.
    pub fn is_resolved(&self) -> bool {
        !self.receiver.is_empty() || self.receiver.is_disconnected()
    }

    /// Block until the command resolves.
    pub fn wait(self) -> Result<ResultSet> {
        self.receiver
            .recv()
            .unwrap_or_else(|_| Err(ErrorKind::WorkerGone.into()))
    }

    /// Block at most `timeout`, then fail with [`ErrorKind::Timeout`].
    pub fn wait_timeout(self, timeout: Duration) -> Result<ResultSet> {
        Self::resolve(self.receiver.recv_timeout(timeout))
    }

    /// Block until `deadline`, then fail with [`ErrorKind::Timeout`].
    pub fn wait_deadline(self, deadline: Instant) -> Result<ResultSet> {
        Self::resolve(self.receiver.recv_deadline(deadline))
    }

    /// Wait without blocking the thread, for callers running on an async runtime.
    pub async fn wait_async(self) -> Result<ResultSet> {
        self.receiver
            .recv_async()
            .await
            .unwrap_or_else(|_| Err(ErrorKind::WorkerGone.into()))
    }

    fn resolve(
        received: std::result::Result<Result<ResultSet>, RecvTimeoutError>,
    ) -> Result<ResultSet> {
        match received {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(ErrorKind::Timeout.into()),
            Err(RecvTimeoutError::Disconnected) => Err(ErrorKind::WorkerGone.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{ErrorKind, ResponseSink, ResultSet, RowsAffected};
    use std::{thread, time::Duration};

    #[test]
    fn resolves_across_threads() {
        let (responder, sink) = ResponseSink::channel(7);
        assert_eq!(sink.sequence(), 7);
        assert!(!sink.is_resolved());
        let worker = thread::spawn(move || {
            responder.set(Ok(ResultSet::affected(RowsAffected {
                rows_affected: 3,
                last_affected_id: None,
            })))
        });
        let result = sink.wait().expect("The sink should resolve with a value");
        assert_eq!(result.affected.rows_affected, 3);
        worker.join().unwrap();
    }

    #[test]
    fn dropped_responder_wakes_the_caller() {
        let (responder, sink) = ResponseSink::channel(0);
        drop(responder);
        assert!(sink.is_resolved());
        let error = sink.wait().unwrap_err();
        assert_eq!(ErrorKind::of(&error), Some(&ErrorKind::WorkerGone));
    }

    #[test]
    fn bounded_wait_times_out() {
        let (responder, sink) = ResponseSink::channel(0);
        let error = sink.wait_timeout(Duration::from_millis(20)).unwrap_err();
        assert_eq!(ErrorKind::of(&error), Some(&ErrorKind::Timeout));
        // The caller left, resolving afterwards is harmless
        responder.set(Ok(ResultSet::default()));
    }
}
