//! Fragment channel: the ordered hand-off queue of one exchange.
//!
//! A thin wrapper over an unbounded crossbeam channel. It is created fresh
//! for every exchange and has exactly one sender and one receiver, so FIFO
//! order of sends is the order the renderer sees.

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, SendError, Sender};
use std::time::Duration;

/// One ordered piece of generated text.
pub type Fragment = String;

/// Outcome of a bounded-wait poll on the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Poll {
    /// A fragment arrived within the timeout.
    Fragment(Fragment),
    /// The timeout elapsed with nothing queued.
    Idle,
    /// The sender is gone and nothing is queued; no fragment can ever arrive.
    Closed,
}

/// Producer end of a fragment channel.
///
/// Not `Clone`: the channel has a single producer.
#[derive(Debug)]
pub struct FragmentSender {
    tx: Sender<Fragment>,
}

/// Consumer end of a fragment channel.
#[derive(Debug)]
pub struct FragmentReceiver {
    rx: Receiver<Fragment>,
}

/// Create a new, empty fragment channel.
pub fn fragment_channel() -> (FragmentSender, FragmentReceiver) {
    let (tx, rx) = unbounded();
    (FragmentSender { tx }, FragmentReceiver { rx })
}

impl FragmentSender {
    /// Enqueue a fragment.
    ///
    /// # Errors
    ///
    /// Returns the fragment back if the receiver has been dropped.
    pub fn send(&self, fragment: impl Into<Fragment>) -> Result<(), SendError<Fragment>> {
        self.tx.send(fragment.into())
    }
}

impl FragmentReceiver {
    /// Wait up to `timeout` for the next fragment.
    pub fn poll(&self, timeout: Duration) -> Poll {
        match self.rx.recv_timeout(timeout) {
            Ok(fragment) => Poll::Fragment(fragment),
            Err(RecvTimeoutError::Timeout) => Poll::Idle,
            Err(RecvTimeoutError::Disconnected) => Poll::Closed,
        }
    }

    /// Check whether no fragment is currently queued.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Number of fragments currently queued.
    #[inline]
    pub fn len(&self) -> usize {
        self.rx.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let (tx, rx) = fragment_channel();
        tx.send("a").unwrap();
        tx.send("b").unwrap();
        tx.send("c").unwrap();

        assert_eq!(rx.len(), 3);
        assert_eq!(rx.poll(Duration::ZERO), Poll::Fragment("a".into()));
        assert_eq!(rx.poll(Duration::ZERO), Poll::Fragment("b".into()));
        assert_eq!(rx.poll(Duration::ZERO), Poll::Fragment("c".into()));
        assert!(rx.is_empty());
    }

    #[test]
    fn test_poll_times_out_when_empty() {
        let (_tx, rx) = fragment_channel();
        assert_eq!(rx.poll(Duration::from_millis(5)), Poll::Idle);
    }

    #[test]
    fn test_closed_only_after_drain() {
        let (tx, rx) = fragment_channel();
        tx.send("last").unwrap();
        drop(tx);

        // Queued fragments are still delivered after the sender is gone.
        assert_eq!(rx.poll(Duration::ZERO), Poll::Fragment("last".into()));
        assert_eq!(rx.poll(Duration::ZERO), Poll::Closed);
    }

    #[test]
    fn test_send_fails_without_receiver() {
        let (tx, rx) = fragment_channel();
        drop(rx);
        assert!(tx.send("orphan").is_err());
    }
}
