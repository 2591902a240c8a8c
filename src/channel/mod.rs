//! Unbuffered rendezvous channel shared by producers and the consumer.
//!
//! A zero-capacity `crossbeam_channel`: a send only completes once a
//! receiver has taken the value, so nothing is ever buffered.
//!
//! The channel disconnects when every sender (or every receiver) is
//! dropped. The fan-in path keeps a sender alive for the whole run, so a
//! consumer waiting for values that are never sent stays blocked.

pub use crossbeam_channel::{Receiver, RecvError, RecvTimeoutError, Sender};

/// Create a new rendezvous channel.
pub fn rendezvous<T>() -> (Sender<T>, Receiver<T>) {
    crossbeam_channel::bounded(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::SendTimeoutError;
    use std::collections::HashSet;
    use std::thread;
    use std::time::Duration;

    const SHORT: Duration = Duration::from_millis(50);

    #[test]
    fn test_send_without_receiver_never_completes() {
        let (tx, _rx) = rendezvous();
        assert_eq!(tx.send_timeout(1, SHORT), Err(SendTimeoutError::Timeout(1)));
    }

    #[test]
    fn test_send_completes_once_taken() {
        let (tx, rx) = rendezvous();
        let producer = thread::spawn(move || tx.send("hand-off"));

        assert_eq!(rx.recv(), Ok("hand-off"));
        assert!(producer.join().unwrap().is_ok());
    }

    #[test]
    fn test_receiver_waits_while_a_sender_lives() {
        let (tx, rx) = rendezvous::<u64>();
        assert_eq!(rx.recv_timeout(SHORT), Err(RecvTimeoutError::Timeout));

        drop(tx);
        assert_eq!(rx.recv(), Err(RecvError));
    }

    #[test]
    fn test_dropping_receiver_releases_blocked_sender() {
        let (tx, rx) = rendezvous();
        let producer = thread::spawn(move || tx.send(7u64));

        thread::sleep(SHORT);
        drop(rx);

        let err = producer.join().unwrap().unwrap_err();
        assert_eq!(err.into_inner(), 7);
    }

    #[test]
    fn test_every_value_delivered_exactly_once() {
        let (tx, rx) = rendezvous();

        let producers: Vec<_> = (0..8u64)
            .map(|id| {
                let tx = tx.clone();
                thread::spawn(move || {
                    for n in 0..50u64 {
                        tx.send(id * 1000 + n).unwrap();
                    }
                })
            })
            .collect();
        drop(tx);

        let consumers: Vec<_> = (0..2)
            .map(|_| {
                let rx = rx.clone();
                thread::spawn(move || rx.iter().collect::<Vec<u64>>())
            })
            .collect();
        drop(rx);

        for producer in producers {
            producer.join().unwrap();
        }
        let received: Vec<u64> = consumers
            .into_iter()
            .flat_map(|consumer| consumer.join().unwrap())
            .collect();

        let unique: HashSet<u64> = received.iter().copied().collect();
        assert_eq!(received.len(), 400);
        assert_eq!(unique.len(), 400);
    }
}
