//! Closing a channel to signal the end of a stream.
//!
//! The producer owns the only sender; dropping it disconnects the channel
//! and ends the consumer's iteration.

use crate::channel::rendezvous;
use rand::Rng;
use std::thread;
use tracing::debug;

/// Message sent when none is configured.
pub const DEFAULT_MESSAGE: &str = "Hello!";

/// Upper bound (exclusive) for a randomly chosen stream length.
pub const RANDOM_LIMIT_BOUND: usize = 10;

/// Pick a stream length in `0..RANDOM_LIMIT_BOUND`.
pub fn random_limit<R: Rng + ?Sized>(rng: &mut R) -> usize {
    rng.gen_range(0..RANDOM_LIMIT_BOUND)
}

/// Spawn a producer that sends `message` `limit` times and then closes
/// the channel. Every message is handed to `on_message` as it arrives;
/// returns how many were received.
pub fn run_stream<F>(limit: usize, message: String, mut on_message: F) -> usize
where
    F: FnMut(&str),
{
    let (tx, rx) = rendezvous();

    let producer = thread::spawn(move || {
        for _ in 0..limit {
            if tx.send(message.clone()).is_err() {
                break;
            }
        }
        debug!("Closing stream after {} messages", limit);
        drop(tx);
    });

    let mut received = 0;
    for message in &rx {
        on_message(message.as_str());
        received += 1;
    }

    if producer.join().is_err() {
        debug!("Stream producer panicked after {} messages", received);
    }

    received
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_stream_delivers_every_message() {
        let mut seen = Vec::new();
        let count = run_stream(3, "ping".to_string(), |m| seen.push(m.to_string()));

        assert_eq!(count, 3);
        assert_eq!(seen, vec!["ping", "ping", "ping"]);
    }

    #[test]
    fn test_empty_stream_ends_immediately() {
        let count = run_stream(0, DEFAULT_MESSAGE.to_string(), |_| panic!("no messages expected"));
        assert_eq!(count, 0);
    }

    #[test]
    fn test_random_limit_in_range() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..100 {
            assert!(random_limit(&mut rng) < RANDOM_LIMIT_BOUND);
        }
    }
}
