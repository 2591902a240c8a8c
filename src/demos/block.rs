//! Blocking receive from an unbuffered channel.

use crate::channel::{rendezvous, RecvError};
use std::thread;
use std::time::Duration;
use tracing::debug;

/// Message sent when none is configured.
pub const DEFAULT_MESSAGE: &str = "Don't put ketchup on your hot dog";

/// Spawn a producer that sleeps for `delay` and then sends `message`,
/// while the calling thread blocks on a single receive.
pub fn run_block(delay: Duration, message: String) -> Result<String, RecvError> {
    let (tx, rx) = rendezvous();

    let producer = thread::spawn(move || {
        thread::sleep(delay);
        debug!("Sending message after {:?}", delay);
        tx.send(message)
    });

    let received = rx.recv();

    // The send has been paired with our receive, so the producer is done.
    if producer.join().is_err() {
        debug!("Block producer panicked");
    }

    received
}
