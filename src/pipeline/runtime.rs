//! Process runtime with a bounded shutdown.
//!
//! Stdin and the GPS serial device are read through tokio's blocking pool. A
//! blocking `read(2)` cannot be cancelled, so a plain runtime drop would wait
//! for the next byte on an idle pipe or a silent GPS module. The binary drives
//! the run through [`block_on_bounded`] instead.

use std::future::Future;
use std::time::Duration;
use tokio::runtime::{Builder, Runtime};

/// Multi-threaded runtime with I/O and timers enabled.
pub fn build() -> std::io::Result<Runtime> {
    Builder::new_multi_thread()
        .enable_all()
        .thread_name("cabai-worker")
        .build()
}

/// Run `future` to completion, then shut the runtime down, waiting at most
/// `grace` for tasks still parked on the blocking pool.
pub fn block_on_bounded<F: Future>(runtime: Runtime, future: F, grace: Duration) -> F::Output {
    let output = runtime.block_on(future);
    runtime.shutdown_timeout(grace);
    tracing::debug!(grace = ?grace, "Runtime shut down");
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::os::unix::net::UnixStream;
    use std::time::Instant;

    #[test]
    fn parked_blocking_read_does_not_hold_shutdown() {
        let runtime = build().unwrap();
        let (mut silent, _peer) = UnixStream::pair().unwrap();

        let started = Instant::now();
        let value = block_on_bounded(
            runtime,
            async move {
                tokio::task::spawn_blocking(move || {
                    let mut byte = [0u8; 1];
                    silent.read(&mut byte)
                });
                7
            },
            Duration::from_millis(100),
        );

        assert_eq!(value, 7);
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
