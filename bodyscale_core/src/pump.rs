//! Background link pumping.
//!
//! Spawns a thread that owns the `ScaleLink` and forwards every frame, in
//! arrival order, onto the driver's input channel.
//!
//! Safety: Each `FramePump` spawns exactly one thread that is shut down (and
//! the link closed) when the pump is closed or dropped, preventing thread leaks.
use crossbeam_channel as xch;
use bodyscale_traits::{LinkEvent, ScaleLink};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use crate::driver::DriverInput;
use crate::link_error::map_link_error;

pub struct FramePump {
    forwarded: Arc<AtomicU64>,
    /// Shutdown flag for immediate response (atomic for lock-free check)
    shutdown: Arc<AtomicBool>,
    /// Join handle for graceful thread cleanup
    join_handle: Option<std::thread::JoinHandle<()>>,
}

fn close_link<L: ScaleLink>(link: &mut L) {
    if let Err(e) = link.disconnect() {
        tracing::warn!(error = %e, "link disconnect failed");
    }
}

impl FramePump {
    /// `poll` bounds how long one `next_event` call may block before the
    /// shutdown flag is checked again.
    pub fn spawn<L: ScaleLink + Send + 'static>(
        mut link: L,
        tx: xch::Sender<DriverInput>,
        poll: Duration,
    ) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let forwarded = Arc::new(AtomicU64::new(0));
        let forwarded_clone = forwarded.clone();

        let join_handle = std::thread::spawn(move || {
            loop {
                if shutdown_clone.load(Ordering::Relaxed) {
                    tracing::debug!("frame pump received shutdown signal");
                    close_link(&mut link);
                    break;
                }

                match link.next_event(poll) {
                    Ok(Some(LinkEvent::Frame(bytes))) => {
                        let input = DriverInput::Frame(bytes);
                        // If send fails, the driver is gone; exit gracefully
                        if tx.send(input).is_err() {
                            tracing::debug!("frame pump consumer disconnected, exiting thread");
                            close_link(&mut link);
                            break;
                        }
                        forwarded_clone.fetch_add(1, Ordering::Relaxed);
                    }
                    Ok(Some(LinkEvent::Disconnected)) => {
                        tracing::info!("link reported disconnect");
                        let _ = tx.send(DriverInput::LinkClosed);
                        break;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        let err = map_link_error(e.as_ref());
                        tracing::error!(error = %err, "link failed");
                        let _ = tx.send(DriverInput::LinkFailed(err));
                        close_link(&mut link);
                        break;
                    }
                }
            }
            tracing::trace!("frame pump thread exiting cleanly");
        });

        Self {
            forwarded,
            shutdown,
            join_handle: Some(join_handle),
        }
    }

    /// Frames handed to the driver so far.
    pub fn forwarded(&self) -> u64 {
        self.forwarded.load(Ordering::Relaxed)
    }

    /// Close the link and wait for the thread. Blocks for at most one poll interval.
    pub fn close(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => {
                    tracing::trace!("frame pump thread joined successfully");
                }
                Err(e) => {
                    // Thread panicked; log but don't propagate
                    tracing::warn!(?e, "frame pump thread panicked during shutdown");
                }
            }
        }
    }
}

impl Drop for FramePump {
    fn drop(&mut self) {
        self.stop();
    }
}
