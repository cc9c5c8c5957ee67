//! Glue for moving Ethernet frames between a [`CpswDevice`] and a host [`NetworkBackend`].
//!
//! Every integration layer needs the same deterministic per-tick sequence:
//! 1. Retry receive frames the device is still holding (`poll(mem)`).
//! 2. Hand transmitted frames to the backend, with a bounded budget.
//! 3. Pull frames from the backend into the device, with a bounded budget.
//! 4. Retry again so anything that queued behind an idle channel gets another chance.
#![forbid(unsafe_code)]

use cpsw::{CpswDevice, CpswError};
use memory::GuestMemory;
use net_backend::NetworkBackend;
use tracing::debug;

/// Default frame budget for each direction per [`CpswPump::poll`] call.
pub const DEFAULT_MAX_FRAMES_PER_POLL: usize = 256;

/// Number of frames pumped in each direction during a tick/poll.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PumpCounts {
    /// Device → host frames forwarded via [`NetworkBackend::transmit`].
    pub tx_frames: usize,
    /// Host → device frames fetched via [`NetworkBackend::poll_receive`] and accepted by the
    /// device. Frames dropped on arrival (bad length, receive disabled, pending queue full) are
    /// not counted.
    pub rx_frames: usize,
}

/// Budget-only pump for integration layers that borrow the device and backend each tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpswTickPump {
    pub max_tx_frames_per_tick: usize,
    pub max_rx_frames_per_tick: usize,
}

impl Default for CpswTickPump {
    fn default() -> Self {
        Self {
            max_tx_frames_per_tick: DEFAULT_MAX_FRAMES_PER_POLL,
            max_rx_frames_per_tick: DEFAULT_MAX_FRAMES_PER_POLL,
        }
    }
}

impl CpswTickPump {
    pub fn new(max_tx_frames_per_tick: usize, max_rx_frames_per_tick: usize) -> Self {
        Self {
            max_tx_frames_per_tick,
            max_rx_frames_per_tick,
        }
    }

    pub fn tick<B: NetworkBackend + ?Sized>(
        &mut self,
        dev: &mut CpswDevice,
        mem: &mut dyn GuestMemory,
        backend: &mut B,
    ) {
        tick_cpsw(
            dev,
            mem,
            backend,
            self.max_tx_frames_per_tick,
            self.max_rx_frames_per_tick,
        );
    }

    pub fn tick_with_counts<B: NetworkBackend + ?Sized>(
        &mut self,
        dev: &mut CpswDevice,
        mem: &mut dyn GuestMemory,
        backend: &mut B,
    ) -> PumpCounts {
        tick_cpsw_with_counts(
            dev,
            mem,
            backend,
            self.max_tx_frames_per_tick,
            self.max_rx_frames_per_tick,
        )
    }
}

/// Pump frames between a borrowed [`CpswDevice`] and a borrowed [`NetworkBackend`].
///
/// Transmission itself happens synchronously when software writes a TX head pointer, so by the
/// time a tick runs the egress queue already holds every frame sent since the last one.
///
/// Ordering is deterministic:
/// 1) `dev.poll(mem)` to retry pending receive frames.
/// 2) Drain up to `max_tx_frames_per_tick` from `dev.pop_tx_frame()` into `backend.transmit`.
/// 3) Drain up to `max_rx_frames_per_tick` from `backend.poll_receive()` into
///    `dev.receive_frame`.
/// 4) `dev.poll(mem)` again.
pub fn tick_cpsw<B: NetworkBackend + ?Sized>(
    dev: &mut CpswDevice,
    mem: &mut dyn GuestMemory,
    backend: &mut B,
    max_tx_frames_per_tick: usize,
    max_rx_frames_per_tick: usize,
) {
    let _ = tick_cpsw_with_counts(
        dev,
        mem,
        backend,
        max_tx_frames_per_tick,
        max_rx_frames_per_tick,
    );
}

/// Like [`tick_cpsw`], but returns the number of frames processed in each direction.
pub fn tick_cpsw_with_counts<B: NetworkBackend + ?Sized>(
    dev: &mut CpswDevice,
    mem: &mut dyn GuestMemory,
    backend: &mut B,
    max_tx_frames_per_tick: usize,
    max_rx_frames_per_tick: usize,
) -> PumpCounts {
    let mut counts = PumpCounts::default();

    dev.poll(mem);

    for _ in 0..max_tx_frames_per_tick {
        let Some(frame) = dev.pop_tx_frame() else {
            break;
        };
        backend.transmit(frame);
        counts.tx_frames += 1;
    }

    for _ in 0..max_rx_frames_per_tick {
        let Some(frame) = backend.poll_receive() else {
            break;
        };
        match dev.receive_frame(frame, mem) {
            Ok(()) => counts.rx_frames += 1,
            Err(
                err @ (CpswError::FrameLength { .. }
                | CpswError::RxDisabled
                | CpswError::QueueFull { .. }),
            ) => {
                debug!(%err, "backend frame rejected");
            }
            // The frame was queued; a later ring failure is already counted by the device.
            Err(err) => {
                debug!(%err, "rx ring failure while pumping");
                counts.rx_frames += 1;
            }
        }
    }

    dev.poll(mem);

    counts
}

/// Moves Ethernet frames between an owned [`CpswDevice`] and a host-side [`NetworkBackend`].
#[derive(Debug)]
pub struct CpswPump<B> {
    dev: CpswDevice,
    backend: B,

    max_tx_frames_per_poll: usize,
    max_rx_frames_per_poll: usize,
}

impl<B: NetworkBackend> CpswPump<B> {
    /// Create a pump with default budgets.
    pub fn new(dev: CpswDevice, backend: B) -> Self {
        Self::with_budgets(
            dev,
            backend,
            DEFAULT_MAX_FRAMES_PER_POLL,
            DEFAULT_MAX_FRAMES_PER_POLL,
        )
    }

    /// Create a pump with explicit budgets.
    pub fn with_budgets(
        dev: CpswDevice,
        backend: B,
        max_tx_frames_per_poll: usize,
        max_rx_frames_per_poll: usize,
    ) -> Self {
        Self {
            dev,
            backend,
            max_tx_frames_per_poll,
            max_rx_frames_per_poll,
        }
    }

    /// Run one pump iteration.
    pub fn poll(&mut self, mem: &mut dyn GuestMemory) {
        tick_cpsw(
            &mut self.dev,
            mem,
            &mut self.backend,
            self.max_tx_frames_per_poll,
            self.max_rx_frames_per_poll,
        );
    }

    /// Run one pump iteration and return the number of frames processed in each direction.
    pub fn poll_with_counts(&mut self, mem: &mut dyn GuestMemory) -> PumpCounts {
        tick_cpsw_with_counts(
            &mut self.dev,
            mem,
            &mut self.backend,
            self.max_tx_frames_per_poll,
            self.max_rx_frames_per_poll,
        )
    }

    pub fn device(&self) -> &CpswDevice {
        &self.dev
    }

    pub fn device_mut(&mut self) -> &mut CpswDevice {
        &mut self.dev
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn into_parts(self) -> (CpswDevice, B) {
        (self.dev, self.backend)
    }

    pub fn max_tx_frames_per_poll(&self) -> usize {
        self.max_tx_frames_per_poll
    }

    pub fn max_rx_frames_per_poll(&self) -> usize {
        self.max_rx_frames_per_poll
    }

    pub fn set_max_tx_frames_per_poll(&mut self, value: usize) {
        self.max_tx_frames_per_poll = value;
    }

    pub fn set_max_rx_frames_per_poll(&mut self, value: usize) {
        self.max_rx_frames_per_poll = value;
    }
}
