//! Network backend primitives for bridging emulated Ethernet controllers to host glue.
//!
//! Backends deal exclusively with raw Ethernet frames (`Vec<u8>`). The device models in this
//! workspace never own a backend directly; a pump moves frames between the two.
#![forbid(unsafe_code)]

pub mod frame_queue;

pub use frame_queue::{FrameQueueBackend, FrameQueueError, FrameQueueHandle, FrameQueueStats};

/// Network backend to bridge frames between emulated NICs and the host network stack.
pub trait NetworkBackend {
    /// Transmit a guest → host Ethernet frame.
    fn transmit(&mut self, frame: Vec<u8>);

    /// Poll for a host → guest Ethernet frame.
    fn poll_receive(&mut self) -> Option<Vec<u8>> {
        None
    }

    /// Best-effort queue statistics. Most backends return `None`.
    fn queue_stats(&self) -> Option<FrameQueueStats> {
        None
    }
}

impl<T: NetworkBackend + ?Sized> NetworkBackend for Box<T> {
    fn transmit(&mut self, frame: Vec<u8>) {
        <T as NetworkBackend>::transmit(&mut **self, frame);
    }

    fn poll_receive(&mut self) -> Option<Vec<u8>> {
        <T as NetworkBackend>::poll_receive(&mut **self)
    }

    fn queue_stats(&self) -> Option<FrameQueueStats> {
        <T as NetworkBackend>::queue_stats(&**self)
    }
}

impl<T: NetworkBackend + ?Sized> NetworkBackend for &mut T {
    fn transmit(&mut self, frame: Vec<u8>) {
        <T as NetworkBackend>::transmit(&mut **self, frame);
    }

    fn poll_receive(&mut self) -> Option<Vec<u8>> {
        <T as NetworkBackend>::poll_receive(&mut **self)
    }

    fn queue_stats(&self) -> Option<FrameQueueStats> {
        <T as NetworkBackend>::queue_stats(&**self)
    }
}

/// A sink that silently discards every frame.
impl NetworkBackend for () {
    fn transmit(&mut self, _frame: Vec<u8>) {}
}

impl<B: NetworkBackend> NetworkBackend for Option<B> {
    fn transmit(&mut self, frame: Vec<u8>) {
        if let Some(backend) = self.as_mut() {
            backend.transmit(frame);
        }
    }

    fn poll_receive(&mut self) -> Option<Vec<u8>> {
        self.as_mut().and_then(|backend| backend.poll_receive())
    }

    fn queue_stats(&self) -> Option<FrameQueueStats> {
        self.as_ref().and_then(|backend| backend.queue_stats())
    }
}

impl<T: NetworkBackend + ?Sized> NetworkBackend for std::rc::Rc<std::cell::RefCell<T>> {
    fn transmit(&mut self, frame: Vec<u8>) {
        self.borrow_mut().transmit(frame);
    }

    fn poll_receive(&mut self) -> Option<Vec<u8>> {
        self.borrow_mut().poll_receive()
    }

    fn queue_stats(&self) -> Option<FrameQueueStats> {
        self.borrow().queue_stats()
    }
}

impl<T: NetworkBackend + ?Sized> NetworkBackend for std::sync::Arc<std::sync::Mutex<T>> {
    fn transmit(&mut self, frame: Vec<u8>) {
        self.lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .transmit(frame);
    }

    fn poll_receive(&mut self) -> Option<Vec<u8>> {
        self.lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .poll_receive()
    }

    fn queue_stats(&self) -> Option<FrameQueueStats> {
        self.lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .queue_stats()
    }
}
