// src/capture/mod.rs
// Camera and microphone access as scoped leases.
pub mod audio;
pub mod pushed;

pub use audio::AudioClip;

use crate::errors::ZenError;
use async_trait::async_trait;
use log::debug;

/// A live capture resource (an open stream on a camera or microphone).
pub trait Release: Send {
    /// Stops the underlying tracks. Must be safe to call more than once.
    fn release(&mut self);
}

#[async_trait]
pub trait AudioCapture: Release {
    /// Stops recording and hands back what was captured.
    async fn finish(&mut self) -> Result<AudioClip, ZenError>;
}

#[async_trait]
pub trait FrameCapture: Release {
    /// Grabs a single still, encoded in any common image format.
    async fn snapshot(&mut self) -> Result<Vec<u8>, ZenError>;
}

#[async_trait]
pub trait Microphone: Send + Sync {
    async fn open(&self) -> Result<Box<dyn AudioCapture>, ZenError>;
}

#[async_trait]
pub trait Camera: Send + Sync {
    async fn open(&self) -> Result<Box<dyn FrameCapture>, ZenError>;
}

/// Owns an acquired device until `release` is called or the lease drops,
/// whichever comes first.
pub struct Lease<D: Release + ?Sized> {
    label: &'static str,
    device: Option<Box<D>>,
}

impl<D: Release + ?Sized> Lease<D> {
    pub fn new(label: &'static str, device: Box<D>) -> Self {
        debug!("Acquired {}", label);
        Self {
            label,
            device: Some(device),
        }
    }

    pub fn is_held(&self) -> bool {
        self.device.is_some()
    }

    pub fn device(&mut self) -> Result<&mut D, ZenError> {
        self.device
            .as_deref_mut()
            .ok_or_else(|| ZenError::Device(format!("{} already released", self.label)))
    }

    pub fn release(&mut self) {
        if let Some(mut device) = self.device.take() {
            device.release();
            debug!("Released {}", self.label);
        }
    }
}

impl<D: Release + ?Sized> Drop for Lease<D> {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting(Arc<AtomicUsize>);

    impl Release for Counting {
        fn release(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn explicit_release_is_idempotent() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut lease = Lease::new("test device", Box::new(Counting(count.clone())));
        assert!(lease.is_held());
        lease.release();
        lease.release();
        assert!(!lease.is_held());
        assert!(matches!(lease.device(), Err(ZenError::Device(_))));
        drop(lease);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_releases() {
        let count = Arc::new(AtomicUsize::new(0));
        {
            let _lease = Lease::new("test device", Box::new(Counting(count.clone())));
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
