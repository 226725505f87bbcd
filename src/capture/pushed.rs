// src/capture/pushed.rs
// Devices backed by media the graphical client already recorded and uploaded.
use super::{AudioCapture, AudioClip, Camera, FrameCapture, Microphone, Release};
use crate::errors::ZenError;
use async_trait::async_trait;

pub struct PushedAudio {
    clip: AudioClip,
}

impl PushedAudio {
    pub fn new(clip: AudioClip) -> Self {
        Self { clip }
    }
}

struct PushedRecording {
    clip: Option<AudioClip>,
}

impl Release for PushedRecording {
    fn release(&mut self) {
        self.clip = None;
    }
}

#[async_trait]
impl AudioCapture for PushedRecording {
    async fn finish(&mut self) -> Result<AudioClip, ZenError> {
        self.clip
            .take()
            .ok_or_else(|| ZenError::Device("recording already consumed".to_string()))
    }
}

#[async_trait]
impl Microphone for PushedAudio {
    async fn open(&self) -> Result<Box<dyn AudioCapture>, ZenError> {
        if self.clip.is_empty() {
            return Err(ZenError::Device("no audio captured".to_string()));
        }
        Ok(Box::new(PushedRecording {
            clip: Some(self.clip.clone()),
        }))
    }
}

pub struct PushedFrame {
    data: Vec<u8>,
}

impl PushedFrame {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }
}

struct PushedStill {
    data: Option<Vec<u8>>,
}

impl Release for PushedStill {
    fn release(&mut self) {
        self.data = None;
    }
}

#[async_trait]
impl FrameCapture for PushedStill {
    async fn snapshot(&mut self) -> Result<Vec<u8>, ZenError> {
        self.data
            .take()
            .ok_or_else(|| ZenError::Device("frame already consumed".to_string()))
    }
}

#[async_trait]
impl Camera for PushedFrame {
    async fn open(&self) -> Result<Box<dyn FrameCapture>, ZenError> {
        if self.data.is_empty() {
            return Err(ZenError::Device("no frame captured".to_string()));
        }
        Ok(Box::new(PushedStill {
            data: Some(self.data.clone()),
        }))
    }
}
