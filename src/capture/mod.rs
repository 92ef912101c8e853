//! Microphone capture and chunk assembly
//!
//! This module provides the `CaptureBackend` abstraction that delivers
//! recorded audio as timestamped chunks over a channel:
//! - Microphone capture via cpal (dedicated capture thread)
//! - File replay for batch processing and the demo binary
//! - Scripted replay for tests
//! - WAV assembly of the accumulated chunks for submission

pub mod backend;
pub mod encode;
pub mod file;
pub mod microphone;
pub mod permission;
pub mod scripted;

pub use backend::{
    AudioChunk, CaptureBackend, CaptureBackendFactory, CaptureConfig, CaptureSource,
};
pub use encode::encode_wav;
pub use file::FileCapture;
pub use microphone::MicrophoneCapture;
pub use permission::{PermissionGate, PermissionState};
pub use scripted::{ScriptedCapture, ScriptedFeed};
