//! Hookscore - hook effectiveness scoring for short-form video
//!
//! Samples the opening seconds of a video, extracts and transcribes its audio,
//! sends both to remote visual and audio hook scorers, and combines the two
//! into one score while streaming progress to the caller.

pub mod audio;
pub mod cli;
pub mod combine;
pub mod config;
pub mod error;
pub mod frames;
pub mod media;
pub mod notify;
pub mod progress;
pub mod remote;
pub mod scoring;
pub mod storage;
pub mod transcribe;
pub mod types;
pub mod workflow;
