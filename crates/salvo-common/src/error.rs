//! Error types for Salvo.

use thiserror::Error;

use crate::ids::{InstanceId, PoolId, SequenceId, SoundId};

/// Top-level error type for Salvo operations.
#[derive(Debug, Error)]
pub enum SalvoError {
    /// Audio backend errors
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    /// Sound registration errors
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors reported by an audio backend.
#[derive(Debug, Error)]
pub enum AudioError {
    /// Backend could not create a playback instance.
    #[error("Failed to create instance for '{url}': {message}")]
    CreateFailed {
        /// Asset locator that failed.
        url: String,
        /// Error message.
        message: String,
    },

    /// Asset has not finished loading.
    #[error("Asset not loaded: {0}")]
    NotLoaded(String),

    /// Instance id is not known to the backend.
    #[error("Unknown instance: {0}")]
    UnknownInstance(InstanceId),

    /// Playback could not be started.
    #[error("Playback failed: {0}")]
    PlayFailed(String),
}

/// Errors raised while registering sounds, pools and sequences.
#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    /// Sound registered without any asset locator.
    #[error("Sound has no asset locator")]
    EmptyLocator,

    /// Pool registered without members.
    #[error("Pool has no members")]
    EmptyPool,

    /// Sequence registered without steps.
    #[error("Sequence has no steps")]
    EmptySequence,

    /// Volume outside 0.0-1.0 or not finite.
    #[error("Invalid volume: {0}")]
    InvalidVolume(f32),

    /// Sound id not present in the registry.
    #[error("Unknown sound: {0}")]
    UnknownSound(SoundId),

    /// Pool id not present in the registry.
    #[error("Unknown pool: {0}")]
    UnknownPool(PoolId),

    /// Sequence id not present in the registry.
    #[error("Unknown sequence: {0}")]
    UnknownSequence(SequenceId),
}

/// Result type alias for Salvo operations.
pub type SalvoResult<T> = Result<T, SalvoError>;
