//! Rust SDK for the TQ42 quantum experimentation platform.
//!
//! Each resource wrapper ([`Experiment`], [`Dataset`]) proxies get, update,
//! list and create calls to the platform's gRPC services through a shared
//! [`Tq42Client`], which forwards the configured credentials on every request.
//! Remote failures come back as [`SdkError`] variants, never raw `tonic::Status`.

pub mod client;
pub mod config;
pub mod dataset;
pub mod error;
pub mod experiment;
pub mod models;

pub mod proto {
    pub mod experiment {
        tonic::include_proto!("terraquantum.experiment.v3alpha1");
    }

    pub mod storage {
        tonic::include_proto!("terraquantum.storage.v1alpha1");
    }
}

pub use client::Tq42Client;
pub use config::{ClientConfig, ConfigError};
pub use dataset::{file_name_from_signed_url, Dataset, DatasetSource, NewDataset};
pub use error::{Result, SdkError};
pub use experiment::Experiment;
pub use models::{DatasetData, DatasetSensitivity, ExperimentData, StorageStatus};
