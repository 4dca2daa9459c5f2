use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::proto::experiment::ExperimentProto;
use crate::proto::storage::{DatasetSensitivityProto, StorageProto, StorageStatusProto};

/// Last-known server representation of an experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentData {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub created_by: String,
    pub created_at: Option<DateTime<Utc>>,
}

/// Last-known server representation of a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetData {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub description: String,
    pub sensitivity: DatasetSensitivity,
    pub status: StorageStatus,
    pub location: String,
    pub created_by: String,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DatasetSensitivity {
    #[default]
    Unspecified,
    Public,
    General,
    Sensitive,
    Confidential,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StorageStatus {
    #[default]
    Unspecified,
    Pending,
    Completed,
    Failed,
}

fn timestamp_to_utc(ts: Option<prost_types::Timestamp>) -> Option<DateTime<Utc>> {
    let ts = ts?;
    DateTime::from_timestamp(ts.seconds, u32::try_from(ts.nanos).ok()?)
}

impl From<ExperimentProto> for ExperimentData {
    fn from(msg: ExperimentProto) -> Self {
        ExperimentData {
            id: msg.id,
            project_id: msg.project_id,
            name: msg.name,
            created_by: msg.created_by,
            created_at: timestamp_to_utc(msg.created_at),
        }
    }
}

impl From<StorageProto> for DatasetData {
    fn from(msg: StorageProto) -> Self {
        DatasetData {
            sensitivity: DatasetSensitivity::from_proto(msg.sensitivity),
            status: StorageStatus::from_proto(msg.status),
            id: msg.id,
            project_id: msg.project_id,
            name: msg.name,
            description: msg.description,
            location: msg.location,
            created_by: msg.created_by,
            created_at: timestamp_to_utc(msg.created_at),
        }
    }
}

impl DatasetSensitivity {
    /// Unknown wire values collapse to `Unspecified`.
    pub fn from_proto(value: i32) -> Self {
        match DatasetSensitivityProto::try_from(value) {
            Ok(DatasetSensitivityProto::Public) => DatasetSensitivity::Public,
            Ok(DatasetSensitivityProto::General) => DatasetSensitivity::General,
            Ok(DatasetSensitivityProto::Sensitive) => DatasetSensitivity::Sensitive,
            Ok(DatasetSensitivityProto::Confidential) => DatasetSensitivity::Confidential,
            Ok(DatasetSensitivityProto::Unspecified) | Err(_) => DatasetSensitivity::Unspecified,
        }
    }

    pub fn to_proto(self) -> DatasetSensitivityProto {
        match self {
            DatasetSensitivity::Unspecified => DatasetSensitivityProto::Unspecified,
            DatasetSensitivity::Public => DatasetSensitivityProto::Public,
            DatasetSensitivity::General => DatasetSensitivityProto::General,
            DatasetSensitivity::Sensitive => DatasetSensitivityProto::Sensitive,
            DatasetSensitivity::Confidential => DatasetSensitivityProto::Confidential,
        }
    }
}

impl fmt::Display for DatasetSensitivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DatasetSensitivity::Unspecified => "unspecified",
            DatasetSensitivity::Public => "public",
            DatasetSensitivity::General => "general",
            DatasetSensitivity::Sensitive => "sensitive",
            DatasetSensitivity::Confidential => "confidential",
        };
        f.write_str(name)
    }
}

impl FromStr for DatasetSensitivity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "public" => Ok(DatasetSensitivity::Public),
            "general" => Ok(DatasetSensitivity::General),
            "sensitive" => Ok(DatasetSensitivity::Sensitive),
            "confidential" => Ok(DatasetSensitivity::Confidential),
            other => Err(format!(
                "unknown sensitivity {other:?}, expected one of: public, general, sensitive, confidential"
            )),
        }
    }
}

impl StorageStatus {
    pub fn from_proto(value: i32) -> Self {
        match StorageStatusProto::try_from(value) {
            Ok(StorageStatusProto::Pending) => StorageStatus::Pending,
            Ok(StorageStatusProto::Completed) => StorageStatus::Completed,
            Ok(StorageStatusProto::Failed) => StorageStatus::Failed,
            Ok(StorageStatusProto::Unspecified) | Err(_) => StorageStatus::Unspecified,
        }
    }
}
