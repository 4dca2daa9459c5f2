use std::fmt;

use prost_types::FieldMask;
use tracing::{debug, instrument};

use crate::client::Tq42Client;
use crate::error::Result;
use crate::models::ExperimentData;
use crate::proto::experiment::{
    GetExperimentRequest, ListExperimentsRequest, UpdateExperimentRequest,
};

/// Reference to an existing experiment.
///
/// Holds the id plus the last snapshot the server returned for it.
#[derive(Debug, Clone)]
pub struct Experiment {
    client: Tq42Client,
    id: String,
    data: ExperimentData,
}

impl Experiment {
    /// Fetch an experiment by id.
    #[instrument(skip(client))]
    pub async fn get(client: &Tq42Client, id: &str) -> Result<Self> {
        let data = fetch(client, id).await?;
        Ok(Self::from_data(client, data))
    }

    /// Wrap a snapshot that is already at hand, e.g. from a list response.
    pub fn from_data(client: &Tq42Client, data: ExperimentData) -> Self {
        Self {
            client: client.clone(),
            id: data.id.clone(),
            data,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn data(&self) -> &ExperimentData {
        &self.data
    }

    /// Replace the local snapshot with the server's current state.
    #[instrument(skip(self), fields(experiment_id = %self.id))]
    pub async fn refresh(&mut self) -> Result<&mut Self> {
        self.data = fetch(&self.client, &self.id).await?;
        Ok(self)
    }

    /// Rename the experiment.
    #[instrument(skip(self), fields(experiment_id = %self.id))]
    pub async fn update(&mut self, name: &str) -> Result<&mut Self> {
        let request = UpdateExperimentRequest {
            update_mask: Some(FieldMask {
                paths: vec!["id".to_string(), "name".to_string()],
            }),
            id: self.id.clone(),
            name: name.to_string(),
        };
        debug!("sending UpdateExperiment");
        let resp = self
            .client
            .experiments()
            .update_experiment(request)
            .await?
            .into_inner();
        self.data = resp.into();
        Ok(self)
    }

    pub async fn set_friendly_name(&mut self, friendly_name: &str) -> Result<&mut Self> {
        self.update(friendly_name).await
    }
}

impl fmt::Display for Experiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string_pretty(&self.data).map_err(|_| fmt::Error)?;
        write!(f, "Experiment: {json}")
    }
}

async fn fetch(client: &Tq42Client, id: &str) -> Result<ExperimentData> {
    debug!(experiment_id = %id, "sending GetExperiment");
    let resp = client
        .experiments()
        .get_experiment(GetExperimentRequest { id: id.to_string() })
        .await?
        .into_inner();
    Ok(resp.into())
}

/// List all experiments visible to the caller in a project.
///
/// Without a project id the client's default project is used. Order follows the server.
#[instrument(skip(client))]
pub async fn list_all(client: &Tq42Client, project_id: Option<&str>) -> Result<Vec<Experiment>> {
    let project_id = client.config().resolve_project(project_id)?;
    let resp = client
        .experiments()
        .list_experiments(ListExperimentsRequest { project_id })
        .await?
        .into_inner();
    Ok(resp
        .experiments
        .into_iter()
        .map(|e| Experiment::from_data(client, e.into()))
        .collect())
}
