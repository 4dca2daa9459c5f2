//! In-memory stand-in for the TQ42 experiment and storage services.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::metadata::MetadataMap;
use tonic::transport::Server;
use tonic::{Request, Response, Status, Streaming};

use tq42_sdk::proto::experiment::experiment_service_server::{
    ExperimentService, ExperimentServiceServer,
};
use tq42_sdk::proto::experiment::{
    ExperimentProto, GetExperimentRequest, ListExperimentsRequest, ListExperimentsResponse,
    UpdateExperimentRequest,
};
use tq42_sdk::proto::storage::storage_service_server::{StorageService, StorageServiceServer};
use tq42_sdk::proto::storage::upload_storage_chunk::Payload;
use tq42_sdk::proto::storage::{
    CreateStorageFromUrlRequest, ExportStorageRequest, ExportStorageResponse, GetStorageRequest,
    ListStoragesRequest, ListStoragesResponse, StorageProto, StorageStatusProto,
    UploadStorageChunk,
};

pub const TOKEN: &str = "test-token";
pub const FORBIDDEN_ID: &str = "forbidden";

/// An upload as the server received it.
#[derive(Debug, Clone)]
pub struct ReceivedUpload {
    pub file_name: String,
    pub declared_size: u64,
    pub bytes: Vec<u8>,
    pub chunk_count: usize,
}

#[derive(Default)]
pub struct MockPlatform {
    pub experiments: Mutex<Vec<ExperimentProto>>,
    pub storages: Mutex<Vec<StorageProto>>,
    /// Signed URL handed out by ExportStorage, keyed by storage id.
    pub export_urls: Mutex<HashMap<String, String>>,
    pub last_update_mask: Mutex<Option<Vec<String>>>,
    pub last_list_project: Mutex<Option<String>>,
    pub uploads: Mutex<Vec<ReceivedUpload>>,
    pub sdk_versions_seen: Mutex<Vec<String>>,
    pub calls: Mutex<usize>,
}

impl MockPlatform {
    pub fn with_experiments(experiments: Vec<ExperimentProto>) -> Self {
        Self {
            experiments: Mutex::new(experiments),
            ..Default::default()
        }
    }

    fn authorize(&self, metadata: &MetadataMap) -> Result<(), Status> {
        *self.calls.lock().unwrap() += 1;
        if let Some(version) = metadata.get("x-tq42-sdk-version") {
            self.sdk_versions_seen
                .lock()
                .unwrap()
                .push(version.to_str().unwrap_or_default().to_string());
        }
        let expected = format!("Bearer {TOKEN}");
        match metadata.get("authorization").map(|v| v.to_str()) {
            Some(Ok(value)) if value == expected => Ok(()),
            _ => Err(Status::unauthenticated("missing or invalid token")),
        }
    }

    fn next_storage_id(&self) -> String {
        format!("storage-{}", self.storages.lock().unwrap().len() + 1)
    }
}

pub fn experiment(id: &str, project_id: &str, name: &str) -> ExperimentProto {
    ExperimentProto {
        id: id.to_string(),
        project_id: project_id.to_string(),
        name: name.to_string(),
        created_by: "alice".to_string(),
        created_at: Some(created_at()),
    }
}

fn created_at() -> prost_types::Timestamp {
    prost_types::Timestamp {
        seconds: 1_718_780_047,
        nanos: 0,
    }
}

#[tonic::async_trait]
impl ExperimentService for MockPlatform {
    async fn get_experiment(
        &self,
        request: Request<GetExperimentRequest>,
    ) -> Result<Response<ExperimentProto>, Status> {
        self.authorize(request.metadata())?;
        let id = request.into_inner().id;
        if id == FORBIDDEN_ID {
            return Err(Status::permission_denied("not a member of this project"));
        }
        self.experiments
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.id == id)
            .cloned()
            .map(Response::new)
            .ok_or_else(|| Status::not_found(format!("experiment {id} not found")))
    }

    async fn update_experiment(
        &self,
        request: Request<UpdateExperimentRequest>,
    ) -> Result<Response<ExperimentProto>, Status> {
        self.authorize(request.metadata())?;
        let req = request.into_inner();
        let paths = req.update_mask.map(|m| m.paths).unwrap_or_default();
        *self.last_update_mask.lock().unwrap() = Some(paths.clone());

        let mut experiments = self.experiments.lock().unwrap();
        let exp = experiments
            .iter_mut()
            .find(|e| e.id == req.id)
            .ok_or_else(|| Status::not_found(format!("experiment {} not found", req.id)))?;
        if paths.iter().any(|p| p == "name") {
            exp.name = req.name;
        }
        Ok(Response::new(exp.clone()))
    }

    async fn list_experiments(
        &self,
        request: Request<ListExperimentsRequest>,
    ) -> Result<Response<ListExperimentsResponse>, Status> {
        self.authorize(request.metadata())?;
        let project_id = request.into_inner().project_id;
        *self.last_list_project.lock().unwrap() = Some(project_id.clone());
        let experiments = self
            .experiments
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.project_id == project_id)
            .cloned()
            .collect();
        Ok(Response::new(ListExperimentsResponse { experiments }))
    }
}

#[tonic::async_trait]
impl StorageService for MockPlatform {
    async fn get_storage(
        &self,
        request: Request<GetStorageRequest>,
    ) -> Result<Response<StorageProto>, Status> {
        self.authorize(request.metadata())?;
        let id = request.into_inner().id;
        self.storages
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .map(Response::new)
            .ok_or_else(|| Status::not_found(format!("storage {id} not found")))
    }

    async fn list_storages(
        &self,
        request: Request<ListStoragesRequest>,
    ) -> Result<Response<ListStoragesResponse>, Status> {
        self.authorize(request.metadata())?;
        let project_id = request.into_inner().project_id;
        *self.last_list_project.lock().unwrap() = Some(project_id.clone());
        let storages = self
            .storages
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.project_id == project_id)
            .cloned()
            .collect();
        Ok(Response::new(ListStoragesResponse { storages }))
    }

    async fn create_storage_from_url(
        &self,
        request: Request<CreateStorageFromUrlRequest>,
    ) -> Result<Response<StorageProto>, Status> {
        self.authorize(request.metadata())?;
        let req = request.into_inner();
        if req.url.is_empty() {
            return Err(Status::invalid_argument("url is required"));
        }
        let storage = StorageProto {
            id: self.next_storage_id(),
            project_id: req.project_id,
            name: req.name,
            description: req.description,
            sensitivity: req.sensitivity,
            status: StorageStatusProto::Pending as i32,
            location: req.url,
            created_by: "alice".to_string(),
            created_at: Some(created_at()),
        };
        self.storages.lock().unwrap().push(storage.clone());
        Ok(Response::new(storage))
    }

    async fn create_storage_from_file(
        &self,
        request: Request<Streaming<UploadStorageChunk>>,
    ) -> Result<Response<StorageProto>, Status> {
        self.authorize(request.metadata())?;
        let mut stream = request.into_inner();

        let header = match stream.message().await?.and_then(|c| c.payload) {
            Some(Payload::Header(header)) => header,
            _ => return Err(Status::invalid_argument("first chunk must be a header")),
        };

        let mut bytes = Vec::new();
        let mut chunk_count = 0;
        while let Some(chunk) = stream.message().await? {
            match chunk.payload {
                Some(Payload::Data(data)) => {
                    bytes.extend_from_slice(&data);
                    chunk_count += 1;
                }
                _ => return Err(Status::invalid_argument("unexpected header chunk")),
            }
        }
        if bytes.len() as u64 != header.size_bytes {
            return Err(Status::invalid_argument("upload size mismatch"));
        }

        self.uploads.lock().unwrap().push(ReceivedUpload {
            file_name: header.file_name.clone(),
            declared_size: header.size_bytes,
            bytes,
            chunk_count,
        });

        let id = self.next_storage_id();
        let storage = StorageProto {
            location: format!("gs://tq42-datasets/{id}/{}", header.file_name),
            id,
            project_id: header.project_id,
            name: header.name,
            description: header.description,
            sensitivity: header.sensitivity,
            status: StorageStatusProto::Completed as i32,
            created_by: "alice".to_string(),
            created_at: Some(created_at()),
        };
        self.storages.lock().unwrap().push(storage.clone());
        Ok(Response::new(storage))
    }

    async fn export_storage(
        &self,
        request: Request<ExportStorageRequest>,
    ) -> Result<Response<ExportStorageResponse>, Status> {
        self.authorize(request.metadata())?;
        let id = request.into_inner().id;
        self.export_urls
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .map(|signed_url| Response::new(ExportStorageResponse { signed_url }))
            .ok_or_else(|| Status::not_found(format!("storage {id} not found")))
    }
}

/// Serve the mock on a random local port and return its address.
pub async fn start_mock_platform(platform: Arc<MockPlatform>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        Server::builder()
            .add_service(ExperimentServiceServer::from_arc(Arc::clone(&platform)))
            .add_service(StorageServiceServer::from_arc(platform))
            .serve_with_incoming(TcpListenerStream::new(listener))
            .await
            .unwrap();
    });

    // Give the server time to start
    tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

    format!("http://{addr}")
}
