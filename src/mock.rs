// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Mock KServe v2 inference service for tests.
//!
//! Serves `ServerReady`, `ModelReady`, `ModelMetadata` and `ModelInfer` for
//! a set of scripted models and records every inference request it receives,
//! so tests can assert on the tensors a client actually sent. Use
//! [`MockInferenceService::serve`] to run it on an ephemeral loopback port.

use crate::client::{
    MODEL_INFER_PATH, MODEL_METADATA_PATH, MODEL_READY_PATH, SERVER_READY_PATH, SERVICE_NAME,
    UnaryCodec,
};
use crate::proto::v2::inference::{
    ModelInferRequest, ModelInferResponse, ModelMetadataRequest, ModelMetadataResponse,
    ModelReadyRequest, ModelReadyResponse, ServerReadyRequest, ServerReadyResponse,
    InferTensorContents, model_infer_response::InferOutputTensor,
    model_metadata_response::TensorMetadata,
};
use futures::future::BoxFuture;
use http::{Request, Response};
use prost::Message;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use std::task::Poll;
use std::time::Duration;
use tonic::Status;
use tonic::body::Body;
use tonic::server::{Grpc, NamedService, UnaryService};

/// How a scripted model answers `ModelInfer`.
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Answer with the given output tensors.
    Respond(Vec<InferOutputTensor>),
    /// Fail with a gRPC status.
    Fail {
        /// The status code to return.
        code: tonic::Code,
        /// The status message to return.
        message: String,
    },
    /// Sleep before answering with the given output tensors.
    Delay {
        /// How long to sleep before responding.
        duration: Duration,
        /// The output tensors returned afterwards.
        outputs: Vec<InferOutputTensor>,
    },
}

/// One scripted model hosted by the mock service.
#[derive(Debug, Clone)]
pub struct MockModel {
    /// Model name.
    pub name: String,
    /// Whether `ModelReady` reports the model as ready.
    pub ready: bool,
    /// Input tensor specs reported by `ModelMetadata`.
    pub inputs: Vec<TensorMetadata>,
    /// Output tensor specs reported by `ModelMetadata`.
    pub outputs: Vec<TensorMetadata>,
    /// Scripted `ModelInfer` behavior.
    pub behavior: MockBehavior,
}

impl MockModel {
    /// Creates a ready model with no tensors and an empty response.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ready: true,
            inputs: Vec::new(),
            outputs: Vec::new(),
            behavior: MockBehavior::Respond(Vec::new()),
        }
    }

    /// Adds an input tensor spec to the reported metadata.
    #[must_use]
    pub fn with_input(mut self, name: &str, datatype: &str, shape: Vec<i64>) -> Self {
        self.inputs.push(TensorMetadata {
            name: name.to_string(),
            datatype: datatype.to_string(),
            shape,
        });
        self
    }

    /// Adds an output tensor spec to the reported metadata.
    #[must_use]
    pub fn with_output(mut self, name: &str, datatype: &str, shape: Vec<i64>) -> Self {
        self.outputs.push(TensorMetadata {
            name: name.to_string(),
            datatype: datatype.to_string(),
            shape,
        });
        self
    }

    /// Scripts the `ModelInfer` response tensors.
    #[must_use]
    pub fn respond_with(mut self, outputs: Vec<InferOutputTensor>) -> Self {
        self.behavior = MockBehavior::Respond(outputs);
        self
    }

    /// Scripts an error status for `ModelInfer`.
    #[must_use]
    pub fn fail_with(mut self, code: tonic::Code, message: &str) -> Self {
        self.behavior = MockBehavior::Fail {
            code,
            message: message.to_string(),
        };
        self
    }

    /// Scripts a delayed response for `ModelInfer`.
    #[must_use]
    pub fn delay_with(mut self, duration: Duration, outputs: Vec<InferOutputTensor>) -> Self {
        self.behavior = MockBehavior::Delay { duration, outputs };
        self
    }

    /// Marks the model as not ready.
    #[must_use]
    pub fn not_ready(mut self) -> Self {
        self.ready = false;
        self
    }
}

/// Builds an `FP32` response tensor.
#[must_use]
pub fn fp32_output(name: &str, values: Vec<f32>) -> InferOutputTensor {
    InferOutputTensor {
        name: name.to_string(),
        datatype: "FP32".to_string(),
        shape: vec![values.len() as i64],
        parameters: HashMap::new(),
        contents: Some(InferTensorContents {
            fp32_contents: values,
            ..InferTensorContents::default()
        }),
    }
}

/// Builds an `FP64` response tensor.
#[must_use]
pub fn fp64_output(name: &str, values: Vec<f64>) -> InferOutputTensor {
    InferOutputTensor {
        name: name.to_string(),
        datatype: "FP64".to_string(),
        shape: vec![values.len() as i64],
        parameters: HashMap::new(),
        contents: Some(InferTensorContents {
            fp64_contents: values,
            ..InferTensorContents::default()
        }),
    }
}

/// Builds an `INT64` response tensor.
#[must_use]
pub fn int64_output(name: &str, values: Vec<i64>) -> InferOutputTensor {
    InferOutputTensor {
        name: name.to_string(),
        datatype: "INT64".to_string(),
        shape: vec![values.len() as i64],
        parameters: HashMap::new(),
        contents: Some(InferTensorContents {
            int64_contents: values,
            ..InferTensorContents::default()
        }),
    }
}

struct MockState {
    models: HashMap<String, MockModel>,
    requests: Mutex<Vec<ModelInferRequest>>,
    metadata_requests: Mutex<Vec<ModelMetadataRequest>>,
}

/// The mock service: clone-cheap and usable as a tonic server.
#[derive(Clone)]
pub struct MockInferenceService {
    state: Arc<MockState>,
}

impl MockInferenceService {
    /// Creates a service hosting the given scripted models.
    #[must_use]
    pub fn new(models: Vec<MockModel>) -> Self {
        Self {
            state: Arc::new(MockState {
                models: models
                    .into_iter()
                    .map(|model| (model.name.clone(), model))
                    .collect(),
                requests: Mutex::new(Vec::new()),
                metadata_requests: Mutex::new(Vec::new()),
            }),
        }
    }

    /// The inference requests received so far, in arrival order.
    #[must_use]
    pub fn received(&self) -> Vec<ModelInferRequest> {
        self.state
            .requests
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// The metadata requests received so far, in arrival order.
    #[must_use]
    pub fn metadata_received(&self) -> Vec<ModelMetadataRequest> {
        self.state
            .metadata_requests
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Serves the mock on an ephemeral loopback port and returns its address
    /// together with the server task handle.
    pub async fn serve(self) -> (std::net::SocketAddr, tokio::task::JoinHandle<()>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind loopback listener");
        let addr = listener.local_addr().expect("listener address");
        let incoming = tonic::codegen::tokio_stream::wrappers::TcpListenerStream::new(listener);
        let handle = tokio::spawn(async move {
            let _ = tonic::transport::Server::builder()
                .add_service(self)
                .serve_with_incoming(incoming)
                .await;
        });
        (addr, handle)
    }
}

async fn handle_unary<Req, Resp, S>(req: Request<Body>, service: S) -> Response<Body>
where
    Req: Message + Default + Send + Sync + 'static,
    Resp: Message + Send + Sync + 'static,
    S: UnaryService<Req, Response = Resp>,
{
    let codec = UnaryCodec::<Resp, Req>::default();
    let mut grpc = Grpc::new(codec);
    grpc.unary(service, req).await
}

/// generate a response for a path the grpc server does not know about
fn unimplemented_resp() -> Response<Body> {
    let mut response = Response::new(Body::default());
    let headers = response.headers_mut();
    let _ = headers.insert(
        Status::GRPC_STATUS,
        (tonic::Code::Unimplemented as i32).into(),
    );
    let _ = headers.insert(
        http::header::CONTENT_TYPE,
        tonic::metadata::GRPC_CONTENT_TYPE,
    );
    response
}

struct ServerReadySvc;

impl UnaryService<ServerReadyRequest> for ServerReadySvc {
    type Response = ServerReadyResponse;
    type Future = BoxFuture<'static, Result<tonic::Response<Self::Response>, Status>>;

    fn call(&mut self, _request: tonic::Request<ServerReadyRequest>) -> Self::Future {
        Box::pin(async { Ok(tonic::Response::new(ServerReadyResponse { ready: true })) })
    }
}

struct ModelReadySvc(Arc<MockState>);

impl UnaryService<ModelReadyRequest> for ModelReadySvc {
    type Response = ModelReadyResponse;
    type Future = BoxFuture<'static, Result<tonic::Response<Self::Response>, Status>>;

    fn call(&mut self, request: tonic::Request<ModelReadyRequest>) -> Self::Future {
        let state = Arc::clone(&self.0);
        Box::pin(async move {
            let name = request.into_inner().name;
            let ready = state.models.get(&name).is_some_and(|model| model.ready);
            Ok(tonic::Response::new(ModelReadyResponse { ready }))
        })
    }
}

struct ModelMetadataSvc(Arc<MockState>);

impl UnaryService<ModelMetadataRequest> for ModelMetadataSvc {
    type Response = ModelMetadataResponse;
    type Future = BoxFuture<'static, Result<tonic::Response<Self::Response>, Status>>;

    fn call(&mut self, request: tonic::Request<ModelMetadataRequest>) -> Self::Future {
        let state = Arc::clone(&self.0);
        Box::pin(async move {
            let request = request.into_inner();
            state
                .metadata_requests
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push(request.clone());
            let name = request.name;
            let Some(model) = state.models.get(&name) else {
                return Err(Status::not_found(format!("model `{name}` is not served")));
            };
            Ok(tonic::Response::new(ModelMetadataResponse {
                name: model.name.clone(),
                versions: vec!["1".to_string()],
                platform: "mock".to_string(),
                inputs: model.inputs.clone(),
                outputs: model.outputs.clone(),
            }))
        })
    }
}

struct ModelInferSvc(Arc<MockState>);

impl UnaryService<ModelInferRequest> for ModelInferSvc {
    type Response = ModelInferResponse;
    type Future = BoxFuture<'static, Result<tonic::Response<Self::Response>, Status>>;

    fn call(&mut self, request: tonic::Request<ModelInferRequest>) -> Self::Future {
        let state = Arc::clone(&self.0);
        Box::pin(async move {
            let request = request.into_inner();
            state
                .requests
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push(request.clone());

            let Some(model) = state.models.get(&request.model_name) else {
                return Err(Status::not_found(format!(
                    "model `{}` is not served",
                    request.model_name
                )));
            };

            let outputs = match &model.behavior {
                MockBehavior::Respond(outputs) => outputs.clone(),
                MockBehavior::Fail { code, message } => {
                    return Err(Status::new(*code, message.clone()));
                }
                MockBehavior::Delay { duration, outputs } => {
                    tokio::time::sleep(*duration).await;
                    outputs.clone()
                }
            };

            Ok(tonic::Response::new(ModelInferResponse {
                model_name: request.model_name,
                model_version: request.model_version,
                id: request.id,
                parameters: HashMap::new(),
                outputs,
                raw_output_contents: Vec::new(),
            }))
        })
    }
}

impl tower_service::Service<Request<Body>> for MockInferenceService {
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut std::task::Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let state = Arc::clone(&self.state);
        match req.uri().path() {
            SERVER_READY_PATH => {
                Box::pin(async move { Ok(handle_unary(req, ServerReadySvc).await) })
            }
            MODEL_READY_PATH => {
                Box::pin(async move { Ok(handle_unary(req, ModelReadySvc(state)).await) })
            }
            MODEL_METADATA_PATH => {
                Box::pin(async move { Ok(handle_unary(req, ModelMetadataSvc(state)).await) })
            }
            MODEL_INFER_PATH => {
                Box::pin(async move { Ok(handle_unary(req, ModelInferSvc(state)).await) })
            }
            _ => Box::pin(async move { Ok(unimplemented_resp()) }),
        }
    }
}

impl NamedService for MockInferenceService {
    const NAME: &'static str = SERVICE_NAME;
}
