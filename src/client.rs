// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Client for the KServe v2 `inference.GRPCInferenceService` gRPC service.
//!
//! The client wraps a lazily connected tonic channel. Every call attaches the
//! configured ASCII headers and is bounded by a deadline: `ModelInfer` by the
//! rule's timeout, the probe and metadata RPCs by the client-wide one. An
//! elapsed deadline cancels the in-flight RPC. No retries happen at this
//! layer.

use crate::config::GrpcClientSettings;
use crate::error::{ConfigError, InferenceError};
use crate::proto::v2::inference::{
    ModelInferRequest, ModelInferResponse, ModelMetadataRequest, ModelMetadataResponse,
    ModelReadyRequest, ModelReadyResponse, ServerReadyRequest, ServerReadyResponse,
};
use http::uri::PathAndQuery;
use prost::Message;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use tonic::client::Grpc;
use tonic::codec::{Codec, DecodeBuf, Decoder, EncodeBuf, Encoder};
use tonic::metadata::{AsciiMetadataKey, AsciiMetadataValue};
use tonic::transport::Channel;
use tonic::{GrpcMethod, Request, Status};

/// Full gRPC service name of the KServe v2 inference protocol.
pub const SERVICE_NAME: &str = "inference.GRPCInferenceService";

pub(crate) const SERVER_READY_PATH: &str = "/inference.GRPCInferenceService/ServerReady";
pub(crate) const MODEL_READY_PATH: &str = "/inference.GRPCInferenceService/ModelReady";
pub(crate) const MODEL_METADATA_PATH: &str = "/inference.GRPCInferenceService/ModelMetadata";
pub(crate) const MODEL_INFER_PATH: &str = "/inference.GRPCInferenceService/ModelInfer";

/// Codec for one unary method: encodes `Req`, decodes `Resp`.
pub(crate) struct UnaryCodec<Req, Resp> {
    _pd: PhantomData<(Req, Resp)>,
}

impl<Req, Resp> Default for UnaryCodec<Req, Resp> {
    fn default() -> Self {
        Self { _pd: PhantomData }
    }
}

impl<Req, Resp> Codec for UnaryCodec<Req, Resp>
where
    Req: Message + Send + 'static,
    Resp: Message + Default + Send + 'static,
{
    type Encode = Req;
    type Decode = Resp;

    type Encoder = ProstEncoder<Req>;
    type Decoder = ProstDecoder<Resp>;

    fn encoder(&mut self) -> Self::Encoder {
        ProstEncoder { _pd: PhantomData }
    }

    fn decoder(&mut self) -> Self::Decoder {
        ProstDecoder { _pd: PhantomData }
    }
}

/// Serializes a prost message into the request buffer.
pub(crate) struct ProstEncoder<T> {
    _pd: PhantomData<T>,
}

impl<T: Message> Encoder for ProstEncoder<T> {
    type Item = T;
    type Error = Status;

    fn encode(&mut self, item: Self::Item, dst: &mut EncodeBuf<'_>) -> Result<(), Self::Error> {
        item.encode(dst)
            .map_err(|e| Status::internal(e.to_string()))
    }
}

/// Deserializes a prost message from the response buffer.
pub(crate) struct ProstDecoder<T> {
    _pd: PhantomData<T>,
}

impl<T: Message + Default> Decoder for ProstDecoder<T> {
    type Item = T;
    type Error = Status;

    fn decode(&mut self, buf: &mut DecodeBuf<'_>) -> Result<Option<Self::Item>, Self::Error> {
        let item = Message::decode(buf)
            .map(Some)
            .map_err(|e| Status::internal(e.to_string()))?;
        Ok(item)
    }
}

/// A cheaply cloneable handle to the remote inference service.
#[derive(Clone, Debug)]
pub struct InferenceClient {
    inner: Grpc<Channel>,
    headers: Arc<Vec<(AsciiMetadataKey, AsciiMetadataValue)>>,
    rpc_timeout: Duration,
}

impl InferenceClient {
    /// Builds a client from transport settings. The channel connects lazily
    /// on first use; `rpc_timeout` bounds every call that does not carry its
    /// own deadline.
    pub fn new(settings: &GrpcClientSettings, rpc_timeout: Duration) -> Result<Self, ConfigError> {
        let endpoint = settings.build_endpoint()?;
        let channel = endpoint.connect_lazy();

        let mut inner = Grpc::new(channel);
        if let Some(encoding) = settings.compression_encoding() {
            inner = inner.send_compressed(encoding).accept_compressed(encoding);
        }
        if let Some(limit) = settings.max_receive_message_size {
            inner = inner.max_decoding_message_size(limit);
        }

        let mut headers = Vec::with_capacity(settings.headers.len());
        for (name, value) in &settings.headers {
            let key = name
                .parse::<AsciiMetadataKey>()
                .map_err(|e| ConfigError::InvalidHeader {
                    name: name.clone(),
                    error: e.to_string(),
                })?;
            let value =
                value
                    .parse::<AsciiMetadataValue>()
                    .map_err(|e| ConfigError::InvalidHeader {
                        name: name.clone(),
                        error: e.to_string(),
                    })?;
            headers.push((key, value));
        }

        Ok(Self {
            inner,
            headers: Arc::new(headers),
            rpc_timeout,
        })
    }

    /// `ServerReady`: whether the server accepts inference requests.
    pub async fn server_ready(&mut self) -> Result<bool, InferenceError> {
        let timeout = self.rpc_timeout;
        let response: ServerReadyResponse = self
            .unary(ServerReadyRequest {}, SERVER_READY_PATH, "ServerReady", timeout)
            .await?;
        Ok(response.ready)
    }

    /// `ModelReady`: whether the named model is loaded and ready.
    pub async fn model_ready(
        &mut self,
        model: &str,
        version: Option<&str>,
    ) -> Result<bool, InferenceError> {
        let request = ModelReadyRequest {
            name: model.to_string(),
            version: version.unwrap_or_default().to_string(),
        };
        let timeout = self.rpc_timeout;
        let response: ModelReadyResponse = self
            .unary(request, MODEL_READY_PATH, "ModelReady", timeout)
            .await?;
        Ok(response.ready)
    }

    /// `ModelMetadata`: the model's ordered input/output tensor specs.
    pub async fn model_metadata(
        &mut self,
        model: &str,
        version: Option<&str>,
    ) -> Result<ModelMetadataResponse, InferenceError> {
        let request = ModelMetadataRequest {
            name: model.to_string(),
            version: version.unwrap_or_default().to_string(),
        };
        let timeout = self.rpc_timeout;
        self.unary(request, MODEL_METADATA_PATH, "ModelMetadata", timeout)
            .await
    }

    /// `ModelInfer`: one inference execution, bounded by the rule's `timeout`.
    pub async fn model_infer(
        &mut self,
        request: ModelInferRequest,
        timeout: Duration,
    ) -> Result<ModelInferResponse, InferenceError> {
        self.unary(request, MODEL_INFER_PATH, "ModelInfer", timeout)
            .await
    }

    async fn unary<Req, Resp>(
        &mut self,
        message: Req,
        path: &'static str,
        method: &'static str,
        timeout: Duration,
    ) -> Result<Resp, InferenceError>
    where
        Req: Message + Send + Sync + 'static,
        Resp: Message + Default + Send + Sync + 'static,
    {
        let mut request = Request::new(message);
        for (key, value) in self.headers.iter() {
            let _ = request.metadata_mut().insert(key.clone(), value.clone());
        }
        let _ = request
            .extensions_mut()
            .insert(GrpcMethod::new(SERVICE_NAME, method));

        let codec = UnaryCodec::<Req, Resp>::default();
        let path = PathAndQuery::from_static(path);

        let call = async {
            self.inner
                .ready()
                .await
                .map_err(|e| InferenceError::Transport {
                    message: e.to_string(),
                })?;
            self.inner
                .unary(request, path, codec)
                .await
                .map(tonic::Response::into_inner)
                .map_err(|status| InferenceError::from_status(&status, timeout))
        };
        match tokio::time::timeout(timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(InferenceError::Timeout { timeout }),
        }
    }
}
