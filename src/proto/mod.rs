// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Vendored KServe v2 inference protocol definitions.
//!
//! These definitions mirror the `inference` protobuf package of the KServe
//! open inference protocol (`grpc_service.proto`) and are vendored here to
//! avoid depending on protoc at build time. Only the unary RPC surface used
//! by the processor is carried: `ServerLive`, `ServerReady`, `ModelReady`,
//! `ModelMetadata` and `ModelInfer`.

#[allow(missing_docs)]
#[path = ""]
pub mod v2 {
    #[allow(unused_qualifications)]
    #[allow(clippy::enum_variant_names)]
    #[path = "inference.rs"]
    pub mod inference;
}
