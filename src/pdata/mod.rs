// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Vendored OTLP metrics data model.
//!
//! These definitions mirror the `opentelemetry.proto.{common,resource,metrics}.v1`
//! protobuf packages and are vendored here to avoid depending on protoc at
//! build time. The processor consumes and produces [`MetricsData`] batches,
//! the resource → scope → metric tree used by the host pipeline.
//!
//! [`MetricsData`]: opentelemetry::metrics::v1::MetricsData

#[allow(missing_docs)]
#[path = ""]
pub mod opentelemetry {
    #[path = ""]
    pub mod common {
        #[allow(clippy::enum_variant_names)]
        #[path = "opentelemetry.proto.common.v1.rs"]
        pub mod v1;
    }

    #[path = ""]
    pub mod resource {
        #[path = "opentelemetry.proto.resource.v1.rs"]
        pub mod v1;
    }

    #[path = ""]
    pub mod metrics {
        #[allow(rustdoc::invalid_html_tags)]
        #[path = "opentelemetry.proto.metrics.v1.rs"]
        pub mod v1;
    }
}
