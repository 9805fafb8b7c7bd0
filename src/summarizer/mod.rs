// SPDX-License-Identifier: MIT
//! gRPC client for the external summarizer service.
//!
//! One unary method: `GenerateSummary(SummaryRequest) → SummaryResponse`.
//! The response is opaque to the core — a summarization failure never blocks
//! history persistence.

pub mod pb;

use tonic::transport::{Channel, Endpoint};

/// Thin typed wrapper over a tonic channel. The channel connects lazily, so
/// the worker comes up even while the summarizer is down; calls fail with
/// `unavailable` until it returns.
pub struct SummaryClient {
    inner: tonic::client::Grpc<Channel>,
}

impl SummaryClient {
    pub fn new(channel: Channel) -> Self {
        Self {
            inner: tonic::client::Grpc::new(channel),
        }
    }

    pub fn channel(addr: &str) -> Result<Channel, tonic::transport::Error> {
        Ok(Endpoint::from_shared(addr.to_string())?.connect_lazy())
    }

    pub async fn generate_summary(
        &mut self,
        request: pb::SummaryRequest,
    ) -> Result<tonic::Response<pb::SummaryResponse>, tonic::Status> {
        self.inner.ready().await.map_err(|e| {
            tonic::Status::unavailable(format!("summarizer service not ready: {e}"))
        })?;
        let codec: tonic_prost::ProstCodec<pb::SummaryRequest, pb::SummaryResponse> =
            tonic_prost::ProstCodec::default();
        let path =
            http::uri::PathAndQuery::from_static("/summary.v1.SummaryService/GenerateSummary");
        self.inner
            .unary(tonic::Request::new(request), path, codec)
            .await
    }
}
