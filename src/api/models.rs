//! API models for the batchfossil HTTP surface.
//!
//! - `POST /fossils` accepts a [`FossilRequest`] and answers with
//!   [`FossilAcceptedResponse`] once the record is durable
//! - `GET /results/{data}` returns the latest [`FossilResult`] seen for `data`
//! - `GET /info` returns the fossilizer [`Info`]
//!
//! # Request
//!
//! ```json
//! {
//!   "data": "ca978112ca1bbdcafac231b39a23dc4da786eff8147c4e72b9807785afee48bb",
//!   "meta": "test a"
//! }
//! ```
//!
//! `data` is the leaf value as hex (usually a content hash), `meta` is echoed
//! back in the result and never interpreted.
//!
//! [`FossilResult`]: crate::evidence::FossilResult
//! [`Info`]: crate::fossilizer::Info

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::observability::MetricsSnapshot;

#[derive(Debug, Deserialize, Clone)]
pub struct FossilRequest {
    pub data: String,
    #[serde(default)]
    pub meta: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct FossilAcceptedResponse {
    /// Lowercase hex of the accepted data, usable with `GET /results/{data}`
    pub data: String,
    pub status: FossilStatus,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FossilStatus {
    Pending,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub components: BTreeMap<String, String>,
    pub version: String,
    pub metrics: MetricsSnapshot,
}
