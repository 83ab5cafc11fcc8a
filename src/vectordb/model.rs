use std::collections::HashMap;

use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::vectors_output::VectorsOptions;
use qdrant_client::qdrant::{PointStruct, ScoredPoint};

use super::VectorDbError;
use crate::retrieval::{RawCandidate, VulnerabilityRecord};

pub const PAYLOAD_CVE_ID: &str = "cve_id";
pub const PAYLOAD_DATA: &str = "data";

/// A record to be indexed: identifier, structured payload and its embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct CveRecord {
    pub cve_id: String,
    pub record: VulnerabilityRecord,
    pub vector: Vec<f32>,
}

impl CveRecord {
    pub fn new(cve_id: impl Into<String>, record: VulnerabilityRecord, vector: Vec<f32>) -> Self {
        Self {
            cve_id: cve_id.into(),
            record,
            vector,
        }
    }

    pub fn point_id(&self) -> u64 {
        point_id_for(&self.cve_id)
    }

    pub fn into_point(self) -> Result<PointStruct, VectorDbError> {
        let id = self.point_id();
        let data = serde_json::to_string(&self.record).map_err(|e| VectorDbError::MalformedPoint {
            point: self.cve_id.clone(),
            reason: format!("record serialization failed: {}", e),
        })?;

        let mut payload: HashMap<String, qdrant_client::qdrant::Value> = HashMap::new();
        payload.insert(PAYLOAD_CVE_ID.to_string(), self.cve_id.into());
        payload.insert(PAYLOAD_DATA.to_string(), data.into());

        Ok(PointStruct::new(id, self.vector, payload))
    }
}

/// Stable point id for a CVE identifier: the first 8 bytes of its BLAKE3 hash (LE).
pub fn point_id_for(cve_id: &str) -> u64 {
    let hash = blake3::hash(cve_id.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hash.as_bytes()[..8]);
    u64::from_le_bytes(bytes)
}

/// Parses the JSON `data` payload of a stored record.
pub fn parse_record(point: &str, data: &str) -> Result<VulnerabilityRecord, VectorDbError> {
    serde_json::from_str(data).map_err(|e| VectorDbError::MalformedPoint {
        point: point.to_string(),
        reason: format!("'{}' payload is not a valid record: {}", PAYLOAD_DATA, e),
    })
}

/// Converts a Qdrant hit into a raw candidate.
///
/// A missing `cve_id` is passed through as `None` so the accessor rejects it; a missing
/// or unparseable `data` payload is an error here.
pub fn candidate_from_scored_point(point: ScoredPoint) -> Result<RawCandidate, VectorDbError> {
    let point_label = match point.id.as_ref().and_then(|pid| pid.point_id_options.as_ref()) {
        Some(PointIdOptions::Num(n)) => n.to_string(),
        Some(PointIdOptions::Uuid(u)) => u.clone(),
        None => "?".to_string(),
    };

    let payload = point.payload;

    let id = payload
        .get(PAYLOAD_CVE_ID)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    let data = payload
        .get(PAYLOAD_DATA)
        .and_then(|v| v.as_str())
        .ok_or_else(|| VectorDbError::MalformedPoint {
            point: point_label.clone(),
            reason: format!("missing '{}' payload", PAYLOAD_DATA),
        })?;
    let record = parse_record(&point_label, data)?;

    let embedding = point
        .vectors
        .and_then(|v| v.vectors_options)
        .and_then(|options| match options {
            VectorsOptions::Vector(v) => Some(v.data),
            _ => None,
        });

    Ok(RawCandidate {
        id,
        payload: record,
        distance: None,
        similarity: Some(point.score),
        embedding,
        pairwise: None,
    })
}
