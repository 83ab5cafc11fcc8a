use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A vulnerability record as stored alongside its embedding.
///
/// Every field is optional; the renderer substitutes a placeholder for missing ones.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VulnerabilityRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cvss: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threat: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mitigation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cwe: Vec<String>,
}

impl VulnerabilityRecord {
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_product(mut self, product: impl Into<String>, version: impl Into<String>) -> Self {
        self.product = Some(product.into());
        self.version = Some(version.into());
        self
    }

    pub fn with_severity(mut self, severity: impl Into<String>, cvss: f32) -> Self {
        self.severity = Some(severity.into());
        self.cvss = Some(cvss);
        self
    }
}

/// How the distance between two candidates of the same batch is obtained.
#[derive(Debug, Clone, PartialEq)]
pub enum DistanceSource {
    /// Precomputed distances to the other candidates, keyed by identifier.
    Lookup(HashMap<String, f32>),
    /// Normalized embedding; distances are `1 - dot(a, b)`.
    Vector(Vec<f32>),
}

/// A candidate in canonical shape.
///
/// `similarity` is always "higher is better"; raw distances are converted by the
/// [accessor](super::accessor) before an entry is built.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateEntry {
    pub id: String,
    pub payload: VulnerabilityRecord,
    pub similarity: f32,
    pub distances: DistanceSource,
}

impl CandidateEntry {
    pub fn new(
        id: impl Into<String>,
        payload: VulnerabilityRecord,
        similarity: f32,
        distances: DistanceSource,
    ) -> Self {
        Self {
            id: id.into(),
            payload,
            similarity,
            distances,
        }
    }

    /// Distance between `self` and `other`, or `None` if it cannot be resolved.
    ///
    /// A lookup on either side is consulted first; otherwise both sides must carry
    /// vectors of equal length.
    pub fn pairwise_distance(&self, other: &CandidateEntry) -> Option<f32> {
        if self.id == other.id {
            return Some(0.0);
        }

        if let DistanceSource::Lookup(map) = &self.distances
            && let Some(d) = map.get(&other.id)
        {
            return Some(*d);
        }

        if let DistanceSource::Lookup(map) = &other.distances
            && let Some(d) = map.get(&self.id)
        {
            return Some(*d);
        }

        match (&self.distances, &other.distances) {
            (DistanceSource::Vector(a), DistanceSource::Vector(b)) => cosine_distance(a, b),
            _ => None,
        }
    }
}

/// `1 - dot(a, b)`; inputs are assumed to be unit-normalized.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    Some(1.0 - dot)
}

/// Scales `v` to unit length in place. Zero vectors are left untouched.
pub fn normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
}
