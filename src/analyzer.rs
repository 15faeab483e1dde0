//! Page Analysis Seam
//!
//! The governance layer caches whatever the analyzer produces. Fingerprinting
//! itself lives outside this crate; implementations plug in through
//! [`Analyzer`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Page submitted for analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// Address of the page
    pub url: String,

    /// Raw page content, if the caller already fetched it
    #[serde(default)]
    pub html: Option<String>,
}

/// Outcome of analyzing one page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Report identifier
    pub id: String,

    /// Analyzed page
    pub url: String,

    /// Technologies and content labels detected on the page
    pub labels: BTreeSet<String>,

    /// Bytes of page content inspected
    pub body_bytes: usize,

    /// When the analysis ran
    pub analyzed_at: DateTime<Utc>,
}

impl AnalysisReport {
    pub fn new(request: &AnalysisRequest, labels: BTreeSet<String>) -> Self {
        Self {
            id: format!("analysis-{}", uuid::Uuid::new_v4()),
            url: request.url.clone(),
            labels,
            body_bytes: request.html.as_ref().map(String::len).unwrap_or(0),
            analyzed_at: Utc::now(),
        }
    }
}

/// External page classifier
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Analyze a page and report the detected labels
    async fn analyze(&self, request: &AnalysisRequest) -> AnalysisReport;
}

/// Analyzer that detects nothing. Used when no classifier is wired in.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAnalyzer;

#[async_trait]
impl Analyzer for NoopAnalyzer {
    async fn analyze(&self, request: &AnalysisRequest) -> AnalysisReport {
        AnalysisReport::new(request, BTreeSet::new())
    }
}
