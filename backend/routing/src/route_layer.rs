/// File-backed route layer.
///
/// Each route lists example utterances; an input scores against a route by the
/// best word-set overlap (Jaccard) with any of its utterances.
use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::Result;
use async_trait::async_trait;
use concierge_core::ConciergeError;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::classifier::{IntentClassifier, IntentRoute, RouteName};

static WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[a-z0-9']+").unwrap());

const DEFAULT_THRESHOLD: f32 = 0.3;
const DEFAULT_TOP_K: usize = 3;

#[derive(Deserialize)]
struct LayerFile {
    threshold: Option<f32>,
    top_k: Option<usize>,
    routes: Vec<RouteDef>,
}

#[derive(Deserialize)]
struct RouteDef {
    #[serde(default)]
    name: Value,
    #[serde(default)]
    utterances: Vec<String>,
}

struct Route {
    name: RouteName,
    utterances: Vec<HashSet<String>>,
}

pub struct RouteLayer {
    routes: Vec<Route>,
    threshold: f32,
    top_k: usize,
}

impl RouteLayer {
    /// Load the layer from a JSON file. A missing or unreadable file is a load error.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConciergeError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConciergeError::ClassifierLoad(format!(
                "File not found: {}",
                path.display()
            )));
        }
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ConciergeError::ClassifierLoad(format!("{}: {}", path.display(), e))
        })?;
        let layer = Self::from_json_str(&raw)?;
        info!(path = %path.display(), routes = layer.routes.len(), "Loaded route layer");
        Ok(layer)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConciergeError> {
        let file: LayerFile = serde_json::from_str(raw)
            .map_err(|e| ConciergeError::ClassifierLoad(format!("invalid route layer: {e}")))?;

        let routes = file
            .routes
            .into_iter()
            .map(|def| Route {
                name: RouteName::from_json(&def.name),
                utterances: def.utterances.iter().map(|u| tokenize(u)).collect(),
            })
            .collect();

        Ok(Self {
            routes,
            threshold: file.threshold.unwrap_or(DEFAULT_THRESHOLD),
            top_k: file.top_k.unwrap_or(DEFAULT_TOP_K).max(1),
        })
    }

    /// Labels of all well-formed routes, in file order.
    pub fn route_names(&self) -> Vec<String> {
        self.routes
            .iter()
            .filter_map(|r| r.name.as_named().map(str::to_string))
            .collect()
    }

    /// Routes scoring at or above the threshold, best first, at most `top_k`.
    pub fn retrieve_multiple_routes(&self, text: &str) -> Vec<IntentRoute> {
        let words = tokenize(text);
        if words.is_empty() {
            return Vec::new();
        }

        let mut matches: Vec<IntentRoute> = self
            .routes
            .iter()
            .filter_map(|route| {
                let score = route
                    .utterances
                    .iter()
                    .map(|u| jaccard(&words, u))
                    .fold(0.0_f32, f32::max);
                (score >= self.threshold).then(|| IntentRoute {
                    name: route.name.clone(),
                    score,
                })
            })
            .collect();

        matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        matches.truncate(self.top_k);
        debug!(candidates = matches.len(), "Route layer scored input");
        matches
    }
}

#[async_trait]
impl IntentClassifier for RouteLayer {
    async fn classify(&self, text: &str) -> Result<Vec<IntentRoute>> {
        Ok(self.retrieve_multiple_routes(text))
    }
}

fn tokenize(text: &str) -> HashSet<String> {
    let lower = text.to_lowercase();
    WORD_RE
        .find_iter(&lower)
        .map(|m| m.as_str().to_string())
        .collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f32 / union as f32
}
