//! Similarity ranking used by clustering protocols.
//!
//! Scores follow a single sign convention: a higher score means a closer
//! peer. Distance-like metrics are therefore negated.

use std::{cmp::Ordering, collections::HashMap, fmt, sync::Arc};

use crate::{Payload, PeerId, View};

/// Pure scoring function between the local payload and a remote one.
///
/// Implementations must not perform I/O or rely on shared mutable state, the
/// ranker calls them many times per cycle.
pub trait Similarity: Send + Sync + 'static {
    fn score(&self, local: &Payload, remote: &Payload) -> f64;
}

impl<F> Similarity for F
where
    F: Fn(&Payload, &Payload) -> f64 + Send + Sync + 'static,
{
    fn score(&self, local: &Payload, remote: &Payload) -> f64 {
        self(local, remote)
    }
}

/// Keep the `n` entries of `view` most similar to `local`.
///
/// Returns an empty view when `n` is zero or the view is empty, and a plain
/// copy of the view when it already holds at most `n` entries. Otherwise every
/// returned item carries its score. Entries without payload score `-inf`, ties
/// are broken by peer id.
pub fn rank(n: usize, view: &View, local: Option<&Payload>, similarity: &dyn Similarity) -> View {
    if n == 0 || view.is_empty() {
        return View::new();
    }

    if n >= view.len() {
        return view.clone();
    }

    let mut scored: Vec<(f64, &PeerId)> = view
        .iter()
        .map(|(peer, item)| {
            let score = match (local, item.payload.as_ref()) {
                (Some(local), Some(remote)) => similarity.score(local, remote),
                _ => f64::NEG_INFINITY,
            };

            (score, peer)
        })
        .collect();

    scored.sort_by(|(a_score, a_peer), (b_score, b_peer)| {
        compare_scores(*b_score, *a_score).then(a_peer.cmp(b_peer))
    });

    scored
        .into_iter()
        .take(n)
        .filter_map(|(score, peer)| {
            view.get(peer).map(|item| {
                let mut item = item.clone();
                item.score = Some(score);
                (peer.clone(), item)
            })
        })
        .collect()
}

/// NaN scores compare as the lowest possible value
fn compare_scores(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.total_cmp(&b),
    }
}

/// `-|a - b|` over numeric payloads
#[derive(Debug, Default)]
pub struct NegativeDistance;

impl Similarity for NegativeDistance {
    fn score(&self, local: &Payload, remote: &Payload) -> f64 {
        match (local.as_f64(), remote.as_f64()) {
            (Some(a), Some(b)) => -(a - b).abs(),
            _ => f64::NEG_INFINITY,
        }
    }
}

/// Negated euclidean distance over numeric arrays of the same length
#[derive(Debug, Default)]
pub struct Euclidean;

impl Similarity for Euclidean {
    fn score(&self, local: &Payload, remote: &Payload) -> f64 {
        let (Some(a), Some(b)) = (numbers(local), numbers(remote)) else {
            return f64::NEG_INFINITY;
        };

        if a.len() != b.len() {
            return f64::NEG_INFINITY;
        }

        -a.iter()
            .zip(b.iter())
            .map(|(x, y)| (x - y).powi(2))
            .sum::<f64>()
            .sqrt()
    }
}

/// Jaccard index between two arrays seen as sets
#[derive(Debug, Default)]
pub struct Jaccard;

impl Similarity for Jaccard {
    fn score(&self, local: &Payload, remote: &Payload) -> f64 {
        let (Some(a), Some(b)) = (local.as_array(), remote.as_array()) else {
            return f64::NEG_INFINITY;
        };

        let mut union: Vec<&Payload> = Vec::with_capacity(a.len() + b.len());
        for value in a.iter().chain(b.iter()) {
            if !union.contains(&value) {
                union.push(value);
            }
        }

        if union.is_empty() {
            return 1.0;
        }

        let intersection = union
            .iter()
            .filter(|value| a.contains(**value) && b.contains(**value))
            .count();

        intersection as f64 / union.len() as f64
    }
}

fn numbers(payload: &Payload) -> Option<Vec<f64>> {
    payload
        .as_array()?
        .iter()
        .map(|value| value.as_f64())
        .collect()
}

/// Named similarity functions, resolved once when protocols are configured
#[derive(Clone)]
pub struct SimilarityRegistry {
    functions: HashMap<String, Arc<dyn Similarity>>,
}

impl SimilarityRegistry {
    pub const NEGATIVE_DISTANCE: &'static str = "negative-distance";
    pub const EUCLIDEAN: &'static str = "euclidean";
    pub const JACCARD: &'static str = "jaccard";

    /// Registry without any function
    pub fn empty() -> Self {
        Self {
            functions: HashMap::new(),
        }
    }

    pub fn register<S: Similarity>(&mut self, name: &str, similarity: S) -> &mut Self {
        self.functions
            .insert(name.to_string(), Arc::new(similarity));

        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Similarity>> {
        self.functions.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }
}

impl Default for SimilarityRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry
            .register(Self::NEGATIVE_DISTANCE, NegativeDistance)
            .register(Self::EUCLIDEAN, Euclidean)
            .register(Self::JACCARD, Jaccard);

        registry
    }
}

impl fmt::Debug for SimilarityRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.names().collect();
        names.sort_unstable();

        f.debug_struct("SimilarityRegistry")
            .field("functions", &names)
            .finish()
    }
}
