//! One-dimensional k-means used to bucket average scores into status labels.
//!
//! Seeding is k-means++ driven by a seeded [`StdRng`], so a given input and
//! seed always produce the same partition. Labels are attached by centroid
//! rank rather than by raw cluster index: the cluster with the highest mean
//! score is always [`StatusLabel::Otimo`].

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{PipelineError, Result};

pub const STATUS_CLUSTERS: usize = 3;
const DEFAULT_MAX_ITERATIONS: usize = 300;
const DEFAULT_TOLERANCE: f64 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusLabel {
    Otimo,
    Bom,
    Regular,
}

impl StatusLabel {
    /// Labels ordered from the highest-scoring cluster to the lowest.
    pub const RANKED: [StatusLabel; STATUS_CLUSTERS] =
        [StatusLabel::Otimo, StatusLabel::Bom, StatusLabel::Regular];

    pub fn as_str(&self) -> &'static str {
        match self {
            StatusLabel::Otimo => "ótimo",
            StatusLabel::Bom => "bom",
            StatusLabel::Regular => "regular",
        }
    }

    pub fn from_rank(rank: usize) -> Option<Self> {
        Self::RANKED.get(rank).copied()
    }
}

#[derive(Debug, Clone)]
pub struct KMeans {
    pub k: usize,
    pub seed: u64,
    pub restarts: usize,
    pub max_iterations: usize,
    pub tolerance: f64,
}

impl KMeans {
    pub fn new(k: usize, seed: u64) -> Self {
        Self {
            k,
            seed,
            restarts: 10,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            tolerance: DEFAULT_TOLERANCE,
        }
    }

    /// The three-cluster model behind [`status_labels`].
    pub fn for_status(seed: u64) -> Self {
        Self::new(STATUS_CLUSTERS, seed)
    }

    pub fn with_restarts(mut self, restarts: usize) -> Self {
        self.restarts = restarts.max(1);
        self
    }

    pub fn fit(&self, values: &[f64]) -> Result<Clustering> {
        if self.k == 0 {
            return Err(PipelineError::Clustering(
                "cluster count must be positive".to_string(),
            ));
        }
        if let Some(idx) = values.iter().position(|v| !v.is_finite()) {
            return Err(PipelineError::Clustering(format!(
                "value at row {idx} is not a finite number"
            )));
        }

        let distinct = count_distinct(values);
        if distinct < self.k {
            return Err(PipelineError::Clustering(format!(
                "need at least {} distinct values, found {distinct}",
                self.k
            )));
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut best: Option<Clustering> = None;

        for _ in 0..self.restarts.max(1) {
            let initial = self.seed_centroids(values, &mut rng);
            let candidate = self.lloyd(values, initial);
            let better = match &best {
                Some(current) => candidate.inertia < current.inertia,
                None => true,
            };
            if better {
                best = Some(candidate);
            }
        }

        best.ok_or_else(|| PipelineError::Clustering("no clustering run completed".to_string()))
    }

    fn seed_centroids(&self, values: &[f64], rng: &mut StdRng) -> Vec<f64> {
        let mut centroids = Vec::with_capacity(self.k);
        centroids.push(values[rng.gen_range(0..values.len())]);

        while centroids.len() < self.k {
            let weights: Vec<f64> = values
                .iter()
                .map(|&v| squared_distance_to_nearest(v, &centroids))
                .collect();
            let total: f64 = weights.iter().sum();

            let mut target = rng.gen::<f64>() * total;
            let mut chosen = None;
            for (idx, weight) in weights.iter().enumerate() {
                if *weight <= 0.0 {
                    continue;
                }
                if target < *weight {
                    chosen = Some(idx);
                    break;
                }
                target -= weight;
                chosen = Some(idx);
            }

            // total > 0 while fewer than `distinct` centroids exist, so a point is always chosen
            match chosen {
                Some(idx) => centroids.push(values[idx]),
                None => break,
            }
        }

        centroids
    }

    fn lloyd(&self, values: &[f64], mut centroids: Vec<f64>) -> Clustering {
        let mut assignments = assign(values, &centroids);

        for _ in 0..self.max_iterations {
            relocate_empty_clusters(values, &mut centroids, &mut assignments);
            let updated = recompute_centroids(values, &assignments, &centroids);
            let shift = updated
                .iter()
                .zip(&centroids)
                .map(|(a, b)| (a - b).abs())
                .fold(0.0, f64::max);
            centroids = updated;
            assignments = assign(values, &centroids);
            if shift <= self.tolerance {
                break;
            }
        }

        relocate_empty_clusters(values, &mut centroids, &mut assignments);
        let centroids = recompute_centroids(values, &assignments, &centroids);
        let inertia: f64 = values
            .iter()
            .zip(&assignments)
            .map(|(v, &c)| (v - centroids[c]).powi(2))
            .sum();

        Clustering {
            assignments,
            centroids,
            inertia,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Clustering {
    /// Cluster index per input value, in input order.
    pub assignments: Vec<usize>,
    pub centroids: Vec<f64>,
    pub inertia: f64,
}

impl Clustering {
    /// Rank of each cluster index when centroids are sorted in descending order.
    pub fn centroid_ranks(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.centroids.len()).collect();
        order.sort_by(|&a, &b| self.centroids[b].total_cmp(&self.centroids[a]));

        let mut ranks = vec![0; self.centroids.len()];
        for (rank, cluster) in order.into_iter().enumerate() {
            ranks[cluster] = rank;
        }
        ranks
    }

    pub fn ranked_assignments(&self) -> Vec<usize> {
        let ranks = self.centroid_ranks();
        self.assignments.iter().map(|&c| ranks[c]).collect()
    }
}

/// Cluster `scores` into the three status groups and return one label per score.
pub fn status_labels(scores: &[f64], kmeans: &KMeans) -> Result<Vec<StatusLabel>> {
    if kmeans.k != STATUS_CLUSTERS {
        return Err(PipelineError::Clustering(format!(
            "status labelling needs {STATUS_CLUSTERS} clusters, got {}",
            kmeans.k
        )));
    }
    let clustering = kmeans.fit(scores)?;

    clustering
        .ranked_assignments()
        .into_iter()
        .map(|rank| {
            StatusLabel::from_rank(rank)
                .ok_or_else(|| PipelineError::Clustering(format!("no label for rank {rank}")))
        })
        .collect()
}

fn count_distinct(values: &[f64]) -> usize {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted.dedup();
    sorted.len()
}

fn squared_distance_to_nearest(value: f64, centroids: &[f64]) -> f64 {
    centroids
        .iter()
        .map(|c| (value - c).powi(2))
        .fold(f64::INFINITY, f64::min)
}

fn nearest(value: f64, centroids: &[f64]) -> usize {
    let mut best = 0;
    let mut best_distance = f64::INFINITY;
    for (idx, c) in centroids.iter().enumerate() {
        let distance = (value - c).abs();
        if distance < best_distance {
            best = idx;
            best_distance = distance;
        }
    }
    best
}

fn assign(values: &[f64], centroids: &[f64]) -> Vec<usize> {
    values.iter().map(|&v| nearest(v, centroids)).collect()
}

fn recompute_centroids(values: &[f64], assignments: &[usize], previous: &[f64]) -> Vec<f64> {
    let mut sums = vec![0.0; previous.len()];
    let mut counts = vec![0usize; previous.len()];
    for (v, &c) in values.iter().zip(assignments) {
        sums[c] += v;
        counts[c] += 1;
    }
    sums.iter()
        .zip(&counts)
        .zip(previous)
        .map(|((sum, &count), &prev)| {
            if count == 0 {
                prev
            } else {
                sum / count as f64
            }
        })
        .collect()
}

/// Move the point farthest from its centroid into any cluster left without members.
fn relocate_empty_clusters(values: &[f64], centroids: &mut [f64], assignments: &mut [usize]) {
    for empty in 0..centroids.len() {
        let mut counts = vec![0usize; centroids.len()];
        for &c in assignments.iter() {
            counts[c] += 1;
        }
        if counts[empty] > 0 {
            continue;
        }

        let donor = assignments
            .iter()
            .enumerate()
            .filter(|(_, cluster)| counts[**cluster] > 1)
            .max_by(|a, b| {
                let da = (values[a.0] - centroids[*a.1]).abs();
                let db = (values[b.0] - centroids[*b.1]).abs();
                da.total_cmp(&db)
            })
            .map(|(idx, _)| idx);

        if let Some(idx) = donor {
            assignments[idx] = empty;
            centroids[empty] = values[idx];
        }
    }
}
