//! Per-segment safety scores.
//!
//! Scores are synthetic: each path draws its segment scores from a normal
//! distribution picked by the path's rank, and the rank depends on which
//! kind of request produced the path and in what order it arrived. Segments
//! that geographically overlap always share one score, whichever path
//! introduced them first.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::models::{Coordinate, Path, PathBatch, PathId, PathSafetyRecord, Segment};
use crate::rules::{RoutingRules, MAX_SAFETY_SCORE, MIN_SAFETY_SCORE};
use crate::spatial::{gaussian, round_to, segment_approx_eq};

type CellKey = (i64, i64);

/// Append-only store of scored segments with tolerance-based lookup.
///
/// Segments are bucketed on a grid keyed by their start coordinate; the cell
/// size equals the match tolerance, so a match can only live in the start
/// cell or one of its eight neighbours.
#[derive(Debug, Clone)]
pub struct ScoreCache {
    tolerance: f64,
    cell_size: f64,
    segments: Vec<Segment>,
    grid: HashMap<CellKey, Vec<usize>>,
}

impl ScoreCache {
    pub fn new(tolerance: f64) -> Self {
        Self {
            tolerance,
            cell_size: tolerance.max(1e-9),
            segments: Vec::new(),
            grid: HashMap::new(),
        }
    }

    /// Score of the earliest cached segment matching `from -> to`.
    pub fn lookup(&self, from: Coordinate, to: Coordinate) -> Option<f64> {
        let (row, col) = self.cell(from);
        let mut best: Option<usize> = None;
        for d_row in -1..=1 {
            for d_col in -1..=1 {
                let Some(indices) = self.grid.get(&(row + d_row, col + d_col)) else {
                    continue;
                };
                for &index in indices {
                    let cached = &self.segments[index];
                    if best.is_some_and(|b| b <= index) {
                        continue;
                    }
                    if segment_approx_eq((cached.from, cached.to), (from, to), self.tolerance) {
                        best = Some(index);
                    }
                }
            }
        }
        best.map(|index| self.segments[index].safety_score)
    }

    /// Record a segment. Existing entries are never touched.
    pub fn insert(&mut self, segment: Segment) {
        let index = self.segments.len();
        let key = self.cell(segment.from);
        self.segments.push(segment);
        self.grid.entry(key).or_default().push(index);
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn clear(&mut self) {
        self.segments.clear();
        self.grid.clear();
    }

    fn cell(&self, c: Coordinate) -> CellKey {
        (
            (c.lat / self.cell_size).floor() as i64,
            (c.lng / self.cell_size).floor() as i64,
        )
    }
}

/// Assigns ranks and segment scores to incoming path batches.
pub struct SafetySynthesizer {
    rules: RoutingRules,
    cache: ScoreCache,
    pending: Vec<PathBatch>,
    safest_assigned: bool,
    second_safest_assigned: bool,
    next_other_rank: u32,
    scored: HashSet<PathId>,
    records: Vec<PathSafetyRecord>,
    rng: StdRng,
}

impl SafetySynthesizer {
    pub fn new(rules: RoutingRules) -> Self {
        Self::with_rng(rules, StdRng::from_os_rng())
    }

    pub fn with_seed(rules: RoutingRules, seed: u64) -> Self {
        Self::with_rng(rules, StdRng::seed_from_u64(seed))
    }

    fn with_rng(rules: RoutingRules, rng: StdRng) -> Self {
        let cache = ScoreCache::new(rules.coordinate_tolerance_deg);
        Self {
            rules,
            cache,
            pending: Vec::new(),
            safest_assigned: false,
            second_safest_assigned: false,
            next_other_rank: 3,
            scored: HashSet::new(),
            records: Vec::new(),
            rng,
        }
    }

    /// Take in one response's paths and return the records produced by it.
    ///
    /// A non-decoy batch is held back until a decoy path has been ranked
    /// safest; held batches are then scored decoys first.
    pub fn observe(&mut self, batch: PathBatch) -> Vec<PathSafetyRecord> {
        let uses_synthetic_midpoints = batch.uses_synthetic_midpoints;
        self.pending.push(batch);
        // Stable: arrival order is kept within each kind
        self.pending
            .sort_by_key(|b| if b.uses_synthetic_midpoints { 0 } else { 1 });

        if !uses_synthetic_midpoints && !self.safest_assigned {
            tracing::debug!(
                "Holding {} batch(es) until a decoy path is ranked safest",
                self.pending.len()
            );
            return Vec::new();
        }
        self.score_pending(false)
    }

    /// Score everything held back, ignoring the decoy barrier.
    pub fn flush(&mut self) -> Vec<PathSafetyRecord> {
        self.score_pending(true)
    }

    /// Decoy batches are always scored. Non-decoy batches only once rank 1
    /// is taken, unless `force` is set; otherwise they stay pending.
    fn score_pending(&mut self, force: bool) -> Vec<PathSafetyRecord> {
        let pending = std::mem::take(&mut self.pending);
        let mut emitted = Vec::new();
        for batch in pending {
            if !batch.uses_synthetic_midpoints && !self.safest_assigned && !force {
                self.pending.push(batch);
                continue;
            }
            for path in &batch.paths {
                if let Some(record) = self.score_path(path, batch.uses_synthetic_midpoints) {
                    emitted.push(record);
                }
            }
        }
        self.records.extend(emitted.iter().cloned());
        emitted
    }

    fn score_path(&mut self, path: &Path, from_decoy: bool) -> Option<PathSafetyRecord> {
        if path.geometry.len() < 2 {
            tracing::debug!("Skipping path {} with {} point(s)", path.id, path.geometry.len());
            return None;
        }
        if !self.scored.insert(path.id) {
            return None;
        }

        let rank = self.next_rank(from_decoy);
        let dist = self.rules.distribution_for_rank(rank);
        let precision = self.rules.score_precision;

        let mut segments = Vec::with_capacity(path.geometry.len() - 1);
        let mut hits = 0usize;
        for pair in path.geometry.windows(2) {
            let (from, to) = (pair[0], pair[1]);
            let safety_score = match self.cache.lookup(from, to) {
                Some(score) => {
                    hits += 1;
                    score
                }
                None => {
                    let sampled = gaussian(&mut self.rng, dist.mean, dist.stdev)
                        .clamp(MIN_SAFETY_SCORE, MAX_SAFETY_SCORE);
                    let score = round_to(sampled, precision);
                    self.cache.insert(Segment {
                        from,
                        to,
                        safety_score: score,
                    });
                    score
                }
            };
            segments.push(Segment {
                from,
                to,
                safety_score,
            });
        }

        let sum: f64 = segments.iter().map(|s| s.safety_score).sum();
        let overall_score = round_to(sum / segments.len() as f64, precision);
        tracing::trace!(
            "Path {} rank {}: {} segment(s), {} cached",
            path.id,
            rank,
            segments.len(),
            hits
        );

        Some(PathSafetyRecord {
            path_id: path.id,
            rank,
            segments,
            overall_score,
        })
    }

    fn next_rank(&mut self, from_decoy: bool) -> u32 {
        if from_decoy && !self.safest_assigned {
            self.safest_assigned = true;
            return 1;
        }
        if !from_decoy && !self.second_safest_assigned {
            self.second_safest_assigned = true;
            return 2;
        }
        let rank = self.next_other_rank;
        self.next_other_rank += 1;
        rank
    }

    pub fn records(&self) -> &[PathSafetyRecord] {
        &self.records
    }

    pub fn cache(&self) -> &ScoreCache {
        &self.cache
    }

    pub fn pending_batches(&self) -> usize {
        self.pending.len()
    }

    pub fn safest_assigned(&self) -> bool {
        self.safest_assigned
    }

    /// Forget everything scored this session. The random source is kept.
    pub fn clear(&mut self) {
        self.cache.clear();
        self.pending.clear();
        self.safest_assigned = false;
        self.second_safest_assigned = false;
        self.next_other_rank = 3;
        self.scored.clear();
        self.records.clear();
    }
}

/// Order scored paths by an even blend of distance and overall score,
/// highest first. Paths without a record are left out.
pub fn rank_paths(paths: &[Path], records: &[PathSafetyRecord]) -> Vec<PathId> {
    let mut blended: Vec<(PathId, f64)> = paths
        .iter()
        .filter_map(|path| {
            let record = records.iter().find(|r| r.path_id == path.id)?;
            Some((path.id, path.distance * 0.5 + record.overall_score * 0.5))
        })
        .collect();
    blended.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    blended.into_iter().map(|(id, _)| id).collect()
}
