//! Removal of synthetic waypoints from decoy responses.

use crate::models::Path;

/// Return `path` with the synthetic entries of its snapped waypoints removed.
///
/// Decoy requests carry one synthetic point between each pair of real
/// points, so the synthetic ones sit at every odd index. Paths from
/// non-decoy requests come back unchanged.
pub fn restore(path: &Path, uses_synthetic_midpoints: bool) -> Path {
    if !uses_synthetic_midpoints {
        return path.clone();
    }
    Path {
        snapped_waypoints: path
            .snapped_waypoints
            .iter()
            .step_by(2)
            .copied()
            .collect(),
        ..path.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Coordinate;

    fn path_with_snapped(n: usize) -> Path {
        let snapped = (0..n).map(|i| Coordinate::new(i as f64, i as f64)).collect();
        Path::new(
            vec![Coordinate::new(0.0, 0.0), Coordinate::new(1.0, 1.0)],
            100.0,
            1000,
            snapped,
        )
    }

    #[test]
    fn drops_odd_indices_for_decoys() {
        let path = path_with_snapped(5);
        let restored = restore(&path, true);
        let lats: Vec<f64> = restored.snapped_waypoints.iter().map(|c| c.lat).collect();
        assert_eq!(lats, vec![0.0, 2.0, 4.0]);
        assert_eq!(restored.id, path.id);
        assert_eq!(restored.geometry, path.geometry);
    }

    #[test]
    fn input_is_not_mutated() {
        let path = path_with_snapped(3);
        let _ = restore(&path, true);
        assert_eq!(path.snapped_waypoints.len(), 3);
    }

    #[test]
    fn identity_without_synthetic_points() {
        let path = path_with_snapped(4);
        let restored = restore(&path, false);
        assert_eq!(restored.snapped_waypoints, path.snapped_waypoints);
        assert_eq!(restored.id, path.id);
    }

    #[test]
    fn handles_short_sequences() {
        assert!(restore(&path_with_snapped(0), true).snapped_waypoints.is_empty());
        assert_eq!(restore(&path_with_snapped(1), true).snapped_waypoints.len(), 1);
        assert_eq!(restore(&path_with_snapped(2), true).snapped_waypoints.len(), 1);
    }
}
