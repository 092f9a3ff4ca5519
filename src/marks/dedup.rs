//! Duplicate suppression for nested contours of one printed ring.

use anyhow::Result;

use super::types::MarkCandidate;
use crate::cancel::CancelToken;

/// Keeps one candidate per physical mark.
///
/// Candidates are visited largest area first (ties in input order); a
/// candidate is dropped when its center lies closer than `radius_px` to a
/// candidate already kept. Survivors are returned unchanged, largest first.
pub fn suppress_duplicates(
    candidates: &[MarkCandidate],
    radius_px: f32,
    cancel: &CancelToken,
) -> Result<Vec<MarkCandidate>> {
    let mut order: Vec<usize> = (0..candidates.len()).collect();
    // Stable sort keeps input order among equal areas
    order.sort_by(|&a, &b| candidates[b].area.total_cmp(&candidates[a].area));

    let limit = radius_px as f64;
    let mut kept: Vec<MarkCandidate> = Vec::with_capacity(candidates.len());

    for idx in order {
        cancel.check()?;

        let c = &candidates[idx];
        let is_duplicate = kept.iter().any(|k| {
            let dx = (c.x - k.x) as f64;
            let dy = (c.y - k.y) as f64;
            (dx * dx + dy * dy).sqrt() < limit
        });

        if !is_duplicate {
            kept.push(*c);
        }
    }

    crate::log(&format!(
        "Duplicate suppression: kept {} unique marks (removed {} duplicates)",
        kept.len(),
        candidates.len() - kept.len()
    ));

    Ok(kept)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(x: i32, y: i32, area: f64) -> MarkCandidate {
        MarkCandidate {
            x,
            y,
            radius: 22,
            area,
            circularity: 0.9,
        }
    }

    #[test]
    fn test_inner_ring_removed() {
        let input = vec![
            candidate(100, 100, 1030.0), // inner ring
            candidate(101, 99, 1370.0),  // outer ring
            candidate(160, 100, 1400.0),
        ];

        let kept = suppress_duplicates(&input, 10.0, &CancelToken::new()).unwrap();

        assert_eq!(kept.len(), 2);
        assert!(kept.contains(&input[1]));
        assert!(kept.contains(&input[2]));
        assert!(!kept.contains(&input[0]));
    }

    #[test]
    fn test_equal_areas_keep_first_in_input_order() {
        let input = vec![candidate(50, 50, 1200.0), candidate(55, 50, 1200.0)];

        let kept = suppress_duplicates(&input, 10.0, &CancelToken::new()).unwrap();

        assert_eq!(kept, vec![input[0]]);
    }

    #[test]
    fn test_idempotent() {
        let input = vec![
            candidate(10, 10, 900.0),
            candidate(14, 12, 1500.0),
            candidate(40, 10, 1500.0),
            candidate(45, 14, 800.0),
            candidate(80, 80, 1000.0),
        ];

        let once = suppress_duplicates(&input, 10.0, &CancelToken::new()).unwrap();
        let twice = suppress_duplicates(&once, 10.0, &CancelToken::new()).unwrap();

        assert_eq!(once, twice);
        assert_eq!(once.len(), 3);
    }

    #[test]
    fn test_boundary_distance_is_not_a_duplicate() {
        // Exactly radius apart: kept
        let input = vec![candidate(0, 0, 1000.0), candidate(10, 0, 900.0)];
        let kept = suppress_duplicates(&input, 10.0, &CancelToken::new()).unwrap();
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_empty_input() {
        let kept = suppress_duplicates(&[], 10.0, &CancelToken::new()).unwrap();
        assert!(kept.is_empty());
    }
}
