use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Reshuffles allowed before a draw is reported as unsatisfiable.
pub const MAX_DRAW_ATTEMPTS: usize = 1000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DrawError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("no valid assignment found after {attempts} attempts")]
    Unsatisfiable { attempts: usize },
}

/// Computes a random giver -> receiver mapping over `participants` in which
/// nobody is assigned to themselves and everybody receives exactly once.
///
/// Each attempt shuffles a copy of the participants and maps the giver at
/// position `i` of the original ordering to `shuffled[(i + 1) % n]`. Attempts
/// that produce a self-assignment are discarded and reshuffled, so the result
/// is uniform over all derangements of the input.
pub fn compute_assignment<T, R>(
    participants: &[T],
    rng: &mut R,
) -> Result<BTreeMap<T, T>, DrawError>
where
    T: Ord + Clone,
    R: Rng + ?Sized,
{
    if participants.len() < 2 {
        return Err(DrawError::InvalidInput(
            "at least two participants are required".into(),
        ));
    }

    let mut seen = BTreeSet::new();
    if !participants.iter().all(|p| seen.insert(p)) {
        return Err(DrawError::InvalidInput("duplicate participant".into()));
    }

    let n = participants.len();
    let mut shuffled = participants.to_vec();
    for _ in 0..MAX_DRAW_ATTEMPTS {
        shuffled.shuffle(rng);
        let assignment = participants
            .iter()
            .enumerate()
            .map(|(i, giver)| (giver.clone(), shuffled[(i + 1) % n].clone()))
            .collect::<BTreeMap<_, _>>();

        if is_derangement(participants, &assignment) {
            return Ok(assignment);
        }
    }

    Err(DrawError::Unsatisfiable {
        attempts: MAX_DRAW_ATTEMPTS,
    })
}

/// True when `assignment` is a bijection over `participants` with no fixed point.
pub fn is_derangement<T: Ord>(participants: &[T], assignment: &BTreeMap<T, T>) -> bool {
    if assignment.len() != participants.len() {
        return false;
    }

    let receivers: BTreeSet<&T> = assignment.values().collect();
    receivers.len() == participants.len()
        && participants.iter().all(|p| {
            receivers.contains(p) && assignment.get(p).is_some_and(|receiver| receiver != p)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::HashSet;

    fn ids(n: u64) -> Vec<u64> {
        (1..=n).collect()
    }

    #[test]
    fn rejects_fewer_than_two_participants() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(matches!(
            compute_assignment::<u64, _>(&[], &mut rng),
            Err(DrawError::InvalidInput(_))
        ));
        assert!(matches!(
            compute_assignment(&[7u64], &mut rng),
            Err(DrawError::InvalidInput(_))
        ));
    }

    #[test]
    fn rejects_duplicate_participants() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let err = compute_assignment(&[1u64, 2, 1], &mut rng).unwrap_err();
        assert_eq!(err, DrawError::InvalidInput("duplicate participant".into()));
    }

    #[test]
    fn every_size_yields_a_derangement() {
        for n in 2..=16 {
            let participants = ids(n);
            for seed in 0..25 {
                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                let assignment = compute_assignment(&participants, &mut rng).unwrap();
                assert!(
                    is_derangement(&participants, &assignment),
                    "n={n} seed={seed}: {assignment:?}"
                );
            }
        }
    }

    #[test]
    fn two_participants_always_swap() {
        let participants = ["ana", "bia"];
        for seed in 0..20 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let assignment = compute_assignment(&participants, &mut rng).unwrap();
            assert_eq!(assignment.get("ana"), Some(&"bia"));
            assert_eq!(assignment.get("bia"), Some(&"ana"));
        }
    }

    #[test]
    fn fixed_seed_is_deterministic() {
        let participants = ids(9);
        let first = compute_assignment(&participants, &mut ChaCha8Rng::seed_from_u64(42)).unwrap();
        let second = compute_assignment(&participants, &mut ChaCha8Rng::seed_from_u64(42)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn every_derangement_is_reachable() {
        // Derangement counts: !3 = 2, !4 = 9.
        for (n, expected) in [(3u64, 2usize), (4, 9)] {
            let participants = ids(n);
            let mut seen = HashSet::new();
            for seed in 0..3000 {
                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                let assignment = compute_assignment(&participants, &mut rng).unwrap();
                seen.insert(assignment.into_iter().collect::<Vec<_>>());
            }
            assert_eq!(seen.len(), expected, "n={n}");
        }
    }

    #[test]
    fn detects_invalid_mappings() {
        let participants = [1u64, 2, 3];
        let fixed_point = BTreeMap::from([(1, 2), (2, 1), (3, 3)]);
        let not_bijective = BTreeMap::from([(1, 2), (2, 3), (3, 2)]);
        let missing_giver = BTreeMap::from([(1, 2), (2, 1)]);
        let cycle = BTreeMap::from([(1, 2), (2, 3), (3, 1)]);

        assert!(!is_derangement(&participants, &fixed_point));
        assert!(!is_derangement(&participants, &not_bijective));
        assert!(!is_derangement(&participants, &missing_giver));
        assert!(is_derangement(&participants, &cycle));
    }
}
