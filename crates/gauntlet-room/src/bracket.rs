//! Round pairings with ghost byes.

use gauntlet_protocol::SeatId;
use rand::Rng;
use rand::seq::{IndexedRandom, SliceRandom};

/// One pairing before it gets a match id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pairing {
    pub player1: SeatId,
    pub player2: SeatId,
    /// Set when `player2` is a ghost standing in as a bye.
    pub ghost: Option<SeatId>,
}

/// A round's pairings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bracket {
    pub pairings: Vec<Pairing>,
    /// A live seat left without an opponent because no ghost was available.
    pub bye: Option<SeatId>,
}

/// Shuffles `live` and pairs neighbours.
///
/// An odd count borrows a random seat from `ghosts` for the last pair. With
/// no ghost to borrow, the last shuffled seat sits the round out.
pub fn generate_bracket<R: Rng + ?Sized>(
    live: &[SeatId],
    ghosts: &[SeatId],
    rng: &mut R,
) -> Bracket {
    let mut order = live.to_vec();
    order.shuffle(rng);

    let mut bye = None;
    let mut ghost = None;
    if order.len() % 2 == 1 {
        match ghosts.choose(rng) {
            Some(&g) => {
                ghost = Some(g);
                order.push(g);
            }
            None => bye = order.pop(),
        }
    }

    let pairings = order
        .chunks_exact(2)
        .map(|pair| Pairing {
            player1: pair[0],
            player2: pair[1],
            ghost: ghost.filter(|g| *g == pair[1]),
        })
        .collect();

    Bracket { pairings, bye }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;

    fn seats(ids: &[u32]) -> Vec<SeatId> {
        ids.iter().copied().map(SeatId).collect()
    }

    #[test]
    fn test_generate_bracket_even_count_pairs_everyone_once() {
        let mut rng = StdRng::seed_from_u64(7);
        let live = seats(&[1, 2, 3, 4, 5, 6, 7, 8]);
        let bracket = generate_bracket(&live, &[], &mut rng);

        assert_eq!(bracket.pairings.len(), 4);
        assert_eq!(bracket.bye, None);
        let mut seen = HashSet::new();
        for p in &bracket.pairings {
            assert!(p.ghost.is_none());
            assert!(seen.insert(p.player1));
            assert!(seen.insert(p.player2));
        }
        assert_eq!(seen.len(), 8);
    }

    #[test]
    fn test_generate_bracket_odd_count_borrows_ghost() {
        let mut rng = StdRng::seed_from_u64(1);
        let live = seats(&[1, 3, 5]);
        let ghosts = seats(&[2, 4]);
        let bracket = generate_bracket(&live, &ghosts, &mut rng);

        assert_eq!(bracket.pairings.len(), 2);
        assert_eq!(bracket.bye, None);
        let with_ghost: Vec<_> = bracket
            .pairings
            .iter()
            .filter(|p| p.ghost.is_some())
            .collect();
        assert_eq!(with_ghost.len(), 1);
        let ghost = with_ghost[0].ghost.unwrap();
        assert!(ghosts.contains(&ghost));
        assert_eq!(with_ghost[0].player2, ghost);
        assert!(live.contains(&with_ghost[0].player1));
    }

    #[test]
    fn test_generate_bracket_odd_count_without_ghosts_gives_bye() {
        let mut rng = StdRng::seed_from_u64(3);
        let live = seats(&[1, 2, 3]);
        let bracket = generate_bracket(&live, &[], &mut rng);

        assert_eq!(bracket.pairings.len(), 1);
        let bye = bracket.bye.unwrap();
        let p = bracket.pairings[0];
        assert!(![p.player1, p.player2].contains(&bye));
    }

    #[test]
    fn test_generate_bracket_same_seed_same_pairings() {
        let live = seats(&[1, 2, 3, 4, 5, 6]);
        let a = generate_bracket(&live, &[], &mut StdRng::seed_from_u64(42));
        let b = generate_bracket(&live, &[], &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn test_generate_bracket_single_player_without_ghosts_is_empty() {
        let mut rng = StdRng::seed_from_u64(0);
        let bracket = generate_bracket(&seats(&[4]), &[], &mut rng);
        assert!(bracket.pairings.is_empty());
        assert_eq!(bracket.bye, Some(SeatId(4)));
    }
}
