//! Elo rating update, applied transactionally with game completion by the
//! Persistence Projector.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Win,
    Loss,
    Draw,
}

impl Outcome {
    fn score(self) -> f64 {
        match self {
            Outcome::Win => 1.0,
            Outcome::Draw => 0.5,
            Outcome::Loss => 0.0,
        }
    }

    fn opponent(self) -> Outcome {
        match self {
            Outcome::Win => Outcome::Loss,
            Outcome::Loss => Outcome::Win,
            Outcome::Draw => Outcome::Draw,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatingDelta {
    pub winner_delta: i32,
    pub loser_delta: i32,
}

/// Apply K=32 Elo with logistic expectation to a single game between
/// `rating_a` and `rating_b`, where `outcome` is from `a`'s perspective.
/// Deltas are rounded independently, so `winner_delta + loser_delta` need
/// not be exactly zero (law 3 permits ties from rounding).
pub fn elo_delta(rating_a: i32, rating_b: i32, outcome: Outcome, k_factor: i32) -> RatingDelta {
    let expected_a = expected_score(rating_a, rating_b);
    let expected_b = expected_score(rating_b, rating_a);

    let delta_a = (k_factor as f64 * (outcome.score() - expected_a)).round() as i32;
    let delta_b = (k_factor as f64 * (outcome.opponent().score() - expected_b)).round() as i32;

    RatingDelta {
        winner_delta: delta_a,
        loser_delta: delta_b,
    }
}

fn expected_score(rating_self: i32, rating_other: i32) -> f64 {
    1.0 / (1.0 + 10f64.powf((rating_other - rating_self) as f64 / 400.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_ratings_win_gives_plus_16() {
        let delta = elo_delta(1200, 1200, Outcome::Win, 32);
        assert_eq!(delta.winner_delta, 16);
        assert_eq!(delta.loser_delta, -16);
    }

    #[test]
    fn draw_between_equals_is_zero() {
        let delta = elo_delta(1200, 1200, Outcome::Draw, 32);
        assert_eq!(delta.winner_delta, 0);
        assert_eq!(delta.loser_delta, 0);
    }

    #[test]
    fn underdog_win_gains_more_than_favorite_win() {
        let underdog_win = elo_delta(1000, 1400, Outcome::Win, 32);
        let favorite_win = elo_delta(1400, 1000, Outcome::Win, 32);
        assert!(underdog_win.winner_delta > favorite_win.winner_delta);
    }

    #[test]
    fn expected_score_bounds() {
        assert!(expected_score(1200, 1200) - 0.5 < f64::EPSILON);
        assert!(expected_score(2000, 1000) > 0.9);
        assert!(expected_score(1000, 2000) < 0.1);
    }
}
