use ninefold_db::models::{Draw, HitStatistic, LayerId};
use tracing::debug;

use super::hit::record_hit;
use super::{extract_digits, run_pipeline};

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestOutcome {
    pub draw: Draw,
    pub digits: String,
    pub history_len: usize,
    pub hit: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestReport {
    pub layer: LayerId,
    pub window: usize,
    pub outcomes: Vec<BacktestOutcome>,
    pub stat: HitStatistic,
}

/// Validation glissante. `draws[0]` est le tirage le plus récent.
///
/// Pour chacun des `tests` tirages les plus récents, l'analyse porte sur les
/// `window` tirages strictement antérieurs, puis le tirage est testé contre
/// la couche `layer`. Un tirage sans historique antérieur est ignoré.
pub fn walk_forward(
    draws: &[Draw],
    window: usize,
    tests: usize,
    layer: LayerId,
    key_code_count: usize,
) -> BacktestReport {
    let mut stat = HitStatistic::default();
    let mut outcomes = Vec::with_capacity(tests.min(draws.len()));

    for t in 0..tests.min(draws.len()) {
        let history_end = (t + 1 + window).min(draws.len());
        let history = &draws[t + 1..history_end];
        if history.is_empty() {
            continue;
        }

        let analysis = run_pipeline(history, key_code_count);
        let target = &draws[t];
        let hit = record_hit(&mut stat, &target.number, analysis.layers.get(layer));
        debug!(number = %target.number, history = history.len(), hit, "tirage testé");

        outcomes.push(BacktestOutcome {
            draw: target.clone(),
            digits: extract_digits(&target.number),
            history_len: history.len(),
            hit,
        });
    }

    BacktestReport {
        layer,
        window,
        outcomes,
        stat,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ninefold_db::models::make_test_draws;

    #[test]
    fn test_walk_forward_counts() {
        let draws = make_test_draws(60);
        let report = walk_forward(&draws, 30, 10, LayerId::L6, 3);
        assert_eq!(report.outcomes.len(), 10);
        assert_eq!(report.stat.total, 10);
        let hits = report.outcomes.iter().filter(|o| o.hit).count() as u32;
        assert_eq!(report.stat.hits, hits);
        assert!(report.outcomes.iter().all(|o| o.history_len == 30));
    }

    #[test]
    fn test_walk_forward_no_future_leak() {
        let draws = make_test_draws(60);
        let report = walk_forward(&draws, 30, 5, LayerId::L6, 3);
        for (t, outcome) in report.outcomes.iter().enumerate() {
            let analysis = run_pipeline(&draws[t + 1..t + 31], 3);
            let expected = crate::analysis::hit::test_hit(&draws[t].number, analysis.layers.get(LayerId::L6));
            assert_eq!(outcome.hit, expected);
        }
    }

    #[test]
    fn test_walk_forward_short_history() {
        let draws = make_test_draws(5);
        let report = walk_forward(&draws, 30, 10, LayerId::L1, 3);
        // Le plus ancien tirage n'a pas d'historique
        assert_eq!(report.outcomes.len(), 4);
        assert_eq!(report.outcomes[0].history_len, 4);
        assert_eq!(report.outcomes[3].history_len, 1);
    }

    #[test]
    fn test_walk_forward_empty() {
        let report = walk_forward(&[], 30, 10, LayerId::L6, 3);
        assert!(report.outcomes.is_empty());
        assert_eq!(report.stat.rate(), 0.0);
    }
}
