use ninefold_db::models::{LayerId, LayerSet, ScoredCandidate};
use tracing::debug;

use super::scoring::ScoredUniverse;

fn first(source: &[ScoredCandidate], n: usize) -> Vec<ScoredCandidate> {
    source.iter().take(n).cloned().collect()
}

fn first_matching<F>(source: &[ScoredCandidate], n: usize, pred: F) -> Vec<ScoredCandidate>
where
    F: Fn(&ScoredCandidate) -> bool,
{
    source.iter().filter(|c| pred(c)).take(n).cloned().collect()
}

/// Part entière de `size * percent / 100`.
fn share(size: usize, percent: usize) -> usize {
    size * percent / 100
}

/// L7 : 70% contenant un chiffre chaud, 20% contenant un chiffre froid,
/// 10% sans l'un ni l'autre. Les seaux se recouvrent : un candidat chaud et
/// froid peut apparaître deux fois.
fn balance_layer(parent: &[ScoredCandidate]) -> Vec<ScoredCandidate> {
    let size = LayerId::L7.target_size();
    let mut layer = first_matching(parent, share(size, 70), |c| c.hot_count > 0);
    layer.extend(first_matching(parent, share(size, 20), |c| c.cold_count > 0));
    layer.extend(first_matching(parent, share(size, 10), |c| {
        c.hot_count == 0 && c.cold_count == 0
    }));
    layer.truncate(size);
    layer
}

/// L4 : 40% de valeurs en marge puis 60% de valeurs normales.
fn extension_layer(parent: &[ScoredCandidate]) -> Vec<ScoredCandidate> {
    let size = LayerId::L4.target_size();
    let mut layer = first_matching(parent, share(size, 40), |c| c.is_edge_value);
    layer.extend(first_matching(parent, share(size, 60), |c| !c.is_edge_value));
    layer.truncate(size);
    layer
}

/// L3 : candidats avec chiffre clé d'abord, complétés par les autres.
fn core_layer(parent: &[ScoredCandidate]) -> Vec<ScoredCandidate> {
    let size = LayerId::L3.target_size();
    let with_key = parent.iter().filter(|c| c.contains_key_code).count();
    let mut layer = first_matching(parent, size, |c| c.contains_key_code);
    layer.extend(first_matching(parent, size.saturating_sub(with_key), |c| {
        !c.contains_key_code
    }));
    layer.truncate(size);
    layer
}

/// Trie l'univers par note totale décroissante puis dérive L9..L1, chaque
/// couche depuis la précédente sans nouveau tri.
///
/// À note égale l'ordre numérique croissant des candidats est conservé.
pub fn filter_layers(scored: &ScoredUniverse) -> LayerSet {
    let mut ranked: Vec<ScoredCandidate> = scored.values().cloned().collect();
    ranked.sort_by(|a, b| b.total_score.total_cmp(&a.total_score));

    let mut layers = LayerSet::default();
    let mut parent = ranked;

    for id in LayerId::ALL {
        let layer = match id {
            LayerId::L7 => balance_layer(&parent),
            LayerId::L4 => extension_layer(&parent),
            LayerId::L3 => core_layer(&parent),
            _ => first(&parent, id.target_size()),
        };
        debug!(layer = %id, count = layer.len(), "couche filtrée");
        layers.insert(id, layer.clone());
        parent = layer;
    }

    layers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::run_pipeline;
    use crate::analysis::scoring::score_candidates;
    use ninefold_db::models::make_test_draws;

    fn contains(layer: &[ScoredCandidate], number: &str) -> bool {
        layer.iter().any(|c| c.number == number)
    }

    #[test]
    fn test_layer_sizes_with_history() {
        let analysis = run_pipeline(&make_test_draws(50), 3);
        let layers = &analysis.layers;
        assert_eq!(layers.get(LayerId::L9).len(), 900);
        assert_eq!(layers.get(LayerId::L8).len(), 800);
        assert!(layers.get(LayerId::L7).len() <= 700);
        for id in [LayerId::L6, LayerId::L5, LayerId::L4, LayerId::L3, LayerId::L2, LayerId::L1] {
            assert_eq!(layers.get(id).len(), id.target_size(), "taille de {}", id);
        }
    }

    #[test]
    fn test_layers_nested() {
        let analysis = run_pipeline(&make_test_draws(50), 3);
        for id in LayerId::ALL {
            let Some(parent) = id.parent() else { continue };
            let outer = analysis.layers.get(parent);
            for c in analysis.layers.get(id) {
                assert!(contains(outer, &c.number), "{} de {} absent de {}", c.number, id, parent);
            }
        }
    }

    #[test]
    fn test_l9_sorted_descending_with_numeric_ties() {
        let analysis = run_pipeline(&make_test_draws(50), 3);
        let l9 = analysis.layers.get(LayerId::L9);
        for pair in l9.windows(2) {
            assert!(pair[0].total_score >= pair[1].total_score);
            if pair[0].total_score == pair[1].total_score {
                assert!(pair[0].number < pair[1].number);
            }
        }
    }

    #[test]
    fn test_prefix_layers_keep_parent_order() {
        let analysis = run_pipeline(&make_test_draws(50), 3);
        let layers = &analysis.layers;
        assert_eq!(layers.get(LayerId::L8), &layers.get(LayerId::L9)[..800]);
        assert_eq!(layers.get(LayerId::L6), &layers.get(LayerId::L7)[..600]);
        assert_eq!(layers.get(LayerId::L5), &layers.get(LayerId::L6)[..500]);
        assert_eq!(layers.get(LayerId::L2), &layers.get(LayerId::L3)[..200]);
        assert_eq!(layers.get(LayerId::L1), &layers.get(LayerId::L2)[..100]);
    }

    #[test]
    fn test_balance_layer_buckets() {
        let analysis = run_pipeline(&make_test_draws(50), 3);
        let l7 = analysis.layers.get(LayerId::L7);
        let l8 = analysis.layers.get(LayerId::L8);

        let hot_bucket: Vec<&ScoredCandidate> = l8.iter().filter(|c| c.hot_count > 0).take(490).collect();
        assert_eq!(hot_bucket.len(), 490);
        for (a, b) in l7.iter().zip(hot_bucket) {
            assert_eq!(a, b);
        }
        let cold_bucket: Vec<&ScoredCandidate> = l8.iter().filter(|c| c.cold_count > 0).take(140).collect();
        for (a, b) in l7[490..].iter().zip(cold_bucket) {
            assert_eq!(a, b);
        }
        assert!(l7[630..].iter().all(|c| c.hot_count == 0 && c.cold_count == 0));
    }

    #[test]
    fn test_balance_layer_keeps_overlap_duplicates() {
        let analysis = run_pipeline(&make_test_draws(50), 3);
        let l7 = analysis.layers.get(LayerId::L7);
        let hot_and_cold = l7[490..630]
            .iter()
            .filter(|c| c.hot_count > 0)
            .count();
        if hot_and_cold > 0 {
            let mut numbers: Vec<&str> = l7.iter().map(|c| c.number.as_str()).collect();
            numbers.sort_unstable();
            numbers.dedup();
            assert!(numbers.len() < l7.len());
        }
    }

    #[test]
    fn test_extension_layer_edge_first() {
        let analysis = run_pipeline(&make_test_draws(50), 3);
        let l4 = analysis.layers.get(LayerId::L4);
        assert!(l4[..160].iter().all(|c| c.is_edge_value));
        assert!(l4[160..].iter().all(|c| !c.is_edge_value));
    }

    #[test]
    fn test_core_layer_key_codes_first() {
        let analysis = run_pipeline(&make_test_draws(50), 3);
        let l3 = analysis.layers.get(LayerId::L3);
        let l4 = analysis.layers.get(LayerId::L4);
        let with_key = l4.iter().filter(|c| c.contains_key_code).count().min(300);
        assert!(l3[..with_key].iter().all(|c| c.contains_key_code));
        assert!(l3[with_key..].iter().all(|c| !c.contains_key_code));
    }

    #[test]
    fn test_core_layer_fills_shortfall() {
        let parent: Vec<ScoredCandidate> = score_candidates(&[], &[], &[9], &Default::default())
            .into_values()
            .take(400)
            .collect();
        let with_key = parent.iter().filter(|c| c.contains_key_code).count();
        assert!(with_key < 300);
        let layer = core_layer(&parent);
        assert_eq!(layer.len(), 300);
        assert_eq!(layer.iter().filter(|c| c.contains_key_code).count(), with_key);
    }

    #[test]
    fn test_empty_history_layers() {
        // Sans chiffre chaud ni froid, L7 se limite au seau "autres"
        let analysis = run_pipeline(&[], 3);
        let layers = &analysis.layers;
        assert_eq!(layers.get(LayerId::L9).len(), 900);
        assert_eq!(layers.get(LayerId::L8).len(), 800);
        assert_eq!(layers.get(LayerId::L7).len(), 70);
        assert_eq!(layers.get(LayerId::L6).len(), 70);
        assert!(layers.get(LayerId::L1).len() <= 70);
    }
}
