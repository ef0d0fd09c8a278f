use ninefold_db::models::{HitStatistic, ScoredCandidate};

use super::extract_digits;

/// Vrai si les trois derniers chiffres du tirage figurent dans la couche.
pub fn test_hit(draw_raw: &str, layer: &[ScoredCandidate]) -> bool {
    let digits = extract_digits(draw_raw);
    layer.iter().any(|c| c.number == digits)
}

/// Teste un tirage et cumule le résultat dans `stat`.
pub fn record_hit(stat: &mut HitStatistic, draw_raw: &str, layer: &[ScoredCandidate]) -> bool {
    let hit = test_hit(draw_raw, layer);
    stat.record(hit);
    hit
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::run_pipeline;
    use ninefold_db::models::{LayerId, make_test_draws};

    #[test]
    fn test_hit_on_l6_member() {
        let analysis = run_pipeline(&make_test_draws(50), 3);
        let l6 = analysis.layers.get(LayerId::L6);
        let member = &l6[0].number;
        let raw = format!("7,{},{},{}", &member[0..1], &member[1..2], &member[2..3]);
        assert!(test_hit(&raw, l6));
        assert!(test_hit(&format!("5{}", member), l6));
    }

    #[test]
    fn test_miss_on_absent_number() {
        let analysis = run_pipeline(&make_test_draws(50), 3);
        let l6 = analysis.layers.get(LayerId::L6);
        let absent = (0..1000)
            .map(|v| format!("{:03}", v))
            .find(|n| !l6.iter().any(|c| &c.number == n))
            .unwrap();
        assert!(!test_hit(&format!("1{}", absent), l6));
    }

    #[test]
    fn test_malformed_draw_never_hits() {
        let analysis = run_pipeline(&make_test_draws(50), 3);
        let l9 = analysis.layers.get(LayerId::L9);
        assert!(!test_hit("12", l9));
        assert!(!test_hit("", l9));
    }

    #[test]
    fn test_record_hit_accumulates() {
        let analysis = run_pipeline(&make_test_draws(50), 3);
        let l6 = analysis.layers.get(LayerId::L6);
        let member = format!("0{}", l6[0].number);

        let mut stat = HitStatistic::default();
        assert!(record_hit(&mut stat, &member, l6));
        assert!(!record_hit(&mut stat, "12", l6));
        assert_eq!(stat.total, 2);
        assert_eq!(stat.hits, 1);
        assert_eq!(stat.rate(), 50.0);
    }
}
