pub mod backtest;
pub mod hit;
pub mod layers;
pub mod scoring;

use std::collections::BTreeMap;

use ninefold_db::models::{Draw, LayerSet};
use tracing::debug;

use crate::analysis::layers::filter_layers;
use crate::analysis::scoring::{ScoredUniverse, score_candidates};

/// Occurrences par chiffre (0-9). Seuls les chiffres rencontrés y figurent.
pub type FrequencyTable = BTreeMap<u8, u32>;

/// Nombre de chiffres chauds et froids retenus.
pub const HOT_COLD_COUNT: usize = 3;

/// Classement des chiffres issu de l'historique.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HistoryAnalysis {
    pub hot: Vec<u8>,
    pub cold: Vec<u8>,
    pub key: Vec<u8>,
    pub freq: FrequencyTable,
}

/// Résultat complet d'une analyse : classement, notes et couches.
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub history: HistoryAnalysis,
    pub scored: ScoredUniverse,
    pub layers: LayerSet,
}

/// Ramène un numéro brut à ses trois derniers chiffres.
///
/// "1,2,3,4" donne "234", "1234" donne "234". Une entrée plus courte que
/// quatre caractères et sans virgule est renvoyée telle quelle.
pub fn extract_digits(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }
    if raw.contains(',') {
        let parts: Vec<&str> = raw.split(',').map(str::trim).collect();
        if parts.len() >= 4 {
            return parts[1..4].concat();
        }
    }
    let len = raw.chars().count();
    if len >= 4 {
        return raw.chars().skip(len - 3).collect();
    }
    raw.to_string()
}

/// Compte les chiffres des tirages et en déduit les chiffres chauds, froids et clés.
///
/// Le classement est décroissant en fréquence ; à fréquence égale le plus
/// petit chiffre passe devant (tri stable sur la table ordonnée).
pub fn analyze_history(draws: &[Draw], key_code_count: usize) -> HistoryAnalysis {
    let mut freq = FrequencyTable::new();

    for draw in draws {
        for c in extract_digits(&draw.number).chars() {
            if let Some(d) = c.to_digit(10) {
                *freq.entry(d as u8).or_insert(0) += 1;
            }
        }
    }

    let mut ranking: Vec<(u8, u32)> = freq.iter().map(|(&d, &n)| (d, n)).collect();
    ranking.sort_by(|a, b| b.1.cmp(&a.1));

    let hot = ranking.iter().take(HOT_COLD_COUNT).map(|&(d, _)| d).collect();
    let cold = ranking[ranking.len().saturating_sub(HOT_COLD_COUNT)..]
        .iter()
        .map(|&(d, _)| d)
        .collect();
    let key = ranking.iter().take(key_code_count).map(|&(d, _)| d).collect();

    debug!(draws = draws.len(), digits = freq.len(), "fréquences calculées");

    HistoryAnalysis { hot, cold, key, freq }
}

/// Chaîne complète : fréquences, notation des 1000 candidats, neuf couches.
pub fn run_pipeline(draws: &[Draw], key_code_count: usize) -> Analysis {
    let history = analyze_history(draws, key_code_count);
    let scored = score_candidates(&history.hot, &history.cold, &history.key, &history.freq);
    let layers = filter_layers(&scored);
    Analysis { history, scored, layers }
}
