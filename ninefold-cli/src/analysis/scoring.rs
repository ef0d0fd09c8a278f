use std::collections::BTreeMap;

use ninefold_db::models::{ScoredCandidate, UNIVERSE_SIZE};
use tracing::debug;

use super::FrequencyTable;

/// Les 1000 candidats notés, indexés par leur forme "000".."999".
/// L'ordre d'itération est l'ordre numérique croissant.
pub type ScoredUniverse = BTreeMap<String, ScoredCandidate>;

const SUM_CENTER: f64 = 16.0;
const SUM_TOLERANCE: f64 = 6.0;
const SPAN_CENTER: f64 = 5.0;
const SPAN_TOLERANCE: f64 = 1.0;

fn candidate_digits(value: usize) -> [u8; 3] {
    [
        (value / 100) as u8,
        (value / 10 % 10) as u8,
        (value % 10) as u8,
    ]
}

/// Fréquence estimée d'un candidat : moyenne des fréquences de ses chiffres.
fn estimated_frequency(digits: &[u8; 3], freq: &FrequencyTable) -> f64 {
    let total: u32 = digits.iter().map(|d| freq.get(d).copied().unwrap_or(0)).sum();
    total as f64 / 3.0
}

pub fn sum_score(sum: u8) -> f64 {
    let distance = (sum as f64 - SUM_CENTER).abs();
    if distance <= SUM_TOLERANCE {
        10.0 - (distance / SUM_TOLERANCE) * 5.0
    } else {
        2.0
    }
}

pub fn span_score(span: u8) -> f64 {
    let distance = (span as f64 - SPAN_CENTER).abs();
    if distance <= SPAN_TOLERANCE {
        10.0 - distance * 2.0
    } else {
        3.0
    }
}

/// Table (chauds, froids) -> note. Toute autre combinaison vaut 5.
pub fn hot_cold_score(hot_count: u8, cold_count: u8) -> f64 {
    match (hot_count, cold_count) {
        (2, 1) | (1, 2) => 10.0,
        (3, 0) => 4.0,
        (0, 3) => 3.0,
        (2, 0) => 7.0,
        (1, 0) => 6.0,
        _ => 5.0,
    }
}

/// Valeur en marge : somme hors 10..=22 ou écart hors 4..=6.
pub fn is_edge_value(sum: u8, span: u8) -> bool {
    !(10..=22).contains(&sum) || !(4..=6).contains(&span)
}

/// Note les 1000 candidats sur quatre dimensions (somme, écart, chaud/froid,
/// fréquence estimée) ; la note totale est leur moyenne.
pub fn score_candidates(
    hot: &[u8],
    cold: &[u8],
    key: &[u8],
    freq: &FrequencyTable,
) -> ScoredUniverse {
    let frequencies: Vec<f64> = (0..UNIVERSE_SIZE)
        .map(|value| estimated_frequency(&candidate_digits(value), freq))
        .collect();
    // Plancher à 1 : un historique vide donne des notes de fréquence nulles
    let max_freq = frequencies.iter().copied().fold(1.0f64, f64::max);
    debug!(max_freq, "fréquence estimée maximale");

    (0..UNIVERSE_SIZE)
        .map(|value| {
            let digits = candidate_digits(value);
            let number = format!("{:03}", value);

            let sum: u8 = digits.iter().sum();
            let max = digits.iter().copied().max().unwrap_or(0);
            let min = digits.iter().copied().min().unwrap_or(0);
            let span = max - min;

            let hot_count = digits.iter().filter(|d| hot.contains(d)).count() as u8;
            let cold_count = digits.iter().filter(|d| cold.contains(d)).count() as u8;

            let sum_score = sum_score(sum);
            let span_score = span_score(span);
            let hot_cold_score = hot_cold_score(hot_count, cold_count);
            let hit_score = frequencies[value] / max_freq * 10.0;
            let total_score = (sum_score + span_score + hot_cold_score + hit_score) / 4.0;

            let candidate = ScoredCandidate {
                number: number.clone(),
                digits,
                sum,
                span,
                sum_score,
                span_score,
                hot_cold_score,
                hit_score,
                total_score,
                hot_count,
                cold_count,
                contains_key_code: digits.iter().any(|d| key.contains(d)),
                is_edge_value: is_edge_value(sum, span),
            };
            (number, candidate)
        })
        .collect()
}
