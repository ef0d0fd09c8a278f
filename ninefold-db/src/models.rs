use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

/// Nombre de candidats du domaine "000".."999".
pub const UNIVERSE_SIZE: usize = 1000;

/// Tirage historique tel que reçu de l'extérieur (API, fichier, générateur).
///
/// `number` est soit "d,d,d,d" soit une chaîne d'au moins 4 chiffres.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Draw {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draw_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<String>,
}

impl Draw {
    pub fn new(number: impl Into<String>) -> Self {
        Self {
            id: None,
            number: number.into(),
            draw_date: None,
            period: None,
        }
    }

    /// Vrai si `number` suit l'un des deux encodages acceptés.
    /// Un tirage mal formé reste exploitable, il est simplement signalé.
    pub fn is_well_formed(&self) -> bool {
        let raw = self.number.trim();
        if raw.contains(',') {
            let parts: Vec<&str> = raw.split(',').map(str::trim).collect();
            return parts.len() >= 4
                && parts.iter().all(|p| p.len() == 1 && p.chars().all(|c| c.is_ascii_digit()));
        }
        raw.len() >= 4 && raw.chars().all(|c| c.is_ascii_digit())
    }
}

/// Identifiant de couche. L9 est la moins filtrée, L1 la plus filtrée.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LayerId {
    L1,
    L2,
    L3,
    L4,
    L5,
    L6,
    L7,
    L8,
    L9,
}

impl LayerId {
    /// Ordre de dérivation : chaque couche est calculée depuis la précédente.
    pub const ALL: [LayerId; 9] = [
        LayerId::L9,
        LayerId::L8,
        LayerId::L7,
        LayerId::L6,
        LayerId::L5,
        LayerId::L4,
        LayerId::L3,
        LayerId::L2,
        LayerId::L1,
    ];

    pub fn index(&self) -> usize {
        match self {
            LayerId::L1 => 0,
            LayerId::L2 => 1,
            LayerId::L3 => 2,
            LayerId::L4 => 3,
            LayerId::L5 => 4,
            LayerId::L6 => 5,
            LayerId::L7 => 6,
            LayerId::L8 => 7,
            LayerId::L9 => 8,
        }
    }

    pub fn target_size(&self) -> usize {
        (self.index() + 1) * 100
    }

    pub fn ratio(&self) -> f64 {
        self.target_size() as f64 / UNIVERSE_SIZE as f64
    }

    pub fn name(&self) -> &'static str {
        match self {
            LayerId::L9 => "Original",
            LayerId::L8 => "Edge",
            LayerId::L7 => "Balance",
            LayerId::L6 => "Fault Tolerance",
            LayerId::L5 => "Standard",
            LayerId::L4 => "Extension",
            LayerId::L3 => "Core",
            LayerId::L2 => "Selected",
            LayerId::L1 => "Limit",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            LayerId::L9 => "Top 90% by score",
            LayerId::L8 => "Remove bottom 20%",
            LayerId::L7 => "Hot/cold distribution",
            LayerId::L6 => "Fault tolerance",
            LayerId::L5 => "Standard matrix",
            LayerId::L4 => "Range coverage",
            LayerId::L3 => "Key code rotation",
            LayerId::L2 => "Misalignment",
            LayerId::L1 => "Top scores only",
        }
    }

    /// Couche parente dans la chaîne de dérivation (aucune pour L9).
    pub fn parent(&self) -> Option<LayerId> {
        match self {
            LayerId::L9 => None,
            _ => Some(LayerId::ALL[LayerId::ALL.len() - self.index() - 2]),
        }
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.index() + 1)
    }
}

impl FromStr for LayerId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let digits = s
            .strip_prefix('L')
            .or_else(|| s.strip_prefix('l'))
            .unwrap_or(s);
        let n: usize = digits
            .parse()
            .with_context(|| format!("Couche invalide : '{}' (attendu L1-L9)", s))?;
        if !(1..=9).contains(&n) {
            bail!("Couche hors limites : '{}' (attendu L1-L9)", s);
        }
        Ok(LayerId::ALL[9 - n])
    }
}

/// Candidat noté sur les quatre dimensions. Les valeurs numériques font foi
/// pour le tri ; le rendu texte à deux décimales passe par [`ScoreRecord`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredCandidate {
    pub number: String,
    pub digits: [u8; 3],
    pub sum: u8,
    pub span: u8,
    pub sum_score: f64,
    pub span_score: f64,
    pub hot_cold_score: f64,
    pub hit_score: f64,
    pub total_score: f64,
    pub hot_count: u8,
    pub cold_count: u8,
    pub contains_key_code: bool,
    pub is_edge_value: bool,
}

impl ScoredCandidate {
    pub fn record(&self) -> ScoreRecord {
        ScoreRecord {
            number: self.number.clone(),
            sum: self.sum,
            span: self.span,
            sum_score: fixed2(self.sum_score),
            span_score: fixed2(self.span_score),
            hot_cold_score: fixed2(self.hot_cold_score),
            hit_score: fixed2(self.hit_score),
            total_score: fixed2(self.total_score),
            contains_key_code: self.contains_key_code,
            is_edge_value: self.is_edge_value,
        }
    }
}

/// Texte à deux décimales, les demis arrondis vers le haut ("5.125" donne "5.13").
pub fn fixed2(value: f64) -> String {
    format!("{:.2}", (value * 100.0).round() / 100.0)
}

/// Forme persistée d'un candidat noté.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRecord {
    pub number: String,
    pub sum: u8,
    pub span: u8,
    pub sum_score: String,
    pub span_score: String,
    pub hot_cold_score: String,
    pub hit_score: String,
    pub total_score: String,
    pub contains_key_code: bool,
    pub is_edge_value: bool,
}

/// Résultat des neuf couches, indexé par [`LayerId`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LayerSet {
    layers: [Vec<ScoredCandidate>; 9],
}

impl LayerSet {
    pub fn get(&self, id: LayerId) -> &[ScoredCandidate] {
        &self.layers[id.index()]
    }

    pub fn insert(&mut self, id: LayerId, candidates: Vec<ScoredCandidate>) {
        self.layers[id.index()] = candidates;
    }

    /// Parcourt les couches de L9 à L1.
    pub fn iter(&self) -> impl Iterator<Item = (LayerId, &[ScoredCandidate])> {
        LayerId::ALL.into_iter().map(move |id| (id, self.get(id)))
    }
}

/// Forme persistée d'une couche : liste JSON ordonnée et son effectif.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerRecord {
    pub layer_id: LayerId,
    pub numbers: String,
    pub count: usize,
}

impl LayerRecord {
    pub fn from_layer(layer_id: LayerId, candidates: &[ScoredCandidate]) -> Result<Self> {
        let numbers = serde_json::to_string(candidates)
            .with_context(|| format!("Sérialisation de la couche {} impossible", layer_id))?;
        Ok(Self {
            layer_id,
            numbers,
            count: candidates.len(),
        })
    }

    pub fn candidates(&self) -> Result<Vec<ScoredCandidate>> {
        serde_json::from_str(&self.numbers)
            .with_context(|| format!("Couche {} illisible", self.layer_id))
    }
}

/// Compteurs cumulés de tests de couverture sur une couche de référence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HitStatistic {
    pub total: u32,
    pub hits: u32,
}

impl HitStatistic {
    pub fn record(&mut self, hit: bool) {
        self.total += 1;
        if hit {
            self.hits += 1;
        }
    }

    /// Taux de réussite en pourcentage, arrondi à deux décimales.
    pub fn rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        let raw = self.hits as f64 / self.total as f64 * 100.0;
        (raw * 100.0).round() / 100.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HitRecord {
    pub draw_number: String,
    pub is_hit: bool,
    pub layer_id: LayerId,
    pub draw_time: String,
}

pub fn make_test_draws(n: usize) -> Vec<Draw> {
    (0..n)
        .map(|i| {
            // Hachage multiplicatif : chiffres variés mais reproductibles
            let x = (i as u64).wrapping_mul(2_654_435_761).wrapping_add(12_345) % (1 << 32);
            let digit = |k: u32| (x >> (4 * k)) % 10;
            Draw {
                id: Some(i as i64),
                number: format!("{},{},{},{}", digit(0), digit(1), digit(2), digit(3)),
                draw_date: Some(format!("2024-03-{:02}", (i % 28) + 1)),
                period: Some(format!("{}", 2024032000 + i)),
            }
        })
        .collect()
}
