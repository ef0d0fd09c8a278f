use std::path::Path;

use anyhow::{Context, Result, bail};
use ninefold_db::models::LayerId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Nombre de chiffres clés retenus.
    pub key_code_count: usize,
    /// Couche suivie pour les statistiques de réussite.
    pub reference_layer: LayerId,
    /// Nombre de tirages analysés.
    pub window: u32,
    /// Taille de l'historique généré par `sample`.
    pub sample_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            key_code_count: 3,
            reference_layer: LayerId::L6,
            window: 100,
            sample_size: 50,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.key_code_count == 0 || self.key_code_count > 10 {
            bail!("Nombre de chiffres clés invalide : {} (attendu 1-10)", self.key_code_count);
        }
        if self.window == 0 {
            bail!("La fenêtre d'analyse doit contenir au moins un tirage");
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<PipelineConfig> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Impossible de lire {:?}", path))?;
    let config: PipelineConfig = serde_json::from_str(&json)
        .with_context(|| format!("Configuration invalide dans {:?}", path))?;
    config.validate()?;
    Ok(config)
}

/// Charge la configuration si le fichier existe, sinon les valeurs par défaut.
pub fn load_or_default(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(p) if p.exists() => load_config(p),
        Some(p) => {
            tracing::warn!(path = %p.display(), "configuration absente, valeurs par défaut");
            Ok(PipelineConfig::default())
        }
        None => Ok(PipelineConfig::default()),
    }
}

pub fn save_config(config: &PipelineConfig, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(path, json)
        .with_context(|| format!("Impossible d'écrire {:?}", path))?;
    Ok(())
}
