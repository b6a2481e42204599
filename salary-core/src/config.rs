//! # Configuração
//!
//! Todos os parâmetros do pipeline em um único [`PipelineConfig`], lido de
//! JSON. Qualquer campo ausente assume o valor padrão, então `{}` é uma
//! configuração válida.
//!
//! ```json
//! {
//!   "threshold": 0.8,
//!   "fallback": { "holdout_size": 3157, "seed": 123 },
//!   "overrides": [
//!     { "first_name": "Santa", "last_name": "Ono", "category": "Male" }
//!   ]
//! }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::DatasetError;
use crate::frequency::{Category, RowFilter, SourceSchema};
use crate::normalizer::TextWindow;

/// Parâmetros de treino do classificador estatístico.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    /// Quantos exemplos do início do conjunto embaralhado ficam para teste.
    pub holdout_size: usize,
    pub seed: u64,
    /// Multiplica a probabilidade a posteriori pela acurácia do modelo.
    pub scale_by_accuracy: bool,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            holdout_size: 3157,
            seed: 123,
            scale_by_accuracy: true,
        }
    }
}

/// Correção manual aplicada depois de toda a inferência.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Override {
    pub first_name: String,
    pub last_name: String,
    pub category: Category,
}

impl Override {
    pub fn new(first_name: &str, last_name: &str, category: Category) -> Self {
        Self {
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            category,
        }
    }
}

/// Uma base de nomes: esquema mais os arquivos que o seguem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSpec {
    pub paths: Vec<PathBuf>,
    #[serde(flatten)]
    pub schema: SourceSchema,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// `None` processa o texto inteiro, sem recorte.
    pub window: Option<TextWindow>,
    pub markers: Vec<String>,
    pub threshold: f64,
    pub fallback: FallbackConfig,
    pub overrides: Vec<Override>,
    pub sources: Vec<SourceSpec>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            window: Some(TextWindow::default()),
            markers: vec!["SCHEDULE".to_string()],
            threshold: 0.8,
            fallback: FallbackConfig::default(),
            overrides: default_overrides(),
            sources: default_sources(),
        }
    }
}

impl PipelineConfig {
    /// Lê a configuração de um arquivo JSON.
    pub fn load(path: &Path) -> Result<Self, DatasetError> {
        let text = std::fs::read_to_string(path).map_err(|source| DatasetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Lê o arquivo se existir; caso contrário usa os padrões.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, DatasetError> {
        match path {
            Some(p) if p.exists() => Self::load(p),
            _ => Ok(Self::default()),
        }
    }
}

/// Correções conhecidas de nomes classificados incorretamente.
pub fn default_overrides() -> Vec<Override> {
    vec![
        Override::new("Lakshmi", "Yatham", Category::Male),
        Override::new("Santa", "Ono", Category::Male),
        Override::new("Ali", "Lazrak", Category::Male),
        Override::new("Jan", "Bena", Category::Female),
        Override::new("Zu-Hua", "Gao", Category::Male),
    ]
}

fn labels(pairs: &[(&str, Category)]) -> BTreeMap<String, Category> {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

/// Bases padrão: Statistics Canada, nomes dos EUA e nomes indianos.
pub fn default_sources() -> Vec<SourceSpec> {
    let corpus = Path::new("data/gender_corpus");
    vec![
        SourceSpec {
            paths: vec![corpus.join("17100147.csv")],
            schema: SourceSchema {
                label: "statcan".to_string(),
                name_column: "First name at birth".to_string(),
                category_column: "Sex at birth".to_string(),
                count_column: Some("VALUE".to_string()),
                category_labels: labels(&[("Female", Category::Female), ("Male", Category::Male)]),
                filter: Some(RowFilter {
                    column: "Indicator".to_string(),
                    equals: "Frequency".to_string(),
                }),
                fixed_confidence: None,
            },
        },
        SourceSpec {
            paths: vec![corpus.join("NationalNames.csv")],
            schema: SourceSchema {
                label: "us_national".to_string(),
                name_column: "Name".to_string(),
                category_column: "Gender".to_string(),
                count_column: Some("Count".to_string()),
                category_labels: labels(&[("F", Category::Female), ("M", Category::Male)]),
                filter: None,
                fixed_confidence: None,
            },
        },
        SourceSpec {
            paths: vec![
                corpus.join("Indian-Female-Names.csv"),
                corpus.join("Indian-Male-Names.csv"),
            ],
            schema: SourceSchema {
                label: "indian".to_string(),
                name_column: "name".to_string(),
                category_column: "gender".to_string(),
                count_column: None,
                category_labels: labels(&[("f", Category::Female), ("m", Category::Male)]),
                filter: None,
                fixed_confidence: Some(0.85),
            },
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_uses_defaults() {
        let config: PipelineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.threshold, 0.8);
        assert_eq!(config.fallback.holdout_size, 3157);
        assert_eq!(config.overrides.len(), 5);
        assert_eq!(config.sources.len(), 3);
    }

    #[test]
    fn test_partial_json() {
        let json = r#"{
            "window": null,
            "threshold": 0.5,
            "fallback": { "seed": 7 },
            "overrides": [{ "first_name": "Ali", "last_name": "Lazrak", "category": "Male" }],
            "sources": [{
                "label": "toy",
                "paths": ["toy.csv"],
                "name_column": "n",
                "category_column": "g",
                "category_labels": { "F": "Female" }
            }]
        }"#;
        let config: PipelineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.window, None);
        assert_eq!(config.fallback.seed, 7);
        assert_eq!(config.fallback.holdout_size, 3157);
        assert_eq!(config.overrides[0].category, Category::Male);
        assert_eq!(config.sources[0].schema.count_column, None);
        assert_eq!(config.markers, vec!["SCHEDULE"]);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "markers": ["SCHEDULE", "Page"] }"#).unwrap();

        let config = PipelineConfig::load(&path).unwrap();
        assert_eq!(config.markers.len(), 2);

        let missing = dir.path().join("nope.json");
        assert!(PipelineConfig::load(&missing).is_err());
        assert_eq!(PipelineConfig::load_or_default(Some(&missing)).unwrap(), PipelineConfig::default());
    }
}
