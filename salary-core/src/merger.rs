//! # Junção das Previsões
//!
//! Último estágio da cascata. Para cada registro de remuneração:
//!
//! 1. pega a previsão determinística do primeiro nome, ou a do modelo se a
//!    determinística não resolveu;
//! 2. confiança abaixo do limiar vira [`Label::Unknown`]: o registro nunca é
//!    descartado, então a contagem de linhas não muda;
//! 3. aplica as correções manuais por `(nome, sobrenome)` exato, sem olhar
//!    a confiança.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::Override;
use crate::frequency::Category;
use crate::record::PersonSalaryRecord;
use crate::resolver::{GenderPrediction, PredictionSource};

/// Categoria final de um registro.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Label {
    Female,
    Male,
    Unknown,
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Female => "Female",
            Label::Male => "Male",
            Label::Unknown => "",
        }
    }
}

impl From<Category> for Label {
    fn from(c: Category) -> Self {
        match c {
            Category::Female => Label::Female,
            Category::Male => Label::Male,
        }
    }
}

/// Registro de remuneração com a categoria inferida.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedRecord {
    pub record: PersonSalaryRecord,
    pub label: Label,
    /// Confiança da previsão usada (0 se nenhuma).
    pub confidence: f64,
    pub source: PredictionSource,
}

/// Contadores do merge, para o relatório da execução.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeStats {
    pub low_confidence: usize,
    pub unresolved: usize,
    pub overrides_applied: usize,
}

/// Escolhe a previsão de um nome: determinística resolvida primeiro.
fn pick<'a>(
    name: &str,
    deterministic: &'a BTreeMap<String, GenderPrediction>,
    fallback: &'a BTreeMap<String, GenderPrediction>,
) -> Option<&'a GenderPrediction> {
    deterministic
        .get(name)
        .filter(|p| p.is_resolved())
        .or_else(|| fallback.get(name).filter(|p| p.is_resolved()))
}

/// Anota cada registro, na ordem de entrada.
pub fn merge(
    records: &[PersonSalaryRecord],
    deterministic: &BTreeMap<String, GenderPrediction>,
    fallback: &BTreeMap<String, GenderPrediction>,
    overrides: &[Override],
    threshold: f64,
) -> (Vec<AnnotatedRecord>, MergeStats) {
    let mut stats = MergeStats::default();
    let corrections: HashMap<(&str, &str), Category> = overrides
        .iter()
        .map(|o| ((o.first_name.as_str(), o.last_name.as_str()), o.category))
        .collect();

    let annotated = records
        .iter()
        .map(|record| {
            let (mut label, confidence, source) =
                match pick(&record.first_name, deterministic, fallback) {
                    Some(p) => match p.category {
                        Some(c) if p.confidence >= threshold => (Label::from(c), p.confidence, p.source),
                        _ => {
                            stats.low_confidence += 1;
                            (Label::Unknown, p.confidence, p.source)
                        }
                    },
                    None => {
                        stats.unresolved += 1;
                        (Label::Unknown, 0.0, PredictionSource::Unresolved)
                    }
                };

            if let Some(&category) = corrections.get(&record.key()) {
                debug!(first = %record.first_name, last = %record.last_name, %category, "correção manual");
                label = category.into();
                stats.overrides_applied += 1;
            }

            AnnotatedRecord {
                record: record.clone(),
                label,
                confidence,
                source,
            }
        })
        .collect();

    info!(
        records = records.len(),
        low_confidence = stats.low_confidence,
        unresolved = stats.unresolved,
        overrides = stats.overrides_applied,
        "previsões combinadas"
    );
    (annotated, stats)
}

/// Mesma regra de [`merge`], devolvendo `(nome, sobrenome) → categoria`.
///
/// Pessoas repetidas em vários anos aparecem uma vez só.
pub fn merge_keyed(
    records: &[PersonSalaryRecord],
    deterministic: &BTreeMap<String, GenderPrediction>,
    fallback: &BTreeMap<String, GenderPrediction>,
    overrides: &[Override],
    threshold: f64,
) -> BTreeMap<(String, String), Label> {
    let (annotated, _) = merge(records, deterministic, fallback, overrides, threshold);
    annotated
        .into_iter()
        .map(|a| ((a.record.first_name, a.record.last_name), a.label))
        .collect()
}
