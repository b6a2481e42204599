//! # Classificador Determinístico
//!
//! Busca exata do primeiro nome na [`FrequencyTable`]. É o caminho de alta
//! precisão da cascata: só nomes ausentes da tabela seguem para o modelo
//! estatístico.
//!
//! ## Confiança e desempate
//!
//! A confiança de cada entrada é `count / total` arredondado para duas casas
//! (empate para o par), ou a confiança fixa da fonte. Vence a maior
//! confiança; empates seguem uma ordem fixa:
//!
//! 1. entradas contadas antes de entradas de confiança fixa;
//! 2. `Female` antes de `Male`.
//!
//! ## Exemplo de Uso
//!
//! ```rust
//! use salary_core::frequency::{Category, FrequencyTable, NameFrequencyEntry};
//! use salary_core::lookup::classify;
//!
//! let table = FrequencyTable::from_entries(vec![
//!     NameFrequencyEntry::counted("Sam", Category::Female, 7000, 12000),
//!     NameFrequencyEntry::counted("Sam", Category::Male, 5000, 12000),
//! ]);
//! let p = classify("Sam", &table);
//! assert_eq!(p.category, Some(Category::Female));
//! assert_eq!(p.confidence, 0.58);
//! ```

use crate::frequency::{Category, FrequencyTable, NameFrequencyEntry};
use crate::resolver::{GenderPrediction, PredictionSource};

/// Posição da entrada na ordem de desempate (menor vence).
fn tie_rank(entry: &NameFrequencyEntry) -> (bool, Category) {
    (entry.fixed_confidence.is_some(), entry.category)
}

/// Classifica um nome pela tabela. Função pura; nome ausente → não resolvido.
pub fn classify(name: &str, table: &FrequencyTable) -> GenderPrediction {
    let mut best: Option<(&NameFrequencyEntry, f64)> = None;

    for entry in table.lookup(name) {
        let confidence = entry.confidence();
        best = match best {
            Some((current, c))
                if c > confidence || (c == confidence && tie_rank(current) <= tie_rank(entry)) =>
            {
                Some((current, c))
            }
            _ => Some((entry, confidence)),
        };
    }

    match best {
        Some((entry, confidence)) => GenderPrediction {
            name: name.to_string(),
            category: Some(entry.category),
            confidence,
            source: PredictionSource::Lookup,
        },
        None => GenderPrediction::unresolved(name),
    }
}
