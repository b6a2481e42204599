//! # Relatório da Execução
//!
//! Problemas recuperáveis não interrompem o lote: são contados aqui, por
//! tipo, e o chamador decide o que fazer com os números.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Tipos de problema contabilizados.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Ano sem as frases delimitadoras (ou sem nenhum registro).
    SegmentationMiss,
    /// Fragmento com cara de registro que não pôde ser lido.
    UnparseableRecord,
    /// Campo numérico ilegível, guardado como nulo.
    NumericCoercionFailure,
    /// Nome ausente da tabela de frequência.
    UnresolvedName,
    /// Previsão abaixo do limiar, reescrita como desconhecida.
    LowConfidencePrediction,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 5] = [
        ErrorKind::SegmentationMiss,
        ErrorKind::UnparseableRecord,
        ErrorKind::NumericCoercionFailure,
        ErrorKind::UnresolvedName,
        ErrorKind::LowConfidencePrediction,
    ];
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub counts: BTreeMap<ErrorKind, usize>,
    /// Cabeçalhos e fragmentos sem vírgula descartados pelo segmentador.
    pub discarded_fragments: usize,
    pub overrides_applied: usize,
    pub failed_years: Vec<String>,
}

impl RunReport {
    pub fn add(&mut self, kind: ErrorKind, n: usize) {
        if n > 0 {
            *self.counts.entry(kind).or_insert(0) += n;
        }
    }

    pub fn count(&self, kind: ErrorKind) -> usize {
        self.counts.get(&kind).copied().unwrap_or(0)
    }

    /// Soma outro relatório a este.
    pub fn absorb(&mut self, other: &RunReport) {
        for (&kind, &n) in &other.counts {
            self.add(kind, n);
        }
        self.discarded_fragments += other.discarded_fragments;
        self.overrides_applied += other.overrides_applied;
        self.failed_years.extend(other.failed_years.iter().cloned());
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = ErrorKind::ALL
            .iter()
            .map(|k| format!("{k:?}={}", self.count(*k)))
            .collect();
        write!(f, "{} discarded={}", parts.join(" "), self.discarded_fragments)?;
        if !self.failed_years.is_empty() {
            write!(f, " failed_years={}", self.failed_years.join(","))?;
        }
        Ok(())
    }
}
