//! # Erros da biblioteca
//!
//! Apenas falhas estruturais viram `Err`. Problemas de um único registro
//! (nome com dígito, número ilegível, nome não resolvido) são contabilizados
//! no [`RunReport`](crate::report::RunReport) e nunca interrompem o lote.

use std::path::PathBuf;

use thiserror::Error;

/// Falhas que impedem a extração de um ano inteiro.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// O texto não contém a frase delimitadora esperada.
    #[error("ano {year}: frase delimitadora não encontrada: {phrase:?}")]
    SegmentationMiss { year: String, phrase: String },

    /// A janela existe, mas nenhum registro sobreviveu à segmentação.
    #[error("ano {year}: nenhum registro extraído")]
    EmptyExtraction { year: String },
}

/// Falhas de leitura/escrita das tabelas delimitadas e da configuração.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("erro de E/S em {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("coluna {column:?} ausente em {path}")]
    MissingColumn { column: String, path: PathBuf },
}

/// Falhas de treino do classificador estatístico.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("dados insuficientes: {available} exemplos para um conjunto de teste de {holdout}")]
    InsufficientData { available: usize, holdout: usize },

    #[error("o conjunto de teste precisa ter pelo menos um exemplo")]
    EmptyHoldout,
}

/// Falha do colaborador que converte documentos em texto.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("documento não é UTF-8 válido: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
}

/// Falhas que interrompem a execução completa do pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error(transparent)]
    Model(#[from] ModelError),

    /// Nenhum ano produziu registros.
    #[error("nenhum registro extraído ({failed} anos com falha)")]
    NoRecords { failed: usize },
}
