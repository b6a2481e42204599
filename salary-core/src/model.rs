//! # Contexto de Inferência
//!
//! Agrega tudo que a cascata de gênero precisa num snapshot imutável:
//!
//! - **Tabela de frequência**, compartilhada via `Arc`;
//! - **Modelo estatístico** treinado sobre os nomes dessa tabela;
//! - **Limiar** de confiança e **correções manuais** do merger.
//!
//! O contexto é construído uma vez por execução e passado por referência
//! aos estágios; nenhum estado global é consultado. Como só há leitura
//! depois da construção, ele pode ser usado por várias threads.

use std::sync::Arc;

use crate::bayes::NaiveBayesModel;
use crate::config::{Override, PipelineConfig};
use crate::error::ModelError;
use crate::frequency::FrequencyTable;
use crate::resolver::{LookupResolver, ModelResolver, ResolverChain};

#[derive(Debug, Clone)]
pub struct InferenceContext {
    pub table: Arc<FrequencyTable>,
    /// `None` desativa o caminho estatístico: nomes fora da tabela ficam
    /// sem categoria.
    pub model: Option<Arc<NaiveBayesModel>>,
    pub overrides: Vec<Override>,
    pub threshold: f64,
    pub scale_by_accuracy: bool,
}

impl InferenceContext {
    /// Treina o modelo estatístico sobre a tabela e monta o contexto.
    pub fn train(table: FrequencyTable, config: &PipelineConfig) -> Result<Self, ModelError> {
        let model = NaiveBayesModel::fit(&table, &config.fallback)?;
        Ok(Self::with_model(table, Some(model), config))
    }

    /// Monta o contexto com um modelo já treinado (ou nenhum).
    pub fn with_model(
        table: FrequencyTable,
        model: Option<NaiveBayesModel>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            table: Arc::new(table),
            model: model.map(Arc::new),
            overrides: config.overrides.clone(),
            threshold: config.threshold,
            scale_by_accuracy: config.fallback.scale_by_accuracy,
        }
    }

    /// Cascata na ordem: tabela, depois modelo.
    pub fn chain(&self) -> ResolverChain {
        let chain = ResolverChain::new().with(LookupResolver::new(Arc::clone(&self.table)));
        match &self.model {
            Some(model) => chain.with(ModelResolver::new(Arc::clone(model), self.scale_by_accuracy)),
            None => chain,
        }
    }

    /// Acurácia do modelo no conjunto de teste, se houver modelo.
    pub fn model_accuracy(&self) -> Option<f64> {
        self.model.as_ref().map(|m| m.accuracy())
    }
}
