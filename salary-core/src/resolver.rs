//! # Cadeia de Resolvedores
//!
//! A inferência de gênero é uma cascata: cada [`Resolver`] tenta classificar
//! o nome e, se não conseguir, passa a vez ao próximo.
//!
//! ```text
//! nome ──► LookupResolver ──(não resolvido)──► ModelResolver ──► previsão
//!               │                                   │
//!               └────── resolvido: fonte Lookup     └── fonte Model
//! ```
//!
//! A ordem importa: a tabela de frequência é o caminho preciso e o modelo
//! estatístico, treinado sobre os mesmos nomes, só vê nomes novos.
//!
//! Nomes distintos são resolvidos em paralelo com `rayon`, pois uma previsão
//! não depende de nenhuma outra.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::bayes::NaiveBayesModel;
use crate::frequency::{Category, FrequencyTable};
use crate::lookup;

/// Quem produziu a previsão.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionSource {
    Lookup,
    Model,
    Unresolved,
}

/// Uma previsão para um primeiro nome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenderPrediction {
    pub name: String,
    /// `None` quando nenhum resolvedor classificou o nome.
    pub category: Option<Category>,
    pub confidence: f64,
    pub source: PredictionSource,
}

impl GenderPrediction {
    pub fn unresolved(name: &str) -> Self {
        Self {
            name: name.to_string(),
            category: None,
            confidence: 0.0,
            source: PredictionSource::Unresolved,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.category.is_some()
    }
}

/// Um elo da cascata.
pub trait Resolver: Send + Sync {
    fn source(&self) -> PredictionSource;

    /// `None` passa o nome adiante.
    fn resolve(&self, name: &str) -> Option<GenderPrediction>;
}

/// Busca exata na tabela de frequência.
pub struct LookupResolver {
    table: Arc<FrequencyTable>,
}

impl LookupResolver {
    pub fn new(table: Arc<FrequencyTable>) -> Self {
        Self { table }
    }
}

impl Resolver for LookupResolver {
    fn source(&self) -> PredictionSource {
        PredictionSource::Lookup
    }

    fn resolve(&self, name: &str) -> Option<GenderPrediction> {
        Some(lookup::classify(name, &self.table)).filter(GenderPrediction::is_resolved)
    }
}

/// Classificador estatístico para nomes fora da tabela.
pub struct ModelResolver {
    model: Arc<NaiveBayesModel>,
    scale_by_accuracy: bool,
}

impl ModelResolver {
    pub fn new(model: Arc<NaiveBayesModel>, scale_by_accuracy: bool) -> Self {
        Self {
            model,
            scale_by_accuracy,
        }
    }
}

impl Resolver for ModelResolver {
    fn source(&self) -> PredictionSource {
        PredictionSource::Model
    }

    fn resolve(&self, name: &str) -> Option<GenderPrediction> {
        let dist = self.model.prob_classify(name);
        if dist.is_empty() {
            return None;
        }
        let (category, posterior) = self.model.classify(name);
        Some(GenderPrediction {
            name: name.to_string(),
            category: Some(category),
            confidence: self.model.confidence(posterior, self.scale_by_accuracy),
            source: PredictionSource::Model,
        })
    }
}

/// Resolvedores em ordem de precedência.
#[derive(Default)]
pub struct ResolverChain {
    resolvers: Vec<Box<dyn Resolver>>,
}

impl ResolverChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, resolver: impl Resolver + 'static) -> Self {
        self.resolvers.push(Box::new(resolver));
        self
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }

    /// Primeiro resolvedor que classificar o nome; senão, não resolvido.
    pub fn resolve(&self, name: &str) -> GenderPrediction {
        self.resolvers
            .iter()
            .find_map(|r| r.resolve(name))
            .unwrap_or_else(|| GenderPrediction::unresolved(name))
    }

    /// Resolve cada nome distinto uma única vez.
    pub fn resolve_all<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Resolution {
        let distinct: BTreeSet<&str> = names.into_iter().collect();
        let predictions: BTreeMap<String, GenderPrediction> = distinct
            .into_par_iter()
            .map(|name| (name.to_string(), self.resolve(name)))
            .collect();

        let resolution = Resolution { predictions };
        for source in [PredictionSource::Lookup, PredictionSource::Model, PredictionSource::Unresolved] {
            debug!(?source, names = resolution.count(source), "nomes por fonte");
        }
        info!(
            names = resolution.predictions.len(),
            lookup = resolution.count(PredictionSource::Lookup),
            model = resolution.count(PredictionSource::Model),
            unresolved = resolution.count(PredictionSource::Unresolved),
            "nomes resolvidos"
        );
        resolution
    }
}

/// Previsões por nome, com a fonte de cada uma.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub predictions: BTreeMap<String, GenderPrediction>,
}

impl Resolution {
    pub fn get(&self, name: &str) -> Option<&GenderPrediction> {
        self.predictions.get(name)
    }

    pub fn count(&self, source: PredictionSource) -> usize {
        self.predictions.values().filter(|p| p.source == source).count()
    }

    /// Subconjunto produzido por uma fonte.
    pub fn by_source(&self, source: PredictionSource) -> BTreeMap<String, GenderPrediction> {
        self.predictions
            .iter()
            .filter(|(_, p)| p.source == source)
            .map(|(k, p)| (k.clone(), p.clone()))
            .collect()
    }
}
