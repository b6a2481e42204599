//! # Classificador Naive Bayes de Nomes
//!
//! Caminho de menor precisão da cascata, usado só para nomes que não estão
//! na tabela de frequência. É um modelo **generativo**: assume que as
//! features de um nome são independentes dada a categoria.
//!
//! $$ P(c \mid f_1..f_n) \propto P(c) \prod_i P(f_i \mid c) $$
//!
//! ## Suavização
//!
//! Tanto a priori quanto as verossimilhanças usam *expected likelihood
//! estimation* (soma de ½ a cada contagem):
//!
//! - `P(c) = (count(c) + 0.5) / (N + 0.5 · |C|)`
//! - `P(v | c, f) = (count(c, f=v) + 0.5) / (count(c) + 0.5 · |valores(f)|)`
//!
//! Um sufixo nunca visto numa categoria recebe probabilidade pequena mas
//! não-nula. As contas são feitas em log-space e normalizadas com
//! log-sum-exp.
//!
//! ## Treino
//!
//! 1. Cada nome distinto da tabela vira um exemplo rotulado com o vencedor
//!    da busca determinística.
//! 2. Os exemplos são ordenados por nome e embaralhados com semente fixa.
//! 3. Os primeiros `holdout_size` ficam para teste; a acurácia no teste,
//!    arredondada para duas casas, penaliza as confianças reportadas.
//!
//! ## Exemplo de Uso
//!
//! ```rust
//! use salary_core::bayes::NaiveBayesModel;
//! use salary_core::features::NameFeatures;
//! use salary_core::frequency::Category;
//!
//! let examples = vec![
//!     (NameFeatures::extract("Anna"), Category::Female),
//!     (NameFeatures::extract("Maria"), Category::Female),
//!     (NameFeatures::extract("John"), Category::Male),
//! ];
//! let model = NaiveBayesModel::train(&examples);
//! let (category, posterior) = model.classify("Julia");
//! assert_eq!(category, Category::Female);
//! assert!(posterior > 0.5);
//! ```

use std::collections::{BTreeMap, BTreeSet};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::FallbackConfig;
use crate::error::ModelError;
use crate::features::NameFeatures;
use crate::frequency::{round2, Category, FrequencyTable};
use crate::lookup;

/// Divisão treino/teste dos nomes rotulados.
#[derive(Debug, Clone)]
pub struct DatasetSplit {
    pub train: Vec<(String, Category)>,
    pub test: Vec<(String, Category)>,
}

/// Uma feature com forte poder discriminativo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InformativeFeature {
    pub feature: String,
    pub value: String,
    /// Categoria com maior verossimilhança para este valor.
    pub favours: Category,
    /// Razão entre a maior e a menor verossimilhança.
    pub ratio: f64,
}

/// Modelo treinado, serializável em JSON.
///
/// Guarda apenas contagens; as probabilidades suavizadas são derivadas na
/// hora, então o arquivo salvo é legível e estável.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NaiveBayesModel {
    /// Exemplos de treino por categoria.
    label_counts: BTreeMap<Category, u64>,
    /// `categoria → feature → valor → contagem`.
    feature_counts: BTreeMap<Category, BTreeMap<String, BTreeMap<String, u64>>>,
    /// Valores distintos vistos por feature (o `B` da suavização).
    feature_values: BTreeMap<String, BTreeSet<String>>,
    /// Acurácia no conjunto de teste, arredondada. 0 antes da avaliação.
    accuracy: f64,
}

/// Nomes distintos da tabela rotulados pelo classificador determinístico.
pub fn labelled_names(table: &FrequencyTable) -> Vec<(String, Category)> {
    table
        .names()
        .into_iter()
        .filter_map(|name| {
            lookup::classify(name, table)
                .category
                .map(|category| (name.to_string(), category))
        })
        .collect()
}

/// Embaralha com semente fixa e separa os primeiros `holdout` para teste.
pub fn train_test_split(
    mut examples: Vec<(String, Category)>,
    holdout: usize,
    seed: u64,
) -> Result<DatasetSplit, ModelError> {
    if holdout == 0 {
        return Err(ModelError::EmptyHoldout);
    }
    if holdout >= examples.len() {
        return Err(ModelError::InsufficientData {
            available: examples.len(),
            holdout,
        });
    }

    examples.sort();
    let mut rng = StdRng::seed_from_u64(seed);
    examples.shuffle(&mut rng);

    let train = examples.split_off(holdout);
    Ok(DatasetSplit {
        train,
        test: examples,
    })
}

fn featurize(examples: &[(String, Category)]) -> Vec<(NameFeatures, Category)> {
    examples
        .iter()
        .map(|(name, category)| (NameFeatures::extract(name), *category))
        .collect()
}

impl NaiveBayesModel {
    /// Conta categorias e valores de features dos exemplos.
    pub fn train(examples: &[(NameFeatures, Category)]) -> Self {
        let mut label_counts: BTreeMap<Category, u64> = BTreeMap::new();
        let mut feature_counts: BTreeMap<Category, BTreeMap<String, BTreeMap<String, u64>>> =
            BTreeMap::new();
        let mut feature_values: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

        for (features, category) in examples {
            *label_counts.entry(*category).or_insert(0) += 1;
            let per_label = feature_counts.entry(*category).or_default();
            for (feature, value) in features.iter() {
                *per_label
                    .entry(feature.to_string())
                    .or_default()
                    .entry(value.to_string())
                    .or_insert(0) += 1;
                feature_values
                    .entry(feature.to_string())
                    .or_default()
                    .insert(value.to_string());
            }
        }

        Self {
            label_counts,
            feature_counts,
            feature_values,
            accuracy: 0.0,
        }
    }

    /// Fluxo completo: rotula, divide, treina e mede a acurácia.
    pub fn fit(table: &FrequencyTable, config: &FallbackConfig) -> Result<Self, ModelError> {
        let split = train_test_split(labelled_names(table), config.holdout_size, config.seed)?;
        let mut model = Self::train(&featurize(&split.train));
        let accuracy = model.evaluate(&split.test);

        info!(
            train = split.train.len(),
            test = split.test.len(),
            accuracy,
            "classificador estatístico treinado"
        );
        Ok(model)
    }

    /// Mede e guarda a acurácia (arredondada) num conjunto rotulado.
    pub fn evaluate(&mut self, test: &[(String, Category)]) -> f64 {
        if test.is_empty() {
            self.accuracy = 0.0;
            return 0.0;
        }
        let correct = test
            .iter()
            .filter(|(name, expected)| self.classify(name).0 == *expected)
            .count();
        self.accuracy = round2(correct as f64 / test.len() as f64);
        self.accuracy
    }

    pub fn accuracy(&self) -> f64 {
        self.accuracy
    }

    pub fn labels(&self) -> impl Iterator<Item = Category> + '_ {
        self.label_counts.keys().copied()
    }

    fn total(&self) -> u64 {
        self.label_counts.values().sum()
    }

    fn log_prior(&self, category: Category) -> f64 {
        let count = self.label_counts.get(&category).copied().unwrap_or(0) as f64;
        let bins = self.label_counts.len() as f64;
        ((count + 0.5) / (self.total() as f64 + 0.5 * bins)).ln()
    }

    fn likelihood(&self, category: Category, feature: &str, value: &str) -> Option<f64> {
        let counts = self.feature_counts.get(&category)?.get(feature)?;
        let bins = self.feature_values.get(feature).map_or(0, BTreeSet::len) as f64;
        let label_total = self.label_counts.get(&category).copied().unwrap_or(0) as f64;
        let count = counts.get(value).copied().unwrap_or(0) as f64;
        Some((count + 0.5) / (label_total + 0.5 * bins))
    }

    /// Distribuição a posteriori sobre as categorias vistas no treino.
    pub fn prob_classify(&self, name: &str) -> BTreeMap<Category, f64> {
        let features = NameFeatures::extract(name);

        let logs: Vec<(Category, f64)> = self
            .labels()
            .map(|category| {
                let mut log_prob = self.log_prior(category);
                for (feature, value) in features.iter() {
                    // Features nunca vistas em nenhuma categoria são ignoradas
                    if !self.feature_values.contains_key(feature) {
                        continue;
                    }
                    log_prob += match self.likelihood(category, feature, value) {
                        Some(p) => p.ln(),
                        None => f64::NEG_INFINITY,
                    };
                }
                (category, log_prob)
            })
            .collect();

        let max = logs.iter().map(|(_, l)| *l).fold(f64::NEG_INFINITY, f64::max);
        if !max.is_finite() {
            return BTreeMap::new();
        }
        let norm = max + logs.iter().map(|(_, l)| (l - max).exp()).sum::<f64>().ln();

        logs.into_iter().map(|(c, l)| (c, (l - norm).exp())).collect()
    }

    /// Categoria de maior probabilidade e sua probabilidade.
    ///
    /// Empates exatos ficam com a primeira categoria (`Female`). Um modelo
    /// sem exemplos devolve `(Female, 0.0)`.
    pub fn classify(&self, name: &str) -> (Category, f64) {
        let mut best = (Category::Female, 0.0);
        let mut seen = false;
        for (category, p) in self.prob_classify(name) {
            if !seen || p > best.1 {
                best = (category, p);
                seen = true;
            }
        }
        best
    }

    /// Confiança reportada ao merger.
    pub fn confidence(&self, posterior: f64, scale_by_accuracy: bool) -> f64 {
        if scale_by_accuracy {
            round2(posterior * self.accuracy)
        } else {
            round2(posterior)
        }
    }

    /// As `n` features cuja verossimilhança mais difere entre categorias.
    pub fn most_informative_features(&self, n: usize) -> Vec<InformativeFeature> {
        let labels: Vec<Category> = self.labels().collect();
        let mut ranked = Vec::new();

        for (feature, values) in &self.feature_values {
            for value in values {
                let probs: Vec<(Category, f64)> = labels
                    .iter()
                    .filter_map(|&c| self.likelihood(c, feature, value).map(|p| (c, p)))
                    .collect();
                if probs.len() < 2 {
                    continue;
                }
                let (favours, max) = probs
                    .iter()
                    .copied()
                    .fold((labels[0], f64::MIN), |acc, x| if x.1 > acc.1 { x } else { acc });
                let min = probs.iter().map(|(_, p)| *p).fold(f64::INFINITY, f64::min);
                ranked.push(InformativeFeature {
                    feature: feature.clone(),
                    value: value.clone(),
                    favours,
                    ratio: max / min,
                });
            }
        }

        ranked.sort_by(|a, b| {
            b.ratio
                .total_cmp(&a.ratio)
                .then_with(|| a.feature.cmp(&b.feature))
                .then_with(|| a.value.cmp(&b.value))
        });
        ranked.truncate(n);
        ranked
    }
}
