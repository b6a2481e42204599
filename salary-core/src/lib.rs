//! # salary-core: Extração de Remunerações e Inferência de Gênero
//!
//! Este crate transforma o texto (tipo OCR) de relatórios anuais de
//! remuneração em uma tabela estruturada de pessoas, valores e anos, e depois
//! anota cada pessoa com uma categoria de gênero inferida pelo primeiro nome.
//!
//! ## Arquitetura do Sistema
//!
//! O sistema tem dois estágios lineares:
//!
//! 1.  **Extração**:
//!     *   **Normalização** ([`normalizer`]): recorte da janela útil e colapso de espaços.
//!     *   **Segmentação** ([`segmenter`]): fronteiras inferidas pelo padrão "nome + dois números".
//!     *   **Parse** ([`record`]): divisão ancorada à direita em nome, remuneração e despesas.
//! 2.  **Inferência**:
//!     *   **Tabela de frequência** ([`frequency`]): várias bases de nomes unidas em uma.
//!     *   **Busca determinística** ([`lookup`]): confiança `count / total`.
//!     *   **Modelo estatístico** ([`bayes`], [`features`]): Naive Bayes sobre sufixos.
//!     *   **Cascata** ([`resolver`]): busca primeiro, modelo para nomes novos.
//!     *   **Merge** ([`merger`]): limiar de confiança e correções manuais.
//!
//! ## Exemplo de Uso
//!
//! ```rust
//! use salary_core::{PipelineConfig, SalaryPipeline};
//!
//! let pipeline = SalaryPipeline::new(PipelineConfig::default());
//! let raw = "... external cost recoveries. \nSmith, Jane  85,000   1,200  \n\
//!            SCHEDULE OF REMUNERATION \nDoe, John1  60,000   500 \nEarnings greater than ...";
//!
//! let year = pipeline.extract_year("2023", raw).unwrap();
//! assert_eq!(year.records.len(), 1);
//! assert_eq!(year.skipped.len(), 1); // "John1": dígito no nome
//! ```
//!
//! ## Módulos Principais
//!
//! - [`pipeline`]: Orquestrador que conecta todos os estágios e emite eventos.
//! - [`config`]: Parâmetros do pipeline, com padrões.
//! - [`dataset`]: Leitura e escrita das tabelas CSV.
//! - [`report`]: Contagem de problemas recuperáveis por tipo.

pub mod bayes;
pub mod config;
pub mod dataset;
pub mod document;
pub mod error;
pub mod features;
pub mod frequency;
pub mod lookup;
pub mod merger;
pub mod model;
pub mod normalizer;
pub mod pipeline;
pub mod record;
pub mod report;
pub mod resolver;
pub mod segmenter;

pub use config::PipelineConfig;
pub use frequency::{Category, FrequencyTable, NameFrequencyEntry};
pub use merger::{AnnotatedRecord, Label};
pub use model::InferenceContext;
pub use pipeline::{PipelineEvent, RawDocument, SalaryPipeline};
pub use record::PersonSalaryRecord;
pub use resolver::GenderPrediction;
