//! # Pipeline: Orquestrador com Eventos Observáveis
//!
//! Coordena os dois estágios do sistema e emite eventos em cada passo via
//! um canal Rust (`mpsc`), para que o chamador acompanhe o progresso.
//!
//! ```text
//! texto bruto por ano ─► janela ─► normalize ─► segment ─► parse ─► registros
//!                                                                      │
//! bases de nomes ─► tabela de frequência ─► modelo estatístico         │
//!                          │                      │                    ▼
//!                          └──────► cascata (lookup → modelo) ─► merge ─► registros anotados
//! ```
//!
//! ## Isolamento por ano
//!
//! Cada ano é extraído de forma independente e em paralelo (`rayon`). Um ano
//! sem as frases delimitadoras vira uma entrada na lista de erros e os
//! demais seguem normalmente. A execução só falha se nenhum ano produzir
//! registros.
//!
//! ## Exemplo de Uso
//!
//! ```rust
//! use salary_core::config::PipelineConfig;
//! use salary_core::pipeline::{RawDocument, SalaryPipeline};
//!
//! let pipeline = SalaryPipeline::new(PipelineConfig::default());
//! let text = "capa external cost recoveries. Smith, Jane 85,000 1,200 Earnings greater than";
//! let year = pipeline.extract_year("2023", text).unwrap();
//! assert_eq!(year.records.len(), 1);
//! assert_eq!(year.records[0].last_name, "Smith");
//! ```

use std::collections::BTreeMap;
use std::sync::mpsc;
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::error::{ExtractionError, PipelineError};
use crate::frequency::{self, BuildReport, RawFrequencySource};
use crate::merger::{self, AnnotatedRecord};
use crate::model::InferenceContext;
use crate::normalizer::{normalize, take_window};
use crate::record::{parse_segment_detailed, PersonSalaryRecord, SkipReason, SkippedRecord};
use crate::report::{ErrorKind, RunReport};
use crate::resolver::{PredictionSource, Resolution};
use crate::segmenter::{FragmentKind, Segmenter};

/// Texto bruto de um ano fiscal, como entregue pelo extrator de documentos.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawDocument {
    pub year: String,
    pub text: String,
}

/// Resultado da extração de um ano.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearExtraction {
    pub year: String,
    pub records: Vec<PersonSalaryRecord>,
    pub skipped: Vec<SkippedRecord>,
    pub report: RunReport,
}

/// Resultado da extração de todos os anos: parcial, com lista de erros.
#[derive(Debug, Default)]
pub struct BatchExtraction {
    /// Anos bem-sucedidos, em ordem de ano.
    pub years: Vec<YearExtraction>,
    pub errors: Vec<ExtractionError>,
    pub report: RunReport,
}

impl BatchExtraction {
    /// Todos os registros, concatenados em ordem de ano.
    pub fn records(&self) -> Vec<PersonSalaryRecord> {
        self.years.iter().flat_map(|y| y.records.iter().cloned()).collect()
    }

    /// Registros agrupados por ano. Documentos distintos do mesmo ano
    /// (`2023.txt` e `FY23 UBC.txt`) caem no mesmo grupo, na ordem de entrada.
    pub fn records_by_year(&self) -> BTreeMap<&str, Vec<PersonSalaryRecord>> {
        let mut grouped: BTreeMap<&str, Vec<PersonSalaryRecord>> = BTreeMap::new();
        for extraction in &self.years {
            grouped
                .entry(extraction.year.as_str())
                .or_default()
                .extend(extraction.records.iter().cloned());
        }
        grouped
    }
}

/// Resultado da inferência sobre um conjunto de registros.
#[derive(Debug, Clone)]
pub struct Inference {
    pub annotated: Vec<AnnotatedRecord>,
    pub resolution: Resolution,
    /// Nomes que a tabela não resolveu e foram enviados ao modelo.
    pub needs_fallback: Vec<String>,
    pub model_accuracy: Option<f64>,
    pub report: RunReport,
}

impl Inference {
    fn by_source(&self, source: PredictionSource) -> Vec<AnnotatedRecord> {
        self.annotated
            .iter()
            .filter(|a| a.source == source)
            .cloned()
            .collect()
    }

    /// Registros resolvidos pela tabela de frequência.
    pub fn lookup_predictions(&self) -> Vec<AnnotatedRecord> {
        self.by_source(PredictionSource::Lookup)
    }

    /// Registros resolvidos pelo modelo estatístico.
    pub fn model_predictions(&self) -> Vec<AnnotatedRecord> {
        self.by_source(PredictionSource::Model)
    }
}

/// Saída completa de [`SalaryPipeline::run`].
#[derive(Debug)]
pub struct PipelineOutput {
    pub extraction: BatchExtraction,
    pub inference: Inference,
    pub build_report: BuildReport,
    pub report: RunReport,
}

/// Eventos emitidos durante a execução.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PipelineEvent {
    /// Um ano foi extraído.
    YearExtracted {
        year: String,
        records: usize,
        skipped: usize,
    },
    /// Um ano falhou; os demais continuam.
    YearFailed { year: String, message: String },
    /// Tabela de frequência pronta.
    TableBuilt { entries: usize, names: usize },
    /// Modelo estatístico treinado.
    ModelTrained { accuracy: f64 },
    /// Cascata aplicada aos nomes distintos.
    NamesResolved {
        lookup: usize,
        model: usize,
        unresolved: usize,
    },
    /// Execução concluída.
    Done {
        records: usize,
        report: RunReport,
        processing_ms: u64,
    },
    /// Falha irrecuperável.
    Error { message: String },
}

pub struct SalaryPipeline {
    pub config: PipelineConfig,
    segmenter: Segmenter,
}

impl SalaryPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        let segmenter = Segmenter::new(config.markers.clone());
        Self { config, segmenter }
    }

    /// Extrai os registros de um ano: janela, normalização, segmentação e parse.
    pub fn extract_year(&self, year: &str, raw_text: &str) -> Result<YearExtraction, ExtractionError> {
        let windowed = match &self.config.window {
            Some(window) => take_window(raw_text, window, year)?,
            None => raw_text,
        };
        let text = normalize(windowed);

        let mut records = Vec::new();
        let mut skipped = Vec::new();
        let mut report = RunReport::default();

        for fragment in self.segmenter.split(&text) {
            match fragment.kind {
                FragmentKind::Candidate => match parse_segment_detailed(&fragment.text, year) {
                    Ok(parsed) => {
                        report.add(ErrorKind::NumericCoercionFailure, parsed.coercion_failures);
                        records.push(parsed.record);
                    }
                    Err(skip) => {
                        debug!(year, segment = %skip.segment, reason = ?skip.reason, "segmento rejeitado");
                        report.add(ErrorKind::UnparseableRecord, 1);
                        skipped.push(skip);
                    }
                },
                FragmentKind::DigitInName | FragmentKind::Unmatched => {
                    let reason = if fragment.kind == FragmentKind::DigitInName {
                        SkipReason::DigitInName
                    } else {
                        SkipReason::MalformedSplit
                    };
                    debug!(year, segment = %fragment.text, ?reason, "fragmento não parseável");
                    report.add(ErrorKind::UnparseableRecord, 1);
                    skipped.push(SkippedRecord {
                        segment: fragment.text,
                        reason,
                    });
                }
                FragmentKind::Header | FragmentKind::NoComma => {
                    report.discarded_fragments += 1;
                }
            }
        }

        if records.is_empty() {
            return Err(ExtractionError::EmptyExtraction {
                year: year.to_string(),
            });
        }

        info!(
            year,
            records = records.len(),
            skipped = skipped.len(),
            discarded = report.discarded_fragments,
            "ano extraído"
        );
        Ok(YearExtraction {
            year: year.to_string(),
            records,
            skipped,
            report,
        })
    }

    /// Extrai todos os anos em paralelo, isolando as falhas por ano.
    pub fn extract_all(&self, documents: &[RawDocument]) -> BatchExtraction {
        let mut results: Vec<(String, Result<YearExtraction, ExtractionError>)> = documents
            .par_iter()
            .map(|doc| (doc.year.clone(), self.extract_year(&doc.year, &doc.text)))
            .collect();
        results.sort_by(|a, b| a.0.cmp(&b.0));

        let mut batch = BatchExtraction::default();
        for (year, result) in results {
            match result {
                Ok(extraction) => {
                    batch.report.absorb(&extraction.report);
                    batch.years.push(extraction);
                }
                Err(err) => {
                    warn!(year = %year, error = %err, "ano ignorado");
                    if matches!(err, ExtractionError::SegmentationMiss { .. }) {
                        batch.report.add(ErrorKind::SegmentationMiss, 1);
                    }
                    batch.report.failed_years.push(year);
                    batch.errors.push(err);
                }
            }
        }
        batch
    }

    /// Constrói a tabela de frequência e treina o modelo estatístico.
    pub fn build_context(
        &self,
        sources: &[RawFrequencySource],
    ) -> Result<(InferenceContext, BuildReport), PipelineError> {
        let (table, build_report) = frequency::build(sources)?;
        let context = InferenceContext::train(table, &self.config)?;
        Ok((context, build_report))
    }

    /// Aplica a cascata de gênero e o merge aos registros.
    pub fn infer(&self, records: &[PersonSalaryRecord], context: &InferenceContext) -> Inference {
        let resolution = context
            .chain()
            .resolve_all(records.iter().map(|r| r.first_name.as_str()));

        let deterministic = resolution.by_source(PredictionSource::Lookup);
        let fallback = resolution.by_source(PredictionSource::Model);
        let needs_fallback: Vec<String> = resolution
            .predictions
            .iter()
            .filter(|(_, p)| p.source != PredictionSource::Lookup)
            .map(|(name, _)| name.clone())
            .collect();

        let (annotated, stats) = merger::merge(
            records,
            &deterministic,
            &fallback,
            &context.overrides,
            context.threshold,
        );

        let mut report = RunReport::default();
        report.add(ErrorKind::UnresolvedName, needs_fallback.len());
        report.add(ErrorKind::LowConfidencePrediction, stats.low_confidence);
        report.overrides_applied = stats.overrides_applied;

        Inference {
            annotated,
            resolution,
            needs_fallback,
            model_accuracy: context.model_accuracy(),
            report,
        }
    }

    /// Execução completa, emitindo [`PipelineEvent`]s no canal.
    ///
    /// Erros de envio são ignorados: o chamador pode descartar o receptor.
    pub fn run_streaming(
        &self,
        documents: &[RawDocument],
        sources: &[RawFrequencySource],
        tx: mpsc::Sender<PipelineEvent>,
    ) -> Result<PipelineOutput, PipelineError> {
        let start = Instant::now();

        let extraction = self.extract_all(documents);
        for year in &extraction.years {
            let _ = tx.send(PipelineEvent::YearExtracted {
                year: year.year.clone(),
                records: year.records.len(),
                skipped: year.skipped.len(),
            });
        }
        for (year, err) in extraction.report.failed_years.iter().zip(&extraction.errors) {
            let _ = tx.send(PipelineEvent::YearFailed {
                year: year.clone(),
                message: err.to_string(),
            });
        }

        let records = extraction.records();
        if records.is_empty() {
            let err = PipelineError::NoRecords {
                failed: extraction.errors.len(),
            };
            let _ = tx.send(PipelineEvent::Error {
                message: err.to_string(),
            });
            return Err(err);
        }

        let (context, build_report) = match self.build_context(sources) {
            Ok(built) => built,
            Err(err) => {
                let _ = tx.send(PipelineEvent::Error {
                    message: err.to_string(),
                });
                return Err(err);
            }
        };
        let _ = tx.send(PipelineEvent::TableBuilt {
            entries: context.table.len(),
            names: context.table.names().len(),
        });
        if let Some(accuracy) = context.model_accuracy() {
            let _ = tx.send(PipelineEvent::ModelTrained { accuracy });
        }

        let inference = self.infer(&records, &context);
        let _ = tx.send(PipelineEvent::NamesResolved {
            lookup: inference.resolution.count(PredictionSource::Lookup),
            model: inference.resolution.count(PredictionSource::Model),
            unresolved: inference.resolution.count(PredictionSource::Unresolved),
        });

        let mut report = extraction.report.clone();
        report.absorb(&inference.report);
        info!(records = records.len(), %report, "execução concluída");

        let _ = tx.send(PipelineEvent::Done {
            records: inference.annotated.len(),
            report: report.clone(),
            processing_ms: start.elapsed().as_millis() as u64,
        });

        Ok(PipelineOutput {
            extraction,
            inference,
            build_report,
            report,
        })
    }

    /// Execução completa sem observador.
    pub fn run(
        &self,
        documents: &[RawDocument],
        sources: &[RawFrequencySource],
    ) -> Result<PipelineOutput, PipelineError> {
        let (tx, _rx) = mpsc::channel();
        self.run_streaming(documents, sources, tx)
    }
}

impl Default for SalaryPipeline {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frequency::{Category, SourceSchema};
    use crate::merger::Label;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    const SPEC_TEXT: &str = "... external cost recoveries. \nSmith, Jane  85,000   1,200  \nSCHEDULE OF REMUNERATION \nDoe, John1  60,000   500 \nEarnings greater than ...";

    fn doc(year: &str, text: &str) -> RawDocument {
        RawDocument {
            year: year.to_string(),
            text: text.to_string(),
        }
    }

    fn names_source() -> RawFrequencySource {
        let female = ["Jane", "Anna", "Maria", "Julia", "Sofia", "Emma", "Olivia", "Laura"];
        let male = ["John", "Robert", "Peter", "Mark", "Tom", "David", "Frank", "Paul"];
        let mut rows: Vec<Vec<String>> = Vec::new();
        for n in female {
            rows.push(vec![n.to_string(), "F".to_string(), "100".to_string()]);
        }
        for n in male {
            rows.push(vec![n.to_string(), "M".to_string(), "100".to_string()]);
        }
        rows.push(vec!["Sam".into(), "F".into(), "7000".into()]);
        rows.push(vec!["Sam".into(), "M".into(), "5000".into()]);

        RawFrequencySource {
            schema: SourceSchema {
                label: "toy".into(),
                name_column: "Name".into(),
                category_column: "Gender".into(),
                count_column: Some("Count".into()),
                category_labels: BTreeMap::from([
                    ("F".to_string(), Category::Female),
                    ("M".to_string(), Category::Male),
                ]),
                filter: None,
                fixed_confidence: None,
            },
            origin: PathBuf::from("toy.csv"),
            headers: vec!["Name".into(), "Gender".into(), "Count".into()],
            rows,
        }
    }

    fn small_config() -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.fallback.holdout_size = 4;
        config
    }

    #[test]
    fn test_extract_spec_scenario() {
        let pipeline = SalaryPipeline::default();
        let year = pipeline.extract_year("2023", SPEC_TEXT).unwrap();

        assert_eq!(
            year.records,
            vec![PersonSalaryRecord {
                last_name: "Smith".into(),
                first_name: "Jane".into(),
                compensation: Some(85000.0),
                expenses: Some(1200.0),
                year: "2023".into(),
            }]
        );
        assert_eq!(year.skipped.len(), 1);
        assert_eq!(year.skipped[0].reason, SkipReason::DigitInName);
        assert_eq!(year.report.count(ErrorKind::UnparseableRecord), 1);
        assert_eq!(year.report.discarded_fragments, 1);
    }

    #[test]
    fn test_round_trip_counts() {
        let good = [
            ("Abe", "Al"),
            ("Baker", "Beth"),
            ("Chu", "Cy"),
            ("O'Dell", "Di"),
            ("Evans-Lee", "Ed"),
            ("Fox", "Mary Jo"),
        ];
        let bad = [("Gray", "G1ll"), ("Hu", "H2")];

        let mut text = String::from("external cost recoveries.\n");
        for (i, (last, first)) in good.iter().enumerate() {
            text.push_str(&format!("{last}, {first}   {},{:03}  {}\n", 50 + i, i, i * 10));
            if let Some((l, f)) = bad.get(i) {
                text.push_str(&format!("{l},\n{f}  1,000 2\n"));
            }
        }
        text.push_str("Earnings greater than");

        let year = SalaryPipeline::default().extract_year("2020", &text).unwrap();
        assert_eq!(year.records.len(), good.len());
        assert_eq!(year.skipped.len(), bad.len());
        for r in &year.records {
            for v in [r.compensation, r.expenses].into_iter().flatten() {
                assert!(v >= 0.0);
            }
        }
        assert_eq!(year.records[5].first_name, "Mary Jo");
    }

    #[test]
    fn test_extract_all_isolates_failures() {
        let pipeline = SalaryPipeline::default();
        let docs = vec![
            doc("2021", SPEC_TEXT),
            doc("2019", "sem frases delimitadoras"),
            doc("2020", "external cost recoveries. nada aqui Earnings greater than"),
        ];
        let batch = pipeline.extract_all(&docs);

        assert_eq!(batch.years.len(), 1);
        assert_eq!(batch.years[0].year, "2021");
        assert_eq!(batch.errors.len(), 2);
        assert_eq!(batch.report.failed_years, vec!["2019", "2020"]);
        assert_eq!(batch.report.count(ErrorKind::SegmentationMiss), 1);
        assert_eq!(batch.records().len(), 1);
    }

    #[test]
    fn test_records_by_year_merges_documents_of_same_year() {
        let pipeline = SalaryPipeline::default();
        let docs = vec![
            doc("2023", SPEC_TEXT),
            doc("2022", SPEC_TEXT),
            doc(
                "2023",
                "external cost recoveries. Lee, Bo 1 2 Earnings greater than",
            ),
        ];
        let batch = pipeline.extract_all(&docs);
        assert_eq!(batch.years.len(), 3);

        let grouped = batch.records_by_year();
        assert_eq!(grouped.keys().copied().collect::<Vec<_>>(), vec!["2022", "2023"]);
        let names: Vec<&str> = grouped["2023"].iter().map(|r| r.first_name.as_str()).collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"Jane") && names.contains(&"Bo"));
        assert_eq!(grouped.values().map(Vec::len).sum::<usize>(), batch.records().len());
    }

    #[test]
    fn test_extract_handles_tabs_and_typographic_apostrophes() {
        let pipeline = SalaryPipeline::default();
        let text = "external cost recoveries. Smith, Jane\t85,000\t1,200 \
                    O\u{2019}Neil, Pat\u{a0}90,000\u{a0}1,000 Lee, Bo 1 2 Earnings greater than";
        let year = pipeline.extract_year("2023", text).unwrap();

        assert!(year.skipped.is_empty(), "{:?}", year.skipped);
        let keys: Vec<(&str, &str)> = year.records.iter().map(|r| r.key()).collect();
        assert_eq!(keys, vec![("Jane", "Smith"), ("Pat", "O\u{2019}Neil"), ("Bo", "Lee")]);
    }

    #[test]
    fn test_infer_routes_unknown_names_to_model() {
        let pipeline = SalaryPipeline::new(small_config());
        let (context, _) = pipeline.build_context(&[names_source()]).unwrap();

        let records = vec![
            parse("Smith, Jane 1 2"),
            parse("Lee, Sam 3 4"),
            parse("Ono, Santa 5 6"),
            parse("Kowalski, Zbigniewa 7 8"),
        ];
        let inference = pipeline.infer(&records, &context);

        assert_eq!(inference.annotated.len(), records.len());
        assert_eq!(inference.annotated[0].label, Label::Female);
        assert_eq!(inference.annotated[0].confidence, 1.0);
        // 0.58 < 0.8
        assert_eq!(inference.annotated[1].label, Label::Unknown);
        assert_eq!(inference.annotated[1].source, PredictionSource::Lookup);
        // Override manual
        assert_eq!(inference.annotated[2].label, Label::Male);

        assert!(inference.needs_fallback.contains(&"Zbigniewa".to_string()));
        assert!(inference.needs_fallback.contains(&"Santa".to_string()));
        assert_eq!(inference.annotated[3].source, PredictionSource::Model);
        assert_eq!(inference.lookup_predictions().len(), 2);
        assert_eq!(inference.model_predictions().len(), 2);
        assert!(inference.model_accuracy.is_some());
    }

    #[test]
    fn test_run_streaming_events() {
        let pipeline = SalaryPipeline::new(small_config());
        let docs = vec![doc("2023", SPEC_TEXT), doc("2019", "vazio")];
        let (tx, rx) = mpsc::channel();

        let output = pipeline.run_streaming(&docs, &[names_source()], tx).unwrap();
        let events: Vec<PipelineEvent> = rx.iter().collect();

        assert!(matches!(events.first(), Some(PipelineEvent::YearExtracted { records: 1, .. })));
        assert!(events.iter().any(|e| matches!(e, PipelineEvent::YearFailed { year, .. } if year == "2019")));
        assert!(events.iter().any(|e| matches!(e, PipelineEvent::ModelTrained { .. })));
        assert!(matches!(events.last(), Some(PipelineEvent::Done { records: 1, .. })));

        assert_eq!(output.inference.annotated.len(), 1);
        assert_eq!(output.report.count(ErrorKind::UnparseableRecord), 1);
        assert_eq!(output.report.count(ErrorKind::SegmentationMiss), 1);
    }

    #[test]
    fn test_run_fails_without_records() {
        let pipeline = SalaryPipeline::new(small_config());
        let err = pipeline.run(&[doc("2019", "vazio")], &[names_source()]).unwrap_err();
        assert!(matches!(err, PipelineError::NoRecords { failed: 1 }));
    }

    #[test]
    fn test_event_serialisation_shape() {
        let event = PipelineEvent::TableBuilt { entries: 3, names: 2 };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "TableBuilt");
        assert_eq!(json["data"]["entries"], 3);
    }

    fn parse(segment: &str) -> PersonSalaryRecord {
        crate::record::parse_segment(segment, "2023").unwrap()
    }
}
