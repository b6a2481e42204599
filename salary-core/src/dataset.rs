//! # Arquivos Delimitados
//!
//! Leitura e escrita das tabelas CSV (UTF-8, vírgula, com cabeçalho):
//!
//! | Arquivo                 | Colunas                                                     |
//! |-------------------------|-------------------------------------------------------------|
//! | `<ano>.csv`, `all_years.csv` | `last_name, first_name, compensation, expenses, year` |
//! | previsões               | as anteriores + `predicted_category, confidence_score`      |
//! | bases de nomes          | esquema próprio de cada fonte ([`SourceSchema`](crate::frequency::SourceSchema)) |
//!
//! Valores numéricos são escritos sem aspas e sem separador de milhar;
//! valores nulos viram campo vazio.

use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bayes::NaiveBayesModel;
use crate::config::SourceSpec;
use crate::error::DatasetError;
use crate::frequency::RawFrequencySource;
use crate::merger::AnnotatedRecord;
use crate::record::{parse_amount, PersonSalaryRecord};

fn open(path: &Path) -> Result<File, DatasetError> {
    File::open(path).map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn create(path: &Path) -> Result<File, DatasetError> {
    File::create(path).map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Formata um valor monetário: inteiro quando não há parte fracionária.
fn format_amount(value: Option<f64>) -> String {
    match value {
        Some(v) if v.fract() == 0.0 && v.abs() < 1e15 => format!("{}", v as i64),
        Some(v) => v.to_string(),
        None => String::new(),
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct RecordRow {
    last_name: String,
    first_name: String,
    compensation: String,
    expenses: String,
    year: String,
}

impl From<&PersonSalaryRecord> for RecordRow {
    fn from(r: &PersonSalaryRecord) -> Self {
        Self {
            last_name: r.last_name.clone(),
            first_name: r.first_name.clone(),
            compensation: format_amount(r.compensation),
            expenses: format_amount(r.expenses),
            year: r.year.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct PredictionRow<'a> {
    last_name: &'a str,
    first_name: &'a str,
    compensation: String,
    expenses: String,
    year: &'a str,
    predicted_category: &'static str,
    confidence_score: f64,
}

/// Lê todos os arquivos de uma fonte de nomes, um [`RawFrequencySource`] por arquivo.
pub fn read_source(spec: &SourceSpec) -> Result<Vec<RawFrequencySource>, DatasetError> {
    spec.paths
        .iter()
        .map(|path| {
            let mut reader = csv::ReaderBuilder::new()
                .flexible(true)
                .from_reader(open(path)?);
            let headers = reader.headers()?.iter().map(str::to_string).collect();
            let rows = reader
                .records()
                .map(|r| r.map(|rec| rec.iter().map(str::to_string).collect()))
                .collect::<Result<Vec<Vec<String>>, _>>()?;

            debug!(source = %spec.schema.label, path = %path.display(), rows = rows.len(), "base de nomes lida");
            Ok(RawFrequencySource {
                schema: spec.schema.clone(),
                origin: path.clone(),
                headers,
                rows,
            })
        })
        .collect()
}

/// Lê todas as fontes configuradas.
pub fn read_sources(specs: &[SourceSpec]) -> Result<Vec<RawFrequencySource>, DatasetError> {
    let mut out = Vec::new();
    for spec in specs {
        out.extend(read_source(spec)?);
    }
    Ok(out)
}

pub fn write_records(path: &Path, records: &[PersonSalaryRecord]) -> Result<(), DatasetError> {
    let mut writer = csv::Writer::from_writer(create(path)?);
    for record in records {
        writer.serialize(RecordRow::from(record))?;
    }
    writer.flush().map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

pub fn read_records(path: &Path) -> Result<Vec<PersonSalaryRecord>, DatasetError> {
    let mut reader = csv::Reader::from_reader(open(path)?);
    let mut records = Vec::new();
    for row in reader.deserialize() {
        let row: RecordRow = row?;
        records.push(PersonSalaryRecord {
            last_name: row.last_name,
            first_name: row.first_name,
            compensation: parse_amount(&row.compensation),
            expenses: parse_amount(&row.expenses),
            year: row.year,
        });
    }
    Ok(records)
}

pub fn write_predictions(path: &Path, annotated: &[AnnotatedRecord]) -> Result<(), DatasetError> {
    let mut writer = csv::Writer::from_writer(create(path)?);
    for a in annotated {
        writer.serialize(PredictionRow {
            last_name: &a.record.last_name,
            first_name: &a.record.first_name,
            compensation: format_amount(a.record.compensation),
            expenses: format_amount(a.record.expenses),
            year: &a.record.year,
            predicted_category: a.label.as_str(),
            confidence_score: a.confidence,
        })?;
    }
    writer.flush().map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

pub fn write_model(path: &Path, model: &NaiveBayesModel) -> Result<(), DatasetError> {
    serde_json::to_writer(create(path)?, model)?;
    Ok(())
}

pub fn read_model(path: &Path) -> Result<NaiveBayesModel, DatasetError> {
    Ok(serde_json::from_reader(std::io::BufReader::new(open(path)?))?)
}

pub fn write_text(path: &Path, text: &str) -> Result<(), DatasetError> {
    std::fs::write(path, text).map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })
}
