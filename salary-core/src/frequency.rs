//! # Tabela de Frequência de Nomes
//!
//! Une várias bases de nomes de bebês, cada uma com seu próprio esquema, em
//! uma única tabela canônica `(nome, categoria, contagem, total)`.
//!
//! ## Fontes
//!
//! Cada [`SourceSchema`] descreve como ler uma tabela:
//!
//! - coluna do nome e coluna da categoria (com rótulos próprios, ex: `F`/`M`
//!   ou `Female`/`Male`, traduzidos por `category_labels`);
//! - coluna de contagem opcional; sem ela cada linha vale 1;
//! - filtro de linha opcional (ex: `Indicator == Frequency` na base da
//!   Statistics Canada, que também traz linhas de proporção);
//! - confiança fixa opcional, para bases sem sinal real de frequência.
//!
//! ## Regras de agregação
//!
//! 1. O nome é reduzido ao primeiro token e posto em *title case*
//!    (`MARY ANN` → `Mary`, `o'neil` → `O'Neil`).
//! 2. Bases contadas somam as contagens por `(nome, categoria)`, através de
//!    anos e de fontes; o total de cada nome é recalculado no final.
//! 3. Bases de confiança fixa contribuem apenas nomes sem ambiguidade: um
//!    nome rotulado nas duas categorias dentro delas é descartado.
//! 4. Nomes com total zero não carregam sinal e são descartados.
//!
//! ## Exemplo de Uso
//!
//! ```rust
//! use salary_core::frequency::{Category, FrequencyTable, NameFrequencyEntry};
//!
//! let table = FrequencyTable::from_entries(vec![
//!     NameFrequencyEntry::counted("Sam", Category::Female, 7000, 12000),
//!     NameFrequencyEntry::counted("Sam", Category::Male, 5000, 12000),
//! ]);
//! assert_eq!(table.lookup("Sam").count(), 2);
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::DatasetError;

/// As duas categorias mutuamente exclusivas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    Female,
    Male,
}

impl Category {
    /// Ordem fixa usada em todos os desempates.
    pub const ALL: [Category; 2] = [Category::Female, Category::Male];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Female => "Female",
            Category::Male => "Male",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Arredonda para duas casas com empate para o par, como `round(x, 2)`.
pub(crate) fn round2(x: f64) -> f64 {
    (x * 100.0).round_ties_even() / 100.0
}

/// Uma linha da tabela canônica.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NameFrequencyEntry {
    pub name: String,
    pub category: Category,
    pub count: u64,
    pub total_count: u64,
    /// Presente apenas para entradas vindas de bases de confiança fixa.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_confidence: Option<f64>,
}

impl NameFrequencyEntry {
    pub fn counted(name: &str, category: Category, count: u64, total_count: u64) -> Self {
        Self {
            name: name.to_string(),
            category,
            count,
            total_count,
            fixed_confidence: None,
        }
    }

    pub fn fixed(name: &str, category: Category, count: u64, confidence: f64) -> Self {
        Self {
            name: name.to_string(),
            category,
            count,
            total_count: count,
            fixed_confidence: Some(confidence),
        }
    }

    /// `count / total` arredondado, ou a confiança fixa da fonte.
    pub fn confidence(&self) -> f64 {
        match self.fixed_confidence {
            Some(c) => c,
            None if self.total_count == 0 => 0.0,
            None => round2(self.count as f64 / self.total_count as f64),
        }
    }
}

/// Filtro de igualdade aplicado antes de ler uma linha.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowFilter {
    pub column: String,
    pub equals: String,
}

/// Esquema de uma base de nomes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSchema {
    pub label: String,
    pub name_column: String,
    pub category_column: String,
    #[serde(default)]
    pub count_column: Option<String>,
    pub category_labels: BTreeMap<String, Category>,
    #[serde(default)]
    pub filter: Option<RowFilter>,
    #[serde(default)]
    pub fixed_confidence: Option<f64>,
}

/// Conteúdo bruto de uma tabela, ainda no esquema de origem.
#[derive(Debug, Clone)]
pub struct RawFrequencySource {
    pub schema: SourceSchema,
    /// Arquivo de onde as linhas vieram (usado nas mensagens de erro).
    pub origin: PathBuf,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Contadores do que foi descartado durante a construção.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildReport {
    pub rows_read: usize,
    pub rows_filtered: usize,
    pub unmapped_category: usize,
    pub empty_name: usize,
    pub bad_count: usize,
    pub ambiguous_fixed_dropped: usize,
    pub zero_total_dropped: usize,
}

/// Snapshot imutável da tabela, indexado por nome.
#[derive(Debug, Clone, Default)]
pub struct FrequencyTable {
    entries: Vec<NameFrequencyEntry>,
    index: HashMap<String, Vec<usize>>,
}

impl FrequencyTable {
    pub fn from_entries(entries: Vec<NameFrequencyEntry>) -> Self {
        let mut index: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, entry) in entries.iter().enumerate() {
            index.entry(entry.name.clone()).or_default().push(i);
        }
        Self { entries, index }
    }

    /// Todas as entradas de um nome (busca exata).
    pub fn lookup<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a NameFrequencyEntry> + 'a {
        self.index
            .get(name)
            .into_iter()
            .flatten()
            .map(move |&i| &self.entries[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Nomes distintos em ordem alfabética.
    pub fn names(&self) -> BTreeSet<&str> {
        self.index.keys().map(String::as_str).collect()
    }

    pub fn entries(&self) -> &[NameFrequencyEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Reduz um nome ao primeiro token em title case.
pub fn canonical_name(raw: &str) -> Option<String> {
    raw.split_whitespace().next().map(title_case)
}

/// Title case: letra após não-letra vira maiúscula, as demais minúsculas.
pub fn title_case(word: &str) -> String {
    let mut out = String::with_capacity(word.len());
    let mut prev_letter = false;
    for c in word.chars() {
        if c.is_alphabetic() {
            if prev_letter {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_letter = true;
        } else {
            out.push(c);
            prev_letter = false;
        }
    }
    out
}

fn parse_count(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    if let Ok(n) = raw.parse::<u64>() {
        return Some(n);
    }
    // Algumas bases exportam contagens como "12.0"
    let value: f64 = raw.parse().ok()?;
    (value.is_finite() && value >= 0.0 && value.fract() == 0.0).then_some(value as u64)
}

struct Columns {
    name: usize,
    category: usize,
    count: Option<usize>,
    filter: Option<(usize, String)>,
}

fn resolve_columns(source: &RawFrequencySource) -> Result<Columns, DatasetError> {
    let find = |column: &str| {
        source
            .headers
            .iter()
            .position(|h| h.trim() == column)
            .ok_or_else(|| DatasetError::MissingColumn {
                column: column.to_string(),
                path: source.origin.clone(),
            })
    };

    let schema = &source.schema;
    Ok(Columns {
        name: find(&schema.name_column)?,
        category: find(&schema.category_column)?,
        count: schema.count_column.as_deref().map(find).transpose()?,
        filter: schema
            .filter
            .as_ref()
            .map(|f| find(&f.column).map(|i| (i, f.equals.clone())))
            .transpose()?,
    })
}

/// Constrói a tabela canônica a partir de todas as fontes.
///
/// Falha apenas se uma coluna declarada no esquema não existir; linhas ruins
/// são puladas e contadas no [`BuildReport`].
pub fn build(sources: &[RawFrequencySource]) -> Result<(FrequencyTable, BuildReport), DatasetError> {
    let mut report = BuildReport::default();
    let mut counted: BTreeMap<String, BTreeMap<Category, u64>> = BTreeMap::new();
    // nome → (categorias vistas, linhas, maior confiança fixa)
    let mut fixed: BTreeMap<String, (BTreeSet<Category>, u64, f64)> = BTreeMap::new();

    for source in sources {
        let columns = resolve_columns(source)?;
        let schema = &source.schema;
        let before = report.clone();

        for row in &source.rows {
            report.rows_read += 1;
            let cell = |i: usize| row.get(i).map(String::as_str).unwrap_or("");

            if let Some((col, expected)) = &columns.filter {
                if cell(*col).trim() != expected {
                    report.rows_filtered += 1;
                    continue;
                }
            }

            let Some(category) = schema.category_labels.get(cell(columns.category).trim()).copied()
            else {
                report.unmapped_category += 1;
                continue;
            };

            let Some(name) = canonical_name(cell(columns.name)) else {
                report.empty_name += 1;
                continue;
            };

            let count = match columns.count {
                Some(col) => match parse_count(cell(col)) {
                    Some(n) => n,
                    None => {
                        report.bad_count += 1;
                        continue;
                    }
                },
                None => 1,
            };

            match schema.fixed_confidence {
                Some(confidence) => {
                    let slot = fixed.entry(name).or_insert((BTreeSet::new(), 0, confidence));
                    slot.0.insert(category);
                    slot.1 += count;
                    slot.2 = slot.2.max(confidence);
                }
                None => {
                    *counted.entry(name).or_default().entry(category).or_insert(0) += count;
                }
            }
        }

        debug!(
            source = %schema.label,
            origin = %source.origin.display(),
            rows = report.rows_read - before.rows_read,
            "fonte lida"
        );
    }

    let mut entries = Vec::new();

    for (name, per_category) in counted {
        let total: u64 = per_category.values().sum();
        if total == 0 {
            report.zero_total_dropped += 1;
            continue;
        }
        for (category, count) in per_category {
            entries.push(NameFrequencyEntry::counted(&name, category, count, total));
        }
    }

    for (name, (categories, rows, confidence)) in fixed {
        if categories.len() > 1 {
            report.ambiguous_fixed_dropped += 1;
            continue;
        }
        if rows == 0 {
            report.zero_total_dropped += 1;
            continue;
        }
        if let Some(&category) = categories.first() {
            entries.push(NameFrequencyEntry::fixed(&name, category, rows, confidence));
        }
    }

    entries.sort_by(|a, b| {
        a.name
            .cmp(&b.name)
            .then(a.fixed_confidence.is_some().cmp(&b.fixed_confidence.is_some()))
            .then(a.category.cmp(&b.category))
    });

    let table = FrequencyTable::from_entries(entries);
    info!(
        entries = table.len(),
        names = table.index.len(),
        rows = report.rows_read,
        skipped = report.unmapped_category + report.empty_name + report.bad_count,
        "tabela de frequência construída"
    );

    Ok((table, report))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, Category)]) -> BTreeMap<String, Category> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn source(schema: SourceSchema, headers: &[&str], rows: &[&[&str]]) -> RawFrequencySource {
        RawFrequencySource {
            schema,
            origin: PathBuf::from("mem.csv"),
            headers: headers.iter().map(|s| s.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        }
    }

    fn american() -> SourceSchema {
        SourceSchema {
            label: "us".into(),
            name_column: "Name".into(),
            category_column: "Gender".into(),
            count_column: Some("Count".into()),
            category_labels: labels(&[("F", Category::Female), ("M", Category::Male)]),
            filter: None,
            fixed_confidence: None,
        }
    }

    fn canadian() -> SourceSchema {
        SourceSchema {
            label: "ca".into(),
            name_column: "First name at birth".into(),
            category_column: "Sex at birth".into(),
            count_column: Some("VALUE".into()),
            category_labels: labels(&[("Female", Category::Female), ("Male", Category::Male)]),
            filter: Some(RowFilter {
                column: "Indicator".into(),
                equals: "Frequency".into(),
            }),
            fixed_confidence: None,
        }
    }

    fn indian() -> SourceSchema {
        SourceSchema {
            label: "in".into(),
            name_column: "name".into(),
            category_column: "gender".into(),
            count_column: None,
            category_labels: labels(&[("f", Category::Female), ("m", Category::Male)]),
            filter: None,
            fixed_confidence: Some(0.85),
        }
    }

    fn assert_totals_partition(table: &FrequencyTable) {
        for name in table.names() {
            let counted: Vec<_> = table.lookup(name).filter(|e| e.fixed_confidence.is_none()).collect();
            let sum: u64 = counted.iter().map(|e| e.count).sum();
            for e in &counted {
                assert_eq!(e.total_count, sum, "{name}");
                assert!(e.total_count >= e.count);
            }
        }
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("MARY"), "Mary");
        assert_eq!(title_case("o'neil"), "O'Neil");
        assert_eq!(title_case("zu-hua"), "Zu-Hua");
        assert_eq!(canonical_name("  anna maria "), Some("Anna".to_string()));
        assert_eq!(canonical_name("   "), None);
    }

    #[test]
    fn test_single_source_sums_years() {
        let src = source(
            american(),
            &["Name", "Year", "Gender", "Count"],
            &[
                &["Sam", "1990", "F", "4000"],
                &["Sam", "1991", "F", "3000"],
                &["Sam", "1990", "M", "5000"],
                &["Ann", "1990", "F", "10"],
            ],
        );
        let (table, report) = build(&[src]).unwrap();

        let sam: Vec<_> = table.lookup("Sam").collect();
        assert_eq!(sam.len(), 2);
        assert_eq!(sam[0].category, Category::Female);
        assert_eq!(sam[0].count, 7000);
        assert_eq!(sam[0].total_count, 12000);
        assert_eq!(sam[0].confidence(), 0.58);
        assert_eq!(report.rows_read, 4);
        assert_totals_partition(&table);
    }

    #[test]
    fn test_merge_across_sources_and_filter() {
        let us = source(
            american(),
            &["Name", "Gender", "Count"],
            &[&["SAM", "F", "10"], &["Lee", "M", "3"]],
        );
        let ca = source(
            canadian(),
            &["First name at birth", "Sex at birth", "Indicator", "VALUE"],
            &[
                &["sam", "Male", "Frequency", "30"],
                &["sam", "Male", "Proportion", "99.5"],
                &["Lee", "Female", "Frequency", "1"],
                &["Lee", "Both", "Frequency", "7"],
            ],
        );
        let (table, report) = build(&[us, ca]).unwrap();

        let sam: Vec<_> = table.lookup("Sam").collect();
        assert_eq!(sam.iter().map(|e| e.count).collect::<Vec<_>>(), vec![10, 30]);
        assert!(sam.iter().all(|e| e.total_count == 40));
        assert_eq!(report.rows_filtered, 1);
        assert_eq!(report.unmapped_category, 1);
        assert_totals_partition(&table);
    }

    #[test]
    fn test_fixed_source_drops_ambiguous_names() {
        let female = source(indian(), &["name", "gender", "race"], &[&["priya devi", "f", "x"], &["jan", "f", "x"]]);
        let male = source(indian(), &["name", "gender", "race"], &[&["arjun", "m", "x"], &["jan", "m", "x"]]);
        let (table, report) = build(&[female, male]).unwrap();

        assert!(!table.contains("Jan"));
        assert_eq!(report.ambiguous_fixed_dropped, 1);
        let priya: Vec<_> = table.lookup("Priya").collect();
        assert_eq!(priya.len(), 1);
        assert_eq!(priya[0].confidence(), 0.85);
        assert_eq!(priya[0].category, Category::Female);
    }

    #[test]
    fn test_zero_totals_and_bad_counts() {
        let src = source(
            american(),
            &["Name", "Gender", "Count"],
            &[&["Zed", "F", "0"], &["Zed", "M", "0"], &["Bo", "M", "n/a"], &["Bo", "M", "2.0"], &["", "F", "1"]],
        );
        let (table, report) = build(&[src]).unwrap();
        assert!(!table.contains("Zed"));
        assert_eq!(report.zero_total_dropped, 1);
        assert_eq!(report.bad_count, 1);
        assert_eq!(report.empty_name, 1);
        assert_eq!(table.lookup("Bo").next().map(|e| e.count), Some(2));
    }

    #[test]
    fn test_missing_column_is_an_error() {
        let src = source(american(), &["Name", "Gender"], &[]);
        let err = build(&[src]).unwrap_err();
        assert!(matches!(err, DatasetError::MissingColumn { ref column, .. } if column == "Count"));
    }

    #[test]
    fn test_round2_ties_to_even() {
        assert_eq!(round2(7000.0 / 12000.0), 0.58);
        assert_eq!(round2(1.0), 1.0);
        assert_eq!(round2(0.125), 0.12);
    }
}
