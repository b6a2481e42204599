//! # Registros de Remuneração
//!
//! Converte um segmento aceito pelo [`Segmenter`](crate::segmenter::Segmenter)
//! em um [`PersonSalaryRecord`]. A divisão é ancorada à direita: os dois
//! últimos tokens são sempre remuneração e despesas, e todo o resto é o nome.
//!
//! ## Regras do nome
//!
//! | Forma do nome        | Resultado                                   |
//! |----------------------|---------------------------------------------|
//! | `Smith, Jane`        | sobrenome `Smith`, nome `Jane`              |
//! | `Jane Smith`         | nome `Jane`, sobrenome `Smith`              |
//! | `Cher`               | nome `Cher`, sobrenome vazio                |
//! | contém dígito        | rejeitado ([`SkipReason::DigitInName`])     |
//!
//! Nomes compostos de várias palavras sem vírgula são divididos apenas no
//! primeiro espaço (`Mary Ann Smith` → `Mary` / `Ann Smith`). Sobrenomes
//! hifenizados são preservados, mas nomes com hífen quebrados pelo OCR em
//! duas linhas não são reconstituídos.
//!
//! ## Exemplo de Uso
//!
//! ```rust
//! use salary_core::record::parse_segment;
//!
//! let record = parse_segment("Smith, Jane 85,000 1,200", "2023").unwrap();
//! assert_eq!(record.first_name, "Jane");
//! assert_eq!(record.compensation, Some(85000.0));
//! ```

use serde::{Deserialize, Serialize};

/// Um funcionário e seus valores em um ano fiscal.
///
/// `compensation`/`expenses` ficam `None` quando o valor não é um decimal
/// não-negativo (ex: `-`, `(120)`, lixo de OCR).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonSalaryRecord {
    pub last_name: String,
    pub first_name: String,
    pub compensation: Option<f64>,
    pub expenses: Option<f64>,
    pub year: String,
}

impl PersonSalaryRecord {
    /// Chave usada pelos overrides manuais e pela junção de previsões.
    pub fn key(&self) -> (&str, &str) {
        (&self.first_name, &self.last_name)
    }
}

/// Motivo pelo qual um segmento não virou registro.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Menos de três tokens: não há nome mais dois números.
    MalformedSplit,
    /// O trecho do nome contém dígito.
    DigitInName,
    /// Nome vazio ou `-` depois da divisão.
    EmptyFirstName,
}

/// Segmento descartado pelo parser, mantido para o relatório.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedRecord {
    pub segment: String,
    pub reason: SkipReason,
}

/// Resultado de parsear um segmento, com contagem de valores ilegíveis.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSegment {
    pub record: PersonSalaryRecord,
    /// Quantos dos dois campos numéricos não puderam ser convertidos.
    pub coercion_failures: usize,
}

/// Parseia um segmento, devolvendo apenas o registro.
pub fn parse_segment(segment: &str, year: &str) -> Result<PersonSalaryRecord, SkippedRecord> {
    parse_segment_detailed(segment, year).map(|p| p.record)
}

/// Parseia um segmento e informa quantos campos numéricos falharam.
pub fn parse_segment_detailed(segment: &str, year: &str) -> Result<ParsedSegment, SkippedRecord> {
    let skip = |reason| SkippedRecord {
        segment: segment.to_string(),
        reason,
    };

    // Tab e espaço não separável também separam campos, como no segmentador
    let collapsed = segment.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut parts = collapsed.rsplitn(3, ' ');
    let (Some(expenses), Some(compensation), Some(name)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(skip(SkipReason::MalformedSplit));
    };

    let (first_name, last_name) = split_name(name.trim()).map_err(skip)?;
    if first_name.is_empty() || first_name == "-" {
        return Err(skip(SkipReason::EmptyFirstName));
    }

    let compensation = parse_amount(compensation);
    let expenses = parse_amount(expenses);
    let coercion_failures = [compensation, expenses].iter().filter(|v| v.is_none()).count();

    Ok(ParsedSegment {
        record: PersonSalaryRecord {
            last_name: last_name.to_string(),
            first_name: first_name.to_string(),
            compensation,
            expenses,
            year: year.to_string(),
        },
        coercion_failures,
    })
}

/// Divide o trecho do nome em `(nome, sobrenome)`.
fn split_name(name: &str) -> Result<(&str, &str), SkipReason> {
    if name.contains(',') {
        // "Sobrenome, Nome"; sem ", " o nome fica vazio e o registro é pulado
        return Ok(match name.split_once(", ") {
            Some((last, first)) => (first.trim(), last.trim()),
            None => ("", name),
        });
    }

    if name.chars().any(|c| c.is_ascii_digit()) {
        return Err(SkipReason::DigitInName);
    }

    Ok(match name.split_once(' ') {
        Some((first, last)) => (first, last.trim()),
        None => (name, ""),
    })
}

/// Converte um valor monetário em decimal não-negativo.
///
/// Vírgulas de milhar são removidas. Parênteses (negativo contábil), hífen
/// isolado e qualquer texto não numérico resultam em `None`.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let cleaned: String = raw.chars().filter(|&c| c != ',').collect();
    if cleaned.is_empty() || cleaned.starts_with('(') || cleaned == "-" {
        return None;
    }
    let value: f64 = cleaned.parse().ok()?;
    (value.is_finite() && value >= 0.0).then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_last_first() {
        let r = parse_segment("Smith, Jane 85,000 1,200", "2023").unwrap();
        assert_eq!(r.last_name, "Smith");
        assert_eq!(r.first_name, "Jane");
        assert_eq!(r.compensation, Some(85000.0));
        assert_eq!(r.expenses, Some(1200.0));
        assert_eq!(r.year, "2023");
    }

    #[test]
    fn test_parse_multiword_names() {
        let r = parse_segment("Van der Berg, Mary Ann 101,500 3,200", "2019").unwrap();
        assert_eq!(r.key(), ("Mary Ann", "Van der Berg"));

        let r = parse_segment("Mary Ann Smith 10 20", "2019").unwrap();
        assert_eq!(r.key(), ("Mary", "Ann Smith"));

        let r = parse_segment("Cher 10 20", "2019").unwrap();
        assert_eq!(r.key(), ("Cher", ""));
    }

    #[test]
    fn test_parse_preserves_hyphenated_names() {
        let r = parse_segment("Gao, Zu-Hua 90,000 -", "2021").unwrap();
        assert_eq!(r.first_name, "Zu-Hua");
        assert_eq!(r.expenses, None);
    }

    #[test]
    fn test_parse_rejections() {
        let err = parse_segment("Smith 85,000", "2023").unwrap_err();
        assert_eq!(err.reason, SkipReason::MalformedSplit);

        let err = parse_segment("John1 Doe 60,000 500", "2023").unwrap_err();
        assert_eq!(err.reason, SkipReason::DigitInName);

        let err = parse_segment("Smith,Jane 1 2", "2023").unwrap_err();
        assert_eq!(err.reason, SkipReason::EmptyFirstName);

        let err = parse_segment("Smith, - 1 2", "2023").unwrap_err();
        assert_eq!(err.reason, SkipReason::EmptyFirstName);
    }

    #[test]
    fn test_parse_splits_on_any_whitespace() {
        for segment in ["Smith, Jane\t85,000\t1,200", "Smith,\u{a0}Jane\u{a0}85,000\u{a0}1,200"] {
            let r = parse_segment(segment, "2023").unwrap();
            assert_eq!(r.key(), ("Jane", "Smith"), "{segment:?}");
            assert_eq!(r.compensation, Some(85000.0));
            assert_eq!(r.expenses, Some(1200.0));
        }
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("1,234,567"), Some(1234567.0));
        assert_eq!(parse_amount("12.50"), Some(12.5));
        assert_eq!(parse_amount("0"), Some(0.0));
        assert_eq!(parse_amount("-"), None);
        assert_eq!(parse_amount("(120)"), None);
        assert_eq!(parse_amount("-5"), None);
        assert_eq!(parse_amount("abc"), None);
        assert_eq!(parse_amount("inf"), None);
    }

    #[test]
    fn test_coercion_failures_are_counted() {
        let parsed = parse_segment_detailed("Lee, Ann - (5)", "2020").unwrap();
        assert_eq!(parsed.coercion_failures, 2);
        assert_eq!(parsed.record.first_name, "Ann");
    }
}
