//! # Documentos de Entrada
//!
//! A conversão de PDF em texto acontece fora deste crate. Aqui fica apenas a
//! interface do colaborador ([`DocumentTextExtractor`]), uma implementação
//! para texto puro e a detecção do ano fiscal a partir do nome do arquivo.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::DocumentError;

static FULL_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[^0-9])((?:19|20)[0-9]{2})(?:[^0-9]|$)").expect("regex de ano válida"));

static FISCAL_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)FY([0-9]{2})(?:[^0-9]|$)").expect("regex de ano fiscal válida"));

/// Converte os bytes de um documento em texto.
pub trait DocumentTextExtractor: Send + Sync {
    fn extract(&self, bytes: &[u8]) -> Result<String, DocumentError>;
}

/// Documentos que já são texto UTF-8.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

impl DocumentTextExtractor for PlainTextExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<String, DocumentError> {
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        Ok(String::from_utf8(bytes.to_vec())?)
    }
}

/// Ano de um nome de arquivo: `2023.txt`, `sofi_2019.txt` ou `FY23 UBC.txt`.
pub fn year_from_name(name: &str) -> Option<String> {
    if let Some(c) = FISCAL_YEAR.captures(name) {
        return Some(format!("20{}", &c[1]));
    }
    FULL_YEAR.captures(name).map(|c| c[1].to_string())
}
