//! # Normalizador de Texto
//!
//! O texto extraído dos relatórios (via OCR ou conversão de PDF) chega com
//! quebras de linha no meio de nomes, espaços duplicados entre colunas e
//! cabeçalhos de página. Antes de qualquer segmentação, o texto é reduzido a
//! uma única linha com palavras separadas por exatamente um espaço.
//!
//! ## Etapas
//!
//! 1. **Janela** ([`take_window`]): descarta o preâmbulo e as tabelas finais,
//!    mantendo apenas o trecho entre duas frases delimitadoras.
//! 2. **Normalização** ([`normalize`]): quebras de linha viram espaços, séries
//!    de espaços colapsam em um só e as bordas são aparadas.
//!
//! ## Exemplo de Uso
//!
//! ```rust
//! use salary_core::normalizer::normalize;
//!
//! let raw = "Smith, Jane  85,000\n   1,200  ";
//! assert_eq!(normalize(raw), "Smith, Jane 85,000 1,200");
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ExtractionError;

/// Par de frases que delimita a parte útil do documento.
///
/// Tudo antes de `start_phrase` (capa, sumário, notas) e tudo depois de
/// `end_phrase` (tabelas de fornecedores etc.) é descartado.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextWindow {
    pub start_phrase: String,
    pub end_phrase: String,
}

impl Default for TextWindow {
    fn default() -> Self {
        Self {
            start_phrase: "external cost recoveries.".to_string(),
            end_phrase: "Earnings greater than".to_string(),
        }
    }
}

/// Retorna o trecho após a primeira ocorrência de `start_phrase` e antes da
/// primeira ocorrência de `end_phrase` que vem depois dela.
///
/// A busca é feita no texto bruto, antes da normalização.
pub fn take_window<'a>(
    text: &'a str,
    window: &TextWindow,
    year: &str,
) -> Result<&'a str, ExtractionError> {
    let miss = |phrase: &str| ExtractionError::SegmentationMiss {
        year: year.to_string(),
        phrase: phrase.to_string(),
    };

    let start = text
        .find(&window.start_phrase)
        .map(|i| i + window.start_phrase.len())
        .ok_or_else(|| miss(&window.start_phrase))?;
    let rest = &text[start..];
    let end = rest.find(&window.end_phrase).ok_or_else(|| miss(&window.end_phrase))?;

    Ok(&rest[..end])
}

/// Colapsa quebras de linha e espaços repetidos em espaços simples.
///
/// Função total: nunca falha e pode retornar string vazia. A substituição de
/// `"  "` por `" "` é repetida até não restar nenhuma sequência de dois
/// espaços, pois uma única passada deixa sobras em séries ímpares.
pub fn normalize(text: &str) -> String {
    let mut out: String = text
        .chars()
        .map(|c| if matches!(c, '\n' | '\r') { ' ' } else { c })
        .collect();

    while out.contains("  ") {
        out = out.replace("  ", " ");
    }

    out.trim().to_string()
}
