//! # Segmentador de Registros
//!
//! O texto normalizado não tem delimitadores explícitos entre pessoas. A
//! fronteira de cada registro é inferida pelo padrão estrutural recorrente:
//!
//! ```text
//! <nome: palavras com letras, pontos, apóstrofos, hífens, vírgulas> <número> <número>
//! Smith, Jane                                                       85,000   1,200
//! ```
//!
//! Um número é uma sequência de dígitos e vírgulas, opcionalmente entre
//! parênteses, ou um hífen isolado (zero/negativo).
//!
//! ## Algoritmo
//!
//! 1. **Cabeçalhos**: cada ocorrência de um marcador (ex: `SCHEDULE`) é
//!    expandida para a sequência de palavras em caixa alta ao redor
//!    (`SCHEDULE OF REMUNERATION AND EXPENSES`) e recortada como fragmento
//!    próprio, para não ser colada ao próximo registro.
//! 2. **Casamento**: todas as ocorrências não sobrepostas do padrão são
//!    encontradas (`find_iter`). O texto entre ocorrências é mantido como
//!    fragmento "lacuna", então nada some silenciosamente.
//! 3. **Classificação**: cada fragmento vira [`FragmentKind`]. Somente
//!    `Candidate` segue para o parser.
//!
//! A guarda mais importante é a de dígitos no nome: dígitos nunca aparecem em
//! nomes pessoais deste domínio, então `Doe, John1 60,000 500` indica colunas
//! fundidas pelo OCR e vai para o balde de registros não parseáveis.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Padrão de um registro: nome seguido de dois campos numéricos.
///
/// Cada palavra do nome precisa de pelo menos uma letra, senão um `-`
/// (despesa zerada) poderia ser engolido como parte do nome seguinte.
/// Apóstrofos tipográficos (`’`, `‘`) valem como `'`.
static RECORD_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    let word = r"[\p{L}.,'’‘\-]*\p{L}[\p{L}.,'’‘\-]*";
    let number = r"(?:\(?[0-9][0-9,]*\)?|-)";
    Regex::new(&format!(r"{word}(?:\s+{word})*\s+{number}\s+{number}"))
        .expect("padrão de registro válido")
});

static NUMERIC_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\(?[0-9][0-9,]*\)?|-)$").expect("padrão numérico válido")
});

/// Classificação de um fragmento do texto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FragmentKind {
    /// Casou o padrão e passou nos filtros: segue para o parser.
    Candidate,
    /// Contém um marcador de cabeçalho/rodapé. Descartado.
    Header,
    /// Não contém vírgula (não parece "Sobrenome, Nome"). Descartado.
    NoComma,
    /// O trecho do nome contém um dígito. Registro não parseável.
    DigitInName,
    /// Lacuna com vírgula que não casa o padrão. Registro não parseável.
    Unmatched,
}

impl FragmentKind {
    /// Fragmentos que provavelmente eram uma pessoa mas não puderam ser lidos.
    pub fn is_unparseable(&self) -> bool {
        matches!(self, FragmentKind::DigitInName | FragmentKind::Unmatched)
    }
}

/// Um pedaço do texto normalizado e a decisão tomada sobre ele.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    pub text: String,
    pub kind: FragmentKind,
}

/// Segmentador configurado com os marcadores de texto não-registro.
#[derive(Debug, Clone)]
pub struct Segmenter {
    markers: Vec<String>,
}

impl Segmenter {
    pub fn new(markers: Vec<String>) -> Self {
        let markers = markers.into_iter().filter(|m| !m.is_empty()).collect();
        Self { markers }
    }

    /// Retorna apenas os segmentos aceitos, em ordem de aparição.
    pub fn segment(&self, text: &str) -> Vec<String> {
        self.split(text)
            .into_iter()
            .filter(|f| f.kind == FragmentKind::Candidate)
            .map(|f| f.text)
            .collect()
    }

    /// Divide o texto normalizado em fragmentos classificados.
    pub fn split(&self, text: &str) -> Vec<Fragment> {
        let mut fragments = Vec::new();

        for (piece, is_header) in self.isolate_headers(text) {
            if is_header {
                fragments.push(Fragment {
                    text: piece.to_string(),
                    kind: FragmentKind::Header,
                });
                continue;
            }

            for raw in match_with_gaps(piece) {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    continue;
                }
                fragments.push(Fragment {
                    text: trimmed.to_string(),
                    kind: self.classify(trimmed, raw.matched),
                });
            }
        }

        fragments
    }

    fn classify(&self, text: &str, matched: bool) -> FragmentKind {
        if self.markers.iter().any(|m| text.contains(m.as_str())) {
            FragmentKind::Header
        } else if !text.contains(',') {
            FragmentKind::NoComma
        } else if name_span(text).chars().any(|c| c.is_ascii_digit()) {
            FragmentKind::DigitInName
        } else if matched {
            FragmentKind::Candidate
        } else {
            FragmentKind::Unmatched
        }
    }

    /// Recorta os cabeçalhos do texto. Retorna `(trecho, é_cabeçalho)`.
    fn isolate_headers<'a>(&self, text: &'a str) -> Vec<(&'a str, bool)> {
        let spans = token_spans(text);
        if spans.is_empty() {
            return Vec::new();
        }

        let mut header = vec![false; spans.len()];
        for marker in &self.markers {
            for (at, _) in text.match_indices(marker.as_str()) {
                let end = at + marker.len();
                for (i, &(s, e)) in spans.iter().enumerate() {
                    if s < end && at < e {
                        header[i] = true;
                    }
                }
            }
        }

        // Expande sobre palavras vizinhas em caixa alta
        for i in 1..spans.len() {
            if header[i - 1] && is_header_word(span_text(text, spans[i])) {
                header[i] = true;
            }
        }
        for i in (0..spans.len() - 1).rev() {
            if header[i + 1] && is_header_word(span_text(text, spans[i])) {
                header[i] = true;
            }
        }

        let mut pieces = Vec::new();
        let mut run_start = 0;
        for i in 1..=spans.len() {
            if i == spans.len() || header[i] != header[run_start] {
                let from = spans[run_start].0;
                let to = spans[i - 1].1;
                pieces.push((&text[from..to], header[run_start]));
                run_start = i;
            }
        }
        pieces
    }
}

impl Default for Segmenter {
    fn default() -> Self {
        Self::new(vec!["SCHEDULE".to_string()])
    }
}

struct RawFragment<'a> {
    text: &'a str,
    matched: bool,
}

impl std::ops::Deref for RawFragment<'_> {
    type Target = str;

    fn deref(&self) -> &str {
        self.text
    }
}

/// Aplica o padrão e devolve ocorrências e lacunas intercaladas.
///
/// Uma ocorrência que começa no meio de uma palavra (`Jo1hn` → `hn ...`)
/// absorve a lacuna anterior: o registro inteiro vira um só fragmento e a
/// guarda de dígitos o rejeita.
fn match_with_gaps(text: &str) -> Vec<RawFragment<'_>> {
    let mut out = Vec::new();
    let mut cursor = 0;

    for m in RECORD_PATTERN.find_iter(text) {
        let glued = m.start() > cursor
            && text[..m.start()]
                .chars()
                .next_back()
                .is_some_and(|c| !c.is_whitespace());

        if glued {
            out.push(RawFragment {
                text: &text[cursor..m.end()],
                matched: false,
            });
        } else {
            if m.start() > cursor {
                out.push(RawFragment {
                    text: &text[cursor..m.start()],
                    matched: false,
                });
            }
            out.push(RawFragment {
                text: m.as_str(),
                matched: true,
            });
        }
        cursor = m.end();
    }

    if cursor < text.len() {
        out.push(RawFragment {
            text: &text[cursor..],
            matched: false,
        });
    }
    out
}

/// Trecho do nome: tudo à esquerda dos (até dois) tokens numéricos finais.
pub(crate) fn name_span(fragment: &str) -> String {
    let mut tokens: Vec<&str> = fragment.split_whitespace().collect();
    for _ in 0..2 {
        match tokens.last() {
            Some(t) if tokens.len() > 1 && NUMERIC_TOKEN.is_match(t) => {
                tokens.pop();
            }
            _ => break,
        }
    }
    tokens.join(" ")
}

fn token_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = None;
    for (i, c) in text.char_indices() {
        match (c.is_whitespace(), start) {
            (true, Some(s)) => {
                spans.push((s, i));
                start = None;
            }
            (false, None) => start = Some(i),
            _ => {}
        }
    }
    if let Some(s) = start {
        spans.push((s, text.len()));
    }
    spans
}

fn span_text(text: &str, (s, e): (usize, usize)) -> &str {
    &text[s..e]
}

/// Palavra típica de cabeçalho: letras maiúsculas, sem dígitos nem vírgula.
fn is_header_word(word: &str) -> bool {
    word.chars().any(char::is_alphabetic)
        && !word.chars().any(|c| c.is_lowercase() || c.is_ascii_digit() || c == ',')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::normalize;

    fn kinds(fragments: &[Fragment]) -> Vec<(&str, FragmentKind)> {
        fragments.iter().map(|f| (f.text.as_str(), f.kind)).collect()
    }

    #[test]
    fn test_segment_spec_scenario() {
        let text = normalize(
            " \nSmith, Jane  85,000   1,200  \nSCHEDULE OF REMUNERATION \nDoe, John1  60,000   500 \n",
        );
        let fragments = Segmenter::default().split(&text);

        assert_eq!(
            kinds(&fragments),
            vec![
                ("Smith, Jane 85,000 1,200", FragmentKind::Candidate),
                ("SCHEDULE OF REMUNERATION", FragmentKind::Header),
                ("Doe, John1 60,000 500", FragmentKind::DigitInName),
            ]
        );
    }

    #[test]
    fn test_multiword_names_and_line_breaks() {
        let text = normalize("Van der\nBerg, Mary Ann 101,500 3,200 O'Neil, Pat-Lee 90,000 -");
        let segments = Segmenter::default().segment(&text);
        assert_eq!(
            segments,
            vec!["Van der Berg, Mary Ann 101,500 3,200", "O'Neil, Pat-Lee 90,000 -"]
        );
    }

    #[test]
    fn test_hyphen_amount_does_not_merge_records() {
        let text = "Lee, Ann - - Kim, Bo 75,000 (120)";
        let segments = Segmenter::default().segment(text);
        assert_eq!(segments, vec!["Lee, Ann - -", "Kim, Bo 75,000 (120)"]);
    }

    #[test]
    fn test_digit_inside_word_is_not_split_off() {
        let text = "Abe, Al 1 2 Doe, Jo1hn 60,000 500";
        let fragments = Segmenter::default().split(text);
        assert_eq!(
            kinds(&fragments),
            vec![
                ("Abe, Al 1 2", FragmentKind::Candidate),
                ("Doe, Jo1hn 60,000 500", FragmentKind::DigitInName),
            ]
        );
    }

    #[test]
    fn test_header_run_is_isolated() {
        let text = "Abe, Al 1,000 2 UBC SCHEDULE OF REMUNERATION AND EXPENSES Page Zhu, Li 3,000 4";
        let fragments = Segmenter::default().split(text);
        assert_eq!(fragments[1].text, "UBC SCHEDULE OF REMUNERATION AND EXPENSES");
        assert_eq!(fragments[1].kind, FragmentKind::Header);
        // "Page" tem minúsculas, então não pertence ao cabeçalho; o registro
        // seguinte casa como "Page Zhu, Li" e o parser decide o resto.
        assert_eq!(fragments[2].kind, FragmentKind::Candidate);
    }

    #[test]
    fn test_no_comma_fragment_is_discarded() {
        let fragments = Segmenter::default().split("Total 1 2");
        assert_eq!(fragments[0].kind, FragmentKind::NoComma);
        assert!(Segmenter::default().segment("Total 1 2").is_empty());
    }

    #[test]
    fn test_candidates_never_carry_digits_in_name() {
        let text = normalize(
            "A, B 1 2 C3, D 4 5 E, F 6,000 7 G, H 8 9 footnote, see 10 Ii, Jj 11 12",
        );
        for segment in Segmenter::default().segment(&text) {
            assert!(!name_span(&segment).chars().any(|c| c.is_ascii_digit()), "{segment}");
        }
    }

    #[test]
    fn test_typographic_apostrophe_in_name() {
        let text = "O\u{2019}Neil, Pat 90,000 1,000 D\u{2018}Arcy, Lu 1 2 Lee, Bo 1 2";
        let segments = Segmenter::default().segment(text);
        assert_eq!(
            segments,
            vec!["O\u{2019}Neil, Pat 90,000 1,000", "D\u{2018}Arcy, Lu 1 2", "Lee, Bo 1 2"]
        );
    }

    #[test]
    fn test_every_candidate_parses() {
        let text = normalize(
            "Smith, Jane\t85,000\t1,200 Ng,\u{a0}Al\u{a0}1\u{a0}2 O\u{2019}Neil, Pat 90,000 - \
             Van der Berg, Mary Ann 101,500 3,200 Doe, John1 60,000 500 Lee, Ann - - \
             SCHEDULE OF REMUNERATION Kim, Bo 75,000 (120) Cher 10 20",
        );
        let candidates: Vec<Fragment> = Segmenter::default()
            .split(&text)
            .into_iter()
            .filter(|f| f.kind == FragmentKind::Candidate)
            .collect();
        assert_eq!(candidates.len(), 6);
        for fragment in candidates {
            assert!(
                crate::record::parse_segment(&fragment.text, "2023").is_ok(),
                "{:?}",
                fragment.text
            );
        }
    }

    #[test]
    fn test_name_span() {
        assert_eq!(name_span("Smith, Jane 85,000 1,200"), "Smith, Jane");
        assert_eq!(name_span("Doe, John1 60,000"), "Doe, John1");
        assert_eq!(name_span("-"), "-");
    }
}
