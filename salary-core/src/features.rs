//! # Features de Nomes
//!
//! O classificador estatístico enxerga um nome apenas por atributos
//! determinísticos da forma minúscula: os sufixos de 1 a 5 caracteres e o
//! nome inteiro. Sufixos carregam boa parte do sinal de gênero em nomes
//! ocidentais (`-a`, `-ette`, `-son`).
//!
//! Os sufixos são contados em caracteres, não bytes, e nomes mais curtos que
//! o sufixo pedido devolvem o nome inteiro (`"bo"` → `last_5_letters = "bo"`).
//!
//! ## Exemplo de Uso
//!
//! ```rust
//! use salary_core::features::NameFeatures;
//!
//! let f = NameFeatures::extract("Emily");
//! assert_eq!(f.get("last_letter"), Some("y"));
//! assert_eq!(f.get("last_3_letters"), Some("ily"));
//! assert_eq!(f.get("name"), Some("emily"));
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Nome de cada feature e o tamanho do sufixo correspondente.
pub const SUFFIX_FEATURES: [(&str, usize); 5] = [
    ("last_letter", 1),
    ("last_two_letters", 2),
    ("last_3_letters", 3),
    ("last_4_letters", 4),
    ("last_5_letters", 5),
];

pub const NAME_FEATURE: &str = "name";

/// Conjunto de features `nome → valor` de um nome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameFeatures {
    pub features: BTreeMap<String, String>,
}

impl NameFeatures {
    pub fn extract(name: &str) -> Self {
        let lower = name.to_lowercase();
        let chars: Vec<char> = lower.chars().collect();

        let mut features = BTreeMap::new();
        for (feature, len) in SUFFIX_FEATURES {
            let from = chars.len().saturating_sub(len);
            features.insert(feature.to_string(), chars[from..].iter().collect());
        }
        features.insert(NAME_FEATURE.to_string(), lower);

        Self { features }
    }

    pub fn get(&self, feature: &str) -> Option<&str> {
        self.features.get(feature).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.features.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
