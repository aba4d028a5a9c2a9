use serde::{Deserialize, Serialize};
use std::fmt;

/// Fixed article categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Shows,
    #[serde(rename = "Lançamentos")]
    Releases,
    #[serde(rename = "Listas")]
    Lists,
    #[serde(rename = "Outros")]
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Shows => "Shows",
            Self::Releases => "Lançamentos",
            Self::Lists => "Listas",
            Self::Other => "Outros",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Evaluated top to bottom; the first rule with a hit wins.
const RULES: &[(Category, &[&str])] = &[
    (
        Category::Shows,
        &["show", "tour", "turnê", "turne", "apresentação", "festival", "concert", "concerto"],
    ),
    (
        Category::Releases,
        &["álbum", "album", "disco", "single", "faixa", "lançamento", "lança", "release"],
    ),
    (Category::Lists, &["lista", "top", "ranking", "os melhores", "the best"]),
];

/// Maps an article to a category by keyword match over its lower-cased title and summary.
pub fn classify(title: &str, summary: &str) -> Category {
    let text = format!("{} {}", title, summary).to_lowercase();
    RULES
        .iter()
        .find(|(_, words)| words.iter().any(|w| text.contains(w)))
        .map(|(category, _)| *category)
        .unwrap_or(Category::Other)
}
