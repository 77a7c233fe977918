//! Languages a group title can be displayed in.

use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, str::FromStr};

/// A supported display language. Korean is the source language of every
/// title; the other six are translation targets.
///
/// Variant order is the order languages are listed in menus and maps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "ko")]
    Korean,
    #[serde(rename = "en")]
    English,
    #[serde(rename = "zh-cn")]
    Chinese,
    #[serde(rename = "vi")]
    Vietnamese,
    #[serde(rename = "th")]
    Thai,
    #[serde(rename = "uz")]
    Uzbek,
    #[serde(rename = "ja")]
    Japanese,
}

/// Title text keyed by language.
pub type Translations = BTreeMap<Language, String>;

impl Language {
    pub const ALL: [Language; 7] = [
        Language::Korean,
        Language::English,
        Language::Chinese,
        Language::Vietnamese,
        Language::Thai,
        Language::Uzbek,
        Language::Japanese,
    ];

    /// The language titles are entered in.
    pub const SOURCE: Language = Language::Korean;

    /// Every language except the source.
    pub fn targets() -> impl Iterator<Item = Language> {
        Self::ALL.into_iter().filter(|lang| *lang != Self::SOURCE)
    }

    pub fn code(&self) -> &'static str {
        match self {
            Language::Korean => "ko",
            Language::English => "en",
            Language::Chinese => "zh-cn",
            Language::Vietnamese => "vi",
            Language::Thai => "th",
            Language::Uzbek => "uz",
            Language::Japanese => "ja",
        }
    }

    /// Name of the language written in that language.
    pub fn display_name(&self) -> &'static str {
        match self {
            Language::Korean => "한국어",
            Language::English => "English",
            Language::Chinese => "中文",
            Language::Vietnamese => "Tiếng Việt",
            Language::Thai => "ไทย",
            Language::Uzbek => "O'zbek",
            Language::Japanese => "日本語",
        }
    }

    /// Parse an optional `?lang=` value, falling back to the source language
    /// when it is absent or unsupported.
    pub fn resolve(code: Option<&str>) -> Language {
        code.and_then(|c| c.parse().ok()).unwrap_or(Self::SOURCE)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct UnsupportedLanguage(pub String);

impl fmt::Display for UnsupportedLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unsupported language `{}`", self.0)
    }
}

impl std::error::Error for UnsupportedLanguage {}

impl FromStr for Language {
    type Err = UnsupportedLanguage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|lang| lang.code() == normalized)
            .ok_or_else(|| UnsupportedLanguage(s.to_string()))
    }
}
