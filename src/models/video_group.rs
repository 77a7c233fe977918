//! Represents one uploaded group: a video plus its metadata and translations.

use super::{
    category::{CategoryPath, CategoryTranslations},
    language::{Language, Translations},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A catalogued video group.
///
/// `translations` always holds the Korean title under [`Language::Korean`];
/// the other languages appear once translated.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct VideoGroup {
    /// Generated identifier (hex UUID), never reused.
    pub group_id: String,

    /// Korean title as submitted.
    pub group_name: String,

    /// Title per language.
    pub translations: Translations,

    /// Korean category path as submitted.
    pub category: CategoryPath,

    /// Category names translated at upload time.
    pub category_translations: CategoryTranslations,

    /// Free-text difficulty level.
    pub level: String,

    pub tag: Option<String>,

    /// Object key of the uploaded video.
    pub video_key: String,

    pub thumbnail_key: Option<String>,

    /// Object key of the QR PNG.
    pub qr_key: String,

    /// Watch URL encoded in the QR image.
    pub qr_link: String,

    /// Video length, filled by the upload probe or later by the poller.
    pub duration_seconds: Option<i64>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VideoGroup {
    /// Languages that still lack a title.
    pub fn missing_languages(&self) -> Vec<Language> {
        Language::targets()
            .filter(|lang| !self.translations.contains_key(lang))
            .collect()
    }

    pub fn is_translation_complete(&self) -> bool {
        self.missing_languages().is_empty()
    }

    /// Merge newly translated titles. The Korean entry always mirrors
    /// `group_name` and is never overwritten by a translation.
    pub fn merge_translations(&mut self, translated: Translations) {
        for (lang, text) in translated {
            if lang != Language::SOURCE {
                self.translations.insert(lang, text);
            }
        }
        self.translations
            .insert(Language::SOURCE, self.group_name.clone());
    }

    /// Title to show for `requested`, and the language it is actually in.
    /// Untranslated languages fall back to Korean.
    pub fn display_title(&self, requested: Language) -> (Language, &str) {
        match self.translations.get(&requested) {
            Some(title) => (requested, title.as_str()),
            None => (Language::SOURCE, self.group_name.as_str()),
        }
    }

    /// Category path to show for `lang`, falling back to Korean.
    pub fn display_category(&self, lang: Language) -> &CategoryPath {
        self.category_translations
            .get(&lang)
            .unwrap_or(&self.category)
    }

    /// Duration formatted as `m:ss`; `0:00` when unknown.
    pub fn time_label(&self) -> String {
        format_duration(self.duration_seconds.unwrap_or(0))
    }
}

/// Seed a translations map with the Korean title plus whatever translated.
pub fn seed_translations(group_name: &str, translated: Translations) -> Translations {
    let mut translations: Translations = translated
        .into_iter()
        .filter(|(lang, _)| *lang != Language::SOURCE)
        .collect();
    translations.insert(Language::SOURCE, group_name.to_string());
    translations
}

pub fn format_duration(total_seconds: i64) -> String {
    let total = total_seconds.max(0);
    format!("{}:{:02}", total / 60, total % 60)
}
