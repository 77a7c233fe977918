//! Title translation.
//!
//! [`Translator`] is the seam to the external translation service;
//! [`HttpTranslator`] talks to a Google Cloud Translation v2 compatible
//! endpoint. [`translate_title`] fans one Korean title out to every target
//! language and keeps whatever succeeded; [`translate_category`] does the
//! same for a category path.

use crate::models::{
    category::{CategoryPath, CategoryTranslations},
    language::{Language, Translations},
};
use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum TranslationError {
    #[error("translation request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("translation service returned {status}: {message}")]
    Service { status: u16, message: String },
    #[error("translation service returned no text")]
    EmptyResponse,
}

/// Translates Korean text into one target language.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, target: Language) -> Result<String, TranslationError>;
}

/// Translate `text` into each of `targets` concurrently.
///
/// Failed languages are logged and left out of the result; this never fails
/// as a whole. Blank input yields an empty map.
pub async fn translate_into(
    translator: &dyn Translator,
    text: &str,
    targets: &[Language],
) -> Translations {
    if text.trim().is_empty() {
        return Translations::new();
    }

    let results = join_all(targets.iter().map(|&lang| async move {
        (lang, translator.translate(text, lang).await)
    }))
    .await;

    let mut translations = Translations::new();
    for (lang, result) in results {
        match result {
            Ok(translated) => {
                debug!("translated '{}' -> '{}' ({})", text, translated, lang);
                translations.insert(lang, translated);
            }
            Err(err) => warn!("translation to {} failed for '{}': {}", lang, text, err),
        }
    }
    translations
}

/// Translate a title into every target language.
pub async fn translate_title(translator: &dyn Translator, title: &str) -> Translations {
    let targets: Vec<Language> = Language::targets().collect();
    translate_into(translator, title, &targets).await
}

/// Translate the three category names into every target language.
///
/// A language is kept only when all three names translated, so a path is
/// never shown half in Korean.
pub async fn translate_category(
    translator: &dyn Translator,
    category: &CategoryPath,
) -> CategoryTranslations {
    let (mut mains, mut subs, mut leaves) = futures::join!(
        translate_title(translator, &category.main_category),
        translate_title(translator, &category.sub_category),
        translate_title(translator, &category.leaf_category),
    );

    Language::targets()
        .filter_map(|lang| {
            let path = CategoryPath {
                main_category: mains.remove(&lang)?,
                sub_category: subs.remove(&lang)?,
                leaf_category: leaves.remove(&lang)?,
            };
            Some((lang, path))
        })
        .collect()
}

#[derive(Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'a str,
}

#[derive(Deserialize)]
struct TranslateResponse {
    data: TranslateData,
}

#[derive(Deserialize)]
struct TranslateData {
    translations: Vec<TranslatedText>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranslatedText {
    translated_text: String,
}

/// Client for `POST {endpoint}/language/translate/v2`.
pub struct HttpTranslator {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpTranslator {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Result<Self, TranslationError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Language code as the service expects it.
    fn service_code(lang: Language) -> &'static str {
        match lang {
            Language::Chinese => "zh-CN",
            other => other.code(),
        }
    }
}

#[async_trait]
impl Translator for HttpTranslator {
    async fn translate(&self, text: &str, target: Language) -> Result<String, TranslationError> {
        if target == Language::SOURCE {
            return Ok(text.to_string());
        }

        let mut request = self
            .client
            .post(format!("{}/language/translate/v2", self.endpoint))
            .json(&TranslateRequest {
                q: text,
                source: Language::SOURCE.code(),
                target: Self::service_code(target),
                format: "text",
            });
        if let Some(key) = &self.api_key {
            request = request.query(&[("key", key)]);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(TranslationError::Service {
                status: status.as_u16(),
                message,
            });
        }

        let body: TranslateResponse = response.json().await?;
        body.data
            .translations
            .into_iter()
            .next()
            .map(|t| t.translated_text)
            .filter(|t| !t.trim().is_empty())
            .ok_or(TranslationError::EmptyResponse)
    }
}
