//! Upload, watch and catalog workflows.
//!
//! Upload: validate → probe → store video/thumbnail → translate title and
//! category → render & store QR → write the group record → confirmation payload.
//! Watch: load record → presign object links → pick display language.
//!
//! Objects written before a later step fails are left in place; the record
//! is written last, so a failed upload never produces a half-filled group.

use crate::{
    models::{
        category::CategoryPath,
        language::{Language, Translations},
        video_group::{VideoGroup, seed_translations},
    },
    services::{
        catalog::{CatalogError, GroupFilter},
        object_store::{StagedFile, StorageError},
        qr::{self, QrError},
        translation::{translate_category, translate_title},
    },
    state::AppState,
};
use bytes::Bytes;
use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

pub const ALLOWED_VIDEO_EXTENSIONS: [&str; 10] = [
    ".mp4", ".avi", ".mov", ".wmv", ".flv", ".mkv", ".webm", ".m4v", ".mpg", ".mpeg",
];

pub const ALLOWED_IMAGE_EXTENSIONS: [&str; 5] = [".jpg", ".jpeg", ".png", ".gif", ".webp"];

/// Content type an object is served with, from its validated extension.
/// The type the client declared for the part is never used.
pub fn content_type_for(ext: &str) -> &'static str {
    match ext {
        ".mp4" => "video/mp4",
        ".avi" => "video/x-msvideo",
        ".mov" => "video/quicktime",
        ".wmv" => "video/x-ms-wmv",
        ".flv" => "video/x-flv",
        ".mkv" => "video/x-matroska",
        ".webm" => "video/webm",
        ".m4v" => "video/x-m4v",
        ".mpg" | ".mpeg" => "video/mpeg",
        ".jpg" | ".jpeg" => "image/jpeg",
        ".png" => "image/png",
        ".gif" => "image/gif",
        ".webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("{0}")]
    Validation(String),
    #[error("group `{0}` not found")]
    NotFound(String),
    #[error("group `{0}` has no thumbnail")]
    NoThumbnail(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Qr(#[from] QrError),
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// Raw form submission. File parts are already staged.
#[derive(Debug, Default)]
pub struct UploadSubmission {
    pub group_name: Option<String>,
    pub main_category: Option<String>,
    pub sub_category: Option<String>,
    pub leaf_category: Option<String>,
    pub level: Option<String>,
    pub tag: Option<String>,
    pub video: Option<StagedFile>,
    pub thumbnail: Option<StagedFile>,
}

/// A submission that passed validation.
struct ValidUpload {
    group_name: String,
    category: CategoryPath,
    level: String,
    tag: Option<String>,
    video: StagedFile,
    video_ext: String,
    thumbnail: Option<(StagedFile, String)>,
}

impl UploadSubmission {
    fn validate(self) -> WorkflowResult<ValidUpload> {
        let group_name = required(self.group_name, "group_name")?;
        let category = CategoryPath {
            main_category: required(self.main_category, "main_category")?,
            sub_category: required(self.sub_category, "sub_category")?,
            leaf_category: required(self.leaf_category, "sub_sub_category")?,
        };
        let level = required(self.level, "level")?;
        let tag = self
            .tag
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        let video = self
            .video
            .filter(|f| !f.is_empty())
            .ok_or_else(|| WorkflowError::Validation("a video file is required".into()))?;
        let video_ext = allowed_extension(&video, &ALLOWED_VIDEO_EXTENSIONS, "video")?;

        // Browsers send an empty part when no thumbnail was chosen.
        let thumbnail = match self.thumbnail.filter(|f| !f.is_empty()) {
            Some(thumb) => {
                let ext = allowed_extension(&thumb, &ALLOWED_IMAGE_EXTENSIONS, "thumbnail")?;
                Some((thumb, ext))
            }
            None => None,
        };

        Ok(ValidUpload {
            group_name,
            category,
            level,
            tag,
            video,
            video_ext,
            thumbnail,
        })
    }
}

fn required(value: Option<String>, field: &str) -> WorkflowResult<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| WorkflowError::Validation(format!("{field} is required")))
}

fn allowed_extension(file: &StagedFile, allowed: &[&str], what: &str) -> WorkflowResult<String> {
    match file.extension() {
        Some(ext) if allowed.contains(&ext.as_str()) => Ok(ext),
        _ => Err(WorkflowError::Validation(format!(
            "unsupported {what} format; allowed: {}",
            allowed.join(", ")
        ))),
    }
}

fn thumbnail_key(group_id: &str, ext: &str) -> String {
    format!("videos/{}/thumbnail{}", group_id, ext)
}

/// Confirmation payload of a successful upload.
#[derive(Debug, Clone, Serialize)]
pub struct UploadReceipt {
    pub group_id: String,
    pub translations: Translations,
    pub time: String,
    pub level: String,
    pub tag: Option<String>,
    pub video_url: String,
    pub qr_url: String,
    pub thumbnail_url: Option<String>,
    pub watch_url: String,
}

pub async fn upload(state: &AppState, submission: UploadSubmission) -> WorkflowResult<UploadReceipt> {
    let upload = submission.validate()?;
    let group_id = Uuid::new_v4().simple().to_string();

    let duration_seconds = match state.probe.duration_seconds(upload.video.path()).await {
        Ok(seconds) => Some(seconds),
        Err(err) => {
            warn!("could not probe video for {}: {}", group_id, err);
            None
        }
    };

    let video_bytes = upload.video.size_bytes();
    let video_key = format!("videos/{}/video{}", group_id, upload.video_ext);
    state
        .objects
        .commit(&video_key, upload.video, content_type_for(&upload.video_ext))
        .await?;

    let thumbnail_key = match upload.thumbnail {
        Some((thumb, ext)) => {
            let key = thumbnail_key(&group_id, &ext);
            state
                .objects
                .commit(&key, thumb, content_type_for(&ext))
                .await?;
            Some(key)
        }
        None => None,
    };

    let translator = state.translator.as_ref();
    let (translated, category_translations) = futures::join!(
        translate_title(translator, &upload.group_name),
        translate_category(translator, &upload.category),
    );
    let translations = seed_translations(&upload.group_name, translated);

    let qr_link = state.watch_url(&group_id);
    let png = qr::render_png(&qr_link)?;
    let qr_key = format!("videos/{}/qr.png", group_id);
    state
        .objects
        .put_bytes(&qr_key, "image/png", Bytes::from(png))
        .await?;

    let now = Utc::now();
    let group = VideoGroup {
        group_id: group_id.clone(),
        group_name: upload.group_name,
        translations,
        category: upload.category,
        category_translations,
        level: upload.level,
        tag: upload.tag,
        video_key,
        thumbnail_key,
        qr_key,
        qr_link,
        duration_seconds,
        created_at: now,
        updated_at: now,
    };
    state.catalog.insert_group(&group).await?;

    info!(
        "uploaded group {} ({} bytes, {} of {} languages translated)",
        group.group_id,
        video_bytes,
        group.translations.len(),
        Language::ALL.len()
    );

    Ok(UploadReceipt {
        video_url: state.signer.presign(&group.video_key).url,
        qr_url: state.signer.presign(&group.qr_key).url,
        thumbnail_url: group
            .thumbnail_key
            .as_deref()
            .map(|key| state.signer.presign(key).url),
        watch_url: group.qr_link.clone(),
        time: group.time_label(),
        group_id: group.group_id,
        translations: group.translations,
        level: group.level,
        tag: group.tag,
    })
}

/// One entry of the language selector.
#[derive(Debug, Clone, Serialize)]
pub struct LanguageOption {
    pub code: &'static str,
    pub name: &'static str,
    pub selected: bool,
}

/// Everything the playback page shows.
#[derive(Debug, Clone, Serialize)]
pub struct WatchView {
    pub group_id: String,
    pub title: String,
    pub current_language: Language,
    pub current_language_name: &'static str,
    /// Korean category path.
    pub category: CategoryPath,
    /// Category path in the requested language, Korean when untranslated.
    pub display_category: CategoryPath,
    pub category_path: String,
    pub time: String,
    pub level: String,
    pub tag: Option<String>,
    pub video_url: String,
    pub thumbnail_url: Option<String>,
    pub qr_url: String,
    pub languages: Vec<LanguageOption>,
}

async fn load_group(state: &AppState, group_id: &str) -> WorkflowResult<VideoGroup> {
    state
        .catalog
        .get_group(group_id)
        .await?
        .ok_or_else(|| WorkflowError::NotFound(group_id.to_string()))
}

pub async fn watch(
    state: &AppState,
    group_id: &str,
    requested: Option<&str>,
) -> WorkflowResult<WatchView> {
    let group = load_group(state, group_id).await?;

    let requested = Language::resolve(requested);
    let (current, title) = group.display_title(requested);
    let display_category = group.display_category(requested).clone();
    let languages = Language::ALL
        .into_iter()
        .map(|lang| LanguageOption {
            code: lang.code(),
            name: lang.display_name(),
            selected: lang == current,
        })
        .collect();

    Ok(WatchView {
        group_id: group.group_id.clone(),
        title: title.to_string(),
        current_language: current,
        current_language_name: current.display_name(),
        category_path: display_category.to_string(),
        display_category,
        time: group.time_label(),
        level: group.level.clone(),
        tag: group.tag.clone(),
        video_url: state.signer.presign(&group.video_key).url,
        thumbnail_url: group
            .thumbnail_key
            .as_deref()
            .map(|key| state.signer.presign(key).url),
        qr_url: state.signer.presign(&group.qr_key).url,
        languages,
        category: group.category,
    })
}

/// One row of a catalog listing, in the requested language.
#[derive(Debug, Clone, Serialize)]
pub struct VideoSummary {
    pub group_id: String,
    pub title: String,
    pub main_category: String,
    pub sub_category: String,
    pub sub_sub_category: String,
    pub time: String,
    pub level: String,
    pub tag: Option<String>,
    /// `YYYYMMDD` of the upload.
    pub upload_date: String,
    pub language: Language,
    pub video_url: String,
    pub qr_url: String,
    pub thumbnail_url: Option<String>,
}

impl VideoSummary {
    fn new(state: &AppState, group: &VideoGroup, lang: Language) -> Self {
        let (_, title) = group.display_title(lang);
        let category = group.display_category(lang);
        Self {
            group_id: group.group_id.clone(),
            title: title.to_string(),
            main_category: category.main_category.clone(),
            sub_category: category.sub_category.clone(),
            sub_sub_category: category.leaf_category.clone(),
            time: group.time_label(),
            level: group.level.clone(),
            tag: group.tag.clone(),
            upload_date: group.created_at.format("%Y%m%d").to_string(),
            language: lang,
            video_url: state.signer.presign(&group.video_key).url,
            qr_url: state.signer.presign(&group.qr_key).url,
            thumbnail_url: group
                .thumbnail_key
                .as_deref()
                .map(|key| state.signer.presign(key).url),
        }
    }
}

/// Newest groups first, filtered by Korean main category and level.
pub async fn list_videos(
    state: &AppState,
    filter: &GroupFilter,
    lang: Language,
) -> WorkflowResult<Vec<VideoSummary>> {
    let groups = state.catalog.list_groups(filter).await?;
    Ok(groups
        .iter()
        .map(|group| VideoSummary::new(state, group, lang))
        .collect())
}

/// Case-insensitive search over the title and category names shown in
/// `lang`. A blank query matches nothing.
pub async fn search_videos(
    state: &AppState,
    query: &str,
    lang: Language,
    limit: usize,
) -> WorkflowResult<Vec<VideoSummary>> {
    let query = query.trim();
    if query.is_empty() {
        return Ok(Vec::new());
    }
    let needle = query.to_lowercase();

    let groups = state.catalog.list_groups(&GroupFilter::default()).await?;
    Ok(groups
        .iter()
        .filter(|group| {
            let (_, title) = group.display_title(lang);
            title.to_lowercase().contains(&needle) || group.display_category(lang).mentions(query)
        })
        .take(limit)
        .map(|group| VideoSummary::new(state, group, lang))
        .collect())
}

/// Groups whose Korean or `lang` category names contain `category`.
pub async fn videos_in_category(
    state: &AppState,
    category: &str,
    lang: Language,
) -> WorkflowResult<Vec<VideoSummary>> {
    let category = category.trim();
    if category.is_empty() {
        return Ok(Vec::new());
    }

    let groups = state.catalog.list_groups(&GroupFilter::default()).await?;
    Ok(groups
        .iter()
        .filter(|group| {
            group.category.mentions(category) || group.display_category(lang).mentions(category)
        })
        .map(|group| VideoSummary::new(state, group, lang))
        .collect())
}

/// Store a new thumbnail for an existing group and return its link.
///
/// The previous thumbnail is deleted when it lived under another key; a
/// failed delete is only logged.
pub async fn replace_thumbnail(
    state: &AppState,
    group_id: &str,
    thumbnail: Option<StagedFile>,
) -> WorkflowResult<String> {
    let group = load_group(state, group_id).await?;
    let thumbnail = thumbnail
        .filter(|f| !f.is_empty())
        .ok_or_else(|| WorkflowError::Validation("a thumbnail file is required".into()))?;
    let ext = allowed_extension(&thumbnail, &ALLOWED_IMAGE_EXTENSIONS, "thumbnail")?;

    let key = thumbnail_key(group_id, &ext);
    state
        .objects
        .commit(&key, thumbnail, content_type_for(&ext))
        .await?;

    if let Some(old) = group.thumbnail_key.as_deref().filter(|old| *old != key) {
        if let Err(err) = state.objects.delete_object(old).await {
            warn!("could not delete old thumbnail {}: {}", old, err);
        }
    }
    state.catalog.set_thumbnail(group_id, Some(&key)).await?;

    info!("replaced thumbnail of {}", group_id);
    Ok(state.signer.presign(&key).url)
}

/// Remove a group's thumbnail. A failed object delete is only logged.
pub async fn delete_thumbnail(state: &AppState, group_id: &str) -> WorkflowResult<()> {
    let group = load_group(state, group_id).await?;
    let key = group
        .thumbnail_key
        .ok_or_else(|| WorkflowError::NoThumbnail(group_id.to_string()))?;

    if let Err(err) = state.objects.delete_object(&key).await {
        warn!("could not delete thumbnail {}: {}", key, err);
    }
    state.catalog.set_thumbnail(group_id, None).await?;

    info!("deleted thumbnail of {}", group_id);
    Ok(())
}
