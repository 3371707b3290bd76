//! dto.rs
//!
//! Представление события "на проводе" (JSON) и перевод его в модель.
//!
//! Вложенные mediaItem / category работают как ссылки: если передан `id`,
//! используется существующая запись, иначе из полей создаётся новая.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use super::event::{Event, EventCategory, EventInput, MediaItem, NestedRef, NewEventCategory, NewMediaItem};

pub const DEFAULT_MEDIA_TYPE: &str = "IMAGE";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_media_item"))]
pub struct MediaItemDto {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub media_type: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_category"))]
pub struct EventCategoryDto {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct EventDto {
    #[serde(default)]
    pub id: Option<i64>,
    #[validate(length(min = 5, max = 50, message = "name must be between 5 and 50 characters"))]
    pub name: String,
    #[validate(length(min = 20, max = 1000, message = "description must be between 20 and 1000 characters"))]
    pub description: String,
    #[serde(default)]
    #[validate(nested)]
    pub media_item: Option<MediaItemDto>,
    #[serde(default)]
    #[validate(required(message = "category is required"), nested)]
    pub category: Option<EventCategoryDto>,
    #[serde(default)]
    pub version: Option<i64>,
}

fn validate_media_item(item: &MediaItemDto) -> Result<(), ValidationError> {
    if item.id.is_none() && is_blank(item.url.as_deref()) {
        let mut err = ValidationError::new("media_item_url");
        err.message = Some("a new media item needs a url".into());
        return Err(err);
    }
    Ok(())
}

fn validate_category(category: &EventCategoryDto) -> Result<(), ValidationError> {
    if category.id.is_none() && is_blank(category.description.as_deref()) {
        let mut err = ValidationError::new("category_description");
        err.message = Some("a new category needs a description".into());
        return Err(err);
    }
    Ok(())
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}

impl From<&MediaItem> for MediaItemDto {
    fn from(item: &MediaItem) -> Self {
        Self {
            id: Some(item.id),
            media_type: Some(item.media_type.clone()),
            url: Some(item.url.clone()),
        }
    }
}

impl From<&EventCategory> for EventCategoryDto {
    fn from(category: &EventCategory) -> Self {
        Self {
            id: Some(category.id),
            description: Some(category.description.clone()),
        }
    }
}

impl From<&Event> for EventDto {
    fn from(event: &Event) -> Self {
        Self {
            id: Some(event.id),
            name: event.name.clone(),
            description: event.description.clone(),
            media_item: event.media_item.as_ref().map(MediaItemDto::from),
            category: event.category.as_ref().map(EventCategoryDto::from),
            version: Some(event.version),
        }
    }
}

impl MediaItemDto {
    fn into_ref(self) -> NestedRef<NewMediaItem> {
        match self.id {
            Some(id) => NestedRef::Existing(id),
            None => NestedRef::New(NewMediaItem {
                media_type: self
                    .media_type
                    .filter(|t| !t.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_MEDIA_TYPE.to_string()),
                url: self.url.unwrap_or_default(),
            }),
        }
    }
}

impl EventCategoryDto {
    fn into_ref(self) -> NestedRef<NewEventCategory> {
        match self.id {
            Some(id) => NestedRef::Existing(id),
            None => NestedRef::New(NewEventCategory {
                description: self.description.unwrap_or_default(),
            }),
        }
    }
}

impl EventDto {
    /// Переводит DTO в входные данные хранилища. `id` из тела игнорируется:
    /// идентичность берётся из пути либо назначается базой.
    pub fn into_input(self) -> EventInput {
        EventInput {
            name: self.name,
            description: self.description,
            media_item: self.media_item.map(MediaItemDto::into_ref),
            category: self.category.map(EventCategoryDto::into_ref),
            expected_version: self.version,
        }
    }
}
