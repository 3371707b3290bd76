pub mod dto;
pub mod event;
pub mod show;

pub use dto::{EventCategoryDto, EventDto, MediaItemDto};
pub use event::{Event, EventCategory, EventInput, MediaItem, NestedRef, NewEventCategory, NewMediaItem};
pub use show::{Performance, PerformanceMetric, Show, ShowMetric};
