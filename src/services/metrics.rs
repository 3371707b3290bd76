//! metrics.rs
//!
//! Сборка метрик по шоу: для каждого выступления шоу берём число занятых
//! мест из карты performance_id -> билеты. Нет записи - значит мест не занято.

use std::collections::HashMap;

use crate::models::{PerformanceMetric, Show, ShowMetric};

pub fn build_show_metric(show: &Show, occupied_counts: &HashMap<i64, i64>) -> ShowMetric {
    ShowMetric {
        show: show.id,
        event: show.event_name.clone(),
        venue: show.venue_name.clone(),
        capacity: show.capacity,
        performances: show
            .performances
            .iter()
            .map(|p| PerformanceMetric {
                date: p.date,
                occupied_count: occupied_counts.get(&p.id).copied().unwrap_or(0),
            })
            .collect(),
    }
}

pub fn build_metrics(shows: &[Show], occupied_counts: &HashMap<i64, i64>) -> Vec<ShowMetric> {
    shows
        .iter()
        .map(|show| build_show_metric(show, occupied_counts))
        .collect()
}
