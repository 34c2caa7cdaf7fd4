//! Labels derived from stored values

use chrono::{DateTime, Utc};

use crate::models::Product;

/// "Just now", "N hours ago" or "N days ago" (past 24 hours)
pub fn relative_posted(posted: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let hours = (now - posted).num_hours();
    if hours > 24 {
        format!("{} days ago", hours / 24)
    } else if hours > 0 {
        format!("{} hours ago", hours)
    } else {
        "Just now".to_string()
    }
}

/// Posted label for a listing; unparseable dates read as "Just now"
pub fn posted_label(product: &Product, now: DateTime<Utc>) -> String {
    product
        .posted_at()
        .map(|posted| relative_posted(posted, now))
        .unwrap_or_else(|| "Just now".to_string())
}

/// Month and year an account was created, e.g. "Oct 2026"
pub fn joined_label(at: DateTime<Utc>) -> String {
    at.format("%b %Y").to_string()
}

/// Generated initials avatar for a display name
pub fn default_avatar(name: &str) -> String {
    let seed: String = name
        .trim()
        .chars()
        .map(|c| if c == ' ' { '+' } else { c })
        .collect();
    format!("https://api.dicebear.com/7.x/initials/svg?seed={}", seed)
}
