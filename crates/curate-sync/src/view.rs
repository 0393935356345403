//! View models for the dashboard
//!
//! Pure functions over the merged collection: the per-type grid summary,
//! the paginated card list and value rendering. Nothing here touches a store.

use chrono::{DateTime, Utc};
use curate_core::{ContentItem, ContentType, FieldValue, format_label, is_image_field, FieldKind};
use serde::Serialize;

/// Cards per list page
pub const DEFAULT_PAGE_SIZE: usize = 6;

/// Longest string rendered in full
pub const MAX_RENDERED_CHARS: usize = 50;

pub const EMPTY_LIST_TITLE: &str = "No content in this category yet";
pub const EMPTY_LIST_HINT: &str = "Click \"Add Content\" to get started.";

/// Page cursor over a list.
///
/// The cursor is never reset when the list changes: shrinking the list can
/// leave it on a page past the end, which then renders empty until the user
/// navigates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Paginator {
    page_size: usize,
    current_page: usize,
}

impl Default for Paginator {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl Paginator {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            current_page: 1,
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// One-based
    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn page_count(&self, total: usize) -> usize {
        total.div_ceil(self.page_size)
    }

    fn last_page(&self, total: usize) -> usize {
        self.page_count(total).max(1)
    }

    /// Items on the current page; empty past the end
    pub fn page<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let start = (self.current_page - 1).saturating_mul(self.page_size);
        if start >= items.len() {
            return &[];
        }
        let end = (start + self.page_size).min(items.len());
        &items[start..end]
    }

    /// Jump to `page`, clamped to `[1, page_count]`
    pub fn go_to(&mut self, page: usize, total: usize) -> usize {
        self.current_page = page.clamp(1, self.last_page(total));
        self.current_page
    }

    pub fn next(&mut self, total: usize) -> usize {
        self.go_to(self.current_page.saturating_add(1), total)
    }

    pub fn previous(&mut self, total: usize) -> usize {
        self.go_to(self.current_page.saturating_sub(1), total)
    }

    pub fn has_previous(&self) -> bool {
        self.current_page > 1
    }

    pub fn has_next(&self, total: usize) -> bool {
        self.current_page < self.page_count(total)
    }

    /// Snapshot of the current page
    pub fn view<T: Clone>(&self, items: &[T]) -> PageView<T> {
        PageView {
            page: self.current_page,
            page_count: self.page_count(items.len()),
            page_size: self.page_size,
            total: items.len(),
            has_previous: self.has_previous(),
            has_next: self.has_next(items.len()),
            items: self.page(items).to_vec(),
        }
    }
}

/// One rendered page of a list
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageView<T> {
    pub page: usize,
    pub page_count: usize,
    pub page_size: usize,
    pub total: usize,
    pub has_previous: bool,
    pub has_next: bool,
    pub items: Vec<T>,
}

impl<T> PageView<T> {
    /// Pagination controls are only shown with more than one page
    pub fn shows_controls(&self) -> bool {
        self.page_count > 1
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PageView<U> {
        PageView {
            page: self.page,
            page_count: self.page_count,
            page_size: self.page_size,
            total: self.total,
            has_previous: self.has_previous,
            has_next: self.has_next,
            items: self.items.into_iter().map(f).collect(),
        }
    }
}

/// Count tile for one content type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridEntry {
    pub content_type: ContentType,
    pub title: String,
    pub count: usize,
    pub caption: String,
}

/// Per-type counts of the merged collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GridSummary {
    pub entries: Vec<GridEntry>,
}

impl GridSummary {
    pub fn from_items(items: &[ContentItem]) -> Self {
        let entries = ContentType::ALL
            .into_iter()
            .map(|content_type| {
                let count = items
                    .iter()
                    .filter(|item| item.content_type == content_type)
                    .count();
                GridEntry {
                    content_type,
                    title: content_type.to_string(),
                    count,
                    caption: caption(count),
                }
            })
            .collect();
        Self { entries }
    }

    pub fn count(&self, content_type: ContentType) -> usize {
        self.entries
            .iter()
            .find(|e| e.content_type == content_type)
            .map_or(0, |e| e.count)
    }

    pub fn total(&self) -> usize {
        self.entries.iter().map(|e| e.count).sum()
    }
}

fn caption(count: usize) -> String {
    if count == 1 {
        "item curated".to_string()
    } else {
        "items curated".to_string()
    }
}

/// Display string for a field value.
///
/// Text longer than [`MAX_RENDERED_CHARS`] characters is cut to 47
/// characters plus "..."; anything else is shown as JSON.
pub fn render_value(value: &FieldValue) -> String {
    match value {
        FieldValue::Text(text) => {
            if text.chars().count() > MAX_RENDERED_CHARS {
                let mut cut: String = text.chars().take(MAX_RENDERED_CHARS - 3).collect();
                cut.push_str("...");
                cut
            } else {
                text.clone()
            }
        }
        other => other.to_json().to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardField {
    pub name: String,
    pub label: String,
    pub value: String,
    pub is_image: bool,
}

/// One item as a list card
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardView {
    pub id: String,
    pub content_type: ContentType,
    pub created_at: DateTime<Utc>,
    pub created_display: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,
    pub fields: Vec<CardField>,
}

impl CardView {
    pub fn from_item(item: &ContentItem) -> Self {
        let fields = item
            .data
            .iter()
            .map(|(name, value)| {
                let is_image = is_image_field(name, FieldKind::Text);
                // image references are rendered as images, never cut
                let value = match value {
                    FieldValue::Text(url) if is_image => url.clone(),
                    other => render_value(other),
                };
                CardField {
                    name: name.clone(),
                    label: format_label(name),
                    value,
                    is_image,
                }
            })
            .collect();

        Self {
            id: item.id.clone(),
            content_type: item.content_type,
            created_at: item.created_at,
            created_display: item.created_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            order: item.order,
            fields,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_thirteen_items_three_pages() {
        let items: Vec<u32> = (1..=13).collect();
        let mut pager = Paginator::default();
        assert_eq!(pager.page_count(items.len()), 3);

        assert_eq!(pager.go_to(3, items.len()), 3);
        assert_eq!(pager.page(&items), &[13]);

        assert_eq!(pager.go_to(4, items.len()), 3);
        assert_eq!(pager.next(items.len()), 3);
        assert!(!pager.has_next(items.len()));
    }

    #[test]
    fn test_clamps_on_empty() {
        let items: Vec<u32> = Vec::new();
        let mut pager = Paginator::default();
        assert_eq!(pager.go_to(5, 0), 1);
        assert_eq!(pager.previous(0), 1);
        assert!(pager.page(&items).is_empty());
        assert!(!pager.view(&items).shows_controls());
    }

    #[test]
    fn test_delete_keeps_page_index() {
        let mut items: Vec<u32> = (1..=7).collect();
        let mut pager = Paginator::default();
        pager.go_to(2, items.len());
        assert_eq!(pager.page(&items), &[7]);

        items.pop();
        assert_eq!(pager.current_page(), 2);
        assert!(pager.page(&items).is_empty());

        let view = pager.view(&items);
        assert_eq!(view.page, 2);
        assert_eq!(view.page_count, 1);
        assert!(view.items.is_empty());
        assert_eq!(pager.previous(items.len()), 1);
    }

    #[test]
    fn test_previous_and_next() {
        let mut pager = Paginator::new(2);
        assert_eq!(pager.next(5), 2);
        assert_eq!(pager.next(5), 3);
        assert_eq!(pager.next(5), 3);
        assert_eq!(pager.previous(5), 2);
        assert!(pager.has_previous());
        assert_eq!(Paginator::new(0).page_size(), 1);
    }

    #[test]
    fn test_grid_captions() {
        let now = Utc::now();
        let items = vec![
            ContentItem::new("r1", ContentType::Reels, now),
            ContentItem::new("g1", ContentType::Greetings, now),
            ContentItem::new("g2", ContentType::Greetings, now),
        ];
        let grid = GridSummary::from_items(&items);
        assert_eq!(grid.entries.len(), 3);
        assert_eq!(grid.entries[0].caption, "item curated");
        assert_eq!(grid.entries[1].count, 0);
        assert_eq!(grid.entries[1].caption, "items curated");
        assert_eq!(grid.count(ContentType::Greetings), 2);
        assert_eq!(grid.total(), 3);
    }

    #[test]
    fn test_render_value() {
        let short = FieldValue::Text("hello".into());
        assert_eq!(render_value(&short), "hello");

        let exactly_fifty = FieldValue::Text("a".repeat(50));
        assert_eq!(render_value(&exactly_fifty), "a".repeat(50));

        let long = FieldValue::Text("é".repeat(60));
        let rendered = render_value(&long);
        assert_eq!(rendered.chars().count(), 50);
        assert!(rendered.ends_with("..."));

        assert_eq!(render_value(&FieldValue::Number(3.0)), "3.0");
        assert_eq!(render_value(&FieldValue::Bool(true)), "true");
        assert_eq!(render_value(&FieldValue::Json(json!({"a": 1}))), r#"{"a":1}"#);
    }

    #[test]
    fn test_card_view() {
        let created = Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap();
        let item = ContentItem::new("r1", ContentType::Reels, created)
            .with_field("reelsUrl", "https://x/y")
            .with_field("thumbnailUrl", "https://cdn/t.png")
            .with_order(2);
        let card = CardView::from_item(&item);
        assert_eq!(card.created_display, "2024-05-01 09:30:00 UTC");
        assert_eq!(card.fields[0].label, "Reels Url");
        assert!(!card.fields[0].is_image);
        assert!(card.fields[1].is_image);

        let long_url = format!("https://cdn.example.com/{}.png", "x".repeat(80));
        let item = ContentItem::new("r2", ContentType::Reels, created)
            .with_field("thumbnailUrl", long_url.as_str())
            .with_field("name", "n".repeat(80).as_str());
        let card = CardView::from_item(&item);
        assert_eq!(card.fields[1].value, long_url);
        assert_eq!(card.fields[0].value.chars().count(), 50);

        let json = serde_json::to_value(&card).unwrap();
        assert_eq!(json["contentType"], "Reels");
        assert_eq!(json["order"], 2);
    }
}
