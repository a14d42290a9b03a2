use serde::{Deserialize, Serialize};

/// Query parameters of a paged list request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    #[serde(default)]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

fn default_page_size() -> i64 {
    10
}

impl Default for Page {
    fn default() -> Self {
        Self {
            page: 0,
            page_size: default_page_size(),
        }
    }
}

impl Page {
    pub fn new(page: i64, page_size: i64) -> Self {
        Self { page, page_size }
    }
}

/// Sorts `items` by `key` and returns page `page.page` (1-based, 0 meaning 1).
///
/// Negative parameters, an empty input or a start past the end all yield an empty page.
pub fn page_slice<T, F>(mut items: Vec<T>, page: Page, key: F) -> Vec<T>
where
    F: Fn(&T) -> &str,
{
    if page.page < 0 || page.page_size < 0 || items.is_empty() {
        return Vec::new();
    }

    let offset = page.page.max(1) as usize;
    let size = page.page_size as usize;
    items.sort_by(|a, b| key(a).cmp(key(b)));

    let start = (offset - 1).saturating_mul(size);
    if start >= items.len() {
        return Vec::new();
    }
    let end = offset.saturating_mul(size).min(items.len());

    items.drain(start..end).collect()
}
