//! Page-number pagination shared by every post listing.
//!
//! Page numbers are 1-based and always clamped into range: a missing or
//! malformed number selects the first page, numbers below one select the
//! first page and numbers past the end select the last page. An empty
//! sequence still has exactly one (empty) page, so callers never have to
//! deal with an absent page.

use serde::Serialize;

pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Parse the raw `page` query value into a requested page number.
///
/// Anything that is not an integer literal falls back to `1`. Integer
/// literals are kept as requested, saturating on overflow, and clamped later
/// against the real page count.
pub fn parse_page_number(raw: Option<&str>) -> u64 {
    let Some(raw) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
        return 1;
    };

    let (negative, digits) = match raw.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, raw.strip_prefix('+').unwrap_or(raw)),
    };
    if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
        return 1;
    }
    if negative {
        return 1;
    }

    digits.parse::<u64>().unwrap_or(u64::MAX).max(1)
}

/// Resolved position of one page inside a collection of `count` items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub number: u64,
    pub num_pages: u64,
    pub count: u64,
    pub page_size: u32,
}

impl PageWindow {
    pub fn new(count: u64, page_size: u32, requested: u64) -> Self {
        let page_size = page_size.max(1);
        let size = u64::from(page_size);
        let num_pages = count.div_ceil(size).max(1);
        let number = requested.clamp(1, num_pages);
        Self {
            number,
            num_pages,
            count,
            page_size,
        }
    }

    /// Rows to skip before this page.
    pub fn offset(&self) -> u64 {
        (self.number - 1) * u64::from(self.page_size)
    }

    /// Maximum rows on this page.
    pub fn limit(&self) -> u64 {
        u64::from(self.page_size)
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }
}

/// One page of results plus the metadata a client needs to navigate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: u64,
    pub num_pages: u64,
    pub count: u64,
    pub has_previous: bool,
    pub has_next: bool,
    pub previous_page_number: Option<u64>,
    pub next_page_number: Option<u64>,
}

impl<T> Page<T> {
    pub fn from_window(window: PageWindow, items: Vec<T>) -> Self {
        Self {
            items,
            number: window.number,
            num_pages: window.num_pages,
            count: window.count,
            has_previous: window.has_previous(),
            has_next: window.has_next(),
            previous_page_number: window.has_previous().then(|| window.number - 1),
            next_page_number: window.has_next().then(|| window.number + 1),
        }
    }

    /// The single page of an empty collection.
    pub fn empty() -> Self {
        Self::from_window(PageWindow::new(0, DEFAULT_PAGE_SIZE, 1), Vec::new())
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            number: self.number,
            num_pages: self.num_pages,
            count: self.count,
            has_previous: self.has_previous,
            has_next: self.has_next,
            previous_page_number: self.previous_page_number,
            next_page_number: self.next_page_number,
        }
    }
}

/// Slice an already ordered sequence into the requested page.
pub fn paginate<T>(sequence: Vec<T>, page_size: u32, requested: u64) -> Page<T> {
    let window = PageWindow::new(sequence.len() as u64, page_size, requested);
    let skip = usize::try_from(window.offset()).unwrap_or(usize::MAX);
    let take = usize::try_from(window.limit()).unwrap_or(usize::MAX);
    let items = sequence.into_iter().skip(skip).take(take).collect();
    Page::from_window(window, items)
}

/// Carries the configured page size so callers cannot mix sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginator {
    page_size: u32,
}

impl Paginator {
    pub fn new(page_size: u32) -> Self {
        Self {
            page_size: page_size.max(1),
        }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn window(&self, count: u64, requested: u64) -> PageWindow {
        PageWindow::new(count, self.page_size, requested)
    }

    pub fn paginate<T>(&self, sequence: Vec<T>, requested: u64) -> Page<T> {
        paginate(sequence, self.page_size, requested)
    }
}

impl Default for Paginator {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}
