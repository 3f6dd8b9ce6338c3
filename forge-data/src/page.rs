/// Pagination parameters. Construct from whatever query-string
/// extraction the transport layer uses; this crate has no opinion on
/// how `page`/`size`/`sort` arrive, only on what they mean once parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct Pageable {
    pub page: u64,
    pub size: u64,
    pub sort: Option<String>,
}

impl Default for Pageable {
    fn default() -> Self {
        Self { page: 0, size: 20, sort: None }
    }
}

impl Pageable {
    pub fn new(page: u64, size: u64) -> Self {
        Self { page, size, sort: None }
    }

    pub fn with_sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    pub fn offset(&self) -> u64 {
        self.page * self.size
    }
}

/// A page of results plus pagination metadata.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub content: Vec<T>,
    pub page: u64,
    pub size: u64,
    pub total_elements: u64,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub fn new(content: Vec<T>, pageable: &Pageable, total_elements: u64) -> Self {
        let total_pages = if pageable.size == 0 { 0 } else { total_elements.div_ceil(pageable.size) };
        Self {
            content,
            page: pageable.page,
            size: pageable.size,
            total_elements,
            total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_is_page_times_size() {
        let p = Pageable::new(3, 20);
        assert_eq!(p.offset(), 60);
    }

    #[test]
    fn total_pages_rounds_up() {
        let p = Pageable::new(0, 20);
        let page = Page::new(Vec::<i32>::new(), &p, 41);
        assert_eq!(page.total_pages, 3);
    }

    #[test]
    fn zero_size_reports_zero_pages_without_dividing() {
        let p = Pageable::new(0, 0);
        let page = Page::new(Vec::<i32>::new(), &p, 41);
        assert_eq!(page.total_pages, 0);
    }
}
