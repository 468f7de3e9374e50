/// Cursor over the image URLs of one generation. The index stays in
/// `[0, len)` whenever the list is non-empty; navigation never wraps.
#[derive(Debug, Clone, Default)]
pub struct ImageBrowser {
    urls: Vec<String>,
    index: usize,
}

impl ImageBrowser {
    pub fn new(urls: Vec<String>) -> Self {
        Self { urls, index: 0 }
    }

    pub fn replace(&mut self, urls: Vec<String>) {
        self.urls = urls;
        self.index = 0;
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn current(&self) -> Option<&str> {
        self.urls.get(self.index).map(String::as_str)
    }

    pub fn can_previous(&self) -> bool {
        self.index > 0
    }

    pub fn can_next(&self) -> bool {
        self.index + 1 < self.urls.len()
    }

    /// Returns whether the cursor moved.
    pub fn previous(&mut self) -> bool {
        if !self.can_previous() {
            return false;
        }
        self.index -= 1;
        true
    }

    /// Returns whether the cursor moved.
    pub fn next(&mut self) -> bool {
        if !self.can_next() {
            return false;
        }
        self.index += 1;
        true
    }

    pub fn position_label(&self) -> String {
        if self.urls.is_empty() {
            "0 / 0".to_string()
        } else {
            format!("{} / {}", self.index + 1, self.urls.len())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("https://img.example/{i}.jpg")).collect()
    }

    #[test]
    fn empty_browser_has_no_moves() {
        let mut b = ImageBrowser::default();
        assert!(!b.next());
        assert!(!b.previous());
        assert_eq!(b.current(), None);
        assert_eq!(b.position_label(), "0 / 0");
    }

    #[test]
    fn next_clamps_at_end() {
        let mut b = ImageBrowser::new(urls(3));
        assert!(b.next());
        assert!(b.next());
        assert!(!b.next());
        assert!(!b.next());
        assert_eq!(b.index(), 2);
        assert_eq!(b.position_label(), "3 / 3");
        assert!(!b.can_next());
        assert!(b.can_previous());
    }

    #[test]
    fn previous_clamps_at_start() {
        let mut b = ImageBrowser::new(urls(2));
        assert!(!b.previous());
        assert_eq!(b.index(), 0);
        b.next();
        assert!(b.previous());
        assert!(!b.previous());
        assert_eq!(b.current(), Some("https://img.example/0.jpg"));
    }

    #[test]
    fn index_stays_in_bounds_for_any_walk() {
        for n in 1..6 {
            let mut b = ImageBrowser::new(urls(n));
            // fixed walk: mostly forward, then mostly back
            let walk = "nnpnnnnnppnppppppnn";
            for step in walk.chars() {
                match step {
                    'n' => b.next(),
                    _ => b.previous(),
                };
                assert!(b.index() < n, "index {} out of [0, {n})", b.index());
                assert!(b.current().is_some());
            }
        }
    }

    #[test]
    fn replace_resets_cursor() {
        let mut b = ImageBrowser::new(urls(4));
        b.next();
        b.next();
        b.replace(urls(2));
        assert_eq!(b.index(), 0);
        assert_eq!(b.len(), 2);
    }

    #[test]
    fn single_image_disables_both_directions() {
        let b = ImageBrowser::new(urls(1));
        assert!(!b.can_next());
        assert!(!b.can_previous());
        assert_eq!(b.position_label(), "1 / 1");
    }
}
