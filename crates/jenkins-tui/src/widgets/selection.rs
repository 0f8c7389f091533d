//! Cursor over a list whose length changes under it.

/// Selected row index. Every movement takes the current list length so the
/// cursor can never point past the end.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Selection {
    index: usize,
}

impl Selection {
    pub fn index(self) -> usize {
        self.index
    }

    /// Selected index if the list is non-empty.
    pub fn get(self, len: usize) -> Option<usize> {
        (len > 0).then(|| self.index.min(len - 1))
    }

    pub fn select(&mut self, index: usize, len: usize) {
        self.index = index.min(len.saturating_sub(1));
    }

    pub fn down(&mut self, len: usize) {
        self.select(self.index.saturating_add(1), len);
    }

    pub fn up(&mut self) {
        self.index = self.index.saturating_sub(1);
    }

    pub fn top(&mut self) {
        self.index = 0;
    }

    pub fn bottom(&mut self, len: usize) {
        self.index = len.saturating_sub(1);
    }

    pub fn page_down(&mut self, page: usize, len: usize) {
        self.select(self.index.saturating_add(page.max(1)), len);
    }

    pub fn page_up(&mut self, page: usize) {
        self.index = self.index.saturating_sub(page.max(1));
    }

    /// Pull the cursor back inside a list that shrank.
    pub fn clamp(&mut self, len: usize) {
        self.select(self.index, len);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn movement_stays_in_bounds() {
        let mut sel = Selection::default();
        sel.up();
        assert_eq!(sel.index(), 0);
        sel.down(3);
        sel.down(3);
        sel.down(3);
        assert_eq!(sel.index(), 2);
        sel.page_up(10);
        assert_eq!(sel.index(), 0);
        sel.page_down(10, 5);
        assert_eq!(sel.index(), 4);
        sel.clamp(2);
        assert_eq!(sel.index(), 1);
        assert_eq!(sel.get(0), None);
        assert_eq!(sel.get(2), Some(1));
    }
}
