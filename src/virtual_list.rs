//! Variable-height virtual scroll index for the results list.
//!
//! A results list can hold tens of thousands of heterogeneous rows (file
//! headers interleaved with match rows); rendering all of them is a known
//! responsiveness failure mode. This index stores cumulative row offsets so
//! the visible window is found with an O(log n) `partition_point` search and
//! only that window is ever handed to the renderer.

use crate::display::DisplayItem;
use std::ops::Range;

/// Default row heights in logical pixels.
pub const HEADER_HEIGHT: f32 = 28.0;
pub const MATCH_ROW_HEIGHT: f32 = 24.0;

/// Extra rows rendered past each visible edge to avoid pop-in during fast
/// scroll.
pub const OVERSCAN: usize = 3;

/// Viewport dimensions handed in by the embedding shell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub height: f32,
    pub width: f32,
}

/// One row of the computed visible window, absolutely positioned.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionedRow<'a> {
    pub index: usize,
    pub top: f32,
    pub height: f32,
    pub item: &'a DisplayItem,
}

/// Cumulative-offset index over an ordered sequence of row heights.
///
/// `cum_heights[i]` is the bottom edge of row `i`. The index is built once
/// per item-sequence identity and grown by [`extend_for_items`] as batches
/// append, never rebuilt per scroll event.
///
/// [`extend_for_items`]: VirtualList::extend_for_items
#[derive(Debug, Clone, Default)]
pub struct VirtualList {
    cum_heights: Vec<f32>,
}

impl VirtualList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from an explicit height per row.
    pub fn from_heights(heights: impl IntoIterator<Item = f32>) -> Self {
        let mut list = Self::new();
        for h in heights {
            list.push(h);
        }
        list
    }

    /// Build for `count` rows of a single fixed height.
    pub fn fixed(count: usize, height: f32) -> Self {
        Self::from_heights(std::iter::repeat(height).take(count))
    }

    /// Build for a display-item sequence using the default per-kind heights.
    pub fn for_items(items: &[DisplayItem]) -> Self {
        let mut list = Self::new();
        list.extend_for_items(items);
        list
    }

    pub fn push(&mut self, height: f32) {
        let bottom = self.total_height() + height;
        self.cum_heights.push(bottom);
    }

    /// Append rows for newly accumulated display items.
    pub fn extend_for_items(&mut self, items: &[DisplayItem]) {
        for item in items {
            let height = if item.is_header() {
                HEADER_HEIGHT
            } else {
                MATCH_ROW_HEIGHT
            };
            self.push(height);
        }
    }

    pub fn clear(&mut self) {
        self.cum_heights.clear();
    }

    pub fn len(&self) -> usize {
        self.cum_heights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cum_heights.is_empty()
    }

    pub fn total_height(&self) -> f32 {
        self.cum_heights.last().copied().unwrap_or(0.0)
    }

    /// Top edge of row `index`.
    pub fn offset_of(&self, index: usize) -> f32 {
        if index == 0 {
            0.0
        } else {
            self.cum_heights[index - 1]
        }
    }

    pub fn height_of(&self, index: usize) -> f32 {
        self.cum_heights[index] - self.offset_of(index)
    }

    /// Index of the row containing vertical position `y`, clamped to the
    /// last row past the end.
    pub fn index_at(&self, y: f32) -> usize {
        let i = self.cum_heights.partition_point(|&bottom| bottom <= y);
        i.min(self.len().saturating_sub(1))
    }

    /// Exact half-open range of rows intersecting the viewport, no overscan.
    pub fn visible_bounds(&self, scroll_top: f32, viewport_height: f32) -> Range<usize> {
        if self.is_empty() || viewport_height <= 0.0 {
            return 0..0;
        }
        let top = scroll_top.max(0.0);
        let bottom = top + viewport_height;

        // First row whose bottom edge is past the top of the viewport.
        let start = self.cum_heights.partition_point(|&b| b <= top);
        if start >= self.len() {
            return self.len()..self.len();
        }
        // First row whose top edge is at or past the bottom of the viewport.
        let end = self.cum_heights.partition_point(|&b| b < bottom) + 1;
        start..end.min(self.len())
    }

    /// Visible range padded by [`OVERSCAN`] rows on each side.
    pub fn visible_range(&self, scroll_top: f32, viewport_height: f32) -> Range<usize> {
        let bounds = self.visible_bounds(scroll_top, viewport_height);
        if bounds.is_empty() {
            return bounds;
        }
        let start = bounds.start.saturating_sub(OVERSCAN);
        let end = (bounds.end + OVERSCAN).min(self.len());
        start..end
    }

    /// New scroll offset that brings row `index` fully into view, or `None`
    /// when it already is. Rows above the viewport align to the top edge,
    /// rows below align to the bottom edge.
    pub fn scroll_to_item(
        &self,
        index: usize,
        scroll_top: f32,
        viewport_height: f32,
    ) -> Option<f32> {
        let top = self.offset_of(index);
        let bottom = top + self.height_of(index);

        if top >= scroll_top && bottom <= scroll_top + viewport_height {
            return None;
        }
        if top < scroll_top {
            Some(top)
        } else {
            Some((bottom - viewport_height).max(0.0))
        }
    }

    /// Compute the renderable window: the visible items (plus overscan),
    /// each with its absolute position. The full item list never enters the
    /// render tree.
    pub fn window<'a>(
        &self,
        items: &'a [DisplayItem],
        scroll_top: f32,
        viewport: Viewport,
    ) -> Vec<PositionedRow<'a>> {
        debug_assert_eq!(items.len(), self.len());
        self.visible_range(scroll_top, viewport.height)
            .filter_map(|index| {
                items.get(index).map(|item| PositionedRow {
                    index,
                    top: self.offset_of(index),
                    height: self.height_of(index),
                    item,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_accumulate() {
        let list = VirtualList::from_heights([10.0, 20.0, 30.0]);
        assert_eq!(list.len(), 3);
        assert_eq!(list.total_height(), 60.0);
        assert_eq!(list.offset_of(0), 0.0);
        assert_eq!(list.offset_of(2), 30.0);
        assert_eq!(list.height_of(1), 20.0);
    }

    #[test]
    fn empty_list_has_empty_window() {
        let list = VirtualList::new();
        assert_eq!(list.visible_bounds(0.0, 100.0), 0..0);
        assert_eq!(list.total_height(), 0.0);
    }

    #[test]
    fn bounds_cover_partially_visible_edges() {
        // Rows of height 10; viewport [5, 25) clips row 0 and row 2.
        let list = VirtualList::fixed(10, 10.0);
        assert_eq!(list.visible_bounds(5.0, 20.0), 0..3);
    }

    #[test]
    fn scroll_to_visible_item_is_noop() {
        let list = VirtualList::fixed(100, 10.0);
        assert_eq!(list.scroll_to_item(5, 0.0, 100.0), None);
        // Row 50 is below the viewport: align its bottom edge.
        assert_eq!(list.scroll_to_item(50, 0.0, 100.0), Some(410.0));
        // Row 5 is above a scrolled viewport: align its top edge.
        assert_eq!(list.scroll_to_item(5, 200.0, 100.0), Some(50.0));
    }

    #[test]
    fn extend_matches_item_kinds() {
        let items = vec![
            DisplayItem::Header {
                file: "a.rs".into(),
                match_count: None,
            },
            DisplayItem::Match { original_index: 0 },
        ];
        let list = VirtualList::for_items(&items);
        assert_eq!(list.height_of(0), HEADER_HEIGHT);
        assert_eq!(list.height_of(1), MATCH_ROW_HEIGHT);
    }
}
