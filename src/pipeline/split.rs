//! Section splitting: cut a tall page bitmap into horizontal slices.
//!
//! Sections are contiguous row ranges of at most `max_height` rows. Together
//! they cover `[0, height)` exactly once, top to bottom. Every later stage
//! keeps the section index so reassembly never depends on completion order.

use image::{DynamicImage, GenericImageView};
use std::ops::Range;

/// A rendered page awaiting transcription.
#[derive(Debug, Clone)]
pub struct PageImage {
    /// 1-based page number.
    pub page_num: usize,
    pub image: DynamicImage,
}

/// One horizontal slice of a page.
#[derive(Debug, Clone)]
pub struct Section {
    /// 0-based position within the page, top to bottom.
    pub index: usize,
    /// Rows of the page covered by this slice.
    pub rows: Range<u32>,
    pub image: DynamicImage,
}

/// Row ranges for a page of `height` rows, each at most `max_height` rows.
///
/// Always returns at least one range; a zero-height page yields `[0..0]`.
pub fn section_ranges(height: u32, max_height: u32) -> Vec<Range<u32>> {
    let max_height = max_height.max(1);
    if height <= max_height {
        return vec![0..height];
    }
    (0..height)
        .step_by(max_height as usize)
        .map(|top| top..(top + max_height).min(height))
        .collect()
}

/// Split a page into sections no taller than `max_height`.
///
/// A page that already fits is returned whole as the only section.
pub fn split_sections(page: &DynamicImage, max_height: u32) -> Vec<Section> {
    let (width, height) = page.dimensions();
    let ranges = section_ranges(height, max_height);
    if ranges.len() == 1 {
        return vec![Section {
            index: 0,
            rows: 0..height,
            image: page.clone(),
        }];
    }
    ranges
        .into_iter()
        .enumerate()
        .map(|(index, rows)| Section {
            index,
            image: page.crop_imm(0, rows.start, width, rows.end - rows.start),
            rows,
        })
        .collect()
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn ranges_tile_any_page(height in 0u32..20_000, max in 1u32..5_000) {
            let ranges = section_ranges(height, max);
            prop_assert!(!ranges.is_empty());
            prop_assert_eq!(ranges[0].start, 0);
            prop_assert_eq!(ranges[ranges.len() - 1].end, height);
            for pair in ranges.windows(2) {
                prop_assert_eq!(pair[0].end, pair[1].start);
                // Only the last range may be shorter than `max`.
                prop_assert_eq!(pair[0].end - pair[0].start, max);
            }
            let last = &ranges[ranges.len() - 1];
            prop_assert!(last.end - last.start <= max);
            prop_assert!(height == 0 || last.end > last.start);
        }
    }
}
