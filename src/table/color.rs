//! Pixel classification for the reference table.
//!
//! Each diameter column has a fill color; the selection marker is a saturated
//! red that shares its hue with the Ø5.0 column.

use std::ops::Range;

/// Minimum red channel for selection red.
const RED_MIN_R: u8 = 155;
/// Maximum green and blue channels for selection red.
const RED_MAX_GB: u8 = 85;

const YELLOW_MIN_R: u8 = 155;
const YELLOW_MIN_G: u8 = 150;
const YELLOW_MAX_B: u8 = 100;

const ORANGE_MIN_R: u8 = 155;
const ORANGE_G: Range<u8> = 75..150;
const ORANGE_MAX_B: u8 = 75;

const GREEN_MAX_R: u8 = 110;
const GREEN_MIN_G: u8 = 110;
const GREEN_MAX_B: u8 = 110;

const BLUE_MAX_R: u8 = 110;
const BLUE_MAX_G: u8 = 160;
const BLUE_MIN_B: u8 = 120;

/// Ø5.0 fill; slightly wider than selection red on the red channel.
const RED_BAND_MIN_R: u8 = 150;
const RED_BAND_MAX_GB: u8 = 85;

/// Column fill color, one per implant diameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ColorBand {
    Orange,
    Yellow,
    Green,
    Blue,
    Red,
}

impl ColorBand {
    /// All bands in column order (left to right).
    pub const ALL: [ColorBand; 5] = [
        ColorBand::Orange,
        ColorBand::Yellow,
        ColorBand::Green,
        ColorBand::Blue,
        ColorBand::Red,
    ];

    pub fn diameter(self) -> &'static str {
        match self {
            ColorBand::Orange => "3.0",
            ColorBand::Yellow => "3.5",
            ColorBand::Green => "4.0",
            ColorBand::Blue => "4.5",
            ColorBand::Red => "5.0",
        }
    }

    fn index(self) -> usize {
        match self {
            ColorBand::Orange => 0,
            ColorBand::Yellow => 1,
            ColorBand::Green => 2,
            ColorBand::Blue => 3,
            ColorBand::Red => 4,
        }
    }
}

/// True for the saturated red of the selection marker.
pub fn is_selection_red(r: u8, g: u8, b: u8) -> bool {
    r > RED_MIN_R && g < RED_MAX_GB && b < RED_MAX_GB
}

/// Maps a pixel to its column band. Checks run in a fixed order and the first
/// match wins; yellow is tested before orange.
pub fn classify(r: u8, g: u8, b: u8) -> Option<ColorBand> {
    if r > YELLOW_MIN_R && g > YELLOW_MIN_G && b < YELLOW_MAX_B {
        Some(ColorBand::Yellow)
    } else if r > ORANGE_MIN_R && ORANGE_G.contains(&g) && b < ORANGE_MAX_B {
        Some(ColorBand::Orange)
    } else if r < GREEN_MAX_R && g > GREEN_MIN_G && b < GREEN_MAX_B {
        Some(ColorBand::Green)
    } else if r < BLUE_MAX_R && g < BLUE_MAX_G && b > BLUE_MIN_B {
        Some(ColorBand::Blue)
    } else if r > RED_BAND_MIN_R && g < RED_BAND_MAX_GB && b < RED_BAND_MAX_GB {
        Some(ColorBand::Red)
    } else {
        None
    }
}

/// Per-band pixel counts from an interior sample.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BandTally {
    counts: [u32; 5],
}

impl BandTally {
    pub fn add(&mut self, band: ColorBand) {
        self.counts[band.index()] += 1;
    }

    pub fn count(&self, band: ColorBand) -> u32 {
        self.counts[band.index()]
    }

    /// Most frequent band, preferring any non-red band over red since red is
    /// also the marker color. Ties go to the leftmost column.
    pub fn dominant(&self) -> Option<ColorBand> {
        let mut best: Option<(ColorBand, u32)> = None;
        for band in ColorBand::ALL.into_iter().filter(|b| *b != ColorBand::Red) {
            let count = self.count(band);
            if count > 0 && best.is_none_or(|(_, c)| count > c) {
                best = Some((band, count));
            }
        }
        best.map(|(band, _)| band).or_else(|| {
            (self.count(ColorBand::Red) > 0).then_some(ColorBand::Red)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_red() {
        assert!(is_selection_red(220, 40, 40));
        assert!(!is_selection_red(155, 40, 40));
        assert!(!is_selection_red(220, 85, 40));
        assert!(!is_selection_red(240, 110, 110));
    }

    #[test]
    fn test_classify_column_colors() {
        assert_eq!(classify(230, 120, 30), Some(ColorBand::Orange));
        assert_eq!(classify(240, 220, 50), Some(ColorBand::Yellow));
        assert_eq!(classify(60, 180, 60), Some(ColorBand::Green));
        assert_eq!(classify(50, 90, 200), Some(ColorBand::Blue));
        assert_eq!(classify(220, 40, 40), Some(ColorBand::Red));
        assert_eq!(classify(255, 255, 255), None);
        assert_eq!(classify(0, 0, 0), None);
    }

    #[test]
    fn test_classify_order_yellow_before_orange() {
        // Orange stops below g = 150, yellow starts above it
        assert_eq!(classify(200, 149, 50), Some(ColorBand::Orange));
        assert_eq!(classify(200, 150, 50), None);
        assert_eq!(classify(200, 151, 50), Some(ColorBand::Yellow));
    }

    #[test]
    fn test_band_diameters() {
        let diameters: Vec<_> = ColorBand::ALL.iter().map(|b| b.diameter()).collect();
        assert_eq!(diameters, vec!["3.0", "3.5", "4.0", "4.5", "5.0"]);
    }

    #[test]
    fn test_dominant_prefers_non_red() {
        let mut tally = BandTally::default();
        for _ in 0..50 {
            tally.add(ColorBand::Red);
        }
        tally.add(ColorBand::Green);
        assert_eq!(tally.dominant(), Some(ColorBand::Green));
    }

    #[test]
    fn test_dominant_red_only_and_empty() {
        let mut tally = BandTally::default();
        assert_eq!(tally.dominant(), None);
        tally.add(ColorBand::Red);
        assert_eq!(tally.dominant(), Some(ColorBand::Red));
    }

    #[test]
    fn test_dominant_majority_and_ties() {
        let mut tally = BandTally::default();
        tally.add(ColorBand::Blue);
        tally.add(ColorBand::Blue);
        tally.add(ColorBand::Yellow);
        assert_eq!(tally.dominant(), Some(ColorBand::Blue));

        tally.add(ColorBand::Yellow);
        assert_eq!(tally.dominant(), Some(ColorBand::Yellow));
    }
}
