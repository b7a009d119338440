//! The "jet" colormap.

/// Piecewise-linear segments `(position, value)` for one channel.
type Segments = &'static [(f64, f64)];

const RED: Segments = &[(0.0, 0.0), (0.35, 0.0), (0.66, 1.0), (0.89, 1.0), (1.0, 0.5)];
const GREEN: Segments = &[
    (0.0, 0.0),
    (0.125, 0.0),
    (0.375, 1.0),
    (0.64, 1.0),
    (0.91, 0.0),
    (1.0, 0.0),
];
const BLUE: Segments = &[(0.0, 0.5), (0.11, 1.0), (0.34, 1.0), (0.65, 0.0), (1.0, 0.0)];

/// Number of entries in the lookup table.
pub const LUT_SIZE: usize = 256;

/// Blue-to-red colormap for attention values in `[0, 1]`.
///
/// The segment data is sampled into a 256-entry lookup table; `0` maps to dark
/// blue `(0, 0, 127)` and `1` to dark red `(127, 0, 0)`.
#[derive(Debug, Clone)]
pub struct JetColormap {
    lut: [[u8; 3]; LUT_SIZE],
}

impl Default for JetColormap {
    fn default() -> Self {
        Self::new()
    }
}

impl JetColormap {
    /// Build the lookup table.
    #[must_use]
    pub fn new() -> Self {
        let mut lut = [[0u8; 3]; LUT_SIZE];
        // Sample positions as `linspace(0, 1, 256)` produces them.
        let step = 1.0 / (LUT_SIZE - 1) as f64;
        for (i, entry) in lut.iter_mut().enumerate() {
            let x = i as f64 * step;
            *entry = [RED, GREEN, BLUE].map(|segments| (interpolate(segments, x) * 255.0) as u8);
        }
        Self { lut }
    }

    /// Color for an attention value.
    ///
    /// Values are clamped to `[0, 1]`; NaN maps to the lowest color.
    #[must_use]
    pub fn map(&self, value: f32) -> [u8; 3] {
        let index = if value.is_nan() || value <= 0.0 {
            0
        } else {
            ((value * LUT_SIZE as f32) as usize).min(LUT_SIZE - 1)
        };
        self.lut[index]
    }

    /// Raw lookup table entry.
    #[must_use]
    pub fn entry(&self, index: u8) -> [u8; 3] {
        self.lut[index as usize]
    }
}

fn interpolate(segments: Segments, x: f64) -> f64 {
    for pair in segments.windows(2) {
        let (x0, y0) = pair[0];
        let (x1, y1) = pair[1];
        if x <= x1 {
            if x1 <= x0 {
                return y1;
            }
            let t = ((x - x0) / (x1 - x0)).clamp(0.0, 1.0);
            return (t * (y1 - y0) + y0).clamp(0.0, 1.0);
        }
    }
    segments.last().map(|&(_, y)| y).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints() {
        let jet = JetColormap::new();
        assert_eq!(jet.map(0.0), [0, 0, 127]);
        assert_eq!(jet.map(1.0), [127, 0, 0]);
    }

    #[test]
    fn test_midpoint_is_green() {
        let jet = JetColormap::new();
        let [r, g, b] = jet.map(0.5);
        assert!(g > 240);
        assert!(r < 160 && b < 160);
    }

    #[test]
    fn test_reference_entries() {
        let jet = JetColormap::new();
        let expected: [(u8, [u8; 3]); 9] = [
            (32, [0, 0, 255]),
            (64, [0, 128, 255]),
            (96, [21, 255, 225]),
            (127, [121, 255, 125]),
            (128, [125, 255, 121]),
            (174, [255, 215, 0]),
            (201, [255, 115, 0]),
            (224, [255, 29, 0]),
            (228, [250, 15, 0]),
        ];
        for (index, color) in expected {
            assert_eq!(jet.entry(index), color, "entry {index}");
        }
    }

    #[test]
    fn test_out_of_range_clamped() {
        let jet = JetColormap::new();
        assert_eq!(jet.map(-3.0), jet.map(0.0));
        assert_eq!(jet.map(f32::NAN), jet.map(0.0));
        assert_eq!(jet.map(7.5), jet.map(1.0));
        assert_eq!(jet.map(f32::INFINITY), jet.entry(255));
    }

    #[test]
    fn test_blue_decreases_in_upper_half() {
        let jet = JetColormap::new();
        let blues: Vec<u8> = (128..=255u8).map(|i| jet.entry(i)[2]).collect();
        assert!(blues.windows(2).all(|w| w[1] <= w[0]));
    }
}
