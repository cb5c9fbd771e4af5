// src/color.rs - RGB to HSV conversion using the half-range hue convention

/// HSV triple with hue in 0..=180 and saturation/value in 0..=255.
///
/// Hue is halved so a full turn fits in a byte. Every threshold in the
/// colour range tables is calibrated against this convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hsv {
    pub h: u8,
    pub s: u8,
    pub v: u8,
}

impl Hsv {
    pub const fn new(h: u8, s: u8, v: u8) -> Self {
        Self { h, s, v }
    }

    #[inline]
    pub fn channels(&self) -> [u8; 3] {
        [self.h, self.s, self.v]
    }
}

/// Convert an RGB pixel to HSV.
///
/// Total over every input triple. Grey pixels (`r == g == b`) yield zero
/// hue and zero saturation.
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> Hsv {
    let r = r as f64 / 255.0;
    let g = g as f64 / 255.0;
    let b = b as f64 / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let diff = max - min;

    let mut h = 0.0;
    let mut s = 0.0;

    if diff > 0.0 {
        s = diff / max;

        h = if max == r {
            60.0 * (((g - b) / diff) % 6.0)
        } else if max == g {
            60.0 * ((b - r) / diff + 2.0)
        } else {
            60.0 * ((r - g) / diff + 4.0)
        };

        if h < 0.0 {
            h += 360.0;
        }
    }

    Hsv {
        h: (h / 2.0).round() as u8,
        s: (s * 255.0).round() as u8,
        v: (max * 255.0).round() as u8,
    }
}

/// Inclusive HSV box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorRange {
    pub lower: Hsv,
    pub upper: Hsv,
}

impl ColorRange {
    pub const fn new(lower: [u8; 3], upper: [u8; 3]) -> Self {
        Self {
            lower: Hsv::new(lower[0], lower[1], lower[2]),
            upper: Hsv::new(upper[0], upper[1], upper[2]),
        }
    }

    #[inline]
    pub fn contains(&self, hsv: Hsv) -> bool {
        hsv.h >= self.lower.h
            && hsv.h <= self.upper.h
            && hsv.s >= self.lower.s
            && hsv.s <= self.upper.s
            && hsv.v >= self.lower.v
            && hsv.v <= self.upper.v
    }

    /// True when `lower <= upper` on every channel.
    pub fn is_well_formed(&self) -> bool {
        self.lower
            .channels()
            .iter()
            .zip(self.upper.channels().iter())
            .all(|(lo, hi)| lo <= hi)
    }
}
