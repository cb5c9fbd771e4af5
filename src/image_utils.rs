use image::{GrayImage, Luma, RgbImage};

/// Value stored for a set pixel in a binary mask
pub const MASK_ON: u8 = 255;

/// Grey level at or above which a pixel counts as set when binarizing
pub const BINARIZE_THRESHOLD: u8 = 128;

/// One byte per pixel, every byte either 0 or 255.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryMask {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl BinaryMask {
    /// Empty (all zero) mask
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; (width as usize) * (height as usize)],
        }
    }

    /// Mask with every pixel set
    pub fn filled(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![MASK_ON; (width as usize) * (height as usize)],
        }
    }

    /// Build a mask by evaluating `predicate` on every pixel index in row-major order
    pub fn from_predicate<F>(width: u32, height: u32, mut predicate: F) -> Self
    where
        F: FnMut(usize) -> bool,
    {
        let len = (width as usize) * (height as usize);
        let data = (0..len)
            .map(|idx| if predicate(idx) { MASK_ON } else { 0 })
            .collect();
        Self { width, height, data }
    }

    /// Binarize a greyscale image: pixels at or above `threshold` become set.
    pub fn from_gray(image: &GrayImage, threshold: u8) -> Self {
        let (width, height) = image.dimensions();
        let data = image
            .as_raw()
            .iter()
            .map(|&v| if v >= threshold { MASK_ON } else { 0 })
            .collect();
        Self { width, height, data }
    }

    pub fn to_gray(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            Luma([self.data[self.index(x, y)]])
        })
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn index(&self, x: u32, y: u32) -> usize {
        (y as usize) * (self.width as usize) + x as usize
    }

    #[inline]
    pub fn is_set(&self, idx: usize) -> bool {
        self.data[idx] == MASK_ON
    }

    #[inline]
    pub fn is_set_at(&self, x: u32, y: u32) -> bool {
        self.is_set(self.index(x, y))
    }

    #[inline]
    pub fn set(&mut self, idx: usize, on: bool) {
        self.data[idx] = if on { MASK_ON } else { 0 };
    }

    /// Number of set pixels
    pub fn count(&self) -> u64 {
        self.data.iter().filter(|&&v| v == MASK_ON).count() as u64
    }

    /// Keep only pixels also set in `other`
    pub fn intersect(&mut self, other: &BinaryMask) {
        debug_assert_eq!(self.dimensions(), other.dimensions());
        for (a, &b) in self.data.iter_mut().zip(other.data.iter()) {
            if b != MASK_ON {
                *a = 0;
            }
        }
    }

    /// Clear pixels that are set in `other`
    pub fn subtract(&mut self, other: &BinaryMask) {
        debug_assert_eq!(self.dimensions(), other.dimensions());
        for (a, &b) in self.data.iter_mut().zip(other.data.iter()) {
            if b == MASK_ON {
                *a = 0;
            }
        }
    }
}

/// Resize an image so that its longer side is at most `max_dimension`.
/// Smaller images are returned unchanged.
pub fn fit_within(image: &RgbImage, max_dimension: u32) -> RgbImage {
    let (width, height) = image.dimensions();
    let longest = width.max(height);
    if max_dimension == 0 || longest <= max_dimension {
        return image.clone();
    }

    let scale = max_dimension as f64 / longest as f64;
    let new_width = ((width as f64 * scale).round() as u32).max(1);
    let new_height = ((height as f64 * scale).round() as u32).max(1);

    image::imageops::resize(
        image,
        new_width,
        new_height,
        image::imageops::FilterType::Triangle,
    )
}

/// Row spans of a disc structuring element.
///
/// Entry `i` is the half-width of the disc on row `dy = i - radius`, so the
/// disc covers `x - half ..= x + half` on that row.
pub fn disc_half_widths(radius: u32) -> Vec<u32> {
    let r = radius as i64;
    let radius_sq = (r * r) as f64;
    (-r..=r)
        .map(|dy| {
            let remaining = radius_sq - (dy * dy) as f64;
            // Epsilon keeps points exactly on the circumference inside
            (remaining + 1e-6).sqrt().floor() as u32
        })
        .collect()
}

/// Check if a point is inside the image bounds
#[inline]
pub fn in_bounds(x: i64, y: i64, width: u32, height: u32) -> bool {
    x >= 0 && y >= 0 && (x as u64) < width as u64 && (y as u64) < height as u64
}
