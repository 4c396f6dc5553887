//! Single-channel boolean image used for classification results and the
//! warp validity mask.

/// A row-major boolean image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryMask {
    width: u32,
    height: u32,
    data: Vec<bool>,
}

impl BinaryMask {
    /// An all-`false` mask.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![false; width as usize * height as usize],
        }
    }

    /// Build a mask by evaluating `f(col, row)` for every pixel.
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> bool) -> Self {
        let mut data = Vec::with_capacity(width as usize * height as usize);
        for row in 0..height {
            for col in 0..width {
                data.push(f(col, row));
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Value at (`col`, `row`); out-of-bounds reads are `false`.
    pub fn get(&self, col: u32, row: u32) -> bool {
        if col >= self.width || row >= self.height {
            return false;
        }
        self.data[row as usize * self.width as usize + col as usize]
    }

    pub fn set(&mut self, col: u32, row: u32, value: bool) {
        if col < self.width && row < self.height {
            self.data[row as usize * self.width as usize + col as usize] = value;
        }
    }

    /// Number of `true` pixels.
    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&v| v).count()
    }

    /// Iterate over the `(col, row)` coordinates of every `true` pixel in
    /// row-major order.
    pub fn iter_set(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        let width = self.width as usize;
        self.data
            .iter()
            .enumerate()
            .filter(|(_, v)| **v)
            .map(move |(i, _)| ((i % width) as u32, (i / width) as u32))
    }
}
