use crate::prelude::{SyncError, SyncResult};

/// Decoded RGBA frame, row-major, four bytes per pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl PixelBuffer {
    pub fn from_rgba(width: usize, height: usize, data: Vec<u8>) -> SyncResult<Self> {
        let expected = width
            .checked_mul(height)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| SyncError::InvalidInput("pixel buffer dimensions overflow".into()))?;
        if data.len() != expected {
            return Err(SyncError::InvalidInput(format!(
                "expected {} RGBA bytes for {}x{}, got {}",
                expected,
                width,
                height,
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn filled(width: usize, height: usize, rgba: [u8; 4]) -> Self {
        Self {
            width,
            height,
            data: rgba.repeat(width * height),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn rgb(&self, x: usize, y: usize) -> [u8; 3] {
        let idx = (y * self.width + x) * 4;
        match self.data.get(idx..idx + 3) {
            Some(px) => [px[0], px[1], px[2]],
            None => [0, 0, 0],
        }
    }

    pub fn set_rgb(&mut self, x: usize, y: usize, rgb: [u8; 3]) {
        if x >= self.width || y >= self.height {
            return;
        }
        let idx = (y * self.width + x) * 4;
        self.data[idx..idx + 3].copy_from_slice(&rgb);
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_length() {
        assert!(PixelBuffer::from_rgba(2, 2, vec![0; 15]).is_err());
        assert!(PixelBuffer::from_rgba(2, 2, vec![0; 16]).is_ok());
    }

    #[test]
    fn set_and_read_back() {
        let mut buffer = PixelBuffer::filled(3, 2, [0, 0, 0, 255]);
        buffer.set_rgb(2, 1, [10, 20, 30]);
        buffer.set_rgb(9, 9, [1, 1, 1]);
        assert_eq!(buffer.rgb(2, 1), [10, 20, 30]);
        assert_eq!(buffer.rgb(0, 0), [0, 0, 0]);
        assert_eq!(buffer.as_bytes()[23], 255);
    }
}
