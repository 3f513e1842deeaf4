//! RGB framebuffer
//!
//! The PPU overwrites every pixel on each render pass. Hosts get frames by
//! copy ([`crate::Emulator::get_frame`]) or through a [`SharedFrame`] when the
//! emulator runs on a different thread than the presentation layer.

use std::sync::{Arc, PoisonError, RwLock};

use crate::{SCREEN_HEIGHT, SCREEN_WIDTH};

/// One pixel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    /// Pack as 0x00RRGGBB
    pub fn to_u32(self) -> u32 {
        (u32::from(self.0) << 16) | (u32::from(self.1) << 8) | u32::from(self.2)
    }
}

/// Fixed-size 256x240 RGB image, row-major, 3 bytes per pixel
#[derive(Clone, PartialEq, Eq)]
pub struct Framebuffer {
    data: Vec<u8>,
}

impl std::fmt::Debug for Framebuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Framebuffer")
            .field("width", &SCREEN_WIDTH)
            .field("height", &SCREEN_HEIGHT)
            .finish()
    }
}

impl Default for Framebuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Framebuffer {
    /// Black frame
    pub fn new() -> Self {
        Self {
            data: vec![0; SCREEN_WIDTH * SCREEN_HEIGHT * 3],
        }
    }

    /// Pixel at (x, y); out-of-range coordinates read black
    pub fn pixel(&self, x: usize, y: usize) -> Rgb {
        if x >= SCREEN_WIDTH || y >= SCREEN_HEIGHT {
            return Rgb::default();
        }
        let i = (y * SCREEN_WIDTH + x) * 3;
        Rgb(self.data[i], self.data[i + 1], self.data[i + 2])
    }

    pub fn set_pixel(&mut self, x: usize, y: usize, color: Rgb) {
        if x >= SCREEN_WIDTH || y >= SCREEN_HEIGHT {
            return;
        }
        let i = (y * SCREEN_WIDTH + x) * 3;
        self.data[i] = color.0;
        self.data[i + 1] = color.1;
        self.data[i + 2] = color.2;
    }

    pub fn fill(&mut self, color: Rgb) {
        for pixel in self.data.chunks_exact_mut(3) {
            pixel[0] = color.0;
            pixel[1] = color.1;
            pixel[2] = color.2;
        }
    }

    /// Raw RGB bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Pixels packed as 0x00RRGGBB, the layout most window libraries blit
    pub fn to_rgb32(&self) -> Vec<u32> {
        self.data
            .chunks_exact(3)
            .map(|p| Rgb(p[0], p[1], p[2]).to_u32())
            .collect()
    }

    /// Encode as a binary PPM (P6) image
    pub fn to_ppm(&self) -> Vec<u8> {
        let mut out = format!("P6\n{} {}\n255\n", SCREEN_WIDTH, SCREEN_HEIGHT).into_bytes();
        out.extend_from_slice(&self.data);
        out
    }
}

/// A framebuffer slot shared between the emulation thread and a presentation
/// thread. Writers replace the whole frame under the write lock; readers copy
/// it out under the read lock, so a half-written frame is never observed.
#[derive(Debug, Clone, Default)]
pub struct SharedFrame {
    inner: Arc<RwLock<Framebuffer>>,
}

impl SharedFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the published frame
    pub fn publish(&self, frame: &Framebuffer) {
        let mut slot = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        slot.clone_from(frame);
    }

    /// Copy of the last published frame
    pub fn snapshot(&self) -> Framebuffer {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
