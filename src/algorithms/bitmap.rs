//! Uncompressed 24-bit BMP loading and color-channel histograms.
//!
//! The pixel data is treated as a flat `b, g, r` byte stream. Channel counts
//! map into the shuffle key space as three contiguous bands of 256 keys:
//! blue at `0..256`, green at `256..512`, red at `512..768`.

use crate::algorithm::Algorithm;
use crate::shuffle::Key;
use anyhow::{Context, Result, anyhow, ensure};
use std::collections::BTreeMap;
use std::path::Path;

const CHANNEL_BAND: usize = 256;

/// Reads a BMP file and returns its raw pixel bytes.
///
/// Only the classic uncompressed 24-bit layout is accepted. Row padding is
/// not stripped; for histogram purposes the padding bytes land in the blue
/// band's zero bin, which is negligible against real image data.
pub fn load_bitmap(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read bitmap {}", path.display()))?;

    ensure!(bytes.len() >= 54, "bitmap {} is truncated", path.display());
    ensure!(
        &bytes[0..2] == b"BM",
        "bitmap {} has no BM signature",
        path.display()
    );

    let bits_per_pixel = u16::from_le_bytes([bytes[28], bytes[29]]);
    ensure!(
        bits_per_pixel == 24,
        "bitmap {} uses {} bits per pixel, expected 24",
        path.display(),
        bits_per_pixel
    );

    let compression = u32::from_le_bytes([bytes[30], bytes[31], bytes[32], bytes[33]]);
    ensure!(
        compression == 0,
        "bitmap {} is compressed (method {})",
        path.display(),
        compression
    );

    let pixel_offset = u32::from_le_bytes([bytes[10], bytes[11], bytes[12], bytes[13]]) as usize;
    ensure!(
        pixel_offset <= bytes.len(),
        "bitmap {} declares pixel data past end of file",
        path.display()
    );

    Ok(bytes[pixel_offset..].to_vec())
}

/// Returns the first path matching the glob pattern, in sorted order.
pub fn first_bitmap(pattern: &str) -> Result<String> {
    let mut paths = glob::glob(pattern)
        .with_context(|| format!("invalid glob pattern {pattern}"))?;
    let first = paths
        .next()
        .ok_or_else(|| anyhow!("no file matches {pattern}"))?
        .with_context(|| format!("unreadable match for {pattern}"))?;
    Ok(first.to_string_lossy().into_owned())
}

fn channel_key(position: usize, value: u8) -> Key {
    (position % 3) * CHANNEL_BAND + value as usize
}

/// Counts channel occurrences in a pixel byte stream, keyed into the
/// blue/green/red bands.
#[derive(Default)]
pub struct BitmapHistogram;

impl BitmapHistogram {
    pub fn new() -> Self {
        Self
    }
}

impl Algorithm<Vec<u8>, BTreeMap<Key, u64>> for BitmapHistogram {
    fn compute(&self, pixels: Vec<u8>) -> BTreeMap<Key, u64> {
        let mut counts = BTreeMap::new();
        for (position, value) in pixels.into_iter().enumerate() {
            *counts.entry(channel_key(position, value)).or_insert(0u64) += 1;
        }
        counts
    }

    fn name(&self) -> String {
        "bitmap_histogram".to_string()
    }
}

/// [`BitmapHistogram`] shaped for the shuffle stage: every count is emitted
/// as a single-element list so the per-key lists concatenate across inputs.
#[derive(Default)]
pub struct BitmapHistogramParts;

impl BitmapHistogramParts {
    pub fn new() -> Self {
        Self
    }
}

impl Algorithm<Vec<u8>, BTreeMap<Key, Vec<u64>>> for BitmapHistogramParts {
    fn compute(&self, pixels: Vec<u8>) -> BTreeMap<Key, Vec<u64>> {
        BitmapHistogram
            .compute(pixels)
            .into_iter()
            .map(|(key, count)| (key, vec![count]))
            .collect()
    }

    fn name(&self) -> String {
        "bitmap_histogram_parts".to_string()
    }
}

/// Loads a bitmap by path and histograms it in one step.
///
/// A path that fails to load yields an empty map rather than tearing down the
/// surrounding pattern; the per-key lists simply receive no contribution from
/// that file.
#[derive(Default)]
pub struct BitmapFileHistogram;

impl BitmapFileHistogram {
    pub fn new() -> Self {
        Self
    }
}

impl Algorithm<String, BTreeMap<Key, Vec<u64>>> for BitmapFileHistogram {
    fn compute(&self, path: String) -> BTreeMap<Key, Vec<u64>> {
        match load_bitmap(&path) {
            Ok(pixels) => BitmapHistogramParts.compute(pixels),
            Err(_) => BTreeMap::new(),
        }
    }

    fn name(&self) -> String {
        "bitmap_file_histogram".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal valid 24-bit BMP: 54-byte header followed by `pixels`.
    fn make_bmp(pixels: &[u8]) -> Vec<u8> {
        let mut bytes = vec![0u8; 54];
        bytes[0] = b'B';
        bytes[1] = b'M';
        let total = (54 + pixels.len()) as u32;
        bytes[2..6].copy_from_slice(&total.to_le_bytes());
        bytes[10..14].copy_from_slice(&54u32.to_le_bytes());
        bytes[14..18].copy_from_slice(&40u32.to_le_bytes());
        bytes[28..30].copy_from_slice(&24u16.to_le_bytes());
        bytes[30..34].copy_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(pixels);
        bytes
    }

    #[test]
    fn histogram_splits_channels_into_bands() {
        // Two pixels: (b=1, g=2, r=1) and (b=1, g=3, r=255).
        let counts = BitmapHistogram.compute(vec![1, 2, 1, 1, 3, 255]);
        assert_eq!(counts.get(&1), Some(&2)); // blue value 1, twice
        assert_eq!(counts.get(&(256 + 2)), Some(&1));
        assert_eq!(counts.get(&(256 + 3)), Some(&1));
        assert_eq!(counts.get(&(512 + 1)), Some(&1));
        assert_eq!(counts.get(&(512 + 255)), Some(&1));
        assert_eq!(counts.values().sum::<u64>(), 6);
    }

    #[test]
    fn parts_wrap_counts_in_singleton_lists() {
        let parts = BitmapHistogramParts.compute(vec![7, 7, 7]);
        assert_eq!(parts.get(&7), Some(&vec![1]));
        assert_eq!(parts.get(&(256 + 7)), Some(&vec![1]));
        assert_eq!(parts.get(&(512 + 7)), Some(&vec![1]));
    }

    #[test]
    fn load_bitmap_returns_pixel_bytes() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("one.bmp");
        std::fs::write(&path, make_bmp(&[9, 8, 7]))?;
        assert_eq!(load_bitmap(&path)?, vec![9, 8, 7]);
        Ok(())
    }

    #[test]
    fn load_bitmap_rejects_bad_signature_and_depth() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;

        let bad_magic = dir.path().join("magic.bmp");
        std::fs::write(&bad_magic, vec![0u8; 60])?;
        assert!(load_bitmap(&bad_magic).is_err());

        let bad_depth = dir.path().join("depth.bmp");
        let mut bytes = make_bmp(&[1, 2, 3]);
        bytes[28..30].copy_from_slice(&32u16.to_le_bytes());
        std::fs::write(&bad_depth, bytes)?;
        assert!(load_bitmap(&bad_depth).is_err());
        Ok(())
    }

    #[test]
    fn file_histogram_yields_empty_map_on_error() {
        let counts = BitmapFileHistogram.compute("/no/such/file.bmp".to_string());
        assert!(counts.is_empty());
    }

    #[test]
    fn first_bitmap_finds_a_match() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("a.bmp"), make_bmp(&[0]))?;
        let pattern = format!("{}/*.bmp", dir.path().display());
        let found = first_bitmap(&pattern)?;
        assert!(found.ends_with("a.bmp"));
        assert!(first_bitmap("/no/such/dir/*.bmp").is_err());
        Ok(())
    }
}
