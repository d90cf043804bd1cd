//! Automated basic color correction for 8-bit RGB imagery.
//!
//! Three adjustments, applied in order:
//!
//! 1. **Expand histogram**: find the low/high percentiles of all non-zero
//!    samples, step each back toward its extreme by `cut_frac`, then rescale
//!    that range to black..white.
//! 2. **Adjust contrast**: gamma lookup (`gamma < 1` brightens).
//! 3. **Balance colors**: for each channel separately, step back the
//!    `color_percentile` value by `cut_frac` and rescale it to white.
//!
//! Scaling directly to histogram percentiles tends to posterize, or to key
//! off a long outlying tail. Stepping the reference values back by
//! `cut_frac` keeps scenes without true blacks or whites from being
//! over-stretched. The balance reference sits well inside the histogram
//! (95th percentile by default) so one channel's bright tail does not skew
//! the others.
//!
//! Steps 1 and 2 can be roughly undone by hand. Step 3 cannot, because the
//! original channel balance is lost, so [`ColorCorrect::brightness_and_contrast`]
//! omits it for images that will be finished manually.
//!
//! Zero is nodata and never participates in percentile calculations.

mod histogram;

use crate::config::ColorConfig;
use histogram::{CHUNK_PIXELS, channel_histograms, combined};
use image::RgbImage;
use rayon::prelude::*;
use serde::Serialize;
use tracing::warn;

pub use histogram::Histogram;

/// Maximum 8-bit sample value.
const WHITE: f64 = 255.0;

type Lut = [u8; 256];

/// Color correction parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorCorrect {
    /// Low/high histogram reference percentiles.
    pub percentiles: (f64, f64),
    /// High reference percentile for an individual channel.
    pub color_percentile: f64,
    /// Factor by which reference values are shifted before cutting.
    pub cut_frac: f64,
    /// Gamma correction exponent.
    pub gamma: f64,
}

impl Default for ColorCorrect {
    fn default() -> Self {
        Self {
            percentiles: (1.0, 99.0),
            color_percentile: 95.0,
            cut_frac: 0.75,
            gamma: 0.75,
        }
    }
}

impl From<&ColorConfig> for ColorCorrect {
    fn from(config: &ColorConfig) -> Self {
        Self {
            percentiles: (config.percentiles[0], config.percentiles[1]),
            color_percentile: config.color_percentile,
            cut_frac: config.cut_frac,
            gamma: config.gamma,
        }
    }
}

/// Cut values actually applied, for logging.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CorrectionReport {
    pub black_point: Option<f64>,
    pub white_point: Option<f64>,
    pub channel_white_points: Option<[f64; 3]>,
}

impl ColorCorrect {
    /// Rescale intensities, enhance contrast, and balance colors.
    pub fn correct(&self, img: &mut RgbImage) -> CorrectionReport {
        let mut report = self.expand_histogram(img);
        self.adjust_contrast(img);
        report.channel_white_points = Some(self.balance_colors(img));
        report
    }

    /// Rescale intensities and enhance contrast.
    pub fn brightness_and_contrast(&self, img: &mut RgbImage) -> CorrectionReport {
        let report = self.expand_histogram(img);
        self.adjust_contrast(img);
        report
    }

    fn expand_histogram(&self, img: &mut RgbImage) -> CorrectionReport {
        let all = combined(&channel_histograms(img.as_raw()));
        let (Some(low), Some(high)) = (
            all.percentile(self.percentiles.0),
            all.percentile(self.percentiles.1),
        ) else {
            warn!("image has no non-zero samples; histogram left as is");
            return CorrectionReport::default();
        };
        let low = self.renorm_lowcut(low);
        let high = self.renorm_highcut(high);
        let lut = rescale_lut(low, high);
        apply_luts(img, &[lut, lut, lut]);
        CorrectionReport {
            black_point: Some(low),
            white_point: Some(high),
            channel_white_points: None,
        }
    }

    fn adjust_contrast(&self, img: &mut RgbImage) {
        let lut = gamma_lut(self.gamma);
        apply_luts(img, &[lut, lut, lut]);
    }

    fn balance_colors(&self, img: &mut RgbImage) -> [f64; 3] {
        let hists = channel_histograms(img.as_raw());
        let mut cuts = [WHITE; 3];
        let mut luts = [identity_lut(); 3];
        for (c, hist) in hists.iter().enumerate() {
            if let Some(reference) = hist.percentile(self.color_percentile) {
                cuts[c] = self.renorm_highcut(reference);
                luts[c] = rescale_lut(0.0, cuts[c]);
            }
        }
        apply_luts(img, &luts);
        cuts
    }

    /// Shift a low cut toward zero.
    fn renorm_lowcut(&self, cut: f64) -> f64 {
        cut * self.cut_frac
    }

    /// Shift a high cut toward white, rounded half-to-even to a whole
    /// sample value.
    fn renorm_highcut(&self, cut: f64) -> f64 {
        (WHITE - self.cut_frac * (WHITE - cut)).round_ties_even()
    }
}

fn identity_lut() -> Lut {
    std::array::from_fn(|v| v as u8)
}

/// Linear map `[low, high] → [0, 255]`, clipping outside the range.
///
/// A degenerate range thresholds at `high`.
fn rescale_lut(low: f64, high: f64) -> Lut {
    std::array::from_fn(|v| {
        let v = v as f64;
        if high <= low {
            return if v >= high { 255 } else { 0 };
        }
        ((v.clamp(low, high) - low) / (high - low) * WHITE) as u8
    })
}

/// `round(255 * (v / 255) ^ gamma)`.
fn gamma_lut(gamma: f64) -> Lut {
    std::array::from_fn(|v| (WHITE * (v as f64 / WHITE).powf(gamma)).round() as u8)
}

fn apply_luts(img: &mut RgbImage, luts: &[Lut; 3]) {
    let buf: &mut [u8] = img;
    buf.par_chunks_mut(CHUNK_PIXELS * 3).for_each(|chunk| {
        for px in chunk.chunks_exact_mut(3) {
            px[0] = luts[0][px[0] as usize];
            px[1] = luts[1][px[1] as usize];
            px[2] = luts[2][px[2] as usize];
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    /// A gradient occupying the middle of the tonal range.
    fn flat_scene() -> RgbImage {
        RgbImage::from_fn(64, 64, |x, y| {
            let v = (60 + (x + y) as u32 * 80 / 126) as u8;
            Rgb([v, v, v])
        })
    }

    #[test]
    fn default_parameters() {
        let cc = ColorCorrect::default();
        assert_eq!(cc.percentiles, (1.0, 99.0));
        assert_eq!(cc.color_percentile, 95.0);
        assert_eq!(cc.cut_frac, 0.75);
        assert_eq!(cc.gamma, 0.75);
    }

    #[test]
    fn from_config_copies_values() {
        let config = ColorConfig {
            percentiles: [2.0, 98.0],
            color_percentile: 90.0,
            cut_frac: 0.5,
            gamma: 0.9,
        };
        let cc = ColorCorrect::from(&config);
        assert_eq!(cc.percentiles, (2.0, 98.0));
        assert_eq!(cc.color_percentile, 90.0);
        assert_eq!(cc.cut_frac, 0.5);
        assert_eq!(cc.gamma, 0.9);
    }

    #[test]
    fn renorm_cuts_step_back_toward_extremes() {
        let cc = ColorCorrect::default();
        assert_eq!(cc.renorm_lowcut(40.0), 30.0);
        // 255 - 0.75 * (255 - 200) = 213.75 → 214
        assert_eq!(cc.renorm_highcut(200.0), 214.0);
        assert_eq!(cc.renorm_highcut(255.0), 255.0);
    }

    #[test]
    fn renorm_highcut_ties_round_to_even() {
        let cc = ColorCorrect::default();
        // 255 - 0.75 * 6 = 250.5 → 250
        assert_eq!(cc.renorm_highcut(249.0), 250.0);
        // 255 - 0.75 * 10 = 247.5 → 248
        assert_eq!(cc.renorm_highcut(245.0), 248.0);
    }

    #[test]
    fn rescale_lut_clips_and_stretches() {
        let lut = rescale_lut(50.0, 150.0);
        assert_eq!(lut[0], 0);
        assert_eq!(lut[50], 0);
        assert_eq!(lut[100], 127);
        assert_eq!(lut[150], 255);
        assert_eq!(lut[220], 255);
    }

    #[test]
    fn rescale_lut_degenerate_range_thresholds() {
        let lut = rescale_lut(120.0, 120.0);
        assert_eq!(lut[119], 0);
        assert_eq!(lut[120], 255);
    }

    #[test]
    fn gamma_lut_keeps_endpoints_and_brightens() {
        let lut = gamma_lut(0.75);
        assert_eq!(lut[0], 0);
        assert_eq!(lut[255], 255);
        assert!(lut[128] > 128);
        let darker = gamma_lut(1.5);
        assert!(darker[128] < 128);
    }

    #[test]
    fn gamma_one_is_identity() {
        assert_eq!(gamma_lut(1.0), identity_lut());
    }

    #[test]
    fn brightness_and_contrast_widens_range() {
        let mut img = flat_scene();
        let report = ColorCorrect::default().brightness_and_contrast(&mut img);

        let black = report.black_point.unwrap();
        let white = report.white_point.unwrap();
        assert!(black < 60.0);
        assert!(white > 140.0 && white < 255.0);
        assert!(report.channel_white_points.is_none());

        let min = *img.as_raw().iter().min().unwrap();
        let max = *img.as_raw().iter().max().unwrap();
        assert!(min < 60, "min {min}");
        assert!(max > 140, "max {max}");
    }

    #[test]
    fn all_black_image_is_unchanged() {
        let mut img = RgbImage::new(8, 8);
        let report = ColorCorrect::default().correct(&mut img);
        assert_eq!(report.black_point, None);
        assert_eq!(report.white_point, None);
        assert_eq!(report.channel_white_points, Some([WHITE; 3]));
        assert!(img.as_raw().iter().all(|&v| v == 0));
    }

    #[test]
    fn nodata_stays_black() {
        let mut img = flat_scene();
        img.put_pixel(0, 0, Rgb([0, 0, 0]));
        ColorCorrect::default().correct(&mut img);
        assert_eq!(img.get_pixel(0, 0), &Rgb([0, 0, 0]));
    }

    #[test]
    fn balance_lifts_the_dimmer_channel_more() {
        // Red peaks around 100, blue around 200.
        let mut img = RgbImage::from_fn(50, 50, |x, _| {
            let t = x as u8;
            Rgb([50 + t, 100 + t, 150 + t])
        });
        let before = img.clone();
        let cc = ColorCorrect {
            gamma: 1.0,
            ..ColorCorrect::default()
        };
        let mut balanced = img.clone();
        let report = cc.correct(&mut balanced);
        cc.brightness_and_contrast(&mut img);

        let cuts = report.channel_white_points.unwrap();
        assert!(cuts[0] < cuts[2], "cuts {cuts:?}");

        let gain = |a: &RgbImage, b: &RgbImage, c: usize| -> i32 {
            a.pixels()
                .zip(b.pixels())
                .map(|(x, y)| x[c] as i32 - y[c] as i32)
                .sum()
        };
        // Balance is applied on top of the expanded image
        assert!(gain(&balanced, &img, 0) > gain(&balanced, &img, 2));
        assert_ne!(before.as_raw(), balanced.as_raw());
    }
}
