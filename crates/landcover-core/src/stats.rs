//! Per-class pixel histogram and areal statistics.
//!
//! Percentages are shares of the whole scene: the denominator is
//! `width * height`, no-data pixels included.
#[cfg(feature = "threading")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::raster::{ClassId, RasterDataset, NO_DATA};

/// Square metres per square kilometre. Resolution is taken to be in metres.
const M2_PER_KM2: f64 = 1e6;

const N_BUCKETS: usize = ClassId::MAX as usize + 1;

#[cfg(feature = "threading")]
const CHUNK_PIXELS: usize = 1 << 18;

/// Area and share of one class in one year's raster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassStat {
    pub class_id: ClassId,
    pub pixel_count: u64,
    pub area_km2: f64,
    /// Share of the whole scene, rounded to 2 decimals.
    pub percent: f64,
}

impl ClassStat {
    /// Area rounded to 2 decimals, as shown in tables.
    pub fn area_km2_rounded(&self) -> f64 {
        round2(self.area_km2)
    }
}

/// Dense pixel counts for every possible class id.
#[derive(Debug, Clone)]
pub struct ClassHistogram {
    counts: Vec<u64>,
    total: u64,
}

impl ClassHistogram {
    pub fn count(&self, id: ClassId) -> u64 {
        self.counts[usize::from(id)]
    }

    pub fn no_data(&self) -> u64 {
        self.count(NO_DATA)
    }

    /// All pixels, no-data included.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// `(class, count)` for every non-zero class that occurs, ascending.
    pub fn classes(&self) -> impl Iterator<Item = (ClassId, u64)> + '_ {
        self.counts
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(_, &n)| n > 0)
            .map(|(id, &n)| (id as ClassId, n))
    }
}

fn count_into(counts: &mut [u64], values: &[ClassId]) {
    for &v in values {
        counts[usize::from(v)] += 1;
    }
}

/// Count pixels per class value in a single pass.
pub fn class_histogram(values: &[ClassId]) -> ClassHistogram {
    #[cfg(feature = "threading")]
    let counts = values
        .par_chunks(CHUNK_PIXELS)
        .fold(
            || vec![0u64; N_BUCKETS],
            |mut acc, chunk| {
                count_into(&mut acc, chunk);
                acc
            },
        )
        .reduce(
            || vec![0u64; N_BUCKETS],
            |mut a, b| {
                for (x, y) in a.iter_mut().zip(b) {
                    *x += y;
                }
                a
            },
        );

    #[cfg(not(feature = "threading"))]
    let counts = {
        let mut counts = vec![0u64; N_BUCKETS];
        count_into(&mut counts, values);
        counts
    };

    ClassHistogram { counts, total: values.len() as u64 }
}

/// Round half away from zero to 2 decimal places.
pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Statistics for every non-zero class, ordered by class id.
///
/// An all-no-data raster yields an empty vector.
pub fn aggregate(ds: &RasterDataset) -> Vec<ClassStat> {
    let hist = class_histogram(ds.values());
    stats_from_histogram(&hist, ds.pixel_area())
}

/// Convert a histogram to [`ClassStat`]s. `pixel_area_m2` is the area of one
/// pixel in square metres.
pub fn stats_from_histogram(hist: &ClassHistogram, pixel_area_m2: f64) -> Vec<ClassStat> {
    let total = hist.total();
    if total == 0 {
        return Vec::new();
    }
    hist.classes()
        .map(|(class_id, pixel_count)| ClassStat {
            class_id,
            pixel_count,
            area_km2: pixel_count as f64 * pixel_area_m2 / M2_PER_KM2,
            percent: round2(pixel_count as f64 / total as f64 * 100.0),
        })
        .collect()
}
