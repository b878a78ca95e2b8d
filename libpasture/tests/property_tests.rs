use std::io::Cursor;

use image::{ImageOutputFormat, RgbImage};
use pasture::indices::{compute_indices, PixelSample, VegetationIndex};
use pasture::segmentation::{classify, PixelClass};
use pasture::{AnalysisConfig, AnalysisRequest, Analyzer};
use proptest::prelude::*;

fn encode_png(image: &RgbImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(image.clone())
        .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
        .expect("Failed to encode PNG");
    bytes
}

fn small_image() -> impl Strategy<Value = RgbImage> {
    (1u32..12, 1u32..12).prop_flat_map(|(w, h)| {
        proptest::collection::vec(any::<u8>(), (w * h * 3) as usize).prop_map(move |raw| {
            RgbImage::from_raw(w, h, raw).expect("buffer sized to dimensions")
        })
    })
}

fn serial() -> Analyzer {
    Analyzer::new(AnalysisConfig::default().with_parallel(false)).unwrap()
}

proptest! {
    #[test]
    fn indices_stay_in_bounds(r in 0.0f64..=1.0, g in 0.0f64..=1.0, b in 0.0f64..=1.0) {
        let values = compute_indices(r, g, b);
        for index in VegetationIndex::ALL {
            let (lo, hi) = index.bounds();
            let v = values[index.position()];
            prop_assert!(v.is_finite() && v >= lo && v <= hi, "{} = {}", index.name(), v);
        }
    }

    #[test]
    fn more_green_never_leaves_vegetation(r: u8, g: u8, b: u8, extra in 0u8..=255) {
        let greener = g.saturating_add(extra);
        if classify(&PixelSample::from_rgb(r, g, b)) == PixelClass::Vegetation {
            prop_assert_eq!(classify(&PixelSample::from_rgb(r, greener, b)), PixelClass::Vegetation);
        }
    }

    #[test]
    fn results_respect_ranges(image in small_image()) {
        let bytes = encode_png(&image);
        let result = serial().analyze(AnalysisRequest::new(&bytes, "image/png")).unwrap();

        prop_assert!(result.vegetation_indices.is_within_bounds());
        let c = &result.coverage;
        for pct in [c.vegetation_pct, c.bare_pct, c.dead_pct, c.shadow_pct] {
            prop_assert!((0.0..=100.0).contains(&pct));
        }
        prop_assert!((c.vegetation_pct + c.bare_pct + c.dead_pct - 100.0).abs() <= 0.5);

        let bio = &result.biomass;
        prop_assert!(bio.lower_bound <= bio.value && bio.value <= bio.upper_bound);
        prop_assert!(bio.lower_bound >= 0.0);
        prop_assert!((0.0..=1.0).contains(&bio.confidence));
        prop_assert!((0.0..=1.0).contains(&result.health.confidence));
        prop_assert!((0.0..=100.0).contains(&result.health.score));
        prop_assert!(result.feature_vector.is_finite());
    }

    #[test]
    fn greener_image_scores_no_lower(image in small_image(), extra in 1u8..=60) {
        let mut boosted = image.clone();
        for pixel in boosted.pixels_mut() {
            pixel.0[1] = pixel.0[1].saturating_add(extra);
        }
        let analyzer = serial();
        let before = analyzer.analyze(AnalysisRequest::new(&encode_png(&image), "image/png")).unwrap();
        let after = analyzer.analyze(AnalysisRequest::new(&encode_png(&boosted), "image/png")).unwrap();

        prop_assert!(after.coverage.vegetation_pct >= before.coverage.vegetation_pct);
        prop_assert!(
            after.health.score >= before.health.score - 1e-9,
            "score {} -> {}",
            before.health.score,
            after.health.score
        );
    }
}
