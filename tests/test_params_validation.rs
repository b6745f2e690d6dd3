// tests/test_params_validation.rs
// The configuration surface: every documented range edge accepts, and
// everything just outside rejects.

use umbra::shadows::params::{
    ShadowParams, MAP_SIZES, PCF_SAMPLE_BUCKETS, PCSS_BLOCKER_BUCKETS,
};
use umbra::ShadowTechnique;

fn valid() -> ShadowParams {
    ShadowParams::default()
}

#[test]
fn every_enumerated_map_size_is_accepted() {
    for size in MAP_SIZES {
        let mut params = valid();
        params.map_size = size;
        assert!(params.validate().is_ok(), "map_size {}", size);
    }
}

#[test]
fn off_grid_map_sizes_are_rejected() {
    for size in [0, 256, 768, 1025, 4608, 8192] {
        let mut params = valid();
        params.map_size = size;
        assert!(params.validate().is_err(), "map_size {}", size);
    }
}

#[test]
fn bias_edges() {
    let mut params = valid();
    params.bias = 0.001;
    assert!(params.validate().is_ok());
    params.bias = 0.02;
    assert!(params.validate().is_ok());
    params.bias = 0.0009;
    assert!(params.validate().is_err());
    params.bias = 0.021;
    assert!(params.validate().is_err());
}

#[test]
fn pcf_radius_edges() {
    let mut params = valid();
    params.pcf_radius = 0.5;
    assert!(params.validate().is_ok());
    params.pcf_radius = 5.0;
    assert!(params.validate().is_ok());
    params.pcf_radius = 0.4;
    assert!(params.validate().is_err());
    params.pcf_radius = 5.1;
    assert!(params.validate().is_err());
}

#[test]
fn pcf_sample_buckets_are_canonical() {
    for samples in PCF_SAMPLE_BUCKETS {
        let mut params = valid();
        params.pcf_samples = samples;
        assert!(params.validate().is_ok(), "pcf_samples {}", samples);
    }
    for samples in [0, 2, 12, 64] {
        let mut params = valid();
        params.pcf_samples = samples;
        assert!(params.validate().is_err(), "pcf_samples {}", samples);
    }
}

#[test]
fn pcss_light_size_edges() {
    let mut params = valid();
    params.pcss_light_size = 0.01;
    assert!(params.validate().is_ok());
    params.pcss_light_size = 0.2;
    assert!(params.validate().is_ok());
    params.pcss_light_size = 0.005;
    assert!(params.validate().is_err());
    params.pcss_light_size = 0.25;
    assert!(params.validate().is_err());
}

#[test]
fn pcss_blocker_buckets() {
    for samples in PCSS_BLOCKER_BUCKETS {
        let mut params = valid();
        params.pcss_blocker_samples = samples;
        assert!(params.validate().is_ok(), "blocker_samples {}", samples);
    }
    for samples in [4, 12, 64] {
        let mut params = valid();
        params.pcss_blocker_samples = samples;
        assert!(params.validate().is_err(), "blocker_samples {}", samples);
    }
}

#[test]
fn vsm_ranges() {
    let mut params = valid();
    params.vsm_min_variance = 1.0e-6;
    assert!(params.validate().is_ok());
    params.vsm_min_variance = 1.0e-3;
    assert!(params.validate().is_ok());
    params.vsm_min_variance = 1.0e-7;
    assert!(params.validate().is_err());
    params.vsm_min_variance = 1.0e-2;
    assert!(params.validate().is_err());

    let mut params = valid();
    params.vsm_light_bleed_reduction = 0.0;
    assert!(params.validate().is_ok());
    params.vsm_light_bleed_reduction = 0.8;
    assert!(params.validate().is_ok());
    params.vsm_light_bleed_reduction = 0.81;
    assert!(params.validate().is_err());
    params.vsm_light_bleed_reduction = -0.1;
    assert!(params.validate().is_err());
}

#[test]
fn shadow_strength_allows_over_darkening_up_to_two() {
    let mut params = valid();
    params.shadow_strength = 0.0;
    assert!(params.validate().is_ok());
    params.shadow_strength = 2.0;
    assert!(params.validate().is_ok());
    params.shadow_strength = 2.1;
    assert!(params.validate().is_err());
    params.shadow_strength = -0.1;
    assert!(params.validate().is_err());
}

#[test]
fn defaults_are_valid_for_every_technique() {
    for technique in ShadowTechnique::ALL {
        let params = ShadowParams::new(technique);
        assert!(params.validate().is_ok(), "{:?}", technique);
    }
}
