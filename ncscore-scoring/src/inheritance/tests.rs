use crate::inheritance::{compute_variant_score, InheritanceConfig, InheritancePattern};
use crate::FromJson;

use color_eyre::eyre::{Report, Result};
use std::str::FromStr;
use strum::IntoEnumIterator;

const TOLERANCE: f64 = 1e-12;

#[test]
fn base_score_when_segregation_is_one() -> Result<(), Report> {
    let config = InheritanceConfig::default();
    for (pattern, base_score) in &config.base_scores {
        let observed = config.calculate_inheritance_score(pattern.label(), Some(1.0));
        assert_eq!(observed, *base_score, "{pattern}");
    }
    Ok(())
}

#[test]
fn base_score_when_not_applicable_and_absent() -> Result<(), Report> {
    let config = InheritanceConfig::default();
    for pattern in &config.no_segregation_patterns {
        let observed = config.calculate_inheritance_score(pattern.label(), None);
        assert_eq!(observed, config.base_scores[pattern], "{pattern}");
    }
    Ok(())
}

#[test]
fn segregation_ignored_when_not_applicable() -> Result<(), Report> {
    let config = InheritanceConfig::default();
    let observed = config.calculate_inheritance_score("Denovo", Some(0.0001));
    assert_eq!(observed, 0.95);
    let observed = config.calculate_inheritance_score("Compound heterozygous (suspected)", Some(0.0001));
    assert_eq!(observed, 0.4);
    Ok(())
}

#[test]
fn maximal_evidence_at_gamma() -> Result<(), Report> {
    let config = InheritanceConfig::default();
    let patterns = InheritancePattern::iter()
        .filter(|p| !config.no_segregation_patterns.contains(p))
        .collect::<Vec<_>>();
    assert!(!patterns.is_empty());

    for pattern in patterns {
        let observed = config.calculate_inheritance_score(pattern.label(), Some(config.gamma));
        assert!((observed - 1.0).abs() < TOLERANCE, "{pattern}: {observed}");
        // anything stronger than gamma is capped
        let observed = config.calculate_inheritance_score(pattern.label(), Some(1e-8));
        assert!((observed - 1.0).abs() < TOLERANCE, "{pattern}: {observed}");
    }
    Ok(())
}

#[test]
fn missing_segregation_penalty() -> Result<(), Report> {
    let config = InheritanceConfig::default();
    let patterns = [
        "Homozygous recessive",
        "Compound heterozygous (confirmed)",
        "X-linked recessive",
        "X-linked dominant",
        "Inherited dominant",
    ];
    for pattern in patterns {
        let explicit = config.calculate_inheritance_score(pattern, Some(1.0));
        let missing = config.calculate_inheritance_score(pattern, None);
        assert_eq!(missing, explicit * 0.8, "{pattern}");
    }
    Ok(())
}

#[test]
fn unrecognized_pattern_falls_back() -> Result<(), Report> {
    let config = InheritanceConfig::default();
    assert_eq!(config.calculate_inheritance_score("Mitochondrial", Some(1.0)), 0.1);
    // segregation is expected for unrecognized patterns
    assert_eq!(config.calculate_inheritance_score("Mitochondrial", None), 0.1 * 0.8);
    // the combined X-linked category has no base score in the default config
    assert_eq!(config.calculate_inheritance_score("X-linked", Some(1.0)), 0.1);
    Ok(())
}

#[test]
fn malformed_segregation_is_clamped_or_missing() -> Result<(), Report> {
    let config = InheritanceConfig::default();
    let pattern = "Homozygous recessive";

    // above 1 is clamped to 1, no penalty since a value was supplied
    assert_eq!(config.calculate_inheritance_score(pattern, Some(7.5)), 0.8);
    // below 0 is clamped to 0, maximal evidence
    let observed = config.calculate_inheritance_score(pattern, Some(-3.0));
    assert!((observed - 1.0).abs() < TOLERANCE);
    // NaN is treated as missing
    assert_eq!(config.calculate_inheritance_score(pattern, Some(f64::NAN)), 0.8 * 0.8);
    Ok(())
}

#[test]
fn intermediate_segregation() -> Result<(), Report> {
    let config = InheritanceConfig::default();
    // p = 0.05 => -ln(0.05) / -ln(0.001) = 0.4337
    let observed = config.calculate_inheritance_score("Inherited dominant", Some(0.05));
    let factor = 0.05_f64.ln() / 0.001_f64.ln();
    let expected = 0.4 + 0.6 * factor;
    assert!((observed - expected).abs() < TOLERANCE);
    assert!(observed > 0.4 && observed < 1.0);
    Ok(())
}

#[test]
fn core_transform_rejects_out_of_range() -> Result<(), Report> {
    assert!(compute_variant_score(-0.1, 0.5, 0.001, 1e-10).is_err());
    assert!(compute_variant_score(1.1, 0.5, 0.001, 1e-10).is_err());
    assert!(compute_variant_score(0.5, -0.5, 0.001, 1e-10).is_err());
    assert!(compute_variant_score(0.5, 1.5, 0.001, 1e-10).is_err());
    assert!(compute_variant_score(0.5, f64::NAN, 0.001, 1e-10).is_err());
    assert!(compute_variant_score(0.5, 0.5, 1.0, 1e-10).is_err());
    assert_eq!(compute_variant_score(0.5, 1.0, 0.001, 1e-10)?, 0.5);
    Ok(())
}

#[test]
fn pattern_labels_round_trip() -> Result<(), Report> {
    for pattern in InheritancePattern::iter() {
        assert_eq!(InheritancePattern::from_str(&pattern.to_string())?, pattern);
    }
    assert!(InheritancePattern::from_str("X linked").is_err());
    Ok(())
}

#[test]
fn second_variant_patterns() -> Result<(), Report> {
    let config = InheritanceConfig::default();
    assert!(config.requires_second_variant("Compound heterozygous (confirmed)"));
    assert!(config.requires_second_variant("Compound heterozygous (suspected)"));
    assert!(!config.requires_second_variant("Denovo"));
    assert!(!config.requires_second_variant("nonsense"));
    Ok(())
}

#[test]
fn merged_x_linked_config() -> Result<(), Report> {
    let json = r#"{
        "version": "0.0.9",
        "base_scores": {
            "Denovo": 0.95,
            "Homozygous recessive": 0.8,
            "X-linked": 0.7,
            "Unknown": 0.1
        },
        "no_segregation_patterns": ["Denovo", "Unknown"],
        "requires_second_variant": [],
        "gamma": 0.001,
        "epsilon": 1e-10,
        "missing_segregation_penalty": 1.0,
        "fallback_base_score": 0.1
    }"#;
    let config = InheritanceConfig::from_json(json)?;
    assert_eq!(config.version, "0.0.9");
    assert_eq!(config.calculate_inheritance_score("X-linked", Some(1.0)), 0.7);
    // no penalty in this version
    assert_eq!(config.calculate_inheritance_score("X-linked", None), 0.7);
    // split category is absent
    assert_eq!(config.calculate_inheritance_score("X-linked recessive", Some(1.0)), 0.1);
    Ok(())
}

#[test]
fn invalid_config_is_rejected() -> Result<(), Report> {
    let mut config = InheritanceConfig::default();
    config.gamma = 0.0;
    assert!(config.validate().is_err());

    let mut config = InheritanceConfig::default();
    config.missing_segregation_penalty = 1.2;
    assert!(config.validate().is_err());

    let mut config = InheritanceConfig::default();
    config.base_scores.insert(InheritancePattern::XLinked, -0.1);
    assert!(config.validate().is_err());

    assert!(InheritanceConfig::default().validate().is_ok());
    Ok(())
}
