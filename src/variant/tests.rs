use crate::variant::{is_hgvs, normalize_variant, validate_segregation, validate_variant, VcfVariant};

use color_eyre::eyre::{Report, Result};

#[test]
fn normalize_vcf_delimiters() -> Result<(), Report> {
    for input in ["1-55051215-G-GA", "1:55051215:G:GA", "1 55051215 G GA", "chr1-55051215-G-GA", " CHR1:55051215:g:ga "] {
        assert_eq!(normalize_variant(input), "1-55051215-G-GA", "{input:?}");
    }
    assert_eq!(normalize_variant("chrX-100-A-T"), "X-100-A-T");
    Ok(())
}

#[test]
fn normalize_mixed_delimiters_unchanged() -> Result<(), Report> {
    assert_eq!(normalize_variant("1-55051215:G:GA"), "1-55051215:G:GA");
    assert!(validate_variant("1-55051215:G:GA").is_err());
    Ok(())
}

#[test]
fn normalize_hgvs_whitespace() -> Result<(), Report> {
    assert_eq!(normalize_variant(" NM_001009944.3:c.11935 C > T "), "NM_001009944.3:c.11935C>T");
    assert_eq!(normalize_variant("ENST00000262304.c.11935C>T"), "ENST00000262304.c.11935C>T");
    assert_eq!(normalize_variant(""), "");
    Ok(())
}

#[test]
fn validate_versioned_ensembl_transcripts() -> Result<(), Report> {
    for input in ["ENST00000262304.9:c.11935C>T", "ENST00000262304.12:p.Arg3979Cys", "ENST00000262304.c.11935C>T"] {
        assert!(validate_variant(input).is_ok(), "{input:?}");
        assert!(is_hgvs(input), "{input:?}");
    }
    assert_eq!(normalize_variant("ENST00000262304.9:c.11935 C>T"), "ENST00000262304.9:c.11935C>T");
    assert!(validate_variant("ENST00000262304.9.c").is_err());
    Ok(())
}

#[test]
fn validate_variant_forms() -> Result<(), Report> {
    for input in [
        "1-55051215-G-GA",
        "chrM:3243:A:G",
        "NM_001009944.3:c.11935C>T",
        "NM_001009944:c.11935C>T",
        "ENST00000262304:p.Arg3979Cys",
    ] {
        assert!(validate_variant(input).is_ok(), "{input:?}");
    }
    for input in ["", "   ", "NPHS1", "1-55051215-G", "1-55051215-G-N", "NM_001009944.3:x.11935C>T", "NM_001009944.3:c.1:2"] {
        assert!(validate_variant(input).is_err(), "{input:?}");
    }
    Ok(())
}

#[test]
fn vcf_region() -> Result<(), Report> {
    let variant = VcfVariant::parse("1-55051215-G-GA").expect("valid variant");
    assert_eq!(variant.pos, 55051215);
    assert_eq!(variant.to_region(), "1 55051215 . G GA . . .");
    assert!(!is_hgvs("1-55051215-G-GA"));
    assert!(is_hgvs("NM_001009944.3:c.11935C>T"));
    Ok(())
}

#[test]
fn validate_segregation_messages() -> Result<(), Report> {
    assert_eq!(validate_segregation(" ")?, None);
    assert_eq!(validate_segregation("0")?, Some(0.0));
    assert_eq!(validate_segregation("1")?, Some(1.0));

    let error = validate_segregation("abc").expect_err("not a number");
    assert_eq!(error.to_string(), "Segregation must be a number");
    let error = validate_segregation("NaN").expect_err("not a number");
    assert_eq!(error.to_string(), "Segregation must be a number");
    let error = validate_segregation("-0.1").expect_err("out of range");
    assert_eq!(error.to_string(), "Segregation must be between 0 and 1");
    Ok(())
}
