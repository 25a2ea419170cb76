use crate::batch::{parse_batch, to_csv, BatchEntry, BatchResult, BATCH_COLUMNS, MISSING};
use crate::client::Assessment;

use color_eyre::eyre::{Report, Result};
use indoc::indoc;
use ncscore_scoring::{Priority, ScoreComponents};

fn entry(variant: &str, inheritance: &str, segregation: Option<f64>) -> BatchEntry {
    BatchEntry { variant: variant.to_string(), inheritance: inheritance.to_string(), segregation }
}

// ----------------------------------------------------------------------------
// Parse

#[test]
fn parse_batch_lines() -> Result<(), Report> {
    let text = indoc! {"
        # variant\tinheritance\tsegregation
        NM_014251.3:c.1339C>T\tDenovo\t0.95

        17-41197734-C-T\tX-linked recessive
        chr1:55051215:G:GA
        1-55051215-G-GA, Homozygous recessive, 0.001
    "};
    let entries = parse_batch(text, "Unknown")?;
    assert_eq!(
        entries,
        vec![
            entry("NM_014251.3:c.1339C>T", "Denovo", Some(0.95)),
            entry("17-41197734-C-T", "X-linked recessive", None),
            entry("1-55051215-G-GA", "Unknown", None),
            entry("1-55051215-G-GA", "Homozygous recessive", Some(0.001)),
        ]
    );
    assert!(parse_batch("# nothing to score\n\n", "Denovo")?.is_empty());
    Ok(())
}

#[test]
fn parse_batch_invalid_line() -> Result<(), Report> {
    let text = "1-55051215-G-GA\tDenovo\n17-41197734-C-T\tDenovo\t1.5\n";
    let error = parse_batch(text, "Unknown").expect_err("segregation out of range");
    assert!(error.to_string().starts_with("Invalid line 2 of the batch"), "{error}");

    for line in ["\tDenovo", "1-55051215-G-GA\tDominant", "1-55051215-G-GA\tDenovo\t0.5\textra"] {
        assert!(BatchEntry::parse(line, "Unknown").is_err(), "{line:?}");
    }
    Ok(())
}

// ----------------------------------------------------------------------------
// Export

#[test]
fn batch_csv_export() -> Result<(), Report> {
    let components = ScoreComponents { gene_score: 0.6, variant_score: 0.5, inheritance_score: 0.95 };
    let assessed = BatchResult {
        entry: entry("1-55051215-G-GA", "Denovo", None),
        outcome: Ok(Assessment {
            variant: "1-55051215-G-GA".to_string(),
            gene_symbol: "PCSK9".to_string(),
            inheritance: "Denovo".to_string(),
            segregation: None,
            components,
            ncs: components.ncs(),
            priority: Priority::Moderate,
        }),
    };
    let failed = BatchResult {
        entry: entry("not-a-variant", "Homozygous recessive", Some(0.5)),
        outcome: Err("Invalid variant format, please check, input".to_string()),
    };

    let csv = to_csv(&[assessed, failed.clone()])?;
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], BATCH_COLUMNS.join(","));
    assert_eq!(lines[1], "1-55051215-G-GA,PCSK9,Denovo,NA,0.6,0.5,0.95,6.3,Moderate Priority,");
    // the error is quoted, it holds the delimiter
    assert_eq!(
        lines[2],
        r#"not-a-variant,NA,Homozygous recessive,0.5,NA,NA,NA,NA,NA,"Invalid variant format, please check, input""#
    );
    assert_eq!(failed.record().len(), BATCH_COLUMNS.len());
    assert_eq!(failed.record().iter().filter(|cell| *cell == MISSING).count(), 6);
    Ok(())
}
