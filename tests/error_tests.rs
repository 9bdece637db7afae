//! Error taxonomy tests

use sheet_migrate::migrate::{AnchorPair, MigrationPlan, RegionSpec};
use sheet_migrate::MigrateError;

#[test]
fn test_not_found_display() {
    let err = MigrateError::not_found("template workbook", "Planned");
    assert_eq!(err.to_string(), "No 'Planned' tab found in template workbook");
    assert!(err.is_client_error());
}

#[test]
fn test_input_format_display() {
    let err = MigrateError::input_format("source workbook", "not a zip archive");
    assert_eq!(
        err.to_string(),
        "Invalid workbook (source workbook): not a zip archive"
    );
    assert!(err.is_client_error());
}

#[test]
fn test_configuration_display() {
    let err = MigrateError::Configuration("ad hoc anchors must both be named".to_string());
    assert_eq!(
        err.to_string(),
        "Configuration error: ad hoc anchors must both be named"
    );
}

#[test]
fn test_io_and_yaml_are_not_client_errors() {
    let io: MigrateError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
    assert!(!io.is_client_error());
    assert!(io.to_string().starts_with("IO error"));

    let yaml_err = serde_yaml::from_str::<MigrationPlan>("regions: [unclosed").unwrap_err();
    let yaml: MigrateError = yaml_err.into();
    assert!(!yaml.is_client_error());
    assert!(yaml.to_string().starts_with("YAML parsing error"));
}

#[test]
fn test_plan_validation_errors_are_configuration() {
    let inverted = MigrationPlan {
        regions: vec![RegionSpec::new("Assets", 99..=3, 2..=5)],
        ..Default::default()
    };
    assert!(matches!(inverted.validate(), Err(MigrateError::Configuration(_))));

    let same_anchor = MigrationPlan {
        anchors: Some(AnchorPair {
            start: "X".to_string(),
            end: "X".to_string(),
        }),
        ..Default::default()
    };
    assert!(matches!(same_anchor.validate(), Err(MigrateError::Configuration(_))));
}

#[test]
fn test_yaml_plan_with_unknown_policy_fails_to_parse() {
    let err = MigrationPlan::from_yaml_str("sheet_collisions: overwrite\n").unwrap_err();
    assert!(matches!(err, MigrateError::Yaml(_)));
}
