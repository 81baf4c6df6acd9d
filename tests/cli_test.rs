//! CLI integration tests for csdl-resolver binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const VOCABULARY_BASE: &str =
    "http://docs.oasis-open.org/odata/odata/v4.0/errata03/csd01/complete/vocabularies";

fn cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("csdl-resolver"))
}

fn fixtures() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn fixture(name: &str) -> String {
    fixtures().join(name).display().to_string()
}

// Helper to create a temp schema file
fn write_temp_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

mod inspect_command {
    use super::*;

    #[test]
    fn summarizes_namespaces() {
        cmd()
            .args(["inspect", &fixture("Drive_v1.xml")])
            .assert()
            .success()
            .stdout(predicate::str::contains("Drive_v1.xml (Edmx 4.0)"))
            .stdout(predicate::str::contains(
                "Drive: 1 entity, 0 complex, 0 enum, 2 actions",
            ))
            .stdout(predicate::str::contains(
                "Drive.v1_0_0: 1 entity, 1 complex, 1 enum, 0 actions",
            ));
    }

    #[test]
    fn json_output() {
        cmd()
            .args(["inspect", &fixture("Resource_v1.xml"), "--json"])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""edmx_version":"4.0""#))
            .stdout(predicate::str::contains(r#""name":"Resource.v1_0_0""#))
            .stdout(predicate::str::contains(r#""failures":[]"#));
    }

    #[test]
    fn follows_references_and_reports_failures() {
        cmd()
            .args([
                "inspect",
                &fixture("metadata.xml"),
                "--follow-references",
                "--local-base",
                &fixture("vocabularies"),
                "--remote-base",
                VOCABULARY_BASE,
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains("Org.OData.Core.V1: 0 entity"))
            .stdout(predicate::str::contains("Drive.v1_1_0: 1 entity"))
            .stdout(predicate::str::contains("warning: not loaded:"))
            .stdout(predicate::str::contains("Chassis_v1.xml"));
    }

    #[test]
    fn json_schema_sources_by_extension() {
        cmd()
            .args([
                "inspect",
                &fixture("Drive_v1.xml"),
                &fixture("json/Drive.v1_1_0.json"),
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains("Drive.v1_0_0: 1 entity"))
            .stdout(predicate::str::contains("Drive.v1_1_0.json (JSON Schema)"))
            .stdout(predicate::str::contains("  Drive: 6 properties"));
    }

    #[test]
    fn malformed_json_schema_source_exit_code_2() {
        let dir = TempDir::new().unwrap();
        let broken = write_temp_file(&dir, "Drive.v1_0_0.json", "{ not json");

        cmd()
            .args(["inspect", broken.to_str().unwrap()])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("invalid JSON"));
    }

    #[test]
    fn json_failures_name_unavailable_namespaces() {
        cmd()
            .args([
                "inspect",
                &fixture("metadata.xml"),
                "--follow-references",
                "--local-base",
                &fixture("vocabularies"),
                "--remote-base",
                VOCABULARY_BASE,
                "--json",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains(
                r#""namespaces":["Chassis","Chassis.v1_0_0"],"kind":"fetch""#,
            ));
    }

    #[test]
    fn reports_inconsistent_namespaces() {
        cmd()
            .args([
                "inspect",
                &fixture("Resource_v1.xml"),
                &fixture("Resource_v1_conflict.xml"),
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains(
                "warning: namespace Resource.v1_0_0 declared differently",
            ));
    }

    #[test]
    fn missing_file_exit_code_3() {
        cmd()
            .args(["inspect", "/nonexistent/Resource_v1.xml"])
            .assert()
            .code(3)
            .stderr(predicate::str::contains("file not found"));
    }

    #[test]
    fn malformed_xml_exit_code_2() {
        let dir = TempDir::new().unwrap();
        let broken = write_temp_file(&dir, "Broken_v1.xml", "<Edmx><DataServices></Edmx>");

        cmd()
            .args(["inspect", broken.to_str().unwrap()])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("invalid XML"));
    }

    #[test]
    fn missing_name_exit_code_2() {
        let dir = TempDir::new().unwrap();
        let invalid = write_temp_file(
            &dir,
            "Invalid_v1.xml",
            r#"<Edmx Version="4.0"><DataServices><Schema Namespace="X"><EntityType/></Schema></DataServices></Edmx>"#,
        );

        cmd()
            .args(["inspect", invalid.to_str().unwrap()])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("missing the Name attribute"));
    }

    #[test]
    fn requires_a_source() {
        cmd().arg("inspect").assert().failure();
    }
}

mod resolve_type_command {
    use super::*;

    #[test]
    fn resolves_to_newest_version() {
        cmd()
            .args([
                "resolve-type",
                "#Drive.v1_0_3.Drive",
                "--schema",
                &fixture("Resource_v1.xml"),
                "--schema",
                &fixture("Drive_v1.xml"),
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains(
                "Drive.v1_1_0.Drive (EntityType) in",
            ));
    }

    #[test]
    fn resolves_complex_type_json() {
        cmd()
            .args([
                "resolve-type",
                "#Resource.v1_0_0.Status",
                "--schema",
                &fixture("Resource_v1.xml"),
                "--json",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""resolved":true"#))
            .stdout(predicate::str::contains(r#""kind":"ComplexType""#));
    }

    #[test]
    fn unknown_type_exit_code_1() {
        cmd()
            .args([
                "resolve-type",
                "#Power.v1_0_0.Power",
                "--schema",
                &fixture("Resource_v1.xml"),
            ])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("Unresolved: #Power.v1_0_0.Power"));
    }

    #[test]
    fn malformed_type_exit_code_1() {
        cmd()
            .args([
                "resolve-type",
                "Drive.Drive",
                "--schema",
                &fixture("Drive_v1.xml"),
                "--json",
            ])
            .assert()
            .code(1)
            .stdout(predicate::str::contains(r#""resolved":false"#));
    }

    #[test]
    fn requires_schema() {
        cmd()
            .args(["resolve-type", "#Drive.v1_0_0.Drive"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("--schema"));
    }
}

mod base_types_command {
    use super::*;

    #[test]
    fn all_resolve() {
        cmd()
            .args([
                "base-types",
                &fixture("Resource_v1.xml"),
                &fixture("Drive_v1.xml"),
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains("All base types resolve"));
    }

    #[test]
    fn reports_dangling_base_types() {
        cmd()
            .args(["base-types", &fixture("Cycle_v1.xml")])
            .assert()
            .code(1)
            .stdout(predicate::str::contains(
                "Cycle.Orphan -> Missing.v1_0_0.Base: namespace not found",
            ))
            .stdout(predicate::str::contains(
                "Cycle.Stray -> Cycle.Nowhere: type not found in namespace",
            ))
            .stdout(predicate::str::contains("Cycle.Alpha").not());
    }

    #[test]
    fn alias_base_needs_referenced_document() {
        cmd()
            .args(["base-types", &fixture("Drive_v1.xml"), "--json"])
            .assert()
            .code(1)
            .stdout(predicate::str::contains(r#""base_type":"Res.Resource""#))
            .stdout(predicate::str::contains(r#""namespace_found":false"#));
    }
}

mod json_metadata_command {
    use super::*;

    #[test]
    fn lists_definitions() {
        cmd()
            .args(["json-metadata", "Drive", "--dir", &fixture("json")])
            .assert()
            .success()
            .stdout(predicate::str::contains("Drive.v1_1_0.json"))
            .stdout(predicate::str::contains("  Drive (6 properties)"));
    }

    #[test]
    fn shows_property_flags() {
        cmd()
            .args([
                "json-metadata",
                "Drive",
                "--dir",
                &fixture("json"),
                "--type",
                "Drive",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains("Drive (additionalProperties: false)"))
            .stdout(predicate::str::contains("  Id [required, readonly]"))
            .stdout(predicate::str::contains("  CapacityBytes [nullable, readonly]"))
            .stdout(predicate::str::contains("  AssetTag [nullable]"));
    }

    #[test]
    fn definition_json() {
        cmd()
            .args([
                "json-metadata",
                "Drive",
                "--dir",
                &fixture("json"),
                "--type",
                "#Drive.v1_1_0.Drive",
                "--json",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""type_name":"Drive""#))
            .stdout(predicate::str::contains(r#""additional_properties":false"#));
    }

    #[test]
    fn unknown_namespace_exit_code_1() {
        cmd()
            .args(["json-metadata", "Chassis", "--dir", &fixture("json")])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("No JSON schema for Chassis"));
    }

    #[test]
    fn unknown_definition_exit_code_1() {
        cmd()
            .args([
                "json-metadata",
                "Drive",
                "--dir",
                &fixture("json"),
                "--type",
                "Volume",
            ])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("No definition Volume"));
    }

    #[test]
    fn missing_directory_exit_code_3() {
        cmd()
            .args(["json-metadata", "Drive", "--dir", "/nonexistent/json"])
            .assert()
            .code(3);
    }

    #[test]
    fn malformed_schema_exit_code_2() {
        let dir = TempDir::new().unwrap();
        write_temp_file(&dir, "Drive.json", "{ not json");

        cmd()
            .args(["json-metadata", "Drive", "--dir", dir.path().to_str().unwrap()])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("invalid JSON"));
    }
}

mod logging {
    use super::*;

    #[test]
    fn quiet_by_default() {
        cmd()
            .args(["inspect", &fixture("Resource_v1.xml")])
            .env_remove("RUST_LOG")
            .assert()
            .success()
            .stderr(predicate::str::is_empty());
    }

    #[test]
    fn verbose_flag_logs_loads() {
        cmd()
            .args(["-v", "inspect", &fixture("Resource_v1.xml")])
            .env_remove("RUST_LOG")
            .assert()
            .success()
            .stderr(predicate::str::contains("loaded schema document"));
    }

    #[test]
    fn rust_log_overrides_verbosity() {
        let source = fixture("Resource_v1.xml");
        cmd()
            .args(["inspect", &source, &source])
            .env("RUST_LOG", "debug")
            .assert()
            .success()
            .stderr(predicate::str::contains("document already loaded"));
    }

    #[test]
    fn inconsistency_is_a_warning() {
        cmd()
            .args([
                "inspect",
                &fixture("Resource_v1.xml"),
                &fixture("Resource_v1_conflict.xml"),
            ])
            .env_remove("RUST_LOG")
            .assert()
            .success()
            .stderr(predicate::str::contains("namespace redeclared with different content"));
    }
}
