//! End-to-end dependency-config updates against a scripted repository.

mod support;

use camino::Utf8Path;
use rstest::rstest;
use sdk_provisioner::commands::{ConfigUpdateDeps, run_config_update_with};
use sdk_provisioner::credentials::CredentialError;
use sdk_provisioner::error::{ProvisionError, Result};
use sdk_provisioner::output::{Progress, exit_code_for_run_result};
use sdk_provisioner::release::ReleaseId;
use sdk_provisioner::repository::coordinates::PropertyLookup;
use sdk_provisioner::repository::resolver::parent_manifest_url;
use sdk_provisioner::repository::{Coordinate, ResolutionTables};
use sdk_provisioner::rewriter::{
    ARCHIVE_BACKUP, CONFIG_ARCHIVE, LOOSE_BACKUP, LOOSE_CONFIG, WriteResult,
};
use sdk_provisioner::test_utils::{StubRepository, StubResponse, zip_bytes};
use sdk_provisioner::workspace::CleanupRegistry;
use serde_json::Value;
use support::{CONFIG_JSON, REPO, SETTINGS_WITHOUT_PASSWORD, Sandbox, metadata, pom, write};

const SPARK_CONFIG_ENTRY: &str = "spark-conf-files/config.json";

fn mapquad_only() -> ResolutionTables {
    ResolutionTables {
        property_lookups: vec![PropertyLookup::new(
            Coordinate::new("com.here.olp.util", "mapquad"),
            "mapquad.version",
        )],
        ..ResolutionTables::default()
    }
}

fn release(value: &str) -> ReleaseId {
    ReleaseId::try_from(value).expect("valid release")
}

fn bom_url(value: &str) -> String {
    parent_manifest_url(REPO, &release(value))
}

fn update(
    sandbox: &Sandbox,
    version: &str,
    repository: &StubRepository,
    tables: &ResolutionTables,
) -> (Result<WriteResult>, String) {
    let registry = CleanupRegistry::new();
    let deps = ConfigUpdateDeps {
        repository,
        tables,
        registry: &registry,
    };
    let mut sink = Vec::new();
    let result = {
        let mut progress = Progress::new(&mut sink, false);
        run_config_update_with(version, &sandbox.work, &sandbox.paths, deps, &mut progress)
    };
    (result, String::from_utf8_lossy(&sink).into_owned())
}

fn packages(document: &[u8]) -> String {
    let value: Value = serde_json::from_slice(document).expect("valid JSON");
    value
        .pointer("/session_configs/conf/spark.jars.packages")
        .and_then(Value::as_str)
        .expect("packages field")
        .to_owned()
}

fn read(path: &Utf8Path) -> Vec<u8> {
    std::fs::read(path).expect("readable file")
}

fn archive_entry(path: &Utf8Path, name: &str) -> Vec<u8> {
    let file = std::fs::File::open(path).expect("archive");
    let mut archive = zip::ZipArchive::new(file).expect("valid zip");
    let mut entry = archive.by_name(name).expect("entry present");
    let mut contents = Vec::new();
    std::io::Read::read_to_end(&mut entry, &mut contents).expect("entry readable");
    contents
}

#[test]
fn loose_config_gets_resolved_packages() {
    let sandbox = Sandbox::new();
    let config = sandbox.work.join(LOOSE_CONFIG);
    write(&config, CONFIG_JSON);
    let repository = StubRepository::new().with_text(
        bom_url("2.3.4"),
        pom(&[("mapquad.version", "9.9.9"), ("unrelated.version", "1.0")]),
    );

    let (result, stderr) = update(&sandbox, "2.3.4", &repository, &mapquad_only());

    let written = result.expect("update succeeds");
    assert_eq!(written.packages, 1);
    assert_eq!(repository.call_count(), 1);
    assert_eq!(repository.requested_users(), vec!["analyst".to_owned()]);
    assert_eq!(packages(&read(&config)), "com.here.olp.util:mapquad:9.9.9");
    assert_eq!(read(&sandbox.work.join(LOOSE_BACKUP)), CONFIG_JSON.as_bytes());
    assert!(stderr.contains("with 1 package"), "{stderr}");

    let value: Value = serde_json::from_slice(&read(&config)).expect("valid JSON");
    assert_eq!(
        value.pointer("/kernel_python_credentials/url"),
        Some(&Value::from("http://localhost:8998"))
    );
    assert_eq!(
        value.pointer("/session_configs/driverMemory"),
        Some(&Value::from("1000M"))
    );
}

#[test]
fn missing_password_stops_before_any_request() {
    let sandbox = Sandbox::new();
    sandbox.write_settings(SETTINGS_WITHOUT_PASSWORD);
    let config = sandbox.work.join(LOOSE_CONFIG);
    write(&config, CONFIG_JSON);
    let repository = StubRepository::new();

    let (result, _) = update(&sandbox, "2.3.4", &repository, &mapquad_only());

    let err = result.expect_err("credentials incomplete");
    assert!(matches!(
        err,
        ProvisionError::Credentials(CredentialError::EmptyField { .. })
    ));
    assert_eq!(repository.call_count(), 0);
    assert_eq!(read(&config), CONFIG_JSON.as_bytes());
    assert!(!sandbox.work.join(LOOSE_BACKUP).exists());
}

#[test]
fn unknown_release_leaves_config_untouched() {
    let sandbox = Sandbox::new();
    let config = sandbox.work.join(LOOSE_CONFIG);
    write(&config, CONFIG_JSON);
    let repository = StubRepository::new().with(bom_url("9.9.9"), StubResponse::NotFound);

    let (result, _) = update(&sandbox, "9.9.9", &repository, &mapquad_only());

    assert!(matches!(result, Err(ProvisionError::InvalidRelease { .. })));
    let mut stderr = Vec::new();
    assert_eq!(exit_code_for_run_result(result, &mut stderr), 1);
    assert!(String::from_utf8_lossy(&stderr).contains("9.9.9"));
    assert_eq!(read(&config), CONFIG_JSON.as_bytes());
    assert!(!sandbox.work.join(LOOSE_BACKUP).exists());
}

#[rstest]
#[case::traversal("../1.0")]
#[case::empty("")]
fn unsafe_release_is_rejected_without_requests(#[case] version: &str) {
    let sandbox = Sandbox::new();
    write(&sandbox.work.join(LOOSE_CONFIG), CONFIG_JSON);
    let repository = StubRepository::new();

    let (result, _) = update(&sandbox, version, &repository, &mapquad_only());

    assert!(matches!(result, Err(ProvisionError::InvalidRelease { .. })));
    assert_eq!(repository.call_count(), 0);
}

#[test]
fn missing_config_is_reported_before_any_request() {
    let sandbox = Sandbox::new();
    let repository = StubRepository::new();

    let (result, _) = update(&sandbox, "2.3.4", &repository, &mapquad_only());

    assert!(matches!(result, Err(ProvisionError::NoConfigFound { .. })));
    assert_eq!(repository.call_count(), 0);
}

#[test]
fn archive_update_is_idempotent() {
    let sandbox = Sandbox::new();
    let archive = sandbox.work.join(CONFIG_ARCHIVE);
    let original = zip_bytes(&[
        (SPARK_CONFIG_ENTRY, CONFIG_JSON),
        ("spark-conf-files/spark-defaults.conf", "spark.master local[*]\n"),
    ]);
    std::fs::write(&archive, &original).expect("write archive");
    let repository =
        StubRepository::new().with_text(bom_url("2.3.4"), pom(&[("mapquad.version", "9.9.9")]));

    update(&sandbox, "2.3.4", &repository, &mapquad_only())
        .0
        .expect("first update");
    let first = archive_entry(&archive, SPARK_CONFIG_ENTRY);
    update(&sandbox, "2.3.4", &repository, &mapquad_only())
        .0
        .expect("second update");
    let second = archive_entry(&archive, SPARK_CONFIG_ENTRY);

    assert_eq!(first, second);
    assert_eq!(packages(&second), "com.here.olp.util:mapquad:9.9.9");
    assert_eq!(
        archive_entry(&archive, "spark-conf-files/spark-defaults.conf"),
        b"spark.master local[*]\n"
    );

    let backup = sandbox.work.join(ARCHIVE_BACKUP);
    assert_eq!(archive_entry(&backup, SPARK_CONFIG_ENTRY), first);
}

#[test]
fn first_backup_restores_the_original_archive() {
    let sandbox = Sandbox::new();
    let archive = sandbox.work.join(CONFIG_ARCHIVE);
    let original = zip_bytes(&[(SPARK_CONFIG_ENTRY, CONFIG_JSON)]);
    std::fs::write(&archive, &original).expect("write archive");
    let repository =
        StubRepository::new().with_text(bom_url("2.3.4"), pom(&[("mapquad.version", "9.9.9")]));

    update(&sandbox, "2.3.4", &repository, &mapquad_only())
        .0
        .expect("update");

    assert_eq!(read(&sandbox.work.join(ARCHIVE_BACKUP)), original);
    assert_ne!(read(&archive), original);
}

#[test]
fn builtin_tables_resolve_metadata_and_pins() {
    let sandbox = Sandbox::new();
    write(&sandbox.work.join(LOOSE_CONFIG), CONFIG_JSON);
    let tables = ResolutionTables::olp_sdk();
    let mut repository = StubRepository::new().with_text(bom_url("2.3.4"), pom(&[]));
    for coordinate in &tables.metadata_lookups {
        repository = repository.with_text(coordinate.metadata_url(REPO), metadata("4.2.0"));
    }

    let (result, _) = update(&sandbox, "2.3.4", &repository, &tables);

    let written = result.expect("update succeeds");
    assert_eq!(written.packages, tables.metadata_lookups.len() + tables.pins.len());
    assert_eq!(repository.call_count(), 1 + tables.metadata_lookups.len());
    assert_eq!(
        repository.requested_urls().first().map(String::as_str),
        Some(bom_url("2.3.4").as_str())
    );
    let field = packages(&read(&sandbox.work.join(LOOSE_CONFIG)));
    assert!(field.starts_with("com.here.platform.data.client:spark-support_2.11:4.2.0,"));
    assert!(field.ends_with(",com.here.platform.location:location-examples-utils_2.11:0.4.115"));
}

#[test]
fn failing_metadata_request_is_a_network_error() {
    let sandbox = Sandbox::new();
    let config = sandbox.work.join(LOOSE_CONFIG);
    write(&config, CONFIG_JSON);
    let tables = ResolutionTables {
        metadata_lookups: vec![Coordinate::new("com.here.account", "here-oauth-client")],
        ..ResolutionTables::default()
    };
    let repository = StubRepository::new()
        .with_text(bom_url("2.3.4"), pom(&[]))
        .with(
            Coordinate::new("com.here.account", "here-oauth-client").metadata_url(REPO),
            StubResponse::Status(502),
        );

    let (result, _) = update(&sandbox, "2.3.4", &repository, &tables);

    assert!(matches!(result, Err(ProvisionError::Network { .. })));
    assert_eq!(read(&config), CONFIG_JSON.as_bytes());
}
