mod support;

use anyhow::Result;
use assert_cmd::cargo::cargo_bin_cmd;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use httpmock::MockServer;
use predicates::str::contains;
use tempfile::tempdir;
use xnode_dev::credentials::{MemoryStore, SecretStore, TokenPrompt};
use xnode_dev::packer::{self, PackRequest};
use xnode_dev::publish;
use xnode_dev::registry::{RegistryError, RegistryProfile};

struct NoPrompt;

impl TokenPrompt for NoPrompt {
    fn prompt(&self, user: &str) -> Result<String> {
        panic!("unexpected token prompt for {user}");
    }
}

struct FixedPrompt(&'static str);

impl TokenPrompt for FixedPrompt {
    fn prompt(&self, _user: &str) -> Result<String> {
        Ok(self.0.to_string())
    }
}

fn local_profile(url: String) -> RegistryProfile {
    RegistryProfile {
        name: "default".into(),
        url,
        user: None,
        token: None,
    }
}

fn can_bind() -> bool {
    if std::net::TcpListener::bind("127.0.0.1:0").is_err() {
        eprintln!("Skipping test; cannot bind local port in this environment");
        return false;
    }
    true
}

#[test]
fn publish_sends_multipart_form_with_basic_auth() -> Result<()> {
    if !can_bind() {
        return Ok(());
    }
    let temp = tempdir()?;
    let project = temp.path().join("hello");
    let script = support::write_project(&project, support::default_package_json());
    let outcome = packer::pack(&PackRequest {
        project_dir: project.clone(),
        outputs: vec![script],
        out_dir: None,
    })?;

    let server = MockServer::start();
    let expected_auth = format!("Basic {}", STANDARD.encode("dev@example.com:cached-token"));
    let upload = server.mock(|when, then| {
        when.method("POST")
            .path("/-/package/")
            .header("authorization", expected_auth.as_str())
            .body_includes("name=\"name\"")
            .body_includes("hello")
            .body_includes("name=\"scope\"")
            .body_includes("acme")
            .body_includes("name=\"integrity\"")
            .body_includes(outcome.integrity.as_str())
            .body_includes("name=\"read_me\"")
            .body_includes("name=\"author[email]\"")
            .body_includes("name=\"private\"")
            .body_includes("filename=\"hello-1.0.0.xnode\"")
            .body_includes("application/x-xnode");
        then.status(201).body("{\"ok\":true}");
    });

    let store = MemoryStore::with_token("dev@example.com", "cached-token");
    let receipt = publish::publish(&outcome, &local_profile(server.base_url()), &store, &NoPrompt)?;

    upload.assert();
    assert_eq!(receipt.status.as_u16(), 201);
    assert_eq!(&receipt.body[..], b"{\"ok\":true}");
    Ok(())
}

#[test]
fn missing_token_is_prompted_and_cached() -> Result<()> {
    if !can_bind() {
        return Ok(());
    }
    let temp = tempdir()?;
    let project = temp.path().join("hello");
    let script = support::write_project(&project, support::default_package_json());
    let outcome = packer::pack(&PackRequest {
        project_dir: project,
        outputs: vec![script],
        out_dir: None,
    })?;

    let server = MockServer::start();
    let upload = server.mock(|when, then| {
        when.method("POST").path("/-/package/");
        then.status(200);
    });

    let store = MemoryStore::default();
    publish::publish(
        &outcome,
        &local_profile(server.base_url()),
        &store,
        &FixedPrompt("typed-token"),
    )?;
    upload.assert();
    assert_eq!(
        store.get("dev@example.com")?.as_deref(),
        Some("typed-token")
    );
    Ok(())
}

#[test]
fn rejected_credentials_surface_as_unauthorized() -> Result<()> {
    if !can_bind() {
        return Ok(());
    }
    let temp = tempdir()?;
    let project = temp.path().join("hello");
    let script = support::write_project(&project, support::default_package_json());
    let outcome = packer::pack(&PackRequest {
        project_dir: project,
        outputs: vec![script],
        out_dir: None,
    })?;

    let server = MockServer::start();
    server.mock(|when, then| {
        when.method("POST").path("/-/package/");
        then.status(401).body("bad token");
    });

    let store = MemoryStore::with_token("dev@example.com", "stale");
    let err = publish::publish(&outcome, &local_profile(server.base_url()), &store, &NoPrompt)
        .unwrap_err();
    let registry_err = err
        .downcast_ref::<RegistryError>()
        .expect("registry error in chain");
    assert!(matches!(registry_err, RegistryError::Unauthorized(Some(body)) if body == "bad token"));
    Ok(())
}

#[test]
fn server_errors_are_reported_with_status() -> Result<()> {
    if !can_bind() {
        return Ok(());
    }
    let temp = tempdir()?;
    let project = temp.path().join("hello");
    let script = support::write_project(&project, support::default_package_json());
    let outcome = packer::pack(&PackRequest {
        project_dir: project,
        outputs: vec![script],
        out_dir: None,
    })?;

    let server = MockServer::start();
    server.mock(|when, then| {
        when.method("POST").path("/-/package/");
        then.status(409).body("version already exists");
    });

    let store = MemoryStore::with_token("dev@example.com", "token");
    let err = publish::publish(&outcome, &local_profile(server.base_url()), &store, &NoPrompt)
        .unwrap_err();
    let message = format!("{err:#}");
    assert!(message.contains("409"), "{message}");
    assert!(message.contains("version already exists"), "{message}");
    Ok(())
}

#[test]
fn cli_publish_uses_profile_token() -> Result<()> {
    if !can_bind() {
        return Ok(());
    }
    let temp = tempdir()?;
    let project = temp.path().join("hello");
    support::write_project(&project, support::default_package_json());

    let server = MockServer::start();
    let expected_auth = format!("Basic {}", STANDARD.encode("dev@example.com:test-token"));
    let upload = server.mock(|when, then| {
        when.method("POST")
            .path("/-/package/")
            .header("authorization", expected_auth.as_str());
        then.status(200).body("stored");
    });
    let config = support::write_config(temp.path(), &server.base_url());

    let mut cmd = cargo_bin_cmd!("xnode");
    cmd.env("XNODE_CONFIG", &config)
        .env_remove("XNODE_REGISTRY_PROFILE")
        .args(["publish", "--skip-build", "--project"])
        .arg(&project)
        .assert()
        .success()
        .stdout(contains("statusCode: 200"))
        .stdout(contains("stored"))
        .stdout(contains("✓ Published @acme/hello@1.0.0"));
    upload.assert();
    Ok(())
}

#[test]
fn cli_dry_run_does_not_upload() -> Result<()> {
    if !can_bind() {
        return Ok(());
    }
    let temp = tempdir()?;
    let project = temp.path().join("hello");
    support::write_project(&project, support::default_package_json());

    let server = MockServer::start();
    let upload = server.mock(|when, then| {
        when.method("POST").path("/-/package/");
        then.status(200);
    });
    let config = support::write_config(temp.path(), &server.base_url());

    let mut cmd = cargo_bin_cmd!("xnode");
    cmd.env("XNODE_CONFIG", &config)
        .env_remove("XNODE_REGISTRY_PROFILE")
        .args(["publish", "--skip-build", "--dry-run", "--project"])
        .arg(&project)
        .assert()
        .success()
        .stdout(contains("Dry run: would POST"))
        .stdout(contains("tgz_file = hello-1.0.0.xnode"));
    assert_eq!(upload.hits(), 0);
    Ok(())
}
