use crate::common::{TestStorage, stderr, stdout};
use anyhow::Result;
use predicates::prelude::*;

#[test]
fn test_version_command() -> Result<()> {
    let env = TestStorage::new()?;
    env.command()
        .arg("version")
        .assert()
        .success()
        .stdout(format!("multiwerf v{}\n", env!("CARGO_PKG_VERSION")));
    Ok(())
}

#[tokio::test]
async fn test_update_prints_binary_path() -> Result<()> {
    let env = TestStorage::new()?;
    env.publish("1.1.3").await?;
    env.set_remote_mapping(&[("1.1", "stable", "1.1.3")])?;

    let output = env.run(&["update", "1.1", "stable"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let expected = env.storage().binary_path("1.1.3")?;
    assert_eq!(stdout(&output).trim(), expected.display().to_string());
    assert_eq!(std::fs::read_to_string(expected)?, "werf 1.1.3");
    assert!(env.storage().channel_mapping_path().exists());
    Ok(())
}

#[tokio::test]
async fn test_use_prints_alias_snippet() -> Result<()> {
    let env = TestStorage::new()?;
    env.publish("1.2.0-beta.2").await?;
    env.set_remote_mapping(&[("1.2", "beta", "1.2.0-beta.2")])?;

    let output = env.run(&["use", "1.2", "beta"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let script = stdout(&output);
    assert!(script.starts_with("# werf 1.2 beta\n"));
    assert!(script.contains("alias werf='"));
    assert!(script.contains("werf-"));
    Ok(())
}

#[tokio::test]
async fn test_update_resolves_from_mirror_when_mapping_lacks_group() -> Result<()> {
    let env = TestStorage::new()?;
    for version in ["1.1.0-alpha.1", "1.1.0-beta.1", "1.1.0-rc.1", "1.1.0", "1.1.1-alpha.1"] {
        env.publish(version).await?;
    }
    env.set_remote_mapping(&[])?;

    let alpha = env.run(&["update", "1.1", "alpha"]);
    assert!(alpha.status.success(), "stderr: {}", stderr(&alpha));
    assert!(stdout(&alpha).contains("1.1.1-alpha.1"));

    let stable = env.run(&["update", "1.1", "stable"]);
    assert!(stable.status.success(), "stderr: {}", stderr(&stable));
    assert!(stdout(&stable).trim().ends_with("v1.1.0") || stdout(&stable).trim().ends_with("v1.1.0.exe"));
    Ok(())
}

#[tokio::test]
async fn test_bin_path_requires_prior_update() -> Result<()> {
    let env = TestStorage::new()?;
    env.publish("1.1.3").await?;
    env.set_remote_mapping(&[("1.1", "stable", "1.1.3")])?;

    env.command()
        .args(["bin-path", "1.1", "stable"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("error:"));

    env.command().args(["update", "1.1", "stable"]).assert().success();

    env.command()
        .args(["bin-path", "1.1", "stable"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1.1.3"));
    Ok(())
}

#[test]
fn test_invalid_group_is_reported() -> Result<()> {
    let env = TestStorage::new()?;
    env.command()
        .args(["update", "one", "stable"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("MAJOR.MINOR"));
    Ok(())
}

#[test]
fn test_unknown_channel_is_reported() -> Result<()> {
    let env = TestStorage::new()?;
    env.command()
        .args(["bin-path", "1.1", "nightly"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown channel 'nightly'"));
    Ok(())
}

#[tokio::test]
async fn test_missing_version_fails_with_suggestion() -> Result<()> {
    let env = TestStorage::new()?;
    env.publish("1.1.3").await?;
    env.set_remote_mapping(&[])?;

    env.command()
        .args(["update", "1.9", "stable"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No version found for group 1.9 on channel stable"))
        .stderr(predicate::str::contains("available-releases"));
    Ok(())
}

#[test]
fn test_gc_on_empty_storage() -> Result<()> {
    let env = TestStorage::new()?;
    env.command()
        .arg("gc")
        .assert()
        .success()
        .stderr(predicate::str::contains("Nothing to clean"));
    Ok(())
}

#[tokio::test]
async fn test_gc_removes_unreferenced_versions() -> Result<()> {
    let env = TestStorage::new()?;
    env.publish("1.1.3").await?;
    env.set_remote_mapping(&[("1.1", "stable", "1.1.3")])?;
    env.command().args(["update", "1.1", "stable"]).assert().success();

    let stale = env.storage().version_dir("1.0.9")?;
    std::fs::create_dir_all(&stale)?;

    env.command()
        .args(["gc", "--dry-run"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Would remove 1 unused versions: 1.0.9"));
    assert!(stale.exists());

    env.command()
        .arg("gc")
        .assert()
        .success()
        .stderr(predicate::str::contains("Removing 1 unused versions: 1.0.9"));
    assert!(!stale.exists());
    assert!(env.storage().version_dir("1.1.3")?.exists());
    Ok(())
}

#[tokio::test]
async fn test_available_releases_lists_mirror() -> Result<()> {
    let env = TestStorage::new()?;
    for version in ["1.2.0", "1.1.10", "1.1.2"] {
        env.publish(version).await?;
    }

    env.command()
        .arg("available-releases")
        .assert()
        .success()
        .stdout("1.1.2\n1.1.10\n1.2.0\n");

    env.command()
        .args(["available-releases", "1.2"])
        .assert()
        .success()
        .stdout("1.2.0\n");
    Ok(())
}

#[test]
fn test_quiet_and_verbose_conflict() -> Result<()> {
    let env = TestStorage::new()?;
    env.command().args(["--quiet", "--verbose", "gc"]).assert().failure();
    Ok(())
}
