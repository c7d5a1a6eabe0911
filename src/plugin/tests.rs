//! Tests for plugin discovery and the launch handshake.

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use rstest::{fixture, rstest};
use tempfile::TempDir;

use super::*;

struct PluginDirs {
    _tmp: TempDir,
    first: Utf8PathBuf,
    second: Utf8PathBuf,
}

#[fixture]
fn plugin_dirs() -> PluginDirs {
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf())
        .unwrap_or_else(|path| panic!("temp path should be utf8: {}", path.display()));
    let first = root.join("first");
    let second = root.join("second");
    for dir in [&first, &second] {
        std::fs::create_dir_all(dir).unwrap_or_else(|err| panic!("mkdir {dir}: {err}"));
    }
    PluginDirs {
        _tmp: tmp,
        first,
        second,
    }
}

fn install(dir: &Utf8Path, driver: &str, script: &str) -> Utf8PathBuf {
    let path = dir.join(binary_name(driver));
    std::fs::write(&path, script).unwrap_or_else(|err| panic!("write plugin: {err}"));
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .unwrap_or_else(|err| panic!("chmod plugin: {err}"));
    }
    path
}

#[test]
fn binary_name_follows_convention() {
    assert_eq!(
        binary_name("generic"),
        format!("docker-machine-driver-generic{}", std::env::consts::EXE_SUFFIX)
    );
}

#[rstest]
fn find_prefers_earlier_directories(plugin_dirs: PluginDirs) {
    let PluginDirs { first, second, .. } = plugin_dirs;
    install(&second, "demo", "#!/bin/sh\n");
    let preferred = install(&first, "demo", "#!/bin/sh\n");

    let search = PluginSearch::from_dirs(vec![first, second]);

    assert_eq!(
        search.find("demo").unwrap_or_else(|err| panic!("find: {err}")),
        preferred
    );
}

#[rstest]
fn find_reports_missing_plugin(plugin_dirs: PluginDirs) {
    let PluginDirs { first, .. } = plugin_dirs;
    let search = PluginSearch::from_dirs(vec![first]);

    let Err(err) = search.find("virtualbox") else {
        panic!("no plugin should be found");
    };
    assert_eq!(
        err.to_string(),
        "Driver \"virtualbox\" not found. Do you have the plugin binary accessible in your PATH?"
    );
}

#[test]
fn standard_search_starts_with_plugin_dir() {
    let search = PluginSearch::standard(Some(Utf8Path::new("/opt/machine/plugins")));
    assert_eq!(
        search.dirs().first().map(Utf8PathBuf::as_path),
        Some(Utf8Path::new("/opt/machine/plugins"))
    );
}

#[cfg(unix)]
#[rstest]
#[tokio::test]
async fn launch_rejects_garbage_address(plugin_dirs: PluginDirs) {
    let PluginDirs { first, .. } = plugin_dirs;
    install(&first, "garbage", "#!/bin/sh\necho 'not an address'\nsleep 5\n");
    let launcher = PluginLauncher::new(PluginSearch::from_dirs(vec![first]));

    let Err(err) = launcher.launch("garbage", "box").await else {
        panic!("garbage handshake should fail");
    };
    assert!(
        matches!(err, PluginError::InvalidAddress { ref line, .. } if line == "not an address"),
        "got {err}"
    );
}

#[cfg(unix)]
#[rstest]
#[tokio::test]
async fn launch_times_out_on_silent_plugin(plugin_dirs: PluginDirs) {
    let PluginDirs { first, .. } = plugin_dirs;
    install(&first, "silent", "#!/bin/sh\nsleep 5\n");
    let launcher = PluginLauncher::new(PluginSearch::from_dirs(vec![first]))
        .with_handshake_timeout(Duration::from_millis(200));

    let Err(err) = launcher.launch("silent", "box").await else {
        panic!("silent plugin should time out");
    };
    assert!(matches!(err, PluginError::HandshakeTimeout { .. }), "got {err}");
}

#[cfg(unix)]
#[rstest]
#[tokio::test]
async fn launch_fails_when_plugin_exits_early(plugin_dirs: PluginDirs) {
    let PluginDirs { first, .. } = plugin_dirs;
    install(&first, "crash", "#!/bin/sh\necho 'boom' >&2\nexit 1\n");
    let launcher = PluginLauncher::new(PluginSearch::from_dirs(vec![first]));

    let Err(err) = launcher.launch("crash", "box").await else {
        panic!("crashing plugin should fail");
    };
    assert!(matches!(err, PluginError::HandshakeEof { .. }), "got {err}");
}
