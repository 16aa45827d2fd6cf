//! Shared helpers: a fake engine binary written as a shell script.

#![cfg(unix)]

use stackql_exec::config::ExecutionConfig;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

/// Stand-in for the engine. Dispatches on the query text (second argument)
/// and writes its argument vector to `$ARGS_FILE` when that is set.
const FAKE_ENGINE: &str = r#"#!/bin/sh
if [ -n "$ARGS_FILE" ]; then
    printf '%s\n' "$@" > "$ARGS_FILE"
fi
case "$2" in
    "SHOW PROVIDERS")
        printf '[{"name":"aws","version":"v24.07.00"},{"name":"github","version":"v24.04.00"}]'
        ;;
    "SLOW")
        printf '[{"partial":'
        exec sleep 5
        ;;
    "AUTH")
        printf '{"error":"cannot compose signing credentials"}'
        ;;
    "HTTP404")
        echo 'http response status code: 404, response body: <!DOCTYPE html>' >&2
        ;;
    "PULL")
        echo "github provider, version 'v24.04.00' successfully installed" >&2
        ;;
    "ENV")
        printf '[{"token":"%s"}]' "$STACKQL_TEST_TOKEN"
        ;;
    "FAIL")
        echo "unexpected engine failure" >&2
        exit 2
        ;;
    "GARBAGE")
        printf 'this is not json'
        ;;
    *)
        printf '[{"query":"%s"}]' "$2"
        ;;
esac
"#;

/// A fake engine installed in a temporary directory.
pub struct FakeEngine {
    dir: TempDir,
    pub path: PathBuf,
}

impl FakeEngine {
    pub fn install() -> Self {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stackql");
        std::fs::write(&path, FAKE_ENGINE).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        Self { dir, path }
    }

    /// Session config pointing at the fake binary.
    pub fn config(&self) -> ExecutionConfig {
        ExecutionConfig {
            binary_path: self.path.clone(),
            timeout: Duration::from_secs(10),
            ..ExecutionConfig::default()
        }
    }

    /// File the engine writes its arguments to when `ARGS_FILE` points at it.
    pub fn args_file(&self) -> PathBuf {
        self.dir.path().join("args.txt")
    }
}
