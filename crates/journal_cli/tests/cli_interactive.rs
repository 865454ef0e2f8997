use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_path(file_name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("journal-{nanos}-{file_name}"))
}

#[test]
fn interactive_mode_runs_commands_until_exit() {
    let exe = env!("CARGO_BIN_EXE_journal");
    let store_path = temp_path("cli-interactive.json");

    let mut child = Command::new(exe)
        .env("JOURNAL_STORE_PATH", &store_path)
        .env("JOURNAL_CONFIG_PATH", store_path.with_extension("config.json"))
        .env("JOURNAL_USER", "uid-1")
        .env_remove("JOURNAL_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn journal");

    {
        let stdin = child.stdin.as_mut().expect("stdin");
        writeln!(stdin, "task add \"read a book\"").unwrap();
        writeln!(stdin, "task show missing").unwrap();
        writeln!(stdin, "goal add \"unterminated").unwrap();
        writeln!(stdin, "summary").unwrap();
        writeln!(stdin, "exit").unwrap();
        writeln!(stdin, "summary").unwrap();
    }

    let output = child.wait_with_output().expect("wait journal");
    std::fs::remove_file(&store_path).ok();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(stdout.contains("Added task: read a book"));
    assert_eq!(stdout.matches("Unplanned tasks: 1").count(), 1);
    assert!(stderr.contains("ERROR: not_found - task missing not found"));
    assert!(stderr.contains("ERROR: invalid_argument - unterminated quote in command"));
}
