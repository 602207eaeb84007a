use companion_protocol::{Method, Request, PROTOCOL_VERSION};
use serde_json::{json, Value};
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::thread::sleep;
use std::time::Duration;
use tempfile::TempDir;

const ASSISTANT_ENV: &str = "COMPANION_SMOKE_ASSISTANT";

fn write_config(home: &Path) {
    let root = home.join(".companion");
    std::fs::create_dir_all(&root).expect("create config dir");
    std::fs::write(
        root.join("config.toml"),
        format!(
            "[tracker]\nsettle_delay_ms = 50\npolling = false\n\n[probe]\nenv_var = \"{}\"\nprocess_name = \"\"\n",
            ASSISTANT_ENV
        ),
    )
    .expect("write config");
}

fn companion(home: &Path) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_companion"));
    command
        .env("HOME", home)
        .env_remove("COMPANION_CONFIG")
        .env_remove(ASSISTANT_ENV)
        .stderr(Stdio::null());
    command
}

fn request(method: Method, id: &str, params: Option<Value>) -> String {
    let request = Request {
        protocol_version: PROTOCOL_VERSION,
        method,
        id: Some(id.to_string()),
        params,
    };
    let mut line = serde_json::to_string(&request).expect("serialize request");
    line.push('\n');
    line
}

fn json_lines(output: &Output) -> Vec<Value> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|line| serde_json::from_str(line).expect("stdout line is JSON"))
        .collect()
}

fn response<'a>(lines: &'a [Value], id: &str) -> &'a Value {
    lines
        .iter()
        .find(|line| line.get("ok").is_some() && line["id"] == id)
        .unwrap_or_else(|| panic!("no response for {}", id))
}

#[test]
fn run_serves_requests_and_loads_working_set() {
    let home = TempDir::new().expect("temp home");
    let project = TempDir::new().expect("temp project");
    std::fs::write(project.path().join("main.rs"), "fn main() {}").expect("write file");
    write_config(home.path());

    let mut child = companion(home.path())
        .arg("run")
        .arg(project.path())
        .env(ASSISTANT_ENV, "1")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("spawn companion");

    {
        let stdin = child.stdin.as_mut().expect("stdin");
        stdin
            .write_all(request(Method::GetStatus, "before", None).as_bytes())
            .expect("write");
        stdin.flush().ok();
        sleep(Duration::from_millis(400));

        let lines = [
            request(Method::GetStatus, "after", None),
            request(Method::AddFiles, "add", Some(json!({ "paths": ["/tmp/x.rs"] }))),
            request(Method::SwitchSession, "unknown", Some(json!({ "session_id": "nope" }))),
            request(
                Method::SaveWindowState,
                "save",
                Some(json!({ "width": 500, "height": 700, "x": 3, "y": 4 })),
            ),
            request(Method::GetWindowState, "load", None),
        ];
        for line in lines {
            stdin.write_all(line.as_bytes()).expect("write");
        }
    }
    drop(child.stdin.take());

    let output = child.wait_with_output().expect("wait for companion");
    assert!(output.status.success());
    let lines = json_lines(&output);

    let before = response(&lines, "before");
    assert_eq!(before["data"]["connected"], true);
    assert_eq!(before["data"]["context_file_count"], 0);

    let after = response(&lines, "after");
    assert_eq!(after["data"]["context_file_count"], 1);

    assert_eq!(response(&lines, "add")["data"]["context_file_count"], 2);
    assert_eq!(response(&lines, "unknown")["data"]["switched"], false);
    assert_eq!(response(&lines, "load")["data"]["width"], 500);

    let saved = std::fs::read_to_string(home.path().join(".file-explorer-window-state.json"))
        .expect("window state written");
    assert!(saved.contains("700"));

    assert!(lines
        .iter()
        .any(|line| line["notification"] == "activity_changed"));
}

#[test]
fn status_reports_not_running_without_assistant() {
    let home = TempDir::new().expect("temp home");
    let project = TempDir::new().expect("temp project");
    write_config(home.path());

    let output = companion(home.path())
        .arg("status")
        .arg(project.path())
        .output()
        .expect("run companion status");

    assert!(output.status.success());
    let status: Value = serde_json::from_slice(&output.stdout).expect("status JSON");
    assert_eq!(status["connected"], false);
    assert_eq!(status["activity"], "Claude Code not running");
}

#[test]
fn window_state_defaults_without_file() {
    let home = TempDir::new().expect("temp home");

    let output = companion(home.path())
        .arg("window-state")
        .output()
        .expect("run companion window-state");

    assert!(output.status.success());
    let state: Value = serde_json::from_slice(&output.stdout).expect("state JSON");
    assert_eq!(state["width"], 400);
    assert_eq!(state["height"], 800);
}

#[test]
fn open_rejects_missing_directory() {
    let home = TempDir::new().expect("temp home");

    let output = companion(home.path())
        .arg("open")
        .arg(home.path().join("missing"))
        .output()
        .expect("run companion open");

    assert!(!output.status.success());
    let result: Value = serde_json::from_slice(&output.stdout).expect("launch JSON");
    assert_eq!(result["success"], false);
}
