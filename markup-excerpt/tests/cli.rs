use pretty_assertions::assert_eq;
use std::fs;
use std::io::Write;
use std::process::{Command, Output, Stdio};

const PRODUCT_PAGE: &str = "tests/fixtures/html/product-page.html";

fn markup_excerpt(args: &[&str], stdin: Option<&str>) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_markup_excerpt"))
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn markup_excerpt");
    let mut pipe = child.stdin.take().expect("stdin open");
    if let Some(html) = stdin {
        pipe.write_all(html.as_bytes()).expect("write stdin");
    }
    drop(pipe);
    child.wait_with_output().expect("collect output")
}

fn stdout_of(output: &Output) -> String {
    assert!(
        output.status.success(),
        "markup_excerpt failed ({}): {}",
        output.status,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn wraps_title_and_body_of_a_saved_page() {
    let stdout = stdout_of(&markup_excerpt(&[PRODUCT_PAGE], None));
    let expected = include_str!("fixtures/expected/product-page.txt");
    assert_eq!(stdout.trim_end(), expected.trim_end());
}

#[test]
fn json_output_reports_source_and_truncation() {
    let html = include_str!("fixtures/html/uppercase-tags.html");
    let stdout = stdout_of(&markup_excerpt(&["--json", "-"], Some(html)));

    let value: serde_json::Value = serde_json::from_str(&stdout).expect("json output");
    assert_eq!(value["title"], "Lavadora 18KG");
    assert_eq!(value["source"], "body");
    assert_eq!(value["truncated"], false);
    assert_eq!(
        value["body"],
        "<DIV>Capacidad: 18KG</DIV> <DIV>Medidas: 60 x 85 cm</DIV>"
    );
}

#[test]
fn title_flag_overrides_document_title() {
    let stdout = stdout_of(&markup_excerpt(&["--title", "Grill X", PRODUCT_PAGE], None));
    assert!(stdout.starts_with("<title>\nGrill X\n</title>\n"));
}

#[test]
fn config_file_tightens_the_bounds() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = dir.path().join("bounds.json");
    fs::write(
        &config,
        r#"{"max_body_chars": 40, "head_chars": 20, "tail_chars": 20, "elision": " [...] "}"#,
    )
    .expect("write config");

    let stdout = stdout_of(&markup_excerpt(
        &["--json", "--config", config.to_str().expect("utf-8 path"), PRODUCT_PAGE],
        None,
    ));
    let value: serde_json::Value = serde_json::from_str(&stdout).expect("json output");
    let body = value["body"].as_str().expect("body string");
    assert_eq!(value["truncated"], true);
    assert!(body.starts_with("<nav class=\"breadcru"));
    assert!(body.ends_with("disponible</p>"));
    assert!(body.contains(" [...] "));
}

#[test]
fn rejects_a_split_wider_than_the_ceiling() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = dir.path().join("bounds.json");
    fs::write(&config, r#"{"max_body_chars": 10, "head_chars": 8, "tail_chars": 8}"#)
        .expect("write config");

    let output = markup_excerpt(
        &["--config", config.to_str().expect("utf-8 path"), PRODUCT_PAGE],
        None,
    );
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("10-char body ceiling"));
}

#[test]
fn rejects_unknown_options_and_second_inputs() {
    let output = markup_excerpt(&["--pretty"], None);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("unknown option: --pretty"));

    let output = markup_excerpt(&["a.html", "b.html"], None);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("unexpected argument: b.html"));
}
