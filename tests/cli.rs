use assert_cmd::prelude::*;
use predicates::prelude::*;
use predicates::str::contains;
use std::io::Write;
use std::process::Command;
use tempfile::NamedTempFile;

const FIXTURE_FONT: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/Tuffy.ttf");

fn write_scene(xml: &str) -> NamedTempFile {
    let mut tmp = NamedTempFile::new().expect("temp scene");
    tmp.write_all(xml.as_bytes()).expect("write scene");
    tmp
}

#[test]
fn crown_summary_lists_base_and_spikes() {
    let mut cmd = Command::cargo_bin("crowned-letter").expect("binary exists");
    cmd.args(["--summary-only", "--crown", "4", "1"]);
    cmd.assert()
        .success()
        .stdout(contains("Crown 4.00 x 0.30 x 1.00 with 3 spikes"))
        .stdout(contains(" - spike 0 x=-1.33 y=0.15 height=1.50 depth=0.80"))
        .stdout(contains(" - spike 1 x=0.00 y=0.15 height=2.00 depth=0.80"))
        .stdout(contains(" - spike 2 x=1.33 y=0.15 height=1.50 depth=0.80"))
        .stdout(contains("Scene contains 4 mesh node(s)"))
        .stdout(contains(
            " - crown/base pos=(0.00, 0.00, 0.00) vertices=24 triangles=12",
        ))
        .stdout(contains(
            " - crown/spike-1 pos=(0.00, 0.15, 0.00) vertices=18 triangles=6",
        ));
}

#[test]
fn missing_font_is_reported_but_not_fatal() {
    let mut cmd = Command::cargo_bin("crowned-letter").expect("binary exists");
    cmd.args(["--summary-only", "--font", "/definitely/missing/font.ttf"]);
    cmd.assert()
        .success()
        .stdout(contains("Font load failed: failed to read font file"))
        .stdout(contains("Scene contains 0 mesh node(s)"));
}

#[test]
fn font_file_builds_crowned_letter() {
    let mut cmd = Command::cargo_bin("crowned-letter").expect("binary exists");
    cmd.args(["--summary-only", "--font", FIXTURE_FONT]);
    cmd.assert()
        .success()
        .stdout(contains("with 3 spikes"))
        .stdout(contains("Scene contains 5 mesh node(s)"))
        .stdout(contains(" - letter pos=(0.00, 0.00, 0.00)"))
        .stdout(contains(" - crown/spike-1 "))
        .stdout(contains("failed").not());
}

#[test]
fn blank_text_is_reported_as_letter_failure() {
    let mut cmd = Command::cargo_bin("crowned-letter").expect("binary exists");
    cmd.args(["--summary-only", "--font", FIXTURE_FONT, "--text", " "]);
    cmd.assert()
        .success()
        .stdout(contains("Letter build failed: failed to build geometry"))
        .stdout(contains("Font load failed").not())
        .stdout(contains("Scene contains 0 mesh node(s)"));
}

#[test]
fn garbage_font_file_is_reported() {
    let mut font = NamedTempFile::new().expect("temp font");
    font.write_all(b"not a font at all").expect("write font");

    let mut cmd = Command::cargo_bin("crowned-letter").expect("binary exists");
    cmd.arg("--summary-only").arg("--font").arg(font.path());
    cmd.assert()
        .success()
        .stdout(contains("Font load failed: failed to parse font data"));
}

#[test]
fn degenerate_crown_is_rejected_by_default() {
    let mut cmd = Command::cargo_bin("crowned-letter").expect("binary exists");
    cmd.args(["--summary-only", "--crown", "0", "1"]);
    cmd.assert()
        .failure()
        .stderr(contains("crown width must be finite and positive"));
}

#[test]
fn scene_file_can_allow_degenerate_crowns() {
    let scene = write_scene(
        "<scene><crown><dimensions>allow</dimensions></crown></scene>",
    );
    let mut cmd = Command::cargo_bin("crowned-letter").expect("binary exists");
    cmd.arg("--summary-only")
        .arg("--scene")
        .arg(scene.path())
        .args(["--crown", "0", "1"]);
    cmd.assert()
        .success()
        .stdout(contains(" - spike 1 x=0.00 y=0.15"))
        .stdout(contains(" - spike 2 x=0.00 y=0.15"));
}

#[test]
fn invalid_scene_file_fails() {
    let scene = write_scene("<scene><camera><fov>-5</fov></camera></scene>");
    let mut cmd = Command::cargo_bin("crowned-letter").expect("binary exists");
    cmd.arg("--summary-only").arg("--scene").arg(scene.path());
    cmd.assert()
        .failure()
        .stderr(contains("failed to load scene"));
}

#[test]
fn unknown_argument_fails_with_usage() {
    let mut cmd = Command::cargo_bin("crowned-letter").expect("binary exists");
    cmd.arg("--sparkles");
    cmd.assert()
        .failure()
        .stderr(contains("Unknown argument: --sparkles"))
        .stderr(contains("Usage: crowned-letter"));
}
