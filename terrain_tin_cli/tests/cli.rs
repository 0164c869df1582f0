use assert_cmd::prelude::*;
use assert_fs::prelude::*;
use predicates::prelude::*;
use std::process::Command;

const SURFACE: &str = r#"<?xml version="1.0"?>
<LandXML><Surfaces><Surface name="S"><Definition surfType="TIN">
<Pnts>
<P id="1">0 0 1</P><P id="2">2 0 1</P><P id="3">2 2 3</P><P id="4">0 2 3</P>
</Pnts>
<Faces><F>1 2 3</F><F>1 3 4</F></Faces>
</Definition></Surface></Surfaces></LandXML>
"#;

fn bin() -> Command {
    Command::cargo_bin("terrain_tin_cli").unwrap()
}

#[test]
fn info_command() {
    let file = assert_fs::NamedTempFile::new("surface.xml").unwrap();
    file.write_str(SURFACE).unwrap();
    bin()
        .args(["info", file.path().to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Triangles: 2"))
        .stdout(predicate::str::contains("Area: 4.000"));
}

#[test]
fn clip_command() {
    let dir = assert_fs::TempDir::new().unwrap();
    let input = dir.child("surface.xml");
    input.write_str(SURFACE).unwrap();
    let boundary = dir.child("boundary.csv");
    boundary.write_str("0.5,0.5\n1.5,0.5\n1.5,1.5\n0.5,1.5\n").unwrap();
    let output = dir.child("clipped.xml");
    bin()
        .args([
            "clip",
            input.path().to_str().unwrap(),
            boundary.path().to_str().unwrap(),
            output.path().to_str().unwrap(),
        ])
        .assert()
        .success();
    output.assert(predicate::str::contains("<Faces>"));
    bin()
        .args(["info", output.path().to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Area: 1.000"));
    dir.close().unwrap();
}

#[test]
fn delta_elevation_command() {
    let dir = assert_fs::TempDir::new().unwrap();
    let input = dir.child("surface.xml");
    input.write_str(SURFACE).unwrap();
    let output = dir.child("delta.xml");
    bin()
        .args([
            "delta-elevation",
            input.path().to_str().unwrap(),
            "1.0",
            output.path().to_str().unwrap(),
        ])
        .assert()
        .success();
    output.assert(predicate::str::contains("0 0 0</P>"));
    dir.close().unwrap();
}

#[test]
fn delta_command_of_surface_with_itself() {
    let dir = assert_fs::TempDir::new().unwrap();
    let input = dir.child("surface.xml");
    input.write_str(SURFACE).unwrap();
    let output = dir.child("delta.xml");
    bin()
        .args([
            "delta",
            input.path().to_str().unwrap(),
            input.path().to_str().unwrap(),
            output.path().to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("0 unlocated, 0 unmerged"));
    output.assert(predicate::str::contains("2 2 0</P>"));
    dir.close().unwrap();
}

#[test]
fn join_command() {
    let dir = assert_fs::TempDir::new().unwrap();
    let input = dir.child("lines.geojson");
    input
        .write_str(
            r#"{"type":"FeatureCollection","features":[
{"type":"Feature","properties":{"feature_type":"breakline","user_tag":1},"geometry":{"type":"LineString","coordinates":[[0,0,0],[1,0,0]]}},
{"type":"Feature","properties":{"feature_type":"breakline","user_tag":1},"geometry":{"type":"LineString","coordinates":[[1,0,0],[2,1,0]]}}]}"#,
        )
        .unwrap();
    let output = dir.child("joined.geojson");
    bin()
        .args([
            "join",
            input.path().to_str().unwrap(),
            output.path().to_str().unwrap(),
            "--tolerance",
            "0.01",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Before: 2"))
        .stdout(predicate::str::contains("After: 1"));
    output.assert(predicate::str::contains("LineString"));
    dir.close().unwrap();
}

#[test]
fn check_command() {
    let file = assert_fs::NamedTempFile::new("surface.xml").unwrap();
    file.write_str(SURFACE).unwrap();
    bin()
        .args(["check", file.path().to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Topology OK"));
}

#[test]
fn disjoint_clip_fails() {
    let dir = assert_fs::TempDir::new().unwrap();
    let input = dir.child("surface.xml");
    input.write_str(SURFACE).unwrap();
    let boundary = dir.child("boundary.csv");
    boundary.write_str("10,10\n11,10\n11,11\n").unwrap();
    let output = dir.child("clipped.xml");
    bin()
        .args([
            "clip",
            input.path().to_str().unwrap(),
            boundary.path().to_str().unwrap(),
            output.path().to_str().unwrap(),
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("do not overlap"));
    dir.close().unwrap();
}

#[test]
fn settings_file_is_loaded() {
    let dir = assert_fs::TempDir::new().unwrap();
    let settings = dir.child("settings.json");
    settings.write_str(r#"{ "integrity_checks": true }"#).unwrap();
    let input = dir.child("surface.xml");
    input.write_str(SURFACE).unwrap();
    bin()
        .args([
            "--settings",
            settings.path().to_str().unwrap(),
            "info",
            input.path().to_str().unwrap(),
        ])
        .assert()
        .success();
    dir.close().unwrap();
}

#[test]
fn volume_command_splits_cut_and_fill() {
    let file = assert_fs::NamedTempFile::new("surface.xml").unwrap();
    file.write_str(SURFACE).unwrap();
    bin()
        .args(["volume", file.path().to_str().unwrap(), "2.0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Cut: 1.000 over 2.000"))
        .stdout(predicate::str::contains("Fill: 1.000 over 2.000"));
}

#[test]
fn volume_command_with_region() {
    let dir = assert_fs::TempDir::new().unwrap();
    let input = dir.child("surface.xml");
    input.write_str(SURFACE).unwrap();
    let region = dir.child("region.csv");
    region.write_str("-1,1\n3,1\n3,3\n-1,3\n").unwrap();
    bin()
        .args([
            "volume",
            input.path().to_str().unwrap(),
            "2.0",
            "--region",
            region.path().to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Cut: 1.000 over 2.000"))
        .stdout(predicate::str::contains("Fill: 0.000 over 0.000"));
}
