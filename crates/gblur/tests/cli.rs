use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

/// Runs the binary against an empty config file so user settings never leak in.
fn gblur(config_dir: &Path, args: &[&str]) -> Output {
    let config = config_dir.join("config.toml");
    if !config.exists() {
        fs::write(&config, "").unwrap();
    }
    Command::new(env!("CARGO_BIN_EXE_gblur"))
        .env("GBLUR_CONFIG", &config)
        .env("RUST_LOG", "warn")
        .args(args)
        .output()
        .expect("failed to run gblur")
}

fn write_solid_png(path: &Path, width: u32, height: u32, rgb: [u8; 3]) {
    image::RgbImage::from_pixel(width, height, image::Rgb(rgb))
        .save(path)
        .unwrap();
}

#[test]
fn out_of_range_selectors_are_rejected() {
    let root = TempDir::new().unwrap();
    let input = root.path().join("input.png");
    write_solid_png(&input, 4, 4, [10, 20, 30]);
    let input = input.to_str().unwrap();

    for selector in ["0", "4", "abc"] {
        let output = gblur(root.path(), &[input, selector]);
        assert!(!output.status.success(), "accepted selector {selector}");
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(
            stderr.contains("expected 1 (naive)"),
            "unexpected stderr for {selector}: {stderr}"
        );
    }
}

#[test]
fn missing_selector_prints_usage() {
    let root = TempDir::new().unwrap();
    let output = gblur(root.path(), &["input.png"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("1|2|3"), "unexpected stderr: {stderr}");
}

#[test]
fn cpu_export_preserves_solid_image() {
    let root = TempDir::new().unwrap();
    let input = root.path().join("input.png");
    let output_path = root.path().join("blurred.png");
    write_solid_png(&input, 9, 5, [200, 40, 120]);

    for selector in ["1", "2", "3"] {
        let output = gblur(
            root.path(),
            &[
                input.to_str().unwrap(),
                selector,
                "--export",
                output_path.to_str().unwrap(),
                "--backend",
                "cpu",
            ],
        );
        assert!(
            output.status.success(),
            "strategy {selector} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );

        let written = image::open(&output_path).unwrap().to_rgba8();
        assert_eq!(written.dimensions(), (9, 5));
        assert!(written.pixels().all(|px| px.0 == [200, 40, 120, 255]));
    }
}

#[test]
fn missing_image_is_fatal() {
    let root = TempDir::new().unwrap();
    let output_path = root.path().join("never.png");
    let output = gblur(
        root.path(),
        &[
            root.path().join("absent.png").to_str().unwrap(),
            "2",
            "--export",
            output_path.to_str().unwrap(),
            "--backend",
            "cpu",
        ],
    );
    assert!(!output.status.success());
    assert!(!output_path.exists());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("absent.png"), "unexpected stderr: {stderr}");
}

#[test]
fn invalid_config_file_is_fatal() {
    let root = TempDir::new().unwrap();
    fs::write(root.path().join("config.toml"), "[window]\nsize = \"huge\"\n").unwrap();
    let input = root.path().join("input.png");
    write_solid_png(&input, 4, 4, [1, 2, 3]);

    let output = gblur(
        root.path(),
        &[
            input.to_str().unwrap(),
            "1",
            "--export",
            root.path().join("out.png").to_str().unwrap(),
            "--backend",
            "cpu",
        ],
    );
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("configuration"), "unexpected stderr: {stderr}");
}
