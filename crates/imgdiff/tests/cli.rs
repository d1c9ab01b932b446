use std::path::{Path, PathBuf};

use assert_cmd::Command;
use image::{GrayImage, Luma, Rgb, RgbImage, Rgba, RgbaImage};
use predicates::prelude::*;
use tempfile::TempDir;

fn imgdiff() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_imgdiff"));
    cmd.env_remove("IMGDIFF_CONFIG")
        .env_remove("IMGDIFF_FAIL")
        .env_remove("IMGDIFF_WARN");
    cmd
}

fn gray(dir: &Path, name: &str, pixels: [u8; 4]) -> PathBuf {
    let path = dir.join(name);
    let img = GrayImage::from_fn(2, 2, |x, y| Luma([pixels[(y * 2 + x) as usize]]));
    img.save(&path).unwrap();
    path
}

fn s(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[test]
fn identical_images_pass() {
    let dir = TempDir::new().unwrap();
    let a = gray(dir.path(), "a.png", [10, 20, 30, 40]);
    let b = gray(dir.path(), "b.png", [10, 20, 30, 40]);

    imgdiff()
        .args([s(&a), s(&b)])
        .assert()
        .code(0)
        .stdout(format!(
            "Comparing \"{}\" and \"{}\"\nPASS\n",
            a.display(),
            b.display()
        ));
}

#[test]
fn single_bright_pixel_fails() {
    let dir = TempDir::new().unwrap();
    let a = gray(dir.path(), "a.png", [0, 0, 0, 0]);
    let b = gray(dir.path(), "b.png", [255, 0, 0, 0]);

    imgdiff()
        .args(["-fail", "0.5", "-failpercent", "0", s(&a), s(&b)])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("  Mean error = 0.25\n"))
        .stdout(predicate::str::contains("  RMS error = 0.5\n"))
        .stdout(predicate::str::contains("  Max error  = 1 @ (0, 0, Y)\n"))
        .stdout(predicate::str::contains("  1 pixels (25%) over 1e-06\n"))
        .stdout(predicate::str::contains("  1 pixels (25%) over 0.5\n"))
        .stdout(predicate::str::ends_with("FAILURE\n"));
}

#[test]
fn small_difference_only_warns() {
    let dir = TempDir::new().unwrap();
    let a = gray(dir.path(), "a.png", [0, 0, 0, 0]);
    let b = gray(dir.path(), "b.png", [0, 0, 0, 51]);

    imgdiff()
        .args(["--fail", "0.5", s(&a), s(&b)])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("  Max error  = 0.2 @ (1, 1, Y)\n"))
        .stdout(predicate::str::ends_with("WARNING\n"));
}

#[test]
fn percentage_tolerance_passes() {
    let dir = TempDir::new().unwrap();
    let a = gray(dir.path(), "a.png", [0, 0, 0, 0]);
    let b = gray(dir.path(), "b.png", [255, 0, 0, 0]);

    imgdiff()
        .args(["-failpercent", "25", "-warnpercent", "25", s(&a), s(&b)])
        .assert()
        .code(0);

    imgdiff()
        .args(["-failpercent", "25", "-warnpercent", "25", "-hardfail", "0.9", s(&a), s(&b)])
        .assert()
        .code(2);
}

#[test]
fn channel_count_mismatch() {
    let dir = TempDir::new().unwrap();
    let a = dir.path().join("a.png");
    let b = dir.path().join("b.png");
    RgbImage::from_pixel(2, 2, Rgb([0, 0, 0])).save(&a).unwrap();
    RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 255])).save(&b).unwrap();

    imgdiff()
        .args([s(&a), s(&b)])
        .assert()
        .code(3)
        .stdout(predicate::str::contains(
            "Images do not match in size: (2x2x3) versus (2x2x4)\n",
        ))
        .stdout(predicate::str::contains("  0 pixels (0%) over 1e-06\n"))
        .stdout(predicate::str::contains("Mean error").not())
        .stdout(predicate::str::ends_with("FAILURE\n"));
}

#[test]
fn missing_file_is_a_file_error() {
    let dir = TempDir::new().unwrap();
    let a = gray(dir.path(), "a.png", [0, 0, 0, 0]);
    let missing = dir.path().join("missing.png");

    imgdiff()
        .args([s(&a), s(&missing)])
        .assert()
        .code(4)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("imgdiff ERROR: Could not read"))
        .stderr(predicate::str::contains("missing.png"));
}

#[test]
fn absolute_difference_image() {
    let dir = TempDir::new().unwrap();
    let a = gray(dir.path(), "a.png", [50, 100, 0, 0]);
    let b = gray(dir.path(), "b.png", [50, 200, 0, 0]);
    let diff = dir.path().join("out").join("diff.png");

    imgdiff()
        .args(["-o", s(&diff), "-abs", s(&a), s(&b)])
        .assert()
        .code(2);

    let written = image::open(&diff).unwrap().to_luma16();
    assert_eq!(written.dimensions(), (2, 2));
    assert_eq!(written.get_pixel(0, 0)[0], 0);
    // |100 - 200| / 255 in 16 bits.
    assert!(written.get_pixel(1, 0)[0].abs_diff(25700) <= 2);
    assert_eq!(written.get_pixel(0, 1)[0], 0);
}

#[test]
fn only_if_different_skips_identical_images() {
    let dir = TempDir::new().unwrap();
    let a = gray(dir.path(), "a.png", [1, 2, 3, 4]);
    let b = gray(dir.path(), "b.png", [1, 2, 3, 4]);
    let diff = dir.path().join("diff.png");

    imgdiff()
        .args(["-o", s(&diff), "-od", s(&a), s(&b)])
        .assert()
        .code(0);
    assert!(!diff.exists());

    imgdiff().args(["-o", s(&diff), s(&a), s(&b)]).assert().code(0);
    assert!(diff.exists());
}

#[test]
fn config_file_supplies_thresholds() {
    let dir = TempDir::new().unwrap();
    let a = gray(dir.path(), "a.png", [0, 0, 0, 0]);
    let b = gray(dir.path(), "b.png", [0, 0, 0, 51]);
    let config = dir.path().join("imgdiff.toml");
    std::fs::write(&config, "[thresholds]\nfail = 0.5\nwarn = 0.5\n").unwrap();

    imgdiff()
        .args(["--config", s(&config), s(&a), s(&b)])
        .assert()
        .code(0);

    imgdiff()
        .args(["--config", s(&config), "-warn", "0.1", s(&a), s(&b)])
        .assert()
        .code(1);
}

#[test]
fn env_threshold_sits_between_file_and_cli() {
    let dir = TempDir::new().unwrap();
    let a = gray(dir.path(), "a.png", [0, 0, 0, 0]);
    let b = gray(dir.path(), "b.png", [0, 0, 0, 51]);

    imgdiff()
        .env("IMGDIFF_FAIL", "0.5")
        .env("IMGDIFF_WARN", "0.5")
        .args([s(&a), s(&b)])
        .assert()
        .code(0);

    imgdiff()
        .env("IMGDIFF_FAIL", "0.5")
        .env("IMGDIFF_WARN", "0.5")
        .args(["-fail", "0.1", s(&a), s(&b)])
        .assert()
        .code(2);
}

#[test]
fn broken_config_is_a_file_error() {
    let dir = TempDir::new().unwrap();
    let a = gray(dir.path(), "a.png", [0, 0, 0, 0]);
    let config = dir.path().join("imgdiff.toml");
    std::fs::write(&config, "[thresholds]\nfail = \"high\"\n").unwrap();

    imgdiff()
        .args(["--config", s(&config), s(&a), s(&a)])
        .assert()
        .code(4)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("imgdiff ERROR:"));

    imgdiff()
        .env("IMGDIFF_WARN", "abc")
        .args([s(&a), s(&a)])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("IMGDIFF_WARN"));
}

#[test]
fn verbose_prints_stats_for_passing_runs() {
    let dir = TempDir::new().unwrap();
    let a = gray(dir.path(), "a.png", [9, 9, 9, 9]);

    imgdiff()
        .args(["-v", s(&a), s(&a)])
        .assert()
        .code(0)
        .stdout(predicate::str::contains("  Peak SNR = inf\n"))
        .stdout(predicate::str::contains("  0 pixels (0%) over 1e-06\n"))
        .stdout(predicate::str::ends_with("PASS\n"));
}

#[test]
fn usage_errors_exit_one() {
    imgdiff().arg("only-one.png").assert().code(1);
    imgdiff()
        .arg("--help")
        .assert()
        .code(0)
        .stdout(predicate::str::contains("IMAGE_A"));
}
