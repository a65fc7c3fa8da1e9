use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::Result;
use assert_cmd::prelude::*;
use mockito::Matcher;
use predicates::prelude::*;

const API_PATH: &str = "/v1/images:annotate";

macro_rules! cargo_run {
    ($cmd:expr, $($args:expr),*) => {
        {
            let mut cmd = Command::cargo_bin($cmd)?;
            $(cmd.arg($args);)*
            cmd.assert()
        }
    };
}

fn write_jpeg(path: &Path) -> Result<()> {
    image::RgbImage::from_pixel(16, 16, image::Rgb([120, 80, 40])).save(path)?;
    Ok(())
}

/// 空配置文件，避免读取用户目录下的配置
fn empty_config(dir: &Path) -> Result<PathBuf> {
    let path = dir.join("config.toml");
    fs::write(&path, "")?;
    Ok(path)
}

#[test]
fn help_lists_commands() -> Result<()> {
    cargo_run!("fotometa", "--help")
        .success()
        .stdout(predicate::str::contains("annotate"))
        .stdout(predicate::str::contains("batch"))
        .stdout(predicate::str::contains("highlight"));
    Ok(())
}

#[test]
fn batch_over_processed_dir_makes_no_calls() -> Result<()> {
    let temp = assert_fs::TempDir::new()?;
    let photos = temp.path().join("photos");
    fs::create_dir_all(photos.join("2009"))?;
    for name in ["a.jpg", "2009/b.JPG"] {
        write_jpeg(&photos.join(name))?;
        fs::write(photos.join(format!("{name}.json")), "{}")?;
    }
    let config = empty_config(temp.path())?;

    // 如果发起请求，token 命令会失败
    cargo_run!(
        "fotometa",
        "-c",
        &config,
        "--endpoint",
        "http://127.0.0.1:9/v1/images:annotate",
        "--token-command",
        "exit 1",
        "batch",
        &photos
    )
    .success()
    .stdout(predicate::str::contains("written: 0, skipped: 2, empty: 0, failed: 0"));

    Ok(())
}

#[test]
fn batch_requires_root() -> Result<()> {
    let temp = assert_fs::TempDir::new()?;
    let config = empty_config(temp.path())?;

    cargo_run!("fotometa", "-c", &config, "batch")
        .failure()
        .stderr(predicate::str::contains("no root directory"));

    Ok(())
}

#[test]
fn batch_annotates_only_new_images() -> Result<()> {
    let temp = assert_fs::TempDir::new()?;
    let photos = temp.path().join("photos");
    fs::create_dir_all(&photos)?;
    write_jpeg(&photos.join("a.jpg"))?;
    write_jpeg(&photos.join("b.jpg"))?;
    fs::write(photos.join("b.jpg.json"), "old")?;

    let config = temp.path().join("config.toml");
    fs::write(&config, format!("root = '{}'\napi_key = 'k'\n", photos.display()))?;

    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", API_PATH)
        .match_query(Matcher::UrlEncoded("key".into(), "k".into()))
        .match_body(Matcher::Regex("SAFE_SEARCH_DETECTION".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"responses":[{"labelAnnotations":[{"description":"Künstler"}]}]}"#)
        .expect(1)
        .create();

    cargo_run!("fotometa", "-c", &config, "--endpoint", server.url() + API_PATH, "batch")
        .success()
        .stdout(predicate::str::contains("written: 1, skipped: 1, empty: 0, failed: 0"));
    mock.assert();

    let text = fs::read_to_string(photos.join("a.jpg.json"))?;
    assert!(text.contains("K\\u00fcnstler"));
    assert_eq!(fs::read_to_string(photos.join("b.jpg.json"))?, "old");

    Ok(())
}

#[test]
fn batch_reports_failures() -> Result<()> {
    let temp = assert_fs::TempDir::new()?;
    write_jpeg(&temp.path().join("a.jpg"))?;
    let config = empty_config(temp.path())?;

    let mut server = mockito::Server::new();
    server.mock("POST", API_PATH).with_status(429).with_body("RESOURCE_EXHAUSTED").create();

    cargo_run!(
        "fotometa",
        "-c",
        &config,
        "--endpoint",
        server.url() + API_PATH,
        "--access-token",
        "t",
        "batch",
        temp.path()
    )
    .failure()
    .stdout(predicate::str::contains("failed: 1"));
    assert!(!temp.path().join("a.jpg.json").exists());

    Ok(())
}

#[test]
fn annotate_writes_output() -> Result<()> {
    let temp = assert_fs::TempDir::new()?;
    let photo = temp.path().join("in.jpg");
    let output = temp.path().join("result.json");
    write_jpeg(&photo)?;
    let config = empty_config(temp.path())?;

    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", API_PATH)
        .match_header("authorization", "Bearer t")
        .match_body(Matcher::Regex(r#""maxResults":3"#.into()))
        .with_status(200)
        .with_body(r#"{"responses":[{}]}"#)
        .create();

    cargo_run!(
        "fotometa",
        "-c",
        &config,
        "--endpoint",
        server.url() + API_PATH,
        "--access-token",
        "t",
        "annotate",
        &photo,
        "--out",
        &output,
        "--max-results",
        "3"
    )
    .success()
    .stdout(predicate::str::contains("written file"));
    mock.assert();

    assert_eq!(fs::read_to_string(&output)?, "{\n  \"responses\": [\n    {}\n  ]\n}");
    Ok(())
}

#[test]
fn highlight_from_sidecar() -> Result<()> {
    let temp = assert_fs::TempDir::new()?;
    let photo = temp.path().join("face.jpg");
    let output = temp.path().join("face.png");
    write_jpeg(&photo)?;
    fs::write(
        temp.path().join("face.jpg.json"),
        r#"{"responses":[{"faceAnnotations":[{"fdBoundingPoly":{"vertices":[{"x":2,"y":2},{"x":12,"y":2},{"x":12,"y":12},{"x":2,"y":12}]}}]}]}"#,
    )?;
    let config = empty_config(temp.path())?;

    cargo_run!("fotometa", "-c", &config, "highlight", &photo, "--out", &output)
        .success()
        .stdout(predicate::str::contains("Found 1 face"));

    let saved = image::open(&output)?.to_rgb8();
    assert_eq!(saved.get_pixel(7, 2), &image::Rgb([0, 255, 0]));

    Ok(())
}

#[test]
fn highlight_from_faces_file() -> Result<()> {
    let temp = assert_fs::TempDir::new()?;
    let photo = temp.path().join("face.jpg");
    let faces = temp.path().join("faces.json");
    let output = temp.path().join("face.png");
    write_jpeg(&photo)?;
    // 结果文件里没有人脸，应该使用 --faces 指定的文件
    fs::write(temp.path().join("face.jpg.json"), r#"{"responses":[{}]}"#)?;
    fs::write(
        &faces,
        r#"{"responses":[{"faceAnnotations":[{"fdBoundingPoly":{"vertices":[{"x":3,"y":3},{"x":13,"y":3},{"x":13,"y":13}]}},{"fdBoundingPoly":{"vertices":[{"x":1},{"x":5,"y":1}]}}]}]}"#,
    )?;
    let config = empty_config(temp.path())?;

    cargo_run!("fotometa", "-c", &config, "highlight", &photo, "--out", &output, "--faces", &faces)
        .success()
        .stdout(predicate::str::contains("Found 2 faces"));

    let saved = image::open(&output)?.to_rgb8();
    assert_eq!(saved.get_pixel(8, 3), &image::Rgb([0, 255, 0]));

    Ok(())
}

#[test]
fn highlight_without_sidecar_requests_faces() -> Result<()> {
    let temp = assert_fs::TempDir::new()?;
    let photo = temp.path().join("face.jpg");
    let output = temp.path().join("face.png");
    write_jpeg(&photo)?;
    let config = empty_config(temp.path())?;

    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", API_PATH)
        .match_header("authorization", "Bearer t")
        .match_body(Matcher::Regex(
            r#""features":\[\{"type":"FACE_DETECTION","maxResults":4\}\]"#.into(),
        ))
        .with_status(200)
        .with_body(
            r#"{"responses":[{"faceAnnotations":[{"fdBoundingPoly":{"vertices":[{"x":2,"y":2},{"x":12,"y":2},{"x":12,"y":12}]}}]}]}"#,
        )
        .expect(1)
        .create();

    cargo_run!(
        "fotometa",
        "-c",
        &config,
        "--endpoint",
        server.url() + API_PATH,
        "--access-token",
        "t",
        "highlight",
        &photo,
        "--out",
        &output
    )
    .success()
    .stdout(predicate::str::contains("Found 1 face"));
    mock.assert();

    let saved = image::open(&output)?.to_rgb8();
    assert_eq!(saved.get_pixel(7, 2), &image::Rgb([0, 255, 0]));
    // 不会生成结果文件
    assert!(!temp.path().join("face.jpg.json").exists());

    Ok(())
}
