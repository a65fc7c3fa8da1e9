use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use log::{info, warn};
use regex::Regex;
use walkdir::WalkDir;

/// 一张待处理的图片
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub image: PathBuf,
    pub output: PathBuf,
}

/// 结果文件路径：在完整文件名后追加后缀，如 `a.jpg` -> `a.jpg.json`
pub fn sidecar_path(image: &Path, suffix: &str) -> PathBuf {
    let mut path = OsString::from(image.as_os_str());
    path.push(suffix);
    PathBuf::from(path)
}

/// 匹配文件名后缀的正则，区分大小写
pub fn extension_regex(extensions: &[String]) -> Result<Regex> {
    let alternatives = extensions
        .iter()
        .map(|ext| ext.trim().trim_start_matches('.'))
        .filter(|ext| !ext.is_empty())
        .map(regex::escape)
        .collect::<Vec<_>>();
    if alternatives.is_empty() {
        bail!("no image extensions given");
    }
    Ok(Regex::new(&format!(r"\.(?:{})$", alternatives.join("|")))?)
}

/// 递归扫描目录，返回所有匹配后缀的文件，按路径排序
pub fn scan(root: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        bail!("{} is not a directory", root.display());
    }
    let re = extension_regex(extensions)?;

    info!("开始扫描目录: {}", root.display());
    let mut images = WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("跳过无法读取的路径: {}", e);
                None
            }
        })
        .filter(|entry| re.is_match(&entry.file_name().to_string_lossy()))
        .map(|entry| entry.into_path())
        .filter(|path| path.is_file())
        .collect::<Vec<_>>();
    images.sort();
    info!("扫描完成，共 {} 张图片", images.len());

    Ok(images)
}

/// 过滤掉已有结果文件的图片，返回待处理列表和跳过的数量
pub fn pending(images: Vec<PathBuf>, suffix: &str) -> (Vec<Job>, usize) {
    let total = images.len();
    let jobs = images
        .into_iter()
        .filter_map(|image| {
            let output = sidecar_path(&image, suffix);
            if output.exists() { None } else { Some(Job { image, output }) }
        })
        .collect::<Vec<_>>();
    let skipped = total - jobs.len();
    (jobs, skipped)
}
