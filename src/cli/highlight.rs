use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use serde_json::Value;
use tokio::task::{block_in_place, spawn_blocking};

use crate::cli::SubCommandExtend;
use crate::config::Opts;
use crate::encode::encode_payload;
use crate::highlight::highlight_file;
use crate::vision::{FaceAnnotation, VisionClient, detect_faces, faces_from_response};
use crate::walker::sidecar_path;

#[derive(Parser, Debug, Clone)]
pub struct HighlightCommand {
    /// 图片路径
    pub image: PathBuf,
    /// 输出图片路径，格式由后缀决定
    #[arg(long = "out", value_name = "PATH")]
    pub output: PathBuf,
    /// 已保存的 Vision API 结果
    /// 不填则读取图片的结果文件，结果文件不存在时请求 Vision API
    #[arg(long, value_name = "JSON", verbatim_doc_comment)]
    pub faces: Option<PathBuf>,
    /// 请求 Vision API 时人脸的最大数量
    #[arg(long, value_name = "N", default_value_t = 4)]
    pub max_results: u32,
}

impl SubCommandExtend for HighlightCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let config = opts.resolve()?;

        let faces = match &self.faces {
            Some(path) => load_faces(path)?,
            None => {
                let sidecar = sidecar_path(&self.image, &config.suffix);
                if sidecar.is_file() {
                    load_faces(&sidecar)?
                } else {
                    info!("没有找到结果文件，正在请求 Vision API");
                    let data = tokio::fs::read(&self.image)
                        .await
                        .with_context(|| format!("failed to read {}", self.image.display()))?;
                    let compress = config.compress;
                    let payload = spawn_blocking(move || encode_payload(&data, &compress)).await??;
                    let client = VisionClient::from_config(&config)?;
                    detect_faces(&client, payload.content, self.max_results).await?
                }
            }
        };

        println!("Found {} face{}", faces.len(), if faces.len() == 1 { "" } else { "s" });
        block_in_place(|| highlight_file(&self.image, &faces, &self.output))?;
        println!("written file {}", self.output.display());

        Ok(())
    }
}

fn load_faces(path: &Path) -> Result<Vec<FaceAnnotation>> {
    info!("读取人脸数据: {}", path.display());
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let value: Value = serde_json::from_str(&text)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    faces_from_response(&value)
}
