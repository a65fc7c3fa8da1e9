use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use log::info;

use crate::cli::SubCommandExtend;
use crate::config::Opts;
use crate::processor::process_image;
use crate::sidecar::{WriteMode, WriteOutcome};
use crate::vision::VisionClient;

#[derive(Parser, Debug, Clone)]
pub struct AnnotateCommand {
    /// 需要检测的图片
    pub input_image: PathBuf,
    /// 结果文件路径，已存在时覆盖
    #[arg(long = "out", value_name = "PATH", default_value = "out.json")]
    pub output: PathBuf,
    /// 每种检测返回的最大结果数，默认 20
    #[arg(long, value_name = "N")]
    pub max_results: Option<u32>,
}

impl SubCommandExtend for AnnotateCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let config = opts.resolve()?;
        let client = VisionClient::from_config(&config)?;
        let max_results = self.max_results.unwrap_or(config.max_results);

        info!("正在请求 Vision API: {}", self.input_image.display());
        let outcome = process_image(
            &client,
            &self.input_image,
            &self.output,
            max_results,
            &config.compress,
            WriteMode::Overwrite,
        )
        .await?;
        match outcome {
            WriteOutcome::Written(_) => println!("written file {}", self.output.display()),
            WriteOutcome::Empty => {
                println!("NO JSON file written, zero length: {}", self.output.display())
            }
            WriteOutcome::Exists => {}
        }
        Ok(())
    }
}
