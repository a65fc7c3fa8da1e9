use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use indicatif::ProgressBar;
use log::info;
use tokio::task::block_in_place;

use crate::cli::SubCommandExtend;
use crate::config::Opts;
use crate::processor::process_batch;
use crate::utils::pb_style;
use crate::vision::VisionClient;
use crate::walker::{pending, scan};

#[derive(Parser, Debug, Clone)]
pub struct BatchCommand {
    /// 图片所在目录，不填则使用配置文件中的 root
    pub root: Option<PathBuf>,
    /// 结果文件后缀，追加在图片文件名之后，默认 .json
    #[arg(short, long, value_name = "SUFFIX")]
    pub suffix: Option<String>,
    /// 扫描的文件后缀名，区分大小写，多个后缀用逗号分隔，默认 jpg,JPG
    #[arg(short, long, value_name = "LIST", value_delimiter = ',')]
    pub extensions: Option<Vec<String>>,
    /// 每种检测返回的最大结果数，默认 20
    #[arg(long, value_name = "N")]
    pub max_results: Option<u32>,
}

impl SubCommandExtend for BatchCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let config = opts.resolve()?;

        let root = self
            .root
            .clone()
            .or_else(|| config.root.clone())
            .context("no root directory: pass ROOT or set `root` in the config file")?;
        let suffix = self.suffix.clone().unwrap_or_else(|| config.suffix.clone());
        if suffix.is_empty() {
            bail!("sidecar suffix must not be empty");
        }
        let extensions = self.extensions.clone().unwrap_or_else(|| config.extensions.clone());
        let max_results = self.max_results.unwrap_or(config.max_results);

        let images = block_in_place(|| scan(&root, &extensions))?;
        let (jobs, skipped) = pending(images, &suffix);
        info!("{} 张图片已有结果文件，{} 张待处理", skipped, jobs.len());

        let client = VisionClient::from_config(&config)?;
        let pb = ProgressBar::new(jobs.len() as u64).with_style(pb_style());
        let mut summary = process_batch(&client, jobs, max_results, &config.compress, &pb).await;
        summary.skipped += skipped;
        pb.finish_and_clear();

        println!(
            "written: {}, skipped: {}, empty: {}, failed: {}",
            summary.written, summary.skipped, summary.empty, summary.failed
        );
        if summary.failed > 0 {
            bail!("{} image(s) failed", summary.failed);
        }
        Ok(())
    }
}
