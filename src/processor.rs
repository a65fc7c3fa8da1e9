use std::path::Path;

use anyhow::{Context, Result};
use indicatif::ProgressBar;
use log::{debug, error};
use tokio::task::spawn_blocking;

use crate::encode::{CompressOptions, encode_payload};
use crate::sidecar::{self, WriteMode, WriteOutcome};
use crate::vision::{Annotator, BatchAnnotateRequest};
use crate::walker::Job;

/// 处理单张图片：压缩、请求 Vision API、写入结果文件
pub async fn process_image<A: Annotator + Sync>(
    annotator: &A,
    image: &Path,
    output: &Path,
    max_results: u32,
    compress: &CompressOptions,
    mode: WriteMode,
) -> Result<WriteOutcome> {
    let data = tokio::fs::read(image)
        .await
        .with_context(|| format!("failed to read {}", image.display()))?;
    debug!("{}: {} bytes", image.display(), data.len());

    let opts = *compress;
    let payload = spawn_blocking(move || encode_payload(&data, &opts))
        .await?
        .with_context(|| format!("failed to encode {}", image.display()))?;

    let request = BatchAnnotateRequest::all_features(payload.content, max_results);
    let response = annotator
        .annotate(&request)
        .await
        .with_context(|| format!("failed to annotate {}", image.display()))?;

    sidecar::write_output(&response, output, mode)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub written: usize,
    /// 已有结果文件而跳过的图片
    pub skipped: usize,
    pub empty: usize,
    pub failed: usize,
}

/// 依次处理所有图片，单张图片失败不影响其他图片
pub async fn process_batch<A: Annotator + Sync>(
    annotator: &A,
    jobs: Vec<Job>,
    max_results: u32,
    compress: &CompressOptions,
    pb: &ProgressBar,
) -> BatchSummary {
    let mut summary = BatchSummary::default();

    for job in jobs {
        pb.set_message(job.image.display().to_string());

        // 扫描之后出现的结果文件同样不覆盖，写入时还会再检查一次
        if job.output.exists() {
            pb.suspend(|| println!("[SKIP] {}", job.image.display()));
            summary.skipped += 1;
            pb.inc(1);
            continue;
        }

        let mode = WriteMode::CreateNew;
        match process_image(annotator, &job.image, &job.output, max_results, compress, mode).await
        {
            Ok(WriteOutcome::Written(_)) => {
                pb.suspend(|| println!("[OK] {}", job.output.display()));
                summary.written += 1;
            }
            Ok(WriteOutcome::Exists) => {
                pb.suspend(|| println!("[SKIP] {}", job.image.display()));
                summary.skipped += 1;
            }
            Ok(WriteOutcome::Empty) => {
                pb.suspend(|| {
                    println!("NO JSON file written, zero length: {}", job.output.display())
                });
                summary.empty += 1;
            }
            Err(e) => {
                pb.suspend(|| error!("{}: {:#}", job.image.display(), e));
                summary.failed += 1;
            }
        }
        pb.inc(1);
    }

    summary
}
