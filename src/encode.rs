use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as Base64;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ExtendedColorType, ImageEncoder};
use log::{debug, info};
use serde::Deserialize;
use thiserror::Error;

/// Vision API 单次请求允许的最大 base64 长度
pub const DEFAULT_MAX_SIZE: usize = 5_500_000;

#[derive(Debug, Error)]
pub enum CompressError {
    #[error("failed to decode image: {0}")]
    Decode(String),

    #[error("failed to encode image: {0}")]
    Encode(String),

    #[error("image still too large at quality {quality}: {size} > {max_size}")]
    TooLarge { size: usize, max_size: usize, quality: u8 },

    #[error("invalid compress options: {0}")]
    InvalidOptions(&'static str),
}

/// 压缩参数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompressOptions {
    /// base64 编码后允许的最大长度（字符数）
    pub max_size: usize,
    /// 第一次重新编码使用的 JPEG 质量
    pub start_quality: u8,
    /// 每次重试降低的质量
    pub quality_step: u8,
    /// 最低质量，低于该值仍然超限则放弃
    pub min_quality: u8,
}

impl Default for CompressOptions {
    fn default() -> Self {
        Self { max_size: DEFAULT_MAX_SIZE, start_quality: 90, quality_step: 5, min_quality: 10 }
    }
}

impl CompressOptions {
    fn validate(&self) -> Result<(), CompressError> {
        if self.quality_step == 0 {
            return Err(CompressError::InvalidOptions("quality_step must be > 0"));
        }
        if !(1..=100).contains(&self.start_quality) {
            return Err(CompressError::InvalidOptions("start_quality must be in 1..=100"));
        }
        if self.min_quality == 0 || self.min_quality > self.start_quality {
            return Err(CompressError::InvalidOptions("min_quality must be in 1..=start_quality"));
        }
        Ok(())
    }
}

/// 发送给 Vision API 的图片数据
#[derive(Debug, Clone)]
pub struct Payload {
    /// base64 编码的图片
    pub content: String,
    /// 重新编码时使用的质量，`None` 表示使用原图
    pub quality: Option<u8>,
}

/// 填充后的标准 base64 长度
pub fn encoded_len(bytes: usize) -> usize {
    base64::encoded_len(bytes, true).unwrap_or(usize::MAX)
}

/// 将图片编码为 base64，超过 `max_size` 时逐步降低 JPEG 质量重新编码
pub fn encode_payload(data: &[u8], opts: &CompressOptions) -> Result<Payload, CompressError> {
    opts.validate()?;

    let size = encoded_len(data.len());
    if size <= opts.max_size {
        debug!("payload fits without re-encoding: {} KB", size / 1024);
        return Ok(Payload { content: Base64.encode(data), quality: None });
    }

    let image = image::load_from_memory(data).map_err(|e| CompressError::Decode(e.to_string()))?;

    let mut quality = opts.start_quality;
    loop {
        let jpeg = encode_jpeg(&image, quality)?;
        let size = encoded_len(jpeg.len());
        debug!("re-encoded at quality {}: {} KB", quality, size / 1024);

        if size <= opts.max_size {
            info!("final image size: {} KB (quality {})", size / 1024, quality);
            return Ok(Payload { content: Base64.encode(&jpeg), quality: Some(quality) });
        }

        match quality.checked_sub(opts.quality_step) {
            Some(next) if next >= opts.min_quality => quality = next,
            _ => return Err(CompressError::TooLarge { size, max_size: opts.max_size, quality }),
        }
    }
}

/// 以指定质量编码为 JPEG
pub fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>, CompressError> {
    let mut buffer = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buffer, quality);

    // JPEG 不支持透明通道，灰度图保留单通道
    let result = match image {
        DynamicImage::ImageLuma8(gray) => {
            encoder.write_image(gray.as_raw(), gray.width(), gray.height(), ExtendedColorType::L8)
        }
        _ => {
            let rgb = image.to_rgb8();
            encoder.write_image(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)
        }
    };
    result.map_err(|e| CompressError::Encode(e.to_string()))?;

    Ok(buffer)
}
