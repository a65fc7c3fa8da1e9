use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use directories::ProjectDirs;
use serde::Deserialize;

use crate::cli::*;
use crate::encode::CompressOptions;

pub const DEFAULT_ENDPOINT: &str = "https://vision.googleapis.com/v1/images:annotate";
pub const DEFAULT_TOKEN_COMMAND: &str = "gcloud auth application-default print-access-token";
pub const DEFAULT_SUFFIX: &str = ".json";
pub const DEFAULT_EXTENSIONS: [&str; 2] = ["jpg", "JPG"];
pub const DEFAULT_MAX_RESULTS: u32 = 20;

/// 默认配置文件路径
pub fn default_config_file() -> Option<PathBuf> {
    ProjectDirs::from("", "", "fotometa").map(|dirs| dirs.config_dir().join("config.toml"))
}

#[derive(Parser, Debug, Clone)]
#[command(name = "fotometa", version, about = "使用 Vision API 为照片生成元数据")]
pub struct Opts {
    #[command(subcommand)]
    pub subcmd: SubCommand,
    /// 配置文件路径，默认读取用户配置目录下的 config.toml（不存在时忽略）
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Vision API 地址
    #[arg(long, value_name = "URL")]
    pub endpoint: Option<String>,
    /// 单次请求超时时间（秒），不填则一直等待
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
    #[command(flatten)]
    pub credential: CredentialOptions,
    #[command(flatten)]
    pub compress: CompressArgs,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SubCommand {
    /// 为单张图片调用 Vision API 并保存返回的 JSON
    Annotate(AnnotateCommand),
    /// 扫描目录，为没有结果文件的图片调用 Vision API
    Batch(BatchCommand),
    /// 在图片上画出检测到的人脸轮廓
    Highlight(HighlightCommand),
}

#[derive(Args, Debug, Clone, Default)]
pub struct CredentialOptions {
    /// API key，以 `key` 参数附加在请求地址上
    #[arg(long, value_name = "KEY", env = "FOTOMETA_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,
    /// OAuth access token，以 Bearer 方式发送
    #[arg(long, value_name = "TOKEN", env = "FOTOMETA_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,
    /// 输出 access token 的命令
    /// 默认：gcloud auth application-default print-access-token
    #[arg(long, value_name = "CMD", verbatim_doc_comment)]
    pub token_command: Option<String>,
}

impl CredentialOptions {
    fn credential(&self) -> Option<Credential> {
        pick_credential(&self.api_key, &self.access_token, &self.token_command)
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct CompressArgs {
    /// 图片 base64 编码后的最大长度
    #[arg(long, value_name = "N")]
    pub max_size: Option<usize>,
    /// 超限时第一次重新编码使用的 JPEG 质量
    #[arg(long, value_name = "Q", value_parser = clap::value_parser!(u8).range(1..=100))]
    pub start_quality: Option<u8>,
    /// 每次重新编码降低的质量
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u8).range(1..=100))]
    pub quality_step: Option<u8>,
    /// 允许的最低质量
    #[arg(long, value_name = "Q", value_parser = clap::value_parser!(u8).range(1..=100))]
    pub min_quality: Option<u8>,
}

impl CompressArgs {
    fn apply(&self, base: CompressOptions) -> CompressOptions {
        CompressOptions {
            max_size: self.max_size.unwrap_or(base.max_size),
            start_quality: self.start_quality.unwrap_or(base.start_quality),
            quality_step: self.quality_step.unwrap_or(base.quality_step),
            min_quality: self.min_quality.unwrap_or(base.min_quality),
        }
    }
}

/// 访问 Vision API 的凭据
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    ApiKey(String),
    AccessToken(String),
    /// 运行命令，标准输出即 access token
    Command(String),
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ApiKey(_) => f.write_str("ApiKey(***)"),
            Self::AccessToken(_) => f.write_str("AccessToken(***)"),
            Self::Command(cmd) => f.debug_tuple("Command").field(cmd).finish(),
        }
    }
}

impl Default for Credential {
    fn default() -> Self {
        Self::Command(DEFAULT_TOKEN_COMMAND.to_string())
    }
}

fn pick_credential(
    api_key: &Option<String>,
    access_token: &Option<String>,
    token_command: &Option<String>,
) -> Option<Credential> {
    let non_empty = |s: &Option<String>| s.clone().filter(|s| !s.trim().is_empty());
    non_empty(api_key)
        .map(Credential::ApiKey)
        .or_else(|| non_empty(access_token).map(Credential::AccessToken))
        .or_else(|| non_empty(token_command).map(Credential::Command))
}

/// 配置文件内容，所有字段均可省略
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub access_token: Option<String>,
    pub token_command: Option<String>,
    pub timeout: Option<u64>,
    /// 批量处理的根目录
    pub root: Option<PathBuf>,
    pub suffix: Option<String>,
    pub extensions: Option<Vec<String>>,
    pub max_results: Option<u32>,
    pub compress: CompressOptions,
}

impl FileConfig {
    /// 读取配置文件
    ///
    /// 显式指定的文件必须存在；默认位置的文件不存在时返回空配置
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match default_config_file() {
                Some(path) if path.is_file() => path,
                _ => return Ok(Self::default()),
            },
        };
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

/// 合并命令行与配置文件后的最终配置
#[derive(Debug, Clone)]
pub struct Config {
    pub endpoint: String,
    pub credential: Credential,
    pub timeout: Option<Duration>,
    pub compress: CompressOptions,
    pub root: Option<PathBuf>,
    pub suffix: String,
    pub extensions: Vec<String>,
    pub max_results: u32,
}

impl Opts {
    /// 读取配置文件并与命令行参数合并，命令行优先
    pub fn resolve(&self) -> Result<Config> {
        let file = FileConfig::load(self.config.as_deref())?;
        Ok(self.merge(file))
    }

    pub fn merge(&self, file: FileConfig) -> Config {
        let credential = self
            .credential
            .credential()
            .or_else(|| pick_credential(&file.api_key, &file.access_token, &file.token_command))
            .unwrap_or_default();

        Config {
            endpoint: self
                .endpoint
                .clone()
                .or(file.endpoint)
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            credential,
            timeout: self.timeout.or(file.timeout).map(Duration::from_secs),
            compress: self.compress.apply(file.compress),
            root: file.root,
            suffix: file.suffix.unwrap_or_else(|| DEFAULT_SUFFIX.to_string()),
            extensions: file
                .extensions
                .unwrap_or_else(|| DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect()),
            max_results: file.max_results.unwrap_or(DEFAULT_MAX_RESULTS),
        }
    }
}
