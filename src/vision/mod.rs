mod client;
mod types;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;

pub use self::client::*;
pub use self::types::*;

/// 图片标注服务
pub trait Annotator {
    /// 发送一次标注请求，返回服务端原始的 JSON
    fn annotate(
        &self,
        request: &BatchAnnotateRequest,
    ) -> impl std::future::Future<Output = Result<Value>> + Send;
}

/// 只请求人脸检测，返回检测到的人脸
pub async fn detect_faces<A: Annotator + Sync>(
    annotator: &A,
    content: String,
    max_results: u32,
) -> Result<Vec<FaceAnnotation>> {
    let response = annotator.annotate(&BatchAnnotateRequest::faces(content, max_results)).await?;
    faces_from_response(&response)
}

/// 从标注结果中取出第一张图片的人脸，没有人脸时返回空列表
pub fn faces_from_response(value: &Value) -> Result<Vec<FaceAnnotation>> {
    match value.pointer("/responses/0/faceAnnotations") {
        Some(faces) => {
            Ok(Vec::<FaceAnnotation>::deserialize(faces).context("invalid faceAnnotations")?)
        }
        None => Ok(vec![]),
    }
}
