use serde::{Deserialize, Serialize};

/// Vision API 支持的检测类型
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeatureType {
    FaceDetection,
    LandmarkDetection,
    LogoDetection,
    LabelDetection,
    TextDetection,
    ImageProperties,
    SafeSearchDetection,
}

impl FeatureType {
    /// 默认请求的全部检测类型，顺序即请求中的顺序
    pub const ALL: [FeatureType; 7] = [
        FeatureType::FaceDetection,
        FeatureType::LandmarkDetection,
        FeatureType::LogoDetection,
        FeatureType::LabelDetection,
        FeatureType::TextDetection,
        FeatureType::ImageProperties,
        FeatureType::SafeSearchDetection,
    ];
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Feature {
    #[serde(rename = "type")]
    pub kind: FeatureType,
    pub max_results: u32,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ImageContent {
    /// base64 编码的图片
    pub content: String,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct AnnotateImageRequest {
    pub image: ImageContent,
    pub features: Vec<Feature>,
}

/// `images:annotate` 的请求体
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct BatchAnnotateRequest {
    pub requests: Vec<AnnotateImageRequest>,
}

impl BatchAnnotateRequest {
    pub fn new(content: String, kinds: &[FeatureType], max_results: u32) -> Self {
        let features = kinds.iter().map(|&kind| Feature { kind, max_results }).collect();
        Self { requests: vec![AnnotateImageRequest { image: ImageContent { content }, features }] }
    }

    /// 请求全部七种检测
    pub fn all_features(content: String, max_results: u32) -> Self {
        Self::new(content, &FeatureType::ALL, max_results)
    }

    /// 只请求人脸检测
    pub fn faces(content: String, max_results: u32) -> Self {
        Self::new(content, &[FeatureType::FaceDetection], max_results)
    }

    /// 图片数据的总长度
    pub fn payload_len(&self) -> usize {
        self.requests.iter().map(|r| r.image.content.len()).sum()
    }
}

#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Vertex {
    #[serde(default)]
    pub x: i32,
    #[serde(default)]
    pub y: i32,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct BoundingPoly {
    #[serde(default)]
    pub vertices: Vec<Vertex>,
}

/// 人脸检测结果中绘制轮廓所需的部分
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FaceAnnotation {
    #[serde(default)]
    pub fd_bounding_poly: BoundingPoly,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn request_body_has_seven_features() {
        let request = BatchAnnotateRequest::all_features("AAAA".into(), 20);
        let body = serde_json::to_value(&request).unwrap();

        let features = body["requests"][0]["features"].as_array().unwrap();
        let kinds: Vec<_> = features.iter().map(|f| f["type"].as_str().unwrap()).collect();
        assert_eq!(
            kinds,
            [
                "FACE_DETECTION",
                "LANDMARK_DETECTION",
                "LOGO_DETECTION",
                "LABEL_DETECTION",
                "TEXT_DETECTION",
                "IMAGE_PROPERTIES",
                "SAFE_SEARCH_DETECTION",
            ]
        );
        assert!(features.iter().all(|f| f["maxResults"] == json!(20)));
        assert_eq!(body["requests"][0]["image"]["content"], json!("AAAA"));
        assert_eq!(body["requests"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn face_request() {
        let request = BatchAnnotateRequest::faces("AAAA".into(), 4);
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "requests": [{
                    "image": { "content": "AAAA" },
                    "features": [{ "type": "FACE_DETECTION", "maxResults": 4 }],
                }]
            })
        );
        assert_eq!(request.payload_len(), 4);
    }

    #[test]
    fn missing_vertex_coordinates_default_to_zero() {
        let face: FaceAnnotation = serde_json::from_value(json!({
            "fdBoundingPoly": { "vertices": [{ "x": 3 }, { "y": 7 }, {}] },
            "joyLikelihood": "VERY_UNLIKELY",
        }))
        .unwrap();
        assert_eq!(
            face.fd_bounding_poly.vertices,
            [Vertex { x: 3, y: 0 }, Vertex { x: 0, y: 7 }, Vertex { x: 0, y: 0 }]
        );
    }
}
