//! Fixtures shared by the router-level tests.

use crate::error::{PipelineError, StoreError};
use crate::model::{Classifier, ModelHandle};
use crate::server::{routes, types::AppState, types::PredictSettings};
use crate::storage::{BlobStore, MemoryBlobStore, MemoryRecordStore, PredictionRecord, RecordStore};
use async_trait::async_trait;
use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderMap, Method, Request, StatusCode, Uri},
    Router,
};
use bytes::Bytes;
use image::{DynamicImage, GrayImage, ImageFormat, Luma, Rgb, RgbImage, Rgba, RgbaImage};
use metrics_exporter_prometheus::PrometheusBuilder;
use ndarray::Array4;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

pub const BOUNDARY: &str = "dermascan-test-boundary";

/// Classifier returning a constant and remembering the input shapes it saw.
#[derive(Default)]
pub struct FixedScore {
    pub score: f32,
    pub shapes: Mutex<Vec<Vec<usize>>>,
}

impl FixedScore {
    pub fn new(score: f32) -> Arc<Self> {
        Arc::new(Self {
            score,
            shapes: Mutex::new(Vec::new()),
        })
    }

    pub fn seen_shapes(&self) -> Vec<Vec<usize>> {
        self.shapes.lock().unwrap().clone()
    }
}

impl Classifier for FixedScore {
    fn score(&self, input: Array4<f32>) -> Result<f32, PipelineError> {
        self.shapes.lock().unwrap().push(input.shape().to_vec());
        Ok(self.score)
    }
}

pub struct FailingClassifier;

impl Classifier for FailingClassifier {
    fn score(&self, _input: Array4<f32>) -> Result<f32, PipelineError> {
        Err(PipelineError::EmptyOutput)
    }
}

pub struct FailingBlobs;

#[async_trait]
impl BlobStore for FailingBlobs {
    async fn put(&self, _key: &str, _bytes: Bytes, _content_type: &str) -> Result<(), StoreError> {
        Err(StoreError::Rejected {
            status: 403,
            body: "permission denied".to_string(),
        })
    }

    fn backend_name(&self) -> &'static str {
        "failing"
    }
}

pub struct FailingRecords;

#[async_trait]
impl RecordStore for FailingRecords {
    async fn put(&self, _collection: &str, _record: &PredictionRecord) -> Result<(), StoreError> {
        Err(StoreError::Task("document store unreachable".to_string()))
    }

    fn backend_name(&self) -> &'static str {
        "failing"
    }
}

/// Router plus handles on its in-memory backends.
pub struct Harness {
    pub router: Router,
    pub blobs: MemoryBlobStore,
    pub records: MemoryRecordStore,
    pub settings: PredictSettings,
}

impl Harness {
    pub fn ready(model: Arc<dyn Classifier>) -> Self {
        Self::with_model(ModelHandle::ready(model))
    }

    pub fn with_model(model: ModelHandle) -> Self {
        Self::with_settings(model, PredictSettings::default())
    }

    pub fn with_settings(model: ModelHandle, settings: PredictSettings) -> Self {
        let blobs = MemoryBlobStore::new();
        let records = MemoryRecordStore::new();
        let state = AppState {
            model,
            blobs: Arc::new(blobs.clone()),
            records: Arc::new(records.clone()),
            settings: settings.clone(),
        };
        Self {
            router: router(state),
            blobs,
            records,
            settings,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        send(&self.router, request).await
    }
}

pub fn router(state: AppState) -> Router {
    let handle = PrometheusBuilder::new().build_recorder().handle();
    routes::create_router(state, handle)
}

pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, body)
}

// --- images ---

fn encode(img: DynamicImage) -> Vec<u8> {
    let mut buffer = Vec::new();
    img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .unwrap();
    buffer
}

pub fn rgb_png(width: u32, height: u32) -> Vec<u8> {
    encode(DynamicImage::ImageRgb8(RgbImage::from_pixel(
        width,
        height,
        Rgb([200, 120, 90]),
    )))
}

pub fn rgba_png(width: u32, height: u32) -> Vec<u8> {
    encode(DynamicImage::ImageRgba8(RgbaImage::from_pixel(
        width,
        height,
        Rgba([200, 120, 90, 128]),
    )))
}

pub fn gray_png(width: u32, height: u32) -> Vec<u8> {
    encode(DynamicImage::ImageLuma8(GrayImage::from_pixel(
        width,
        height,
        Luma([140]),
    )))
}

// --- multipart bodies ---

#[derive(Default)]
pub struct MultipartBody {
    body: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(
        mut self,
        field: &str,
        file_name: &str,
        content_type: Option<&str>,
        bytes: &[u8],
    ) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n"
            )
            .as_bytes(),
        );
        if let Some(content_type) = content_type {
            self.body
                .extend_from_slice(format!("Content-Type: {content_type}\r\n").as_bytes());
        }
        self.body.extend_from_slice(b"\r\n");
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn text(mut self, field: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    pub fn into_request(mut self) -> Request<Body> {
        self.body
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        Request::builder()
            .method("POST")
            .uri("/predict")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(self.body))
            .unwrap()
    }
}

pub fn image_request(file_name: &str, content_type: &str, bytes: &[u8]) -> Request<Body> {
    MultipartBody::new()
        .file("image", file_name, Some(content_type), bytes)
        .into_request()
}

// --- fake HTTP backend ---

/// One request as seen by [`FakeBackend`].
#[derive(Clone, Debug)]
pub struct Captured {
    pub method: Method,
    pub path: String,
    pub query: HashMap<String, String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Captured {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

#[derive(Clone)]
struct FakeState {
    status: StatusCode,
    body: Bytes,
    seen: Arc<Mutex<Vec<Captured>>>,
}

/// Answers every request on a loopback port with a fixed status and body,
/// recording what it received.
pub struct FakeBackend {
    pub base_url: String,
    seen: Arc<Mutex<Vec<Captured>>>,
}

impl FakeBackend {
    pub async fn start(status: StatusCode, body: impl Into<Bytes>) -> Self {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let state = FakeState {
            status,
            body: body.into(),
            seen: seen.clone(),
        };
        let app = Router::new().fallback(capture).with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            seen,
        }
    }

    pub fn requests(&self) -> Vec<Captured> {
        self.seen.lock().unwrap().clone()
    }

    pub fn only_request(&self) -> Captured {
        let requests = self.requests();
        assert_eq!(requests.len(), 1, "expected exactly one request");
        requests.into_iter().next().unwrap()
    }
}

async fn capture(
    State(state): State<FakeState>,
    method: Method,
    uri: Uri,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Bytes) {
    state.seen.lock().unwrap().push(Captured {
        method,
        path: uri.path().to_string(),
        query,
        headers,
        body,
    });
    (state.status, state.body.clone())
}
