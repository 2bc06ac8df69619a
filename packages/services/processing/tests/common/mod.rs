#![allow(dead_code)]

use std::io::Cursor;

use processing_service::{router, Config, ProcessingService};
use reqwest::multipart::{Form, Part};
use tempfile::TempDir;

pub struct TestServer {
    pub base: String,
    pub service: ProcessingService,
    pub upload_dir: TempDir,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub fn stored_file_count(&self) -> usize {
        std::fs::read_dir(self.upload_dir.path()).unwrap().count()
    }
}

/// Serves the full router on an ephemeral port with uploads in a temp dir.
pub async fn spawn_server(tweak: impl FnOnce(&mut Config)) -> TestServer {
    let upload_dir = tempfile::tempdir().unwrap();
    let mut cfg = Config { upload_dir: upload_dir.path().to_path_buf(), stage_delay_ms: 0, ..Config::default() };
    tweak(&mut cfg);

    let service = ProcessingService::new(cfg).await.unwrap();
    let app = router(service.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

    TestServer { base: format!("http://{}", addr), service, upload_dir }
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_fn(width, height, |x, y| image::Rgb([(x * 3) as u8, (y * 5) as u8, 200]));
    let mut buffer = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buffer), image::ImageFormat::Png)
        .unwrap();
    buffer
}

pub fn image_part(name: &str, mime: &str, data: Vec<u8>) -> Part {
    Part::bytes(data).file_name(name.to_string()).mime_str(mime).unwrap()
}

pub fn png_form(count: usize) -> Form {
    (0..count).fold(Form::new(), |form, i| {
        form.part("images", image_part(&format!("road-{}.png", i), "image/png", png_bytes(64, 48)))
    })
}
