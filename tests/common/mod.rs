//! Shared test utilities

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use serde_json::{Value, json};

use einfo_retrieval::{Config, Embedder, Error, Result};

/// Topic words mapped onto fixed vector axes
const AXES: &[&str] = &["hochwasser", "sandsack", "strom", "brand"];

/// Embedder placing texts on topic axes, with a switch to simulate outages
#[derive(Default)]
pub struct KeywordEmbedder {
    pub calls: AtomicUsize,
    pub failing: AtomicBool,
}

impl KeywordEmbedder {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

/// Vector for a text on the topic axes plus a small constant component
pub fn topic_vector(text: &str) -> Vec<f32> {
    let lower = text.to_lowercase();
    let mut v: Vec<f32> = AXES
        .iter()
        .map(|axis| if lower.contains(axis) { 1.0 } else { 0.0 })
        .collect();
    v.push(0.1);
    v
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::EmbeddingTimeout(Duration::from_secs(1)));
        }
        Ok(topic_vector(text))
    }

    fn model(&self) -> &str {
        "keywords"
    }
}

/// Knowledge and index directories inside a temp dir
pub struct Fixture {
    pub dir: tempfile::TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        std::fs::create_dir_all(dir.path().join("knowledge")).expect("knowledge dir");
        std::fs::create_dir_all(dir.path().join("index")).expect("index dir");
        Self { dir }
    }

    pub fn knowledge_dir(&self) -> PathBuf {
        self.dir.path().join("knowledge")
    }

    pub fn index_dir(&self) -> PathBuf {
        self.dir.path().join("index")
    }

    pub fn config(&self) -> Config {
        Config::with_dirs(self.knowledge_dir(), self.index_dir())
    }

    /// Write JSONL records into the knowledge directory
    pub fn write_records(&self, name: &str, records: &[Value]) {
        let body: Vec<String> = records.iter().map(Value::to_string).collect();
        write(&self.knowledge_dir().join(name), &body.join("\n"));
    }

    /// Write an aligned index of `(source file, text)` chunks embedded on the topic axes
    pub fn write_index(&self, chunks: &[(&str, &str)]) {
        let meta = json!({
            "dim": AXES.len() + 1,
            "files": chunks.iter().map(|(file, _)| json!({"name": file, "chunks": 1})).collect::<Vec<_>>(),
            "chunks": chunks
                .iter()
                .enumerate()
                .map(|(i, (file, text))| json!({"id": i, "fileName": file, "text": text}))
                .collect::<Vec<_>>(),
        });
        let embeddings = json!({
            "vectors": chunks.iter().map(|(_, text)| topic_vector(text)).collect::<Vec<_>>(),
        });
        write(&self.index_dir().join("meta.json"), &meta.to_string());
        write(&self.index_dir().join("embeddings.json"), &embeddings.to_string());
    }

    /// Push the modification time of every index artifact forward
    pub fn touch_index(&self, offset: Duration) {
        for name in ["meta.json", "embeddings.json"] {
            touch(&self.index_dir().join(name), offset);
        }
    }
}

pub fn write(path: &Path, content: &str) {
    std::fs::write(path, content).expect("write fixture");
}

pub fn touch(path: &Path, offset: Duration) {
    let file = std::fs::File::options().write(true).open(path).expect("open fixture");
    file.set_modified(SystemTime::now() + offset).expect("set mtime");
}

pub fn hospital(id: &str, name: &str, lat: f64, lon: f64, municipality: &str) -> Value {
    json!({
        "doc_type": "poi",
        "doc_id": id,
        "title": name,
        "name": name,
        "category": "amenity:hospital",
        "address": {"street": "Hauptstraße", "housenumber": "1", "municipality": municipality},
        "geo": {"lat": lat, "lon": lon},
    })
}

pub fn municipality(name: &str, bbox: [f64; 4]) -> Value {
    json!({
        "doc_type": "municipality_index",
        "doc_id": format!("gemeinde-{name}"),
        "municipality": name,
        "geo": {"bbox": bbox},
    })
}
