use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use docchat::answer::load_latest_answer;
use docchat::config::Config;
use docchat::document_store::DocumentStore;
use docchat::extract::read_docx_paragraphs;
use docchat::locator::ChunkLocator;
use docchat::pipeline::{self, SourceState};
use docchat::{export, index_store::IndexStore};
use docchat_core::embedding::Embedder;
use docchat_core::generate::TextGenerator;
use docchat_core::models::ChunkRef;
use docchat_core::{BuildStage, RagError, RagResult};
use tempfile::TempDir;

/// Counts occurrences of a fixed vocabulary; unknown words are ignored.
struct KeywordEmbedder {
    vocab: Vec<&'static str>,
    fail: AtomicBool,
}

impl KeywordEmbedder {
    fn new() -> Self {
        Self::with_vocab(vec![
            "capital", "france", "paris", "japan", "tokyo", "revenue", "louvre", "region",
        ])
    }

    fn with_vocab(vocab: Vec<&'static str>) -> Self {
        Self {
            vocab,
            fail: AtomicBool::new(false),
        }
    }

    fn vector(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0; self.vocab.len()];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .map(|w| w.to_lowercase())
        {
            if let Some(i) = self.vocab.iter().position(|v| *v == word) {
                v[i] += 1.0;
            }
        }
        v
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    fn model_name(&self) -> &str {
        "keywords"
    }
    fn dims(&self) -> usize {
        self.vocab.len()
    }
    async fn embed_batch(&self, texts: &[String]) -> RagResult<Vec<Vec<f32>>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(RagError::Embedding("embedding service unavailable".into()));
        }
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }
}

/// Returns a canned answer and records every prompt.
struct ScriptedGenerator {
    reply: Result<String, String>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    fn replying(text: &str) -> Self {
        Self {
            reply: Ok(text.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    fn model_name(&self) -> &str {
        "scripted"
    }
    async fn generate(&self, prompt: &str) -> RagResult<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.reply.clone().map_err(RagError::Generation)
    }
}

fn docx(paragraphs: &[&str]) -> Vec<u8> {
    use std::io::Write;
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", p))
        .collect();
    let xml = format!(
        "<w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>{}</w:body></w:document>",
        body
    );
    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.write_all(xml.as_bytes()).unwrap();
        zip.finish().unwrap();
    }
    buf
}

fn setup() -> (TempDir, Config) {
    let tmp = TempDir::new().unwrap();
    let uploads = tmp.path().join("uploads");
    fs::create_dir_all(&uploads).unwrap();
    fs::write(
        uploads.join("france.txt"),
        "Paris is the capital of France. The Louvre is in Paris.",
    )
    .unwrap();
    fs::write(uploads.join("japan.txt"), "Tokyo is the capital of Japan.").unwrap();
    fs::write(
        uploads.join("report.docx"),
        docx(&["Quarterly report", "Revenue grew in every region."]),
    )
    .unwrap();
    fs::write(uploads.join("photo.png"), b"not indexed").unwrap();

    let mut config = Config::default();
    config.paths.upload_dir = uploads;
    config.paths.index_dir = tmp.path().join("index");
    config.embedding.batch_size = 2;
    (tmp, config)
}

async fn build(config: &Config, embedder: &KeywordEmbedder) {
    pipeline::build_index(config, embedder).await.unwrap();
}

#[tokio::test]
async fn answers_from_the_most_relevant_chunk() {
    let (_tmp, config) = setup();
    let embedder = Arc::new(KeywordEmbedder::new());
    build(&config, &embedder).await;

    let generator = Arc::new(ScriptedGenerator::replying("Paris."));
    let answer = pipeline::answer_question(
        &config,
        embedder.clone(),
        generator.clone(),
        "What is the capital of France?",
        5,
    )
    .await
    .unwrap();

    assert_eq!(answer.answer, "Paris.");
    assert_eq!(answer.citations.len(), 3);
    assert_eq!(answer.citations[0].source_id, "france.txt");
    assert_eq!(answer.citations[0].ordinal, 0);
    assert_eq!(answer.citations[1].source_id, "japan.txt");

    let prompt = generator.last_prompt().unwrap();
    assert!(prompt.starts_with("You are a helpful assistant that answers strictly using the provided context."));
    assert!(prompt.contains("Paris is the capital of France."));
    assert!(prompt.ends_with("Question: What is the capital of France?\n\nAnswer:"));
    let france = prompt.find("Paris is the capital").unwrap();
    let japan = prompt.find("Tokyo is the capital").unwrap();
    assert!(france < japan);

    assert_eq!(
        load_latest_answer(&config.paths.index_dir).unwrap().as_deref(),
        Some("Paris.")
    );
}

#[tokio::test]
async fn citations_resolve_to_their_chunk_text() {
    let (_tmp, config) = setup();
    let embedder = Arc::new(KeywordEmbedder::new());
    build(&config, &embedder).await;

    let answer = pipeline::answer_question(
        &config,
        embedder,
        Arc::new(ScriptedGenerator::replying("ok")),
        "How did revenue do in each region?",
        2,
    )
    .await
    .unwrap();
    assert_eq!(answer.citations.len(), 2);
    assert_eq!(answer.citations[0].source_id, "report.docx");

    for citation in &answer.citations {
        let located = pipeline::locate_chunk(&config, &citation.source_id, citation.ordinal).unwrap();
        assert!(located.chunk.text.starts_with(&citation.preview));
        assert!(citation.preview.chars().count() <= 200);
    }

    let page = pipeline::view_chunk(&config, "report.docx", 0).unwrap();
    assert!(page.contains("<h2 style=\"margin-top:0\">report.docx</h2>"));
    assert!(page.contains("<a id='chunk-0'></a><mark"));
}

#[tokio::test]
async fn ask_before_build_is_index_not_found() {
    let (_tmp, config) = setup();
    let err = pipeline::answer_question(
        &config,
        Arc::new(KeywordEmbedder::new()),
        Arc::new(ScriptedGenerator::replying("unused")),
        "anything?",
        5,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, RagError::IndexNotFound { .. }));
}

#[tokio::test]
async fn zero_k_is_rejected() {
    let (_tmp, config) = setup();
    let embedder = Arc::new(KeywordEmbedder::new());
    build(&config, &embedder).await;
    let generator = Arc::new(ScriptedGenerator::replying("unused"));
    let err = pipeline::answer_question(&config, embedder, generator.clone(), "capital?", 0)
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::Config(_)));
    assert!(generator.last_prompt().is_none());
}

#[tokio::test]
async fn generation_failure_is_reported_and_not_saved() {
    let (_tmp, config) = setup();
    let embedder = Arc::new(KeywordEmbedder::new());
    build(&config, &embedder).await;

    let err = pipeline::answer_question(
        &config,
        embedder,
        Arc::new(ScriptedGenerator::failing("model overloaded")),
        "What is the capital of Japan?",
        5,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, RagError::Generation(ref m) if m.contains("overloaded")));
    assert_eq!(load_latest_answer(&config.paths.index_dir).unwrap(), None);
}

#[tokio::test]
async fn question_embedding_failure_is_generation_error() {
    let (_tmp, config) = setup();
    let embedder = Arc::new(KeywordEmbedder::new());
    build(&config, &embedder).await;
    embedder.fail.store(true, Ordering::SeqCst);

    let err = pipeline::answer_question(
        &config,
        embedder,
        Arc::new(ScriptedGenerator::replying("unused")),
        "capital?",
        5,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, RagError::Generation(_)));
}

#[tokio::test]
async fn empty_upload_dir_is_empty_corpus() {
    let tmp = TempDir::new().unwrap();
    let mut config = Config::default();
    config.paths.upload_dir = tmp.path().join("uploads");
    config.paths.index_dir = tmp.path().join("index");
    fs::create_dir_all(&config.paths.upload_dir).unwrap();
    fs::write(config.paths.upload_dir.join("slides.pptx"), b"unsupported").unwrap();

    let err = pipeline::build_index(&config, &KeywordEmbedder::new())
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::EmptyCorpus { .. }));
    assert!(IndexStore::new(&config.paths.index_dir)
        .current_version()
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn failed_rebuild_keeps_serving_previous_index() {
    let (_tmp, config) = setup();
    let embedder = KeywordEmbedder::new();
    build(&config, &embedder).await;
    let store = IndexStore::new(&config.paths.index_dir);
    let before = store.current_version().unwrap();

    fs::write(config.paths.upload_dir.join("extra.txt"), "More about Tokyo.").unwrap();
    embedder.fail.store(true, Ordering::SeqCst);
    let err = pipeline::build_index(&config, &embedder).await.unwrap_err();
    assert!(matches!(
        err,
        RagError::Build {
            stage: BuildStage::Embedding,
            ..
        }
    ));
    assert_eq!(store.current_version().unwrap(), before);
    assert_eq!(store.load().unwrap().index.len(), 3);
}

#[tokio::test]
async fn embedder_with_other_dimensions_is_incompatible() {
    let (_tmp, config) = setup();
    build(&config, &KeywordEmbedder::new()).await;

    let err = pipeline::answer_question(
        &config,
        Arc::new(KeywordEmbedder::with_vocab(vec!["capital", "france"])),
        Arc::new(ScriptedGenerator::replying("unused")),
        "capital?",
        5,
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err,
        RagError::IncompatibleIndex {
            index_dims: 8,
            query_dims: 2
        }
    ));
}

#[tokio::test]
async fn status_reports_changed_and_new_sources() {
    let (_tmp, config) = setup();
    build(&config, &KeywordEmbedder::new()).await;

    let status = pipeline::index_status(&config).unwrap();
    assert!(!status.is_stale());
    assert_eq!(status.entries, 3);
    assert_eq!(status.model, "keywords");

    fs::write(config.paths.upload_dir.join("japan.txt"), "Kyoto was the capital of Japan.").unwrap();
    fs::write(config.paths.upload_dir.join("new.csv"), "a,b\n1,2\n").unwrap();
    fs::remove_file(config.paths.upload_dir.join("france.txt")).unwrap();

    let status = pipeline::index_status(&config).unwrap();
    let state = |id: &str| {
        status
            .sources
            .iter()
            .find(|s| s.source_id == id)
            .map(|s| s.state)
    };
    assert_eq!(state("japan.txt"), Some(SourceState::Changed));
    assert_eq!(state("new.csv"), Some(SourceState::New));
    assert_eq!(state("france.txt"), Some(SourceState::Missing));
    assert_eq!(state("report.docx"), Some(SourceState::Indexed));
    assert!(status.is_stale());
}

#[tokio::test]
async fn exports_latest_answer_as_docx() {
    let (_tmp, config) = setup();
    let embedder = Arc::new(KeywordEmbedder::new());
    build(&config, &embedder).await;
    assert!(export::export_summary(&config.paths.index_dir, None).is_err());

    pipeline::answer_question(
        &config,
        embedder,
        Arc::new(ScriptedGenerator::replying("Tokyo is the capital of Japan.")),
        "What is the capital of Japan?",
        5,
    )
    .await
    .unwrap();

    let out = config.paths.index_dir.join("out").join("summary.docx");
    let path = export::export_summary(&config.paths.index_dir, Some(Path::new(&out))).unwrap();
    let paragraphs = read_docx_paragraphs(&fs::read(path).unwrap()).unwrap();
    assert_eq!(
        paragraphs,
        vec![
            "DocChat Summary".to_string(),
            "Tokyo is the capital of Japan.".to_string()
        ]
    );
}

#[tokio::test]
async fn locate_uses_chunking_recorded_in_index() {
    let (_tmp, mut config) = setup();
    let long: String = (0..40).map(|i| format!("Sentence number {} about Paris. ", i)).collect();
    fs::write(config.paths.upload_dir.join("long.txt"), &long).unwrap();
    config.chunking.chunk_size = 200;
    config.chunking.overlap = 40;
    build(&config, &KeywordEmbedder::new()).await;

    let built = pipeline::locate_chunk(&config, "long.txt", 2).unwrap();

    // A later config change must not shift existing citations.
    config.chunking.chunk_size = 500;
    config.chunking.overlap = 50;
    let after = pipeline::locate_chunk(&config, "long.txt", 2).unwrap();
    assert_eq!(built.chunk.text, after.chunk.text);
    assert!(built.chunk.text.chars().count() <= 200);

    assert!(matches!(
        pipeline::locate_chunk(&config, "long.txt", 999),
        Err(RagError::ChunkNotFound { ordinal: 999, .. })
    ));
    assert!(matches!(
        pipeline::locate_chunk(&config, "nope.txt", 0),
        Err(RagError::SourceNotFound(_))
    ));
}

#[tokio::test]
async fn answer_fails_when_cited_source_was_deleted() {
    let (_tmp, config) = setup();
    let embedder = Arc::new(KeywordEmbedder::new());
    build(&config, &embedder).await;
    fs::remove_file(config.paths.upload_dir.join("france.txt")).unwrap();

    let generator = Arc::new(ScriptedGenerator::replying("unused"));
    let err = pipeline::answer_question(
        &config,
        embedder,
        generator.clone(),
        "What is the capital of France?",
        5,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, RagError::SourceNotFound(ref id) if id == "france.txt"));
    assert!(generator.last_prompt().is_none());
}

#[tokio::test]
async fn highlights_chunk_in_supplied_rendering() {
    let (_tmp, config) = setup();
    build(&config, &KeywordEmbedder::new()).await;

    let html = "<p>Quarterly report</p>\n<p>Revenue grew in every region.</p>";
    let highlighted = pipeline::locate_for_highlight(&config, "report.docx", 0, html).unwrap();
    assert!(highlighted.found);
    assert!(highlighted.html.contains("<mark"));

    let unrelated = pipeline::locate_for_highlight(&config, "report.docx", 0, "<p>other</p>").unwrap();
    assert!(!unrelated.found);
}

#[tokio::test]
async fn duplicate_citations_resolve_to_the_same_text() {
    let (_tmp, config) = setup();
    build(&config, &KeywordEmbedder::new()).await;

    let (_, manifest) = IndexStore::new(&config.paths.index_dir).manifest().unwrap();
    let documents = DocumentStore::from_config(&config).unwrap();
    let locator = ChunkLocator::new(&documents, manifest.params.chunker).unwrap();

    let refs = vec![
        ChunkRef::new("france.txt", 0),
        ChunkRef::new("report.docx", 0),
        ChunkRef::new("france.txt", 0),
    ];
    let located = locator.locate_all(&refs).unwrap();
    let texts: Vec<_> = located.iter().map(|l| l.chunk.text.as_str()).collect();
    assert_eq!(texts[0], "Paris is the capital of France. The Louvre is in Paris.");
    assert_eq!(texts[0], texts[2]);
    assert_eq!(texts[1], "Quarterly report\nRevenue grew in every region.");
    let order: Vec<_> = located.iter().map(|l| l.chunk.chunk_ref()).collect();
    assert_eq!(order, refs);
}
