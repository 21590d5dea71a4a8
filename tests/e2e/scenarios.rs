//! End-to-end scenarios for the Recall gateway
//!
//! Each test wires the real pipeline, retriever and synthesizers over the
//! in-memory index and stores, with deterministic model fakes, and drives
//! them either through the HTTP router or the services directly.

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use recall_core::{ChangeEvent, Document, EmbeddingStatus, Message, Namespace};
use recall_gateway::{build_routes, AppState, WEBHOOK_SECRET_HEADER};
use recall_ingest::{DocumentProcessor, InMemoryBlobStore, InMemoryDocumentStore, IndexingPipeline, StatusTracker};
use recall_rag::{
    InMemoryPersonaDirectory, Persona, RagService, Retriever, SearchScope, SynthesizerConfig, UNNAMED_PERSONA,
};
use recall_runtime::{Embedder, EmbedderConfig, GenerateResponse, MockEmbeddingProvider, MockProvider};
use recall_vector::{InMemoryVectorIndex, UpsertBatching};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

const SECRET: &str = "scenario-secret";
const VOCABULARY: [&str; 8] = ["standup", "foo", "bar", "cooking", "coding", "rust", "pasta", "launch"];

struct World {
    router: Router,
    pipeline: IndexingPipeline,
    rag: RagService,
    retriever: Retriever,
    index: InMemoryVectorIndex,
    documents: InMemoryDocumentStore,
    blobs: InMemoryBlobStore,
    personas: InMemoryPersonaDirectory,
    embeddings: Arc<MockEmbeddingProvider>,
    generator: Arc<MockProvider>,
}

fn world() -> World {
    let embeddings = Arc::new(MockEmbeddingProvider::with_vocabulary(VOCABULARY));
    let embedder = Embedder::new(
        embeddings.clone(),
        EmbedderConfig::default().with_batching(20, Duration::ZERO),
    );
    let index = InMemoryVectorIndex::new(VOCABULARY.len());
    let documents = InMemoryDocumentStore::new();
    let blobs = InMemoryBlobStore::new();

    let processor = DocumentProcessor::new(Arc::new(documents.clone()), Arc::new(blobs.clone()));
    let pipeline = IndexingPipeline::new(
        processor,
        embedder.clone(),
        Arc::new(index.clone()),
        StatusTracker::new(Arc::new(documents.clone())),
    )
    .with_upsert_batching(UpsertBatching::new(100, Duration::ZERO));

    let retriever = Retriever::new(embedder, Arc::new(index.clone()));
    let generator = Arc::new(MockProvider::new());
    let personas = InMemoryPersonaDirectory::new();
    let rag = RagService::new(
        retriever.clone(),
        generator.clone(),
        Arc::new(personas.clone()),
        SynthesizerConfig::default(),
    );

    let state = AppState::new(pipeline.clone(), rag.clone(), Arc::new(personas.clone()), SECRET);
    World {
        router: build_routes(state),
        pipeline,
        rag,
        retriever,
        index,
        documents,
        blobs,
        personas,
        embeddings,
        generator,
    }
}

impl World {
    async fn send(&self, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .header(WEBHOOK_SECRET_HEADER, SECRET)
            .body(Body::from(body.to_string()))
            .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    /// Stores the file; the document row only arrives with its change event.
    async fn upload(&self, owner: Uuid, name: &str, mime_type: &str, content: &str) -> Document {
        let path = format!("{owner}/{name}");
        self.blobs.insert(path.clone(), content.to_string()).await;
        Document::new(owner, name, mime_type, path)
    }

    fn reply(&self, text: &str) {
        self.generator.enqueue_generate(Ok(GenerateResponse::text(text)));
    }
}

#[tokio::test]
async fn scenario_open_question_cites_indexed_message() {
    let w = world();
    let channel = Uuid::new_v4();
    let msg = Message::new(channel, Uuid::new_v4(), "Team standup moved to 10am");

    let (status, ack) = w
        .send("POST", "/v1/hooks/messages", serde_json::to_value(ChangeEvent::create(msg.clone())).unwrap())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["outcome"], "indexed");

    w.reply("Standup is now at 10am [1].");
    let (status, answer) = w
        .send("POST", "/v1/ask", json!({ "query": "when is standup", "channelId": channel }))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert!(answer["answer"].as_str().unwrap().contains("[1]"));
    let sources = answer["sources"].as_array().unwrap();
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0]["content"], "Team standup moved to 10am");
    assert!(sources[0]["score"].as_f64().unwrap() >= 0.3);
    assert!(w.generator.last_prompt().unwrap().contains("[1] ["));
}

#[tokio::test]
async fn scenario_persona_answer_grounded_in_matching_document() {
    let w = world();
    let persona_id = Uuid::new_v4();
    let (status, _) = w
        .send(
            "PUT",
            &format!("/v1/personas/{persona_id}"),
            json!({ "displayName": "Grace", "bio": "Compiler writer" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let cooking = w
        .upload(persona_id, "kitchen.txt", "text/plain", "Cooking pasta is my weekend hobby.")
        .await;
    let coding = w
        .upload(persona_id, "work.md", "text/markdown", "# Work\n\nI spend my days coding in Rust.")
        .await;
    for doc in [&cooking, &coding] {
        let (status, ack) = w
            .send("POST", "/v1/hooks/documents", serde_json::to_value(ChangeEvent::create(doc.clone())).unwrap())
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ack["outcome"], "indexed");
        assert_eq!(w.documents.status(doc.id).await, Some(EmbeddingStatus::Completed));
    }

    w.reply("Mostly Rust.");
    let (status, answer) = w
        .send(
            "POST",
            &format!("/v1/personas/{persona_id}/ask"),
            json!({ "query": "What are you coding these days?" }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    let relevant = answer["relevantDocuments"].as_array().unwrap();
    assert_eq!(relevant.len(), 1);
    assert_eq!(relevant[0]["documentId"], json!(coding.id));
    assert!(answer["formattedAnswer"]
        .as_str()
        .unwrap()
        .starts_with("Mostly Rust.\n\nSources:\n1. work.md"));

    let prompt = w.generator.last_prompt().unwrap();
    assert!(prompt.contains("coding in Rust"));
    assert!(!prompt.contains("pasta"));
}

#[tokio::test(start_paused = true)]
async fn scenario_unsupported_document_fails_and_stays_unsearchable() {
    let w = world();
    let owner = Uuid::new_v4();
    w.personas.insert(Persona::new(owner, "Linus")).await;
    let archive = w.upload(owner, "launch.zip", "application/zip", "launch launch launch").await;

    let (status, body) = w
        .send("POST", "/v1/hooks/documents", serde_json::to_value(ChangeEvent::create(archive.clone())).unwrap())
        .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["kind"], "unsupported_format");
    assert_eq!(w.documents.status(archive.id).await, Some(EmbeddingStatus::Failed));
    assert!(w.index.is_empty(Namespace::AvatarDocuments).await);

    w.reply("I have nothing on that.");
    let answer = w.rag.ask_persona_question("launch", owner).await.unwrap();
    assert!(answer.relevant_documents.is_empty());
}

#[tokio::test]
async fn scenario_edited_message_matches_new_content_only() {
    let w = world();
    let channel = Uuid::new_v4();
    let original = Message::new(channel, Uuid::new_v4(), "foo");
    w.pipeline
        .handle_message_event(ChangeEvent::create(original.clone()))
        .await
        .unwrap();

    let edited = original.clone().edited("bar");
    w.pipeline
        .handle_message_event(ChangeEvent::update(original.clone(), edited))
        .await
        .unwrap();

    w.reply("Nothing about foo.");
    let old = w.rag.ask_question("foo", Some(channel)).await.unwrap();
    assert!(old.sources.is_empty());

    w.reply("Someone said bar [1].");
    let new = w.rag.ask_question("bar", Some(channel)).await.unwrap();
    assert_eq!(new.sources.len(), 1);
    assert_eq!(new.sources[0].content, "bar");
    assert!(new.sources[0].is_edited);
}

#[tokio::test]
async fn duplicate_create_delivery_yields_one_record() {
    let w = world();
    let msg = Message::new(Uuid::new_v4(), Uuid::new_v4(), "launch checklist");
    let event = serde_json::to_value(ChangeEvent::create(msg.clone())).unwrap();

    for _ in 0..3 {
        let (status, _) = w.send("POST", "/v1/hooks/messages", event.clone()).await;
        assert_eq!(status, StatusCode::OK);
    }

    assert_eq!(w.index.len(Namespace::Messages).await, 1);
}

#[tokio::test]
async fn identical_text_ranks_first() {
    let w = world();
    let channel = Uuid::new_v4();
    let target = Message::new(channel, Uuid::new_v4(), "rust coding standup");
    let other = Message::new(channel, Uuid::new_v4(), "rust pasta");
    for msg in [&target, &other] {
        w.pipeline
            .handle_message_event(ChangeEvent::create(msg.clone()))
            .await
            .unwrap();
    }

    let results = w
        .retriever
        .similarity_search(
            "rust coding standup",
            SearchScope::Open { channel_id: Some(channel) },
            5,
        )
        .await
        .unwrap();

    assert_eq!(results[0].id, target.id);
    assert!((results[0].score - 1.0).abs() < 1e-5);
}

#[tokio::test]
async fn deleted_message_never_returns() {
    let w = world();
    let msg = Message::new(Uuid::new_v4(), Uuid::new_v4(), "launch is delayed");
    w.pipeline
        .handle_message_event(ChangeEvent::create(msg.clone()))
        .await
        .unwrap();

    let (status, ack) = w
        .send("POST", "/v1/hooks/messages", serde_json::to_value(ChangeEvent::delete(msg.clone())).unwrap())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["outcome"], "removed");

    for query in ["launch", "launch is delayed", "delayed"] {
        let results = w
            .retriever
            .similarity_search(query, SearchScope::Open { channel_id: None }, 10)
            .await
            .unwrap();
        assert!(results.iter().all(|r| r.id != msg.id));
    }
}

#[tokio::test]
async fn persona_search_never_crosses_owners() {
    let w = world();
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    let mine = w.upload(alice, "mine.txt", "text/plain", "coding notes").await;
    let theirs = w.upload(bob, "theirs.txt", "text/plain", "coding coding rust coding").await;
    for doc in [&mine, &theirs] {
        w.pipeline
            .handle_document_event(ChangeEvent::create(doc.clone()))
            .await
            .unwrap();
    }

    let results = w
        .retriever
        .similarity_search("coding coding rust coding", SearchScope::Persona { owner_id: alice }, 10)
        .await
        .unwrap();

    assert!(!results.is_empty());
    assert!(results.iter().all(|r| r.metadata.owner_id == alice));
}

#[tokio::test]
async fn weak_matches_are_used_but_not_cited() {
    let w = world();
    let channel = Uuid::new_v4();
    let weak = Message::new(channel, Uuid::new_v4(), "rust pasta cooking launch foo bar");
    w.pipeline
        .handle_message_event(ChangeEvent::create(weak.clone()))
        .await
        .unwrap();

    w.reply("Unclear.");
    let answer = w.rag.ask_question("standup rust", Some(channel)).await.unwrap();

    assert!(answer.sources.is_empty());
    assert!(w.generator.last_prompt().unwrap().contains("rust pasta cooking launch foo bar"));
}

#[tokio::test]
async fn long_document_embeds_as_one_text() {
    let w = world();
    let owner = Uuid::new_v4();
    let body = "launch ".repeat(15_000 / 7 + 1);
    let doc = w.upload(owner, "long.txt", "text/plain", &body[..15_000]).await;

    w.pipeline
        .handle_document_event(ChangeEvent::create(doc.clone()))
        .await
        .unwrap();
    let first = w.index.get(Namespace::AvatarDocuments, doc.id).await.unwrap();

    w.pipeline.reprocess_document(doc.id).await.unwrap();
    let second = w.index.get(Namespace::AvatarDocuments, doc.id).await.unwrap();

    assert_eq!(w.embeddings.batch_sizes(), vec![1, 1]);
    assert_eq!(w.index.len(Namespace::AvatarDocuments).await, 1);
    assert_eq!(first.metadata.content, second.metadata.content);
    assert_eq!(first.vector, second.vector);
}

#[tokio::test]
async fn persona_without_stored_profile_answers_from_its_documents() {
    let w = world();
    let owner = Uuid::new_v4();
    let doc = w.upload(owner, "recipes.txt", "text/plain", "cooking pasta on sundays").await;
    let (status, _) = w
        .send("POST", "/v1/hooks/documents", serde_json::to_value(ChangeEvent::create(doc.clone())).unwrap())
        .await;
    assert_eq!(status, StatusCode::OK);

    w.reply("I cook pasta on Sundays.");
    let (status, answer) = w
        .send("POST", &format!("/v1/personas/{owner}/ask"), json!({ "query": "cooking pasta" }))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(answer["relevantDocuments"][0]["documentId"], json!(doc.id));
    assert!(w
        .generator
        .last_prompt()
        .unwrap()
        .starts_with(&format!("You are {UNNAMED_PERSONA}.")));
}
