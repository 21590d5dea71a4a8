//! Consumer-facing question answering.

use std::sync::Arc;

use recall_runtime::AIProvider;
use tracing::debug;
use uuid::Uuid;

use crate::error::RagResult;
use crate::persona::{Persona, PersonaDirectory};
use crate::retriever::Retriever;
use crate::synthesizer::{OpenQaSynthesizer, PersonaAnswer, PersonaSynthesizer, SynthesizedAnswer, SynthesizerConfig};

/// Entry point for both answer policies. Read-only with respect to the index.
#[derive(Clone)]
pub struct RagService {
    open: OpenQaSynthesizer,
    persona: PersonaSynthesizer,
    personas: Arc<dyn PersonaDirectory>,
}

impl RagService {
    pub fn new(
        retriever: Retriever,
        provider: Arc<dyn AIProvider>,
        personas: Arc<dyn PersonaDirectory>,
        config: SynthesizerConfig,
    ) -> Self {
        Self {
            open: OpenQaSynthesizer::new(retriever.clone(), provider.clone(), config.clone()),
            persona: PersonaSynthesizer::new(retriever, provider, config),
            personas,
        }
    }

    pub async fn ask_question(&self, query: &str, channel_id: Option<Uuid>) -> RagResult<SynthesizedAnswer> {
        self.open.answer(query, channel_id).await
    }

    /// Owners without a stored profile are answered under an unnamed persona;
    /// their indexed documents stay reachable either way.
    pub async fn ask_persona_question(&self, query: &str, persona_id: Uuid) -> RagResult<PersonaAnswer> {
        let persona = match self.personas.get_persona(persona_id).await? {
            Some(persona) => persona,
            None => {
                debug!(persona_id = %persona_id, "No stored profile, answering as unnamed persona");
                Persona::unnamed(persona_id)
            }
        };
        self.persona.answer(query, &persona).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::error::RagError;
    use crate::persona::{InMemoryPersonaDirectory, UNNAMED_PERSONA};
    use crate::retriever::RetrieverConfig;
    use recall_core::{Document, Message, Namespace, RetryConfig};
    use recall_runtime::{Embedder, EmbedderConfig, GenerateResponse, MockEmbeddingProvider, MockProvider, ProviderError};
    use recall_vector::{IndexRecord, InMemoryVectorIndex, RecordMetadata, VectorIndex};

    const VOCABULARY: [&str; 5] = ["standup", "deploy", "rust", "pasta", "friday"];

    struct Fixture {
        service: RagService,
        index: InMemoryVectorIndex,
        embedder: Embedder,
        provider: Arc<MockProvider>,
        personas: InMemoryPersonaDirectory,
    }

    fn fixture() -> Fixture {
        let embedder = Embedder::new(
            Arc::new(MockEmbeddingProvider::with_vocabulary(VOCABULARY)),
            EmbedderConfig::default().with_batching(20, Duration::ZERO),
        );
        let index = InMemoryVectorIndex::new(VOCABULARY.len());
        let retriever = Retriever::new(embedder.clone(), Arc::new(index.clone())).with_config(RetrieverConfig {
            persona_empty_retry: RetryConfig::none(),
            ..RetrieverConfig::default()
        });
        let provider = Arc::new(MockProvider::new());
        let personas = InMemoryPersonaDirectory::new();
        let service = RagService::new(
            retriever,
            provider.clone(),
            Arc::new(personas.clone()),
            SynthesizerConfig::default(),
        );
        Fixture {
            service,
            index,
            embedder,
            provider,
            personas,
        }
    }

    impl Fixture {
        async fn add_message(&self, message: &Message) {
            let vector = self.embedder.embed_query(&message.content).await.unwrap();
            self.index
                .upsert(
                    Namespace::Messages,
                    vec![IndexRecord::new(
                        message.id,
                        Namespace::Messages,
                        vector,
                        RecordMetadata::for_message(message),
                    )],
                )
                .await
                .unwrap();
        }

        async fn add_document(&self, document: &Document, text: &str) {
            let vector = self.embedder.embed_query(text).await.unwrap();
            self.index
                .upsert(
                    Namespace::AvatarDocuments,
                    vec![IndexRecord::new(
                        document.id,
                        Namespace::AvatarDocuments,
                        vector,
                        RecordMetadata::for_document(document, text),
                    )],
                )
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn open_answer_cites_relevant_message() {
        let f = fixture();
        let channel = Uuid::new_v4();
        let msg = Message::new(channel, Uuid::new_v4(), "Standup moved to 10am");
        f.add_message(&msg).await;
        f.provider
            .enqueue_generate(Ok(GenerateResponse::text("Standup is at 10am [1].")));

        let answer = f.service.ask_question("when is standup", Some(channel)).await.unwrap();

        assert_eq!(answer.answer, "Standup is at 10am [1].");
        assert_eq!(answer.sources.len(), 1);
        assert_eq!(answer.sources[0].content, "Standup moved to 10am");
        assert!(answer.sources[0].score >= 0.3);
        let prompt = f.provider.last_prompt().unwrap();
        assert!(prompt.contains("\"Standup moved to 10am\" (relevance: 1.00)"));
    }

    #[tokio::test]
    async fn weak_matches_reach_the_prompt_but_not_the_sources() {
        let f = fixture();
        let msg = Message::new(Uuid::new_v4(), Uuid::new_v4(), "pasta for lunch");
        f.add_message(&msg).await;
        f.provider.enqueue_generate(Ok(GenerateResponse::text("No idea.")));

        let answer = f.service.ask_question("deploy friday", None).await.unwrap();

        assert!(answer.sources.is_empty());
        assert!(f.provider.last_prompt().unwrap().contains("pasta for lunch"));
    }

    #[tokio::test]
    async fn empty_index_still_generates() {
        let f = fixture();
        f.provider
            .enqueue_generate(Ok(GenerateResponse::text("The history doesn't say.")));

        let answer = f.service.ask_question("deploy", None).await.unwrap();

        assert_eq!(answer.answer, "The history doesn't say.");
        assert!(answer.sources.is_empty());
        assert!(f
            .provider
            .last_prompt()
            .unwrap()
            .contains("No relevant messages were found"));
    }

    #[tokio::test]
    async fn generation_failure_is_not_retried() {
        let f = fixture();
        f.provider.enqueue_generate(Err(ProviderError::HttpStatus {
            status: 503,
            body: "overloaded".into(),
        }));

        let err = f.service.ask_question("deploy", None).await.unwrap_err();

        assert!(matches!(err, RagError::Generation(_)));
        assert_eq!(f.provider.requests().len(), 1);
    }

    #[tokio::test]
    async fn persona_answer_lists_only_grounding_documents() {
        let f = fixture();
        let persona = Persona::new(Uuid::new_v4(), "Ada").with_bio("Systems programmer.");
        f.personas.insert(persona.clone()).await;
        let cooking = Document::new(persona.id, "pasta.md", "text/markdown", "p/pasta.md");
        let coding = Document::new(persona.id, "rust.pdf", "application/pdf", "p/rust.pdf");
        f.add_document(&cooking, "My pasta sauce needs time.").await;
        f.add_document(&coding, "I write Rust every day. Ownership keeps it safe.").await;
        f.provider
            .enqueue_generate(Ok(GenerateResponse::text("I write Rust daily.")));

        let answer = f
            .service
            .ask_persona_question("How do you use Rust?", persona.id)
            .await
            .unwrap();

        assert_eq!(answer.relevant_documents.len(), 1);
        assert_eq!(answer.relevant_documents[0].document_id, coding.id);
        assert_eq!(answer.relevant_documents[0].document_type, "PDF document");
        assert_eq!(
            answer.formatted_answer,
            "I write Rust daily.\n\nSources:\n1. rust.pdf (PDF document, relevance 1.00)"
        );
        let prompt = f.provider.last_prompt().unwrap();
        assert!(prompt.starts_with("You are Ada."));
        assert!(!prompt.contains("pasta"));
    }

    #[tokio::test]
    async fn persona_never_sees_other_owners_documents() {
        let f = fixture();
        let persona = Persona::new(Uuid::new_v4(), "Ada");
        f.personas.insert(persona.clone()).await;
        let foreign = Document::new(Uuid::new_v4(), "rust.md", "text/markdown", "o/rust.md");
        f.add_document(&foreign, "rust rust rust").await;
        f.provider.enqueue_generate(Ok(GenerateResponse::text("I don't know.")));

        let answer = f.service.ask_persona_question("rust", persona.id).await.unwrap();

        assert!(answer.relevant_documents.is_empty());
        assert_eq!(answer.formatted_answer, "I don't know.");
        assert!(f
            .provider
            .last_prompt()
            .unwrap()
            .contains("No relevant documents were found"));
    }

    #[tokio::test]
    async fn owner_without_profile_still_gets_grounded_answer() {
        let f = fixture();
        let owner = Uuid::new_v4();
        let notes = Document::new(owner, "deploy.txt", "text/plain", "o/deploy.txt");
        f.add_document(&notes, "We deploy every friday.").await;
        f.provider
            .enqueue_generate(Ok(GenerateResponse::text("I deploy on Fridays.")));

        let answer = f.service.ask_persona_question("deploy friday", owner).await.unwrap();

        assert_eq!(answer.relevant_documents.len(), 1);
        assert_eq!(answer.relevant_documents[0].document_id, notes.id);
        let prompt = f.provider.last_prompt().unwrap();
        assert!(prompt.starts_with(&format!("You are {UNNAMED_PERSONA}.")));
        assert!(prompt.contains("About you: No bio provided."));
    }

    #[tokio::test]
    async fn directory_failure_is_surfaced_before_generation() {
        let embedder = Embedder::new(
            Arc::new(MockEmbeddingProvider::with_vocabulary(VOCABULARY)),
            EmbedderConfig::default().with_batching(20, Duration::ZERO),
        );
        let provider = Arc::new(MockProvider::new());
        let service = RagService::new(
            Retriever::new(embedder, Arc::new(InMemoryVectorIndex::new(VOCABULARY.len()))),
            provider.clone(),
            Arc::new(BrokenDirectory),
            SynthesizerConfig::default(),
        );

        let err = service
            .ask_persona_question("anything", Uuid::new_v4())
            .await
            .unwrap_err();

        assert!(matches!(err, RagError::Directory(_)));
        assert!(provider.requests().is_empty());
    }

    struct BrokenDirectory;

    #[async_trait::async_trait]
    impl PersonaDirectory for BrokenDirectory {
        async fn get_persona(&self, _id: Uuid) -> RagResult<Option<Persona>> {
            Err(RagError::Directory("connection refused".into()))
        }

        async fn put_persona(&self, _persona: Persona) -> RagResult<()> {
            Err(RagError::Directory("connection refused".into()))
        }
    }
}
