use std::sync::Arc;

use crate::embedding::EmbeddingProvider;
use crate::generation::{GenerationProvider, StreamRegistry};
use crate::history::{ChatRepository, ChatService};
use crate::retrieval::RetrievalPipeline;
use crate::vectordb::SimilarityStore;

/// Shared handler state; cloned per request.
pub struct HandlerState<E, S, G, R> {
    pub pipeline: Arc<RetrievalPipeline<E, S>>,

    pub generator: Arc<G>,

    pub chats: Arc<ChatService<R>>,

    /// Live generation streams, cancellable by id.
    pub streams: StreamRegistry,
}

impl<E, S, G, R> Clone for HandlerState<E, S, G, R> {
    fn clone(&self) -> Self {
        Self {
            pipeline: Arc::clone(&self.pipeline),
            generator: Arc::clone(&self.generator),
            chats: Arc::clone(&self.chats),
            streams: self.streams.clone(),
        }
    }
}

impl<E, S, G, R> HandlerState<E, S, G, R>
where
    E: EmbeddingProvider + 'static,
    S: SimilarityStore + 'static,
    G: GenerationProvider + 'static,
    R: ChatRepository + 'static,
{
    pub fn new(pipeline: RetrievalPipeline<E, S>, generator: G, chats: ChatService<R>) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            generator: Arc::new(generator),
            chats: Arc::new(chats),
            streams: StreamRegistry::new(),
        }
    }
}
