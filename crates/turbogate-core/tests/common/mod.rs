//! Shared test plugins
#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use turbogate_core::*;
use turbogate_types::*;

pub type CallLog = Arc<Mutex<Vec<String>>>;

pub fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// Entries of the log ending with `suffix`, with the suffix stripped
pub fn calls_with(log: &CallLog, suffix: &str) -> Vec<String> {
    log.lock()
        .iter()
        .filter_map(|line| line.strip_suffix(suffix).map(str::to_string))
        .collect()
}

#[derive(Debug, Clone, Default)]
pub enum PreBehavior {
    #[default]
    Proceed,
    Fail,
    RewriteModel(String),
    RejectWith(DomainError),
    RespondWith(DomainResponse),
}

#[derive(Debug, Clone, Default)]
pub enum PostBehavior {
    #[default]
    Unchanged,
    Fail,
    Recover(DomainResponse),
    Invalidate(DomainError),
    Clear,
}

#[derive(Debug, Clone, Default)]
pub enum ChunkBehavior {
    #[default]
    Pass,
    DropIndex(u64),
    ErrorIndex(u64),
    AbortIndex(u64),
}

#[derive(Debug, Clone, Default)]
pub enum TransportBehavior {
    #[default]
    Pass,
    Fail,
    Respond(TransportResponse),
}

/// Plugin that logs every hook call as `<name>:<hook>`
#[derive(Debug)]
pub struct RecordingPlugin {
    pub name: String,
    pub log: CallLog,
    pub pre: PreBehavior,
    pub post: PostBehavior,
    pub chunk: ChunkBehavior,
    pub transport_pre: TransportBehavior,
    pub transport_post_fails: bool,
}

impl RecordingPlugin {
    pub fn new(name: &str, log: &CallLog) -> Self {
        Self {
            name: name.to_string(),
            log: Arc::clone(log),
            pre: PreBehavior::default(),
            post: PostBehavior::default(),
            chunk: ChunkBehavior::default(),
            transport_pre: TransportBehavior::default(),
            transport_post_fails: false,
        }
    }

    pub fn pre(mut self, behavior: PreBehavior) -> Self {
        self.pre = behavior;
        self
    }

    pub fn post(mut self, behavior: PostBehavior) -> Self {
        self.post = behavior;
        self
    }

    pub fn chunk(mut self, behavior: ChunkBehavior) -> Self {
        self.chunk = behavior;
        self
    }

    pub fn transport_pre(mut self, behavior: TransportBehavior) -> Self {
        self.transport_pre = behavior;
        self
    }

    pub fn failing_transport_post(mut self) -> Self {
        self.transport_post_fails = true;
        self
    }

    fn note(&self, hook: &str) {
        self.log.lock().push(format!("{}:{}", self.name, hook));
    }
}

#[async_trait]
impl Plugin for RecordingPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    async fn http_transport_pre_hook(
        &self,
        _ctx: &RequestContext,
        request: &mut TransportRequest,
    ) -> PluginResult<Option<TransportResponse>> {
        self.note("transport_pre");
        request.set_header(format!("x-seen-{}", self.name), "1");
        match &self.transport_pre {
            TransportBehavior::Pass => Ok(None),
            TransportBehavior::Fail => Err(PluginError::request_processing("transport pre failed")),
            TransportBehavior::Respond(response) => Ok(Some(response.clone())),
        }
    }

    async fn http_transport_post_hook(
        &self,
        _ctx: &RequestContext,
        _request: &TransportRequest,
        response: &mut TransportResponse,
    ) -> PluginResult<()> {
        self.note("transport_post");
        if self.transport_post_fails {
            return Err(PluginError::response_processing("transport post failed"));
        }
        response.set_header(format!("x-post-{}", self.name), "1");
        Ok(())
    }

    async fn http_transport_stream_chunk_hook(
        &self,
        _ctx: &RequestContext,
        _request: &TransportRequest,
        chunk: StreamChunk,
    ) -> ChunkOutcome {
        self.note(&format!("chunk{}", chunk.index));
        match self.chunk {
            ChunkBehavior::DropIndex(index) if chunk.index == index => ChunkOutcome::Drop,
            ChunkBehavior::ErrorIndex(index) if chunk.index == index => {
                ChunkOutcome::ContinueWithError(chunk, PluginError::stream_processing("noisy"))
            }
            ChunkBehavior::AbortIndex(index) if chunk.index == index => {
                ChunkOutcome::Abort(PluginError::stream_processing("stream aborted"))
            }
            _ => ChunkOutcome::Continue(chunk),
        }
    }

    async fn pre_hook(
        &self,
        _ctx: &RequestContext,
        request: &DomainRequest,
    ) -> PluginResult<PreHookOutcome> {
        self.note("pre");
        match &self.pre {
            PreBehavior::Proceed => Ok(PreHookOutcome::proceed()),
            PreBehavior::Fail => Err(PluginError::request_processing("pre hook exploded")),
            PreBehavior::RewriteModel(model) => {
                let mut rewritten = request.clone();
                rewritten.model = model.clone();
                Ok(PreHookOutcome::rewrite(rewritten))
            }
            PreBehavior::RejectWith(error) => Ok(PreHookOutcome::reject(error.clone())),
            PreBehavior::RespondWith(response) => Ok(PreHookOutcome::respond(response.clone())),
        }
    }

    async fn post_hook(
        &self,
        _ctx: &RequestContext,
        _response: Option<&DomainResponse>,
        _error: Option<&DomainError>,
    ) -> PluginResult<PostHookOutcome> {
        self.note("post");
        match &self.post {
            PostBehavior::Unchanged => Ok(PostHookOutcome::Unchanged),
            PostBehavior::Fail => Err(PluginError::response_processing("post hook exploded")),
            PostBehavior::Recover(response) => Ok(PostHookOutcome::Replace {
                response: Some(response.clone()),
                error: Some(DomainError::empty()),
            }),
            PostBehavior::Invalidate(error) => Ok(PostHookOutcome::fail(error.clone())),
            PostBehavior::Clear => Ok(PostHookOutcome::Replace {
                response: None,
                error: None,
            }),
        }
    }
}

pub fn snapshot(plugins: Vec<RecordingPlugin>) -> PluginSnapshot {
    Arc::new(
        plugins
            .into_iter()
            .map(|plugin| PluginEntry::new(Arc::new(plugin)))
            .collect(),
    )
}

pub fn chat_request() -> DomainRequest {
    DomainRequest::new(RequestKind::ChatCompletion, "openai", "gpt-4o")
        .with_input(json!({"messages": [{"role": "user", "content": "hi"}]}))
}

pub fn chat_response(text: &str) -> DomainResponse {
    DomainResponse::new(RequestKind::ChatCompletion, "openai", "gpt-4o", json!(text))
}
