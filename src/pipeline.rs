//! End-to-end processing: excerpt, prompt, model call, normalization.

use std::fmt;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::ModelConfig;
use crate::excerpt::ExcerptDocument;
use crate::extractor::{ConfigError, ExtractionConfig, Extractor};
use crate::model::{ModelInvoker, RemoteServiceError};
use crate::prompt::build_prompt;
use crate::record::ProductRecord;
use crate::reply::{normalize_reply, ReplyError};
use crate::snapshot::PageSnapshot;

/// Step of [`Pipeline::process`] that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Checking the extraction bounds and model configuration.
    Configuration,
    /// Calling the model.
    Invocation,
    /// Turning the reply into a record.
    Normalization,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Configuration => "configuration",
            Self::Invocation => "invocation",
            Self::Normalization => "normalization",
        })
    }
}

/// Errors surfaced by [`Pipeline::process`].
#[derive(Debug, Error)]
pub enum ProcessError {
    /// No usable credential; raised before any network call.
    #[error("model API key is not configured")]
    NotConfigured,
    /// Extraction bounds cannot hold an excerpt.
    #[error("invalid extraction settings: {0}")]
    InvalidExtraction(#[from] ConfigError),
    /// The model service failed.
    #[error(transparent)]
    Invocation(#[from] RemoteServiceError),
    /// The reply was empty or malformed.
    #[error(transparent)]
    Normalization(#[from] ReplyError),
}

impl ProcessError {
    /// Stage at which processing stopped.
    pub fn stage(&self) -> Stage {
        match self {
            Self::NotConfigured | Self::InvalidExtraction(_) => Stage::Configuration,
            Self::Invocation(_) => Stage::Invocation,
            Self::Normalization(_) => Stage::Normalization,
        }
    }
}

/// Everything produced while processing one page.
#[derive(Debug, Clone)]
pub struct Processed {
    /// Excerpt embedded in the prompt.
    pub excerpt: ExcerptDocument,
    /// Raw model reply.
    pub reply: String,
    /// Normalized record.
    pub record: ProductRecord,
}

/// Extractor plus model backend, reused across pages.
pub struct Pipeline<M> {
    extractor: Extractor,
    invoker: M,
}

impl<M: ModelInvoker> Pipeline<M> {
    /// Builds a pipeline with the given extraction settings and backend.
    pub fn new(config: ExtractionConfig, invoker: M) -> Result<Self, ConfigError> {
        Ok(Self {
            extractor: Extractor::new(config)?,
            invoker,
        })
    }

    /// Extractor used for excerpts.
    pub fn extractor(&self) -> &Extractor {
        &self.extractor
    }

    /// Builds the excerpt and prompt without calling the model.
    pub fn prepare(&self, snapshot: &PageSnapshot) -> (ExcerptDocument, String) {
        let excerpt = self.extractor.extract(snapshot);
        let prompt = build_prompt(snapshot, &excerpt);
        (excerpt, prompt)
    }

    /// Runs the full flow for one snapshot.
    pub fn process(
        &self,
        snapshot: &PageSnapshot,
        model: &ModelConfig,
    ) -> Result<ProductRecord, ProcessError> {
        self.process_detailed(snapshot, model).map(|processed| processed.record)
    }

    /// Like [`Pipeline::process`], but also returns the excerpt and raw reply.
    pub fn process_detailed(
        &self,
        snapshot: &PageSnapshot,
        model: &ModelConfig,
    ) -> Result<Processed, ProcessError> {
        if !model.is_configured() {
            warn!("refusing to call the model without an API key");
            return Err(ProcessError::NotConfigured);
        }
        let (excerpt, prompt) = self.prepare(snapshot);
        let reply = self.invoker.invoke(&prompt, model)?;
        info!(url = %snapshot.url, reply_bytes = reply.len(), "model replied");
        let record = normalize_reply(&reply)?;
        Ok(Processed {
            excerpt,
            reply,
            record,
        })
    }
}

/// One-shot convenience wrapper around [`Pipeline::process`].
pub fn process(
    snapshot: &PageSnapshot,
    extraction: &ExtractionConfig,
    model: &ModelConfig,
    invoker: &dyn ModelInvoker,
) -> Result<ProductRecord, ProcessError> {
    Pipeline::new(extraction.clone(), invoker)?.process(snapshot, model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RemoteErrorKind;
    use crate::record::{DEFAULT_PRODUCT_NAME, NOT_AVAILABLE};
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;

    struct ScriptedInvoker {
        reply: Result<String, RemoteServiceError>,
        prompts: RefCell<Vec<String>>,
    }

    impl ScriptedInvoker {
        fn replying(reply: &str) -> Self {
            Self {
                reply: Ok(reply.to_string()),
                prompts: RefCell::new(Vec::new()),
            }
        }

        fn failing(err: RemoteServiceError) -> Self {
            Self {
                reply: Err(err),
                prompts: RefCell::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.prompts.borrow().len()
        }
    }

    impl ModelInvoker for ScriptedInvoker {
        fn invoke(&self, prompt: &str, _config: &ModelConfig) -> Result<String, RemoteServiceError> {
            self.prompts.borrow_mut().push(prompt.to_string());
            self.reply.clone()
        }
    }

    fn snapshot() -> PageSnapshot {
        PageSnapshot::from_markup(
            "https://shop.test/p/grill-x",
            None,
            r#"<html><head><title>Grill X</title></head><body>
               <h1 class="product-title">Parrilla Grill X</h1>
               <span class="price">S/ 199.00</span></body></html>"#
                .to_string(),
        )
    }

    fn configured() -> ModelConfig {
        ModelConfig::with_api_key("sk-or-test")
    }

    #[test]
    fn missing_credentials_fail_before_invocation() {
        let invoker = ScriptedInvoker::replying("{}");
        let err = process(&snapshot(), &ExtractionConfig::default(), &ModelConfig::default(), &invoker)
            .expect_err("not configured");
        assert!(matches!(err, ProcessError::NotConfigured));
        assert_eq!(err.stage(), Stage::Configuration);
        assert_eq!(invoker.calls(), 0);
    }

    #[test]
    fn reply_is_normalized_into_a_record() {
        let invoker = ScriptedInvoker::replying(
            "Claro: {\"productName\":\"Parrilla Grill X\",\"currentPrice\":\"S/ 199.00\",\"rating\":5}",
        );
        let pipeline = Pipeline::new(ExtractionConfig::default(), &invoker).expect("pipeline");
        let processed = pipeline
            .process_detailed(&snapshot(), &configured())
            .expect("processed");

        assert_eq!(processed.record.product_name, "Parrilla Grill X");
        assert_eq!(processed.record.current_price, "S/ 199.00");
        assert_eq!(processed.record.sku, NOT_AVAILABLE);
        assert_eq!(invoker.calls(), 1);
        let prompt = &invoker.prompts.borrow()[0];
        assert!(prompt.contains(processed.excerpt.as_str()));
        assert!(prompt.contains("URL: https://shop.test/p/grill-x"));
    }

    #[test]
    fn remote_failures_are_tagged_with_their_stage() {
        let invoker = ScriptedInvoker::failing(RemoteServiceError::from_status(
            401,
            "No auth credentials found",
        ));
        let err = process(&snapshot(), &ExtractionConfig::default(), &configured(), &invoker)
            .expect_err("remote failure");
        assert_eq!(err.stage(), Stage::Invocation);
        match err {
            ProcessError::Invocation(remote) => {
                assert_eq!(remote.kind, RemoteErrorKind::Unauthenticated);
                assert_eq!(remote.message, "No auth credentials found");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(invoker.calls(), 1);
    }

    #[test]
    fn empty_and_malformed_replies_surface() {
        let empty = ScriptedInvoker::replying("  ");
        let err = process(&snapshot(), &ExtractionConfig::default(), &configured(), &empty)
            .expect_err("empty");
        assert_eq!(err.stage(), Stage::Normalization);
        assert!(matches!(err, ProcessError::Normalization(ReplyError::Empty)));

        let malformed = ScriptedInvoker::replying("{\"productName\": }");
        let err = process(&snapshot(), &ExtractionConfig::default(), &configured(), &malformed)
            .expect_err("malformed");
        assert!(matches!(&err, ProcessError::Normalization(e) if e.is_malformed()));
    }

    #[test]
    fn plain_text_replies_degrade_to_defaults() {
        let invoker = ScriptedInvoker::replying("No pude identificar el producto.");
        let record = process(&snapshot(), &ExtractionConfig::default(), &configured(), &invoker)
            .expect("fallback record");
        assert_eq!(record.product_name, DEFAULT_PRODUCT_NAME);
        assert_eq!(record.description, "No pude identificar el producto....");
    }

    #[test]
    fn undersized_ceilings_fail_before_invocation() {
        let invoker = ScriptedInvoker::replying("{}");
        let extraction = ExtractionConfig {
            max_excerpt_bytes: 100,
            ..ExtractionConfig::default()
        };
        let err = process(&snapshot(), &extraction, &configured(), &invoker)
            .expect_err("ceiling too small");
        assert!(matches!(
            err,
            ProcessError::InvalidExtraction(ConfigError::CeilingTooSmall { max_bytes: 100, .. })
        ));
        assert_eq!(err.stage(), Stage::Configuration);
        assert_eq!(invoker.calls(), 0);
    }
}
