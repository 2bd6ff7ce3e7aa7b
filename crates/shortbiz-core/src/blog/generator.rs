//! The generation pipeline: estimate, check, prompt, generate, render, charge.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use super::extract::extract_text;
use super::markdown::{extract_title, render_html};
use super::prompt::build_prompt;
use super::request::{BlogRequest, GenerationRequest};
use crate::config::Config;
use crate::error::{ServiceError, ServiceResult};
use crate::llm::GenerationClient;
use crate::store::{Artifact, Deduction, NewArtifact, Store};

/// Settings the pipeline needs besides the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationSettings {
    /// Product name the writer persona works for.
    pub brand_name: String,
}

impl GenerationSettings {
    /// Settings taken from the loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            brand_name: config.brand_name.clone(),
        }
    }
}

/// A successful generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationOutcome {
    /// The stored post.
    pub artifact: Artifact,
    /// Owner balance after the charge.
    pub tokens_remaining: i64,
}

/// What a request would cost, without running it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostEstimate {
    /// Tokens the request would consume.
    pub token_cost: i64,
    /// Owner's current balance.
    pub tokens_remaining: i64,
    /// Whether the balance covers the cost.
    pub affordable: bool,
}

/// Runs blog generation against a client and a store.
#[derive(Clone)]
pub struct BlogGenerator {
    client: Arc<dyn GenerationClient>,
    settings: GenerationSettings,
}

impl std::fmt::Debug for BlogGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlogGenerator")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl BlogGenerator {
    /// A generator using `client` for every request.
    pub fn new(client: Arc<dyn GenerationClient>, settings: GenerationSettings) -> Self {
        Self { client, settings }
    }

    /// Generate, render, and store a post for `owner_id`, charging its cost.
    ///
    /// Nothing is charged or stored unless every step succeeds. The balance is
    /// checked once before the backend call and again inside the commit
    /// transaction, so concurrent requests cannot overspend.
    #[tracing::instrument(skip(self, store, request), fields(topic = %request.topic))]
    pub async fn generate_blog(
        &self,
        store: &Store,
        owner_id: &str,
        request: BlogRequest,
    ) -> ServiceResult<GenerationOutcome> {
        let req = GenerationRequest::try_from(request)?;
        let cost = req.token_cost();

        let balance = store
            .balance(owner_id)?
            .ok_or_else(|| ServiceError::not_found("User not found."))?;
        if balance < cost {
            info!(balance, cost, "balance too low, not generating");
            return Err(ServiceError::InsufficientBalance { balance, cost });
        }

        let prompt = build_prompt(&req, &self.settings.brand_name);
        let response = self.client.generate(&prompt).await?;
        let markdown = extract_text(&response)?;

        let html = render_html(&markdown);
        let title = extract_title(&markdown);

        let new = NewArtifact {
            owner_id: owner_id.to_string(),
            title,
            topic: req.topic().to_string(),
            audience: req.audience().to_string(),
            tone: req.tone().to_string(),
            seo_keyword: req.seo_keyword().map(str::to_string),
            word_count: req.word_count(),
            features: *req.features(),
            token_cost: cost,
            content_markdown: markdown,
            content_html: html,
        };

        let deduction = store.deduct_and_insert(&new).map_err(|e| {
            error!(
                error = %e,
                title = %new.title,
                markdown_len = new.content_markdown.len(),
                "generated post could not be saved"
            );
            ServiceError::from(e)
        })?;

        match deduction {
            Deduction::Committed {
                artifact,
                tokens_remaining,
            } => {
                info!(
                    blog_id = artifact.id,
                    cost,
                    tokens_remaining,
                    "blog generated"
                );
                Ok(GenerationOutcome {
                    artifact,
                    tokens_remaining,
                })
            }
            Deduction::Insufficient { balance } => {
                info!(balance, cost, "balance dropped during generation, discarding post");
                Err(ServiceError::InsufficientBalance { balance, cost })
            }
            Deduction::UnknownOwner => Err(ServiceError::not_found("User not found.")),
        }
    }
}

/// Price `request` for `owner_id` without calling the backend.
pub fn estimate(store: &Store, owner_id: &str, request: BlogRequest) -> ServiceResult<CostEstimate> {
    let req = GenerationRequest::try_from(request)?;
    let balance = store
        .balance(owner_id)?
        .ok_or_else(|| ServiceError::not_found("User not found."))?;
    let token_cost = req.token_cost();
    Ok(CostEstimate {
        token_cost,
        tokens_remaining: balance,
        affordable: balance >= token_cost,
    })
}

/// Look up a stored post.
pub fn get_blog(store: &Store, id: i64) -> ServiceResult<Artifact> {
    store
        .blog_by_id(id)?
        .ok_or_else(|| ServiceError::not_found("Blog not found."))
}

/// Posts of `owner_id`, newest first.
pub fn list_blogs(store: &Store, owner_id: &str) -> ServiceResult<Vec<Artifact>> {
    Ok(store.blogs_by_owner(owner_id)?)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::llm::{ContentPart, RawResponse};
    use crate::store::Role;

    const POST: &str = "# Links That Sell\n\nIntro.\n\n| Plan | Price |\n| --- | --- |\n| Pro | $9 |\n\n```json\n{\"title\": \"x\"}\n```\n";

    type Hook = Box<dyn Fn() + Send + Sync>;

    /// Replies with a fixed response and counts calls.
    struct ScriptedClient {
        reply: Mutex<Option<ServiceResult<RawResponse>>>,
        calls: AtomicUsize,
        before_reply: Option<Hook>,
    }

    impl ScriptedClient {
        fn replying(reply: ServiceResult<RawResponse>) -> Self {
            Self {
                reply: Mutex::new(Some(reply)),
                calls: AtomicUsize::new(0),
                before_reply: None,
            }
        }

        fn text(text: &str) -> Self {
            Self::replying(Ok(RawResponse::from_parts(vec![ContentPart::text(text)])))
        }
    }

    #[async_trait]
    impl GenerationClient for ScriptedClient {
        async fn generate(&self, _prompt: &str) -> ServiceResult<RawResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(hook) = &self.before_reply {
                hook();
            }
            self.reply
                .lock()
                .unwrap()
                .take()
                .unwrap_or(Err(ServiceError::Upstream("script exhausted".into())))
        }
    }

    fn owner(store: &Store, balance: i64) -> String {
        store
            .insert_user("owner@example.com", "h", Role::User, balance)
            .unwrap()
            .id
    }

    fn generator(client: Arc<ScriptedClient>) -> BlogGenerator {
        BlogGenerator::new(
            client,
            GenerationSettings {
                brand_name: "MyShortBIZ".into(),
            },
        )
    }

    #[tokio::test]
    async fn insufficient_balance_skips_backend() {
        let store = Store::open_in_memory().unwrap();
        let id = owner(&store, 100);
        let client = Arc::new(ScriptedClient::text(POST));

        let err = generator(client.clone())
            .generate_blog(&store, &id, BlogRequest::new("Link pages"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ServiceError::InsufficientBalance {
                balance: 100,
                cost: 3040
            }
        ));
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.balance(&id).unwrap(), Some(100));
        assert_eq!(store.blog_count(&id).unwrap(), 0);
    }

    #[tokio::test]
    async fn success_charges_and_stores_one_post() {
        let store = Store::open_in_memory().unwrap();
        let id = owner(&store, 10_000);
        let client = Arc::new(ScriptedClient::text(POST));

        let outcome = generator(client.clone())
            .generate_blog(&store, &id, BlogRequest::new("Link pages"))
            .await
            .unwrap();

        assert_eq!(outcome.tokens_remaining, 6960);
        assert_eq!(store.balance(&id).unwrap(), Some(6960));
        assert_eq!(store.blog_count(&id).unwrap(), 1);
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);

        let post = outcome.artifact;
        assert_eq!(post.token_cost, 3040);
        assert_eq!(post.title, "Links That Sell");
        assert_eq!(post.content_markdown, POST.trim());
        assert!(post.content_html.contains("<table>"));
        assert!(post.content_html.contains("<pre><code class=\"language-json\">"));
        assert_eq!(get_blog(&store, post.id).unwrap(), post);
    }

    #[tokio::test]
    async fn empty_output_changes_nothing() {
        let store = Store::open_in_memory().unwrap();
        let id = owner(&store, 10_000);
        let client = Arc::new(ScriptedClient::text("  \n  "));

        let err = generator(client)
            .generate_blog(&store, &id, BlogRequest::new("Link pages"))
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::EmptyGeneration));
        assert_eq!(store.balance(&id).unwrap(), Some(10_000));
        assert_eq!(store.blog_count(&id).unwrap(), 0);
    }

    #[tokio::test]
    async fn upstream_failure_changes_nothing() {
        let store = Store::open_in_memory().unwrap();
        let id = owner(&store, 10_000);
        let client = Arc::new(ScriptedClient::replying(Err(ServiceError::Upstream(
            "status 503".into(),
        ))));

        let err = generator(client)
            .generate_blog(&store, &id, BlogRequest::new("Link pages"))
            .await
            .unwrap_err();

        assert_eq!(err.status(), 502);
        assert_eq!(store.balance(&id).unwrap(), Some(10_000));
    }

    #[tokio::test]
    async fn balance_spent_mid_flight_fails_at_commit() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let id = owner(&store, 4_000);

        let drain_store = Arc::clone(&store);
        let drain_id = id.clone();
        let client = Arc::new(ScriptedClient {
            before_reply: Some(Box::new(move || {
                // A concurrent request spends most of the balance first.
                drain_store.add_tokens(&drain_id, -3_500).unwrap();
            })),
            ..ScriptedClient::text(POST)
        });

        let err = generator(client)
            .generate_blog(&store, &id, BlogRequest::new("Link pages"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ServiceError::InsufficientBalance {
                balance: 500,
                cost: 3040
            }
        ));
        assert_eq!(store.balance(&id).unwrap(), Some(500));
        assert_eq!(store.blog_count(&id).unwrap(), 0);
    }

    #[tokio::test]
    async fn unknown_owner_and_invalid_request() {
        let store = Store::open_in_memory().unwrap();
        let client = Arc::new(ScriptedClient::text(POST));
        let generator = generator(client.clone());

        let err = generator
            .generate_blog(&store, "ghost", BlogRequest::new("Link pages"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));

        let id = owner(&store, 10_000);
        let err = generator
            .generate_blog(&store, &id, BlogRequest::new("ab"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn estimate_reports_affordability() {
        let store = Store::open_in_memory().unwrap();
        let id = owner(&store, 3_000);
        let est = estimate(&store, &id, BlogRequest::new("Link pages")).unwrap();
        assert_eq!(est.token_cost, 3040);
        assert_eq!(est.tokens_remaining, 3_000);
        assert!(!est.affordable);
        assert!(matches!(get_blog(&store, 42), Err(ServiceError::NotFound(_))));
    }
}
