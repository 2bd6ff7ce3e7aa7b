//! MCP (Model Context Protocol) server implementation.
//!
//! Exposes blog generation, published pages, and the plan catalogue to AI
//! assistants over stdio. Every tool delegates to `shortbiz-core`; tools that
//! act for an account take the same access token the CLI uses.

use std::sync::Arc;

use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, Content, Implementation, ServerCapabilities, ServerInfo};
use rmcp::schemars;
use rmcp::{ErrorData as McpError, ServerHandler, tool, tool_handler, tool_router};
use serde::Serialize;

use shortbiz_core::blog::{self, BlogGenerator, BlogRequest, GenerationSettings};
use shortbiz_core::store::User;
use shortbiz_core::{Auth, Config, ResponsesClient, ServiceError, Store, content, pricing};

/// Parameters for the `get_info` tool.
#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct GetInfoParams {
    /// Output format: "text" or "json"
    #[serde(default = "default_format")]
    pub format: String,
}

fn default_format() -> String {
    "text".to_string()
}

/// Parameters for `estimate_blog_cost` and `generate_blog`.
#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct BlogRequestParams {
    /// Access token from `shortbiz auth login`.
    pub access_token: String,
    /// The post to write.
    #[serde(flatten)]
    pub request: BlogRequest,
}

/// Parameters for the `get_blog` tool.
#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct GetBlogParams {
    /// Post id.
    pub id: i64,
}

/// Parameters for the `get_public_page` tool.
#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct PublicPageParams {
    /// Page slug.
    pub slug: String,
}

struct ServerState {
    store: Store,
    auth: Auth,
    generator: Option<BlogGenerator>,
}

/// MCP server over one store.
#[derive(Clone)]
pub struct ShortbizServer {
    state: Arc<ServerState>,
    tool_router: rmcp::handler::server::router::tool::ToolRouter<Self>,
}

impl ShortbizServer {
    /// Build from configuration. A missing API key leaves `generate_blog`
    /// unavailable rather than failing startup.
    pub fn from_config(config: &Config, store: Store) -> Self {
        let generator = match ResponsesClient::from_config(&config.llm) {
            Ok(client) => Some(BlogGenerator::new(
                Arc::new(client),
                GenerationSettings::from_config(config),
            )),
            Err(err) => {
                tracing::warn!(error = %err, "generate_blog disabled");
                None
            }
        };
        Self::new(store, Auth::from_config(config), generator)
    }
}

#[tool_router]
impl ShortbizServer {
    /// Create a server over `store`.
    pub fn new(store: Store, auth: Auth, generator: Option<BlogGenerator>) -> Self {
        Self {
            state: Arc::new(ServerState {
                store,
                auth,
                generator,
            }),
            tool_router: Self::tool_router(),
        }
    }

    /// Get project information.
    #[tool(description = "Get project name, version, and description")]
    #[tracing::instrument(skip(self), fields(otel.kind = "server"))]
    fn get_info(
        &self,
        Parameters(params): Parameters<GetInfoParams>,
    ) -> Result<CallToolResult, McpError> {
        tracing::debug!(tool = "get_info", format = %params.format, "executing MCP tool");

        let info = serde_json::json!({
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "description": env!("CARGO_PKG_DESCRIPTION"),
        });

        let text = if params.format == "json" {
            to_json(&info)?
        } else {
            format!(
                "{} v{}\n{}",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION"),
                env!("CARGO_PKG_DESCRIPTION"),
            )
        };

        tracing::info!(tool = "get_info", "MCP tool completed");
        Ok(CallToolResult::success(vec![Content::text(text)]))
    }

    /// Price a blog request against the caller's balance.
    #[tool(
        description = "Estimate the token cost of a blog post and whether the account's balance covers it. Does not generate anything."
    )]
    #[tracing::instrument(skip(self, params), fields(otel.kind = "server"))]
    fn estimate_blog_cost(
        &self,
        Parameters(params): Parameters<BlogRequestParams>,
    ) -> Result<CallToolResult, McpError> {
        tracing::debug!(tool = "estimate_blog_cost", "executing MCP tool");
        let user = self.caller(&params.access_token)?;
        let est = blog::estimate(&self.state.store, &user.id, params.request).map_err(tool_error)?;

        tracing::info!(
            tool = "estimate_blog_cost",
            cost = est.token_cost,
            "MCP tool completed"
        );
        Ok(CallToolResult::success(vec![Content::text(to_json(&est)?)]))
    }

    /// Generate, store, and charge for a blog post.
    #[tool(
        description = "Generate a blog post with the configured model, store it, and charge its token cost. Returns the post and the remaining balance."
    )]
    #[tracing::instrument(skip(self, params), fields(otel.kind = "server"))]
    async fn generate_blog(
        &self,
        Parameters(params): Parameters<BlogRequestParams>,
    ) -> Result<CallToolResult, McpError> {
        tracing::debug!(tool = "generate_blog", topic = %params.request.topic, "executing MCP tool");
        let generator = self.state.generator.as_ref().ok_or_else(|| {
            McpError::internal_error(
                "generation backend is not configured (set OPENAI_API_KEY)",
                None,
            )
        })?;
        let user = self.caller(&params.access_token)?;
        let outcome = generator
            .generate_blog(&self.state.store, &user.id, params.request)
            .await
            .map_err(tool_error)?;

        tracing::info!(
            tool = "generate_blog",
            blog_id = outcome.artifact.id,
            "MCP tool completed"
        );
        Ok(CallToolResult::success(vec![Content::text(to_json(&outcome)?)]))
    }

    /// Fetch a stored post.
    #[tool(description = "Fetch a stored blog post by id, with markdown and HTML.")]
    #[tracing::instrument(skip(self), fields(otel.kind = "server"))]
    fn get_blog(
        &self,
        Parameters(params): Parameters<GetBlogParams>,
    ) -> Result<CallToolResult, McpError> {
        let post = blog::get_blog(&self.state.store, params.id).map_err(tool_error)?;
        Ok(CallToolResult::success(vec![Content::text(to_json(&post)?)]))
    }

    /// Fetch a published link-in-bio page.
    #[tool(description = "Fetch a published link-in-bio page and its visible link blocks.")]
    #[tracing::instrument(skip(self), fields(otel.kind = "server"))]
    fn get_public_page(
        &self,
        Parameters(params): Parameters<PublicPageParams>,
    ) -> Result<CallToolResult, McpError> {
        let page = content::public_page(&self.state.store, &params.slug).map_err(tool_error)?;
        Ok(CallToolResult::success(vec![Content::text(to_json(&page)?)]))
    }

    /// List plans open for checkout.
    #[tool(description = "List pricing plans open for checkout, cheapest first.")]
    #[tracing::instrument(skip(self), fields(otel.kind = "server"))]
    fn list_plans(&self) -> Result<CallToolResult, McpError> {
        let plans = pricing::list_active_plans(&self.state.store).map_err(tool_error)?;
        tracing::info!(tool = "list_plans", count = plans.len(), "MCP tool completed");
        Ok(CallToolResult::success(vec![Content::text(to_json(&plans)?)]))
    }

    fn caller(&self, token: &str) -> Result<User, McpError> {
        self.state
            .auth
            .authenticate(&self.state.store, token)
            .map_err(tool_error)
    }
}

#[tool_handler]
impl ServerHandler for ShortbizServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: Default::default(),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
            instructions: Some(format!(
                "{} MCP server. Price and generate blog posts, read published pages, and list plans. \
                 Tools that act for an account need an access token from `shortbiz auth login`.",
                env!("CARGO_PKG_NAME"),
            )),
        }
    }
}

/// Caller mistakes become invalid-params errors, everything else is internal.
fn tool_error(err: ServiceError) -> McpError {
    if err.is_client_error() {
        McpError::invalid_params(err.to_string(), None)
    } else {
        tracing::error!(error = %err, "MCP tool failed");
        McpError::internal_error(err.to_string(), None)
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, McpError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| McpError::internal_error(format!("serialization error: {e}"), None))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rmcp::model::{ErrorCode, RawContent};
    use shortbiz_core::ServiceResult;
    use shortbiz_core::auth::Registration;
    use shortbiz_core::config::AuthConfig;
    use shortbiz_core::llm::{ContentPart, GenerationClient, RawResponse};
    use shortbiz_core::store::{PageDraft, PlanDraft, Role};

    struct Canned;

    #[async_trait]
    impl GenerationClient for Canned {
        async fn generate(&self, _prompt: &str) -> ServiceResult<RawResponse> {
            Ok(RawResponse::from_parts(vec![ContentPart::text(
                "# Five Tips\n\n- one\n- two",
            )]))
        }
    }

    fn auth(starting_tokens: i64) -> Auth {
        Auth::new(
            &AuthConfig {
                jwt_secret: "test-secret".into(),
                token_ttl_minutes: 30,
            },
            starting_tokens,
        )
    }

    fn generator() -> BlogGenerator {
        BlogGenerator::new(
            Arc::new(Canned),
            GenerationSettings {
                brand_name: "MyShortBIZ".into(),
            },
        )
    }

    /// A server with one signed-up account; returns its token.
    fn server_with_account(starting_tokens: i64) -> (ShortbizServer, String) {
        let store = Store::open_in_memory().unwrap();
        let auth = auth(starting_tokens);
        let user = auth
            .register(
                &store,
                &Registration {
                    email: "ann@example.com".into(),
                    password: "correct horse".into(),
                    role: Role::User,
                },
            )
            .unwrap();
        let token = auth.issue(&user).unwrap().access_token;
        (ShortbizServer::new(store, auth, Some(generator())), token)
    }

    fn extract_text(result: &CallToolResult) -> Option<&str> {
        result.content.first().and_then(|c| match &c.raw {
            RawContent::Text(t) => Some(t.text.as_str()),
            _ => None,
        })
    }

    fn json_of(result: &CallToolResult) -> serde_json::Value {
        serde_json::from_str(extract_text(result).expect("should have text content")).unwrap()
    }

    fn blog_params(token: &str, words: u32) -> Parameters<BlogRequestParams> {
        let mut request = BlogRequest::new("Small business tips");
        request.word_count = words;
        Parameters(BlogRequestParams {
            access_token: token.into(),
            request,
        })
    }

    #[test]
    fn server_info_has_correct_name() {
        let (server, _) = server_with_account(0);
        let info = ServerHandler::get_info(&server);
        assert_eq!(info.server_info.name, env!("CARGO_PKG_NAME"));
        assert_eq!(info.server_info.version, env!("CARGO_PKG_VERSION"));
        assert!(info.capabilities.tools.is_some());
        assert!(info.instructions.unwrap().contains("access token"));
    }

    #[test]
    fn get_info_tool_returns_json_when_requested() {
        let (server, _) = server_with_account(0);
        let result = server
            .get_info(Parameters(GetInfoParams {
                format: "json".into(),
            }))
            .unwrap();
        assert_eq!(json_of(&result)["name"], env!("CARGO_PKG_NAME"));
    }

    #[test]
    fn estimate_reports_affordability() {
        let (server, token) = server_with_account(100);
        let result = server.estimate_blog_cost(blog_params(&token, 800)).unwrap();
        let json = json_of(&result);
        assert_eq!(json["token_cost"], 3040);
        assert_eq!(json["affordable"], false);
    }

    #[test]
    fn bad_token_is_invalid_params() {
        let (server, _) = server_with_account(100);
        let err = server
            .estimate_blog_cost(blog_params("not-a-token", 800))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn generate_then_fetch() {
        let (server, token) = server_with_account(10_000);
        let result = server.generate_blog(blog_params(&token, 800)).await.unwrap();
        let json = json_of(&result);
        assert_eq!(json["tokens_remaining"], 6960);
        assert_eq!(json["artifact"]["title"], "Five Tips");

        let id = json["artifact"]["id"].as_i64().unwrap();
        let fetched = server.get_blog(Parameters(GetBlogParams { id })).unwrap();
        assert!(
            json_of(&fetched)["content_html"]
                .as_str()
                .unwrap()
                .contains("<li>one</li>")
        );
    }

    #[tokio::test]
    async fn generate_with_low_balance_is_rejected() {
        let (server, token) = server_with_account(100);
        let err = server
            .generate_blog(blog_params(&token, 800))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
        assert!(err.message.contains("3040"));
    }

    #[tokio::test]
    async fn generate_without_backend_is_internal_error() {
        let store = Store::open_in_memory().unwrap();
        let server = ShortbizServer::new(store, auth(0), None);
        let err = server
            .generate_blog(blog_params("whatever", 800))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::INTERNAL_ERROR);
    }

    #[test]
    fn public_page_and_plans() {
        let (server, _) = server_with_account(0);
        let err = server
            .get_public_page(Parameters(PublicPageParams {
                slug: "ann".into(),
            }))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);

        let store = &server.state.store;
        let owner = store.credentials_by_email("ann@example.com").unwrap().unwrap().0;
        content::upsert_my_page(
            store,
            &owner.id,
            &PageDraft {
                slug: "ann".into(),
                title: "Ann".into(),
                ..PageDraft::default()
            },
        )
        .unwrap();
        let page = server
            .get_public_page(Parameters(PublicPageParams {
                slug: "ann".into(),
            }))
            .unwrap();
        assert_eq!(json_of(&page)["page"]["title"], "Ann");

        store.insert_plan(&PlanDraft::new("Pro", "pro", 1900)).unwrap();
        store.insert_plan(&PlanDraft::new("Lite", "lite", 500)).unwrap();
        let plans = json_of(&server.list_plans().unwrap());
        assert_eq!(plans[0]["slug"], "lite");
        assert_eq!(plans[1]["slug"], "pro");
    }
}
