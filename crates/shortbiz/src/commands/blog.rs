//! Blog command: price, generate, and read AI-written posts.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use shortbiz_core::blog::{
    self, BlogGenerator, BlogRequest, CostEstimate, DEFAULT_AUDIENCE, DEFAULT_TONE,
    DEFAULT_WORD_COUNT, Feature, FeatureSelection, GenerationOutcome, GenerationSettings,
};
use shortbiz_core::store::Artifact;
use shortbiz_core::{ResponsesClient, Store};
use tracing::{debug, instrument};

use super::{AppContext, print_json};

/// Arguments for the `blog` subcommand.
#[derive(Args, Debug)]
pub struct BlogArgs {
    #[command(subcommand)]
    command: BlogCommand,
}

#[derive(Subcommand, Debug)]
enum BlogCommand {
    /// Show what a post would cost without generating it
    Estimate(RequestArgs),
    /// Generate a post and charge its cost to your balance
    Generate(RequestArgs),
    /// Print a stored post
    Show {
        /// Post id
        id: i64,
        /// Print the rendered HTML instead of markdown
        #[arg(long)]
        html: bool,
    },
    /// List your posts, newest first
    List,
}

/// Fields of a generation request.
#[derive(Args, Debug, Clone)]
struct RequestArgs {
    /// What the post is about
    topic: String,

    /// Who the post is written for
    #[arg(long, default_value = DEFAULT_AUDIENCE)]
    audience: String,

    /// Voice of the post
    #[arg(long, default_value = DEFAULT_TONE)]
    tone: String,

    /// Primary SEO keyword
    #[arg(long)]
    seo_keyword: Option<String>,

    /// Target length in words (300-2500)
    #[arg(short, long, default_value_t = DEFAULT_WORD_COUNT)]
    words: u32,

    /// Features to switch on (comma-separated)
    #[arg(long = "with", value_enum, value_delimiter = ',')]
    with: Vec<Feature>,

    /// Features to switch off (comma-separated)
    #[arg(long = "without", value_enum, value_delimiter = ',')]
    without: Vec<Feature>,

    /// Start from no features instead of the defaults
    #[arg(long)]
    bare: bool,
}

impl RequestArgs {
    fn into_request(self) -> BlogRequest {
        let mut features = if self.bare {
            FeatureSelection::none()
        } else {
            FeatureSelection::default()
        };
        for f in self.with {
            features.set(f, true);
        }
        for f in self.without {
            features.set(f, false);
        }
        BlogRequest {
            topic: self.topic,
            audience: self.audience,
            tone: self.tone,
            seo_keyword: self.seo_keyword,
            word_count: self.words,
            features,
        }
    }
}

/// Run a `blog` subcommand.
#[instrument(name = "cmd_blog", skip_all)]
pub fn cmd_blog(args: BlogArgs, ctx: &AppContext) -> anyhow::Result<()> {
    match args.command {
        BlogCommand::Estimate(req) => {
            let user = ctx.current_user()?;
            let est = blog::estimate(&ctx.store, &user.id, req.into_request())?;
            if ctx.json {
                print_json(&est)?;
            } else {
                print_estimate(&est);
            }
        }
        BlogCommand::Generate(req) => {
            let user = ctx.current_user()?;
            let client = ResponsesClient::from_config(&ctx.config.llm)?;
            debug!(model = client.model(), "generation backend ready");
            let generator = BlogGenerator::new(
                Arc::new(client),
                GenerationSettings::from_config(&ctx.config),
            );
            let outcome = run_generate(
                &generator,
                &ctx.store,
                &user.id,
                req.into_request(),
                !ctx.json,
            )?;
            if ctx.json {
                print_json(&outcome)?;
            } else {
                print_outcome(&outcome);
            }
        }
        BlogCommand::Show { id, html } => {
            let post = blog::get_blog(&ctx.store, id)?;
            if ctx.json {
                print_json(&post)?;
            } else if html {
                println!("{}", post.content_html);
            } else {
                println!("{}", post.content_markdown);
            }
        }
        BlogCommand::List => {
            let user = ctx.current_user()?;
            let posts = blog::list_blogs(&ctx.store, &user.id)?;
            if ctx.json {
                print_json(&posts)?;
            } else if posts.is_empty() {
                println!("{}", "No posts yet.".dimmed());
            } else {
                for post in &posts {
                    print_listing(post);
                }
            }
        }
    }
    Ok(())
}

/// Drive one generation to completion on a fresh runtime.
fn run_generate(
    generator: &BlogGenerator,
    store: &Store,
    owner_id: &str,
    request: BlogRequest,
    show_progress: bool,
) -> anyhow::Result<GenerationOutcome> {
    let rt = tokio::runtime::Runtime::new().context("failed to create async runtime")?;

    let spinner = show_progress.then(|| {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(format!("Writing \"{}\"", request.topic));
        pb.enable_steady_tick(Duration::from_millis(120));
        pb
    });

    let result = rt.block_on(generator.generate_blog(store, owner_id, request));
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
    Ok(result?)
}

fn print_estimate(est: &CostEstimate) {
    println!("{}: {}", "Cost".dimmed(), est.token_cost.bold());
    println!("{}: {}", "Balance".dimmed(), est.tokens_remaining);
    if est.affordable {
        println!("{}", "Balance covers this request.".green());
    } else {
        println!(
            "{}",
            format!(
                "Short by {} tokens.",
                est.token_cost - est.tokens_remaining
            )
            .red()
        );
    }
}

fn print_outcome(outcome: &GenerationOutcome) {
    let post = &outcome.artifact;
    println!(
        "{} #{} {}",
        "Generated".green(),
        post.id,
        post.title.bold()
    );
    println!(
        "{}: {}  {}: {}",
        "Cost".dimmed(),
        post.token_cost,
        "Tokens left".dimmed(),
        outcome.tokens_remaining.cyan()
    );
    println!();
    println!("{}", post.content_markdown);
}

fn print_listing(post: &Artifact) {
    let features: Vec<&str> = post.features.enabled().map(Feature::as_str).collect();
    let extras = if features.is_empty() {
        "no extras".to_string()
    } else {
        features.join(", ")
    };
    println!(
        "{:>5}  {}  {}",
        format!("#{}", post.id).cyan(),
        post.created_at.format("%Y-%m-%d"),
        post.title.bold()
    );
    println!(
        "       {} words, {} tokens, {}",
        post.word_count,
        post.token_cost,
        extras.dimmed()
    );
}
