use std::io::{self, Write};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tracing::debug;

use crate::client::{ClientOptions, QueryClient};
use crate::config;
use crate::data::HttpConnector;
use crate::format::abbreviate_number;
use crate::logging;
use crate::query::PostsQuery;
use crate::storage;

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// `name` or `name@host`; `None` shows the instance front page.
    pub community: Option<String>,
}

/// Loads config and accounts, fetches the first page of the feed and prints
/// one line per post.
pub fn run(options: RunOptions) -> Result<()> {
    let cfg = config::load(config::LoadOptions::default()).context("load config")?;
    if let Err(err) = logging::init(&cfg.logging.filter) {
        eprintln!("warning: {err:#}");
    }

    let store = storage::Store::open(storage::Options::default()).context("open storage")?;
    let accounts = store
        .load_account_store(&cfg.lemmy.default_instance)
        .context("load accounts")?;
    debug!(
        instance = %accounts.selected_account().instance,
        accounts = accounts.accounts().len(),
        "restored accounts"
    );

    let connector = HttpConnector::new(cfg.lemmy.user_agent.clone(), cfg.lemmy.request_timeout);
    let mut client = QueryClient::new(connector, accounts, ClientOptions::from(&cfg.cache))
        .context("connect to instance")?
        .with_storage(store);

    let query = PostsQuery {
        community_name: options.community,
        ..PostsQuery::default()
    };
    client.posts_query(&query);
    client
        .wait_for_idle(cfg.lemmy.request_timeout + Duration::from_secs(5))
        .context("wait for feed")?;

    if let Some(error) = client.posts_state(&query).and_then(|state| state.error()) {
        bail!("load feed: {error}");
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for post in client.feed_posts(&query) {
        writeln!(
            out,
            "{:>7}  {}  ({})",
            abbreviate_number(post.counts.score),
            post.post.name,
            post.community.slug()
        )?;
    }
    Ok(())
}
