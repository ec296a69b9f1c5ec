//! Replicant query tool
//!
//! Loads a cluster fixture, runs one read through the distributor and
//! prints the merged result as JSON.

use replicant::cluster::ClusterFixture;
use replicant::model::Matcher;
use replicant::telemetry::Telemetry;
use replicant::{Error, RequestContext};

use clap::Parser;
use std::path::PathBuf;
use tracing::info;

/// Replicant query tool
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Cluster fixture (JSON)
    #[arg(long, env = "REPLICANT_FIXTURE")]
    fixture: PathBuf,

    /// Tenant ID
    #[arg(long, env = "TENANT_ID", default_value = "default")]
    tenant: String,

    /// Range start, milliseconds
    #[arg(long, default_value_t = 0)]
    from: i64,

    /// Range end, milliseconds
    #[arg(long, default_value_t = i64::MAX)]
    to: i64,

    /// Series selector, e.g. __name__=up or job=~"api|web" (repeatable)
    #[arg(long = "match", value_name = "MATCHER")]
    matchers: Vec<Matcher>,

    /// Use the streaming read path
    #[arg(long)]
    stream: bool,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let telemetry = Telemetry::init_for_component("replicant-query", &args.log_level)?;

    let fixture = ClusterFixture::from_path(&args.fixture)?;
    let cluster = fixture.build()?;
    let distributor = cluster.distributor(fixture.distributor.clone());
    let ctx = RequestContext::for_tenant(args.tenant.clone());

    info!(
        run_id = telemetry.config().run_id.as_deref().unwrap_or("none"),
        tenant = %args.tenant,
        from = args.from,
        to = args.to,
        matchers = args.matchers.len(),
        stream = args.stream,
        "Running query"
    );

    let output = if args.stream {
        let result = distributor
            .query_stream(&ctx, args.from, args.to, &args.matchers)
            .await?;
        serde_json::to_string_pretty(&result).map_err(Error::from)?
    } else {
        let result = distributor
            .query(&ctx, args.from, args.to, &args.matchers)
            .await?;
        serde_json::to_string_pretty(&result).map_err(Error::from)?
    };

    println!("{output}");
    Ok(())
}
