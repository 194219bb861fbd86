use clap::{Args, Parser, Subcommand};
use segment_cache::Segment;

#[derive(Parser, Debug)]
#[command(name = "segment-cache")]
#[command(about = "Geo-segmented site server with segment-aware response caching")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Evict cached entries from the shared Redis substrate
    ClearCache(ClearCacheArgs),
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct ClearCacheArgs {
    /// Evict every entry under the configured prefix
    #[arg(long)]
    pub all: bool,
    /// Evict keys matching a glob pattern
    #[arg(long, value_name = "GLOB")]
    pub pattern: Option<String>,
    /// Evict every entry of one segment (LOCAL or GLOBAL)
    #[arg(long, value_parser = parse_segment)]
    pub segment: Option<Segment>,
    /// Evict every entry of one logical name (e.g. page:home-en)
    #[arg(long, value_name = "NAME")]
    pub logical: Option<String>,
    /// Evict memoized GeoIP lookups
    #[arg(long)]
    pub geoip: bool,
}

fn parse_segment(s: &str) -> Result<Segment, String> {
    Segment::parse(&s.to_ascii_uppercase()).ok_or_else(|| format!("unknown segment '{}'", s))
}
