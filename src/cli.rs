use clap::Parser;

/// Templated HTTP intruder: rotates tokens over numbered candidate files, checkpoints
/// every attempt and backs off when the endpoint rate-limits.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Initial number of concurrent requests (default 50)
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Delay after each request in seconds (default 0.0)
    #[arg(short, long)]
    pub delay: Option<f64>,

    /// Candidates per batch (default 2000)
    #[arg(short, long)]
    pub batch_size: Option<usize>,

    /// Pause between batches in seconds (default 0.5)
    #[arg(long)]
    pub batch_delay: Option<f64>,

    /// File receiving every candidate that matched the found marker
    #[arg(short, long)]
    pub output: Option<String>,

    /// Token list, one per line (default tokens.txt)
    #[arg(long)]
    pub tokens: Option<String>,

    /// Checkpoint of already attempted candidates (default processed.txt)
    #[arg(long)]
    pub processed: Option<String>,

    /// Candidate files are named {prefix}{N}.{ext} (default prefix "phone")
    #[arg(long)]
    pub input_prefix: Option<String>,

    /// Candidate file extension, empty for none (default "txt")
    #[arg(long)]
    pub input_ext: Option<String>,

    /// First N to look for (default 1)
    #[arg(long)]
    pub start_index: Option<usize>,

    /// Endpoint for the built-in request template
    #[arg(short, long)]
    pub url: Option<String>,

    /// Extra "Name: value" header for the built-in template (repeatable)
    #[arg(short = 'H', long = "header")]
    pub header: Vec<String>,

    /// Body template for the built-in template
    #[arg(long)]
    pub body: Option<String>,

    /// File holding a raw HTTP request to use as the template
    #[arg(short, long)]
    pub request: Option<String>,

    /// Response substring marking a hit
    #[arg(long)]
    pub found_marker: Option<String>,

    /// Response substring marking a rate-limited request (default TOO_MANY_REQUEST)
    #[arg(long)]
    pub rate_limit_marker: Option<String>,

    /// Load a JSON run profile
    #[arg(short, long)]
    pub config: Option<String>,

    /// Write the effective profile to this file and exit
    #[arg(long)]
    pub save_config: Option<String>,

    /// Skip interactive prompts
    #[arg(short, long)]
    pub yes: bool,

    /// Print every request and response
    #[arg(short, long)]
    pub verbose: bool,
}
