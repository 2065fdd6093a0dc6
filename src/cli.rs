use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// SQL Agent - Ask questions of a SQLite database in plain language
#[derive(Parser, Debug)]
#[command(name = "sql-agent")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands
}

/// Options shared by every subcommand
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// SQLite database file
    #[arg(short, long, global = true)]
    pub database: Option<PathBuf>,

    /// Query execution timeout in milliseconds
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    /// Output format
    #[arg(short = 'f', long, global = true, value_enum, default_value = "text")]
    pub output_format: Format,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Verbose output and debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Answer a question by generating and running a guarded SELECT
    Ask {
        /// Question in plain language
        question: String,

        /// LLM provider to use
        #[arg(short, long, value_enum)]
        provider: Option<Provider>,

        /// API key for OpenAI or Anthropic
        #[arg(short, long, env = "LLM_API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        /// Model name
        #[arg(short, long)]
        model: Option<String>,

        /// Ollama base URL
        #[arg(long, default_value = "http://localhost:11434")]
        ollama_url: String,

        /// OpenAI-compatible API root (LM Studio, vLLM)
        #[arg(long)]
        base_url: Option<String>,

        /// Row limit appended when the model omits one
        #[arg(long)]
        limit: Option<u64>,

        /// Skip leading comments and require a single parseable query
        #[arg(long)]
        strict: bool,

        /// Print the accepted SQL without executing it
        #[arg(long)]
        dry_run: bool
    },

    /// Run model output through extraction and guardrails
    Check {
        /// File with model output (use - for stdin)
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// Row limit appended when missing
        #[arg(long)]
        limit: Option<u64>,

        /// Skip leading comments and require a single parseable query
        #[arg(long)]
        strict: bool
    },

    /// Guard and execute a hand-written statement
    Run {
        /// SQL text
        sql: String,

        /// Row limit appended when missing
        #[arg(long)]
        limit: Option<u64>
    },

    /// Print the schema overview used in prompts
    Schema,

    /// Render the relationship diagram as Graphviz DOT
    Erd {
        /// Table names only, no field lists
        #[arg(long)]
        no_columns: bool,

        /// Maximum fields per table (0 for all)
        #[arg(long)]
        max_columns: Option<usize>,

        /// Draw inferred edges dashed
        #[arg(long)]
        dashed_inferred: bool,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>
    },

    /// Print tables, edges and diagnostics
    Graph,

    /// Show the first rows of a table
    Preview {
        /// Table name
        table: String,

        /// Number of rows
        #[arg(short = 'n', long, default_value_t = 10)]
        rows: u64
    },

    /// Row counts by table
    Counts
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Provider {
    #[value(name = "openai")]
    OpenAI,
    Anthropic,
    Ollama
}

impl Provider {
    /// Get default model for provider
    pub fn default_model(&self) -> &str {
        match self {
            Self::OpenAI => "gpt-4o-mini",
            Self::Anthropic => "claude-sonnet-4-20250514",
            Self::Ollama => "llama3.2"
        }
    }

    /// Parse a provider name from configuration
    pub fn from_name(name: &str) -> Option<Self> {
        <Self as ValueEnum>::from_str(name, true).ok()
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Format {
    Text,
    Json,
    Yaml,
    Csv
}
