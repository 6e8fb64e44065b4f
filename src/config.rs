use std::env;
use std::path::PathBuf;

/// Default system prompt used when the caller's history does not start with one.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful bookstore assistant. \
When the user asks for book recommendations or about books in the catalog, call the \
`search_books` tool with a short descriptive query. Once you have what you need, answer \
with the `send_reply` tool. Only recommend books that appear in search results.";

/// Where embeddings come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmbeddingBackend {
    /// Local ONNX sentence encoder.
    Onnx {
        model_path: PathBuf,
        tokenizer_path: PathBuf,
        max_sequence_length: usize,
        /// Optional override for session pool size. If None, uses available cores.
        pool_size: Option<usize>,
    },
    /// OpenAI-compatible `/v1/embeddings` endpoint.
    Remote { url: String, model: String },
}

/// Where the catalog corpus is read from at rebuild time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorpusLocation {
    Csv(PathBuf),
    Http(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
    pub corpus: CorpusLocation,
    /// Snapshot file for the built index. Loaded at startup when valid.
    pub index_path: PathBuf,
    pub embedding: EmbeddingBackend,
    /// Texts embedded per batch during a rebuild.
    pub embedding_batch_size: usize,
    /// Base URL of the Ollama-compatible chat endpoint.
    pub model_url: String,
    pub model_name: String,
    /// Upper bound for one chat exchange, model round trips included.
    pub model_timeout_secs: u64,
    pub max_tool_rounds: usize,
    /// Extra neighbors fetched beyond the requested count to absorb duplicate rows.
    pub search_margin: usize,
    pub max_books_per_search: usize,
    pub system_prompt: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            shutdown_timeout_secs: 10,
            corpus: CorpusLocation::Csv(PathBuf::from("./start_data/data.csv")),
            index_path: PathBuf::from("./data/catalog.index"),
            embedding: EmbeddingBackend::Onnx {
                model_path: PathBuf::from("./models/all-MiniLM-L6-v2/model.onnx"),
                tokenizer_path: PathBuf::from("./models/all-MiniLM-L6-v2/tokenizer.json"),
                max_sequence_length: 256,
                pool_size: None,
            },
            embedding_batch_size: 64,
            model_url: "http://localhost:11434".to_string(),
            model_name: "qwen3:8b".to_string(),
            model_timeout_secs: 60,
            max_tool_rounds: 3,
            search_margin: 20,
            max_books_per_search: 25,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// `CATALOG_URL` takes precedence over `DATA_PATH`, and `EMBEDDING_URL`
    /// switches from the local ONNX encoder to a remote embedding endpoint.
    pub fn from_env() -> anyhow::Result<Self> {
        let corpus = match env::var("CATALOG_URL") {
            Ok(url) if !url.trim().is_empty() => CorpusLocation::Http(url),
            _ => {
                let data_dir =
                    PathBuf::from(env::var("DATA_PATH").unwrap_or_else(|_| "./start_data".into()));
                CorpusLocation::Csv(data_dir.join("data.csv"))
            }
        };

        let embedding = match env::var("EMBEDDING_URL") {
            Ok(url) if !url.trim().is_empty() => EmbeddingBackend::Remote {
                url,
                model: env::var("EMBEDDING_MODEL")
                    .unwrap_or_else(|_| "all-minilm".to_string()),
            },
            _ => EmbeddingBackend::Onnx {
                model_path: PathBuf::from(
                    env::var("EMBEDDING_MODEL_PATH")
                        .unwrap_or_else(|_| "./models/all-MiniLM-L6-v2/model.onnx".to_string()),
                ),
                tokenizer_path: PathBuf::from(
                    env::var("EMBEDDING_TOKENIZER_PATH").unwrap_or_else(|_| {
                        "./models/all-MiniLM-L6-v2/tokenizer.json".to_string()
                    }),
                ),
                max_sequence_length: env::var("MAX_SEQ_LENGTH")
                    .unwrap_or_else(|_| "256".to_string())
                    .parse()?,
                pool_size: env::var("EMBEDDING_POOL_SIZE")
                    .ok()
                    .and_then(|s| s.parse().ok()),
            },
        };

        let index_dir = PathBuf::from(env::var("INDEX_PATH").unwrap_or_else(|_| "./data".into()));
        let index_name = env::var("INDEX_NAME").unwrap_or_else(|_| "catalog.index".to_string());

        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()?,
            shutdown_timeout_secs: env::var("SHUTDOWN_TIMEOUT")
                .unwrap_or_else(|_| "10".to_string())
                .parse()?,
            corpus,
            index_path: index_dir.join(index_name),
            embedding,
            embedding_batch_size: env::var("EMBEDDING_BATCH_SIZE")
                .unwrap_or_else(|_| "64".to_string())
                .parse()?,
            model_url: env::var("MODEL_URL")
                .unwrap_or_else(|_| "http://localhost:11434".to_string()),
            model_name: env::var("MODEL_NAME").unwrap_or_else(|_| "qwen3:8b".to_string()),
            model_timeout_secs: env::var("MODEL_TIMEOUT_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()?,
            max_tool_rounds: env::var("MAX_TOOL_ROUNDS")
                .unwrap_or_else(|_| "3".to_string())
                .parse()?,
            search_margin: env::var("SEARCH_MARGIN")
                .unwrap_or_else(|_| "20".to_string())
                .parse()?,
            max_books_per_search: env::var("MAX_BOOKS_PER_SEARCH")
                .unwrap_or_else(|_| "25".to_string())
                .parse()?,
            system_prompt: env::var("SYSTEM_PROMPT")
                .unwrap_or_else(|_| DEFAULT_SYSTEM_PROMPT.to_string()),
        })
    }
}
