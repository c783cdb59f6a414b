#![deny(warnings)]

use anyhow::Context;
use clap::{Parser, Subcommand};
use comadre_core::config::{
    parse_base_url, resolve_api_key, resolve_history_cap, resolve_optional_string,
    resolve_string_with_default, resolve_table_name, AppConfig, Env, LlmConfig, StdEnv,
    StoreConfig, DEFAULT_ATTEMPT_TIMEOUT_MS, DEFAULT_DATA_DIR, DEFAULT_LLM_BASE_URL,
    DEFAULT_LLM_MODEL, DEFAULT_TURN_BUDGET_MS, ENV_DATA_DIR, ENV_GROQ_API_KEY, ENV_LLM_BASE_URL,
    ENV_LLM_MODEL,
};
use comadre_core::dialogue::DialogueManager;
use comadre_core::generate::{
    OpenAiCompatibleGenerator, ResilientGenerator, ResponseGenerator, ScriptedGenerator,
};
use comadre_core::memory::JsonFileProfileStore;
use comadre_core::mood::LexiconMoodClassifier;
use comadre_core::prompt::PromptComposer;
use comadre_core::skill::{
    RequestEnvelope, ResponseEnvelope, INTENT_CLEAR_MEMORY, INTENT_CONVERSATION, INTENT_HELP,
    INTENT_PROVIDE_NAME, INTENT_STOP, SLOT_USER_INPUT, SLOT_USER_NAME,
};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "comadre")]
#[command(about = "Spanish-speaking voice companion that remembers and adapts to mood")]
struct Args {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    config: ConfigArgs,

    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(clap::Args, Debug)]
struct ConfigArgs {
    /// Profile table; one JSON document per user under <data-dir>/<table>.
    #[arg(long)]
    table: Option<String>,

    #[arg(long)]
    data_dir: Option<PathBuf>,

    #[arg(long)]
    groq_api_key: Option<String>,

    #[arg(long)]
    llm_base_url: Option<String>,

    #[arg(long)]
    model: Option<String>,

    #[arg(long)]
    history_cap: Option<usize>,

    #[arg(long, default_value_t = DEFAULT_ATTEMPT_TIMEOUT_MS)]
    attempt_timeout_ms: u64,

    #[arg(long, default_value_t = DEFAULT_TURN_BUDGET_MS)]
    turn_budget_ms: u64,

    /// Answer with canned replies instead of calling the model.
    #[arg(long, default_value_t = false)]
    offline: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Handle one request envelope and print the response envelope.
    Handle {
        /// Path to the request JSON, or `-` for stdin.
        #[arg(long, default_value = "-")]
        event: String,
    },
    /// Talk to the companion from the terminal.
    Chat {
        #[arg(long, default_value = "local-user")]
        user_id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let Args {
        command,
        config,
        log_level,
    } = Args::parse();
    init_tracing(&log_level)?;

    let env = StdEnv;
    let cfg = build_config(config, &env)?;

    tracing::info!(
        table = cfg.store.table.as_str(),
        data_dir = %cfg.store.data_dir.display(),
        model = %cfg.llm.model,
        offline = cfg.offline,
        "config loaded"
    );

    if cfg.offline {
        run(cfg, ScriptedGenerator::new(), command).await
    } else {
        let key = cfg
            .llm
            .api_key
            .clone()
            .context("llm credential missing after validation")?;
        let generator = OpenAiCompatibleGenerator::new(&cfg.llm, key)?;
        run(cfg, generator, command).await
    }
}

async fn run<G: ResponseGenerator>(cfg: AppConfig, generator: G, command: Command) -> anyhow::Result<()> {
    let store = JsonFileProfileStore::open(&cfg.store)
        .await
        .with_context(|| format!("opening profile store at {}", cfg.store.table_dir().display()))?;
    let manager = DialogueManager::new(
        store,
        LexiconMoodClassifier::new(),
        PromptComposer::from_llm(&cfg.llm),
        ResilientGenerator::new(generator, cfg.llm.attempt_timeout, cfg.turn_budget),
        cfg.store.history_cap,
    );

    match command {
        Command::Handle { event } => handle_event(&manager, &event).await,
        Command::Chat { user_id } => chat(&manager, &user_id).await,
    }
}

async fn handle_event<S, C, G>(manager: &DialogueManager<S, C, G>, event: &str) -> anyhow::Result<()>
where
    S: comadre_core::memory::ProfileStore,
    C: comadre_core::mood::MoodClassifier,
    G: ResponseGenerator,
{
    let raw = if event == "-" {
        let mut buf = String::new();
        tokio::io::stdin()
            .read_to_string(&mut buf)
            .await
            .context("reading request from stdin")?;
        buf
    } else {
        tokio::fs::read_to_string(event)
            .await
            .with_context(|| format!("reading request from {event}"))?
    };
    let request: RequestEnvelope = serde_json::from_str(&raw).context("parsing request envelope")?;

    let response = manager.handle(&request).await;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

async fn chat<S, C, G>(manager: &DialogueManager<S, C, G>, user_id: &str) -> anyhow::Result<()>
where
    S: comadre_core::memory::ProfileStore,
    C: comadre_core::mood::MoodClassifier,
    G: ResponseGenerator,
{
    let mut out = tokio::io::stdout();
    let launch = request_envelope(user_id, serde_json::json!({ "type": "LaunchRequest" }))?;
    if speak(&mut out, manager.handle(&launch).await).await? {
        return Ok(());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let request = request_envelope(user_id, local_intent(line))?;
        if speak(&mut out, manager.handle(&request).await).await? {
            break;
        }
    }
    Ok(())
}

/// Prints what the companion says. Returns true when the session is over.
async fn speak(out: &mut tokio::io::Stdout, response: ResponseEnvelope) -> anyhow::Result<bool> {
    if let Some(text) = response.speech() {
        out.write_all(format!("comadre> {text}\n").as_bytes()).await?;
        out.flush().await?;
    }
    Ok(response.ends_session())
}

fn request_envelope(user_id: &str, request: serde_json::Value) -> anyhow::Result<RequestEnvelope> {
    serde_json::from_value(serde_json::json!({
        "version": "1.0",
        "session": { "new": false, "user": { "userId": user_id } },
        "request": request,
    }))
    .context("building request envelope")
}

/// Rough stand-in for the voice platform's interaction model.
fn local_intent(line: &str) -> serde_json::Value {
    let lower = line.to_lowercase();
    let (name, slot, value) = match lower.as_str() {
        "salir" | "adiós" | "adios" | "para" | "cancela" => (INTENT_STOP, None, None),
        "ayuda" => (INTENT_HELP, None, None),
        "olvida todo" | "borra mi memoria" => (INTENT_CLEAR_MEMORY, None, None),
        l if l.starts_with("me llamo ") || l.starts_with("mi nombre es ") => {
            (INTENT_PROVIDE_NAME, Some(SLOT_USER_NAME), Some(line))
        }
        _ => (INTENT_CONVERSATION, Some(SLOT_USER_INPUT), Some(line)),
    };

    let slots = match (slot, value) {
        (Some(slot), Some(value)) => serde_json::json!({ slot: { "name": slot, "value": value } }),
        _ => serde_json::json!({}),
    };
    serde_json::json!({
        "type": "IntentRequest",
        "intent": { "name": name, "slots": slots }
    })
}

fn init_tracing(level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(
            level
                .parse()
                .with_context(|| format!("invalid --log-level: {level}"))?,
        )
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn build_config(args: ConfigArgs, env: &impl Env) -> anyhow::Result<AppConfig> {
    let table = resolve_table_name(args.table, env)?;
    let data_dir = match args.data_dir {
        Some(dir) => dir,
        None => PathBuf::from(resolve_string_with_default(
            None,
            ENV_DATA_DIR,
            env,
            DEFAULT_DATA_DIR,
        )),
    };
    let history_cap = resolve_history_cap(args.history_cap, env)?;

    let base_url = parse_base_url(&resolve_string_with_default(
        args.llm_base_url,
        ENV_LLM_BASE_URL,
        env,
        DEFAULT_LLM_BASE_URL,
    ))?;
    let model = resolve_optional_string(args.model, ENV_LLM_MODEL, env)
        .unwrap_or_else(|| DEFAULT_LLM_MODEL.to_owned());
    let api_key = resolve_api_key(args.groq_api_key, ENV_GROQ_API_KEY, env)?;

    let cfg = AppConfig {
        store: StoreConfig {
            data_dir,
            table,
            history_cap,
        },
        llm: LlmConfig {
            base_url,
            model,
            api_key,
            attempt_timeout: Duration::from_millis(args.attempt_timeout_ms),
            ..LlmConfig::default()
        },
        turn_budget: Duration::from_millis(args.turn_budget_ms),
        offline: args.offline,
    };
    cfg.validate()?;
    Ok(cfg)
}
