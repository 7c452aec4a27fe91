use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use smg::{AbstractionManager, SmgOptions, SmgState, ValueId};

const APP_NAME: &str = "smg";

#[derive(Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
struct SmgConfig {
    pub options: SmgOptions,
}

impl SmgConfig {
    /// The stored configuration with the command-line overrides applied.
    fn updated(&self, params: &SmgParams) -> Self {
        let mut options = self.options.clone();
        if let Some(t) = params.equality_threshold {
            options.equality_threshold = t;
        }
        if let Some(t) = params.entailment_threshold {
            options.entailment_threshold = t;
        }
        if let Some(t) = params.incomparable_threshold {
            options.incomparable_threshold = t;
        }
        Self { options }
    }
}

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct SmgParams {
    #[command(subcommand)]
    pub command: Commands,
    /// Persist a new equality threshold
    #[arg(long, global = true)]
    pub equality_threshold: Option<usize>,
    /// Persist a new entailment threshold
    #[arg(long, global = true)]
    pub entailment_threshold: Option<usize>,
    /// Persist a new incomparable threshold
    #[arg(long, global = true)]
    pub incomparable_threshold: Option<usize>,
    /// Log abstraction steps
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Build a list of the given length and fold it
    Fold {
        length: usize,
        /// Link the nodes in both directions
        #[arg(long)]
        doubly: bool,
        /// Give every node a different data value
        #[arg(long)]
        distinct: bool,
        /// Print the folded graph in graphviz format
        #[arg(long)]
        dot: bool,
    },
    /// Print the stored configuration
    Config,
}

fn main() -> Result<()> {
    let params: SmgParams = SmgParams::parse();
    tracing_subscriber::fmt()
        .with_max_level(if params.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::WARN
        })
        .with_target(false)
        .init();
    let config = update_config(&params)?;
    match params.command {
        Commands::Fold {
            length,
            doubly,
            distinct,
            dot,
        } => fold(config.options, length, doubly, distinct, dot),
        Commands::Config => {
            println!("{:#?}", config.options);
            Ok(())
        }
    }
}

fn update_config(params: &SmgParams) -> Result<SmgConfig> {
    let stored_config: SmgConfig = confy::load(APP_NAME, None).context("loading configuration")?;
    let new_config = stored_config.updated(params);
    if stored_config != new_config {
        confy::store(APP_NAME, None, &new_config).context("storing configuration")?;
    }
    Ok(new_config)
}

/// A null-terminated list built back to front, with `head` pointing at the first node.
///
/// Nodes hold `next` at 0, `prev` at 8 when doubly linked, and a data word after the
/// links.
fn build_list(options: SmgOptions, length: usize, doubly: bool, distinct: bool) -> Result<SmgState> {
    let word = options.pointer_size;
    let links = if doubly { 2 } else { 1 };
    let size = word * (links + 1);
    let mut state = SmgState::new(options);
    let head = state.declare_global("head", word);
    let mut next = ValueId::ZERO;
    let mut next_node = None;
    for i in (0..length).rev() {
        let (mut successor, pointer) = state
            .malloc(size)?
            .into_iter()
            .next()
            .context("allocation has no successor")?;
        let node = successor
            .graph()
            .points_to(pointer)
            .map(|e| e.target)
            .context("allocation did not return a pointer")?;
        successor.write_value(node, 0, word, next)?;
        if doubly {
            successor.write_value(node, word as i64, word, ValueId::ZERO)?;
            if let Some(next_node) = next_node {
                successor.write_value(next_node, word as i64, word, pointer)?;
            }
        }
        let data = successor.value_for(if distinct { i as i64 } else { 0 });
        successor.write_value(node, (word * links) as i64, word, data)?;
        next = pointer;
        next_node = Some(node);
        state = successor;
    }
    state.write_value(head, 0, word, next)?;
    if state.has_memory_errors() {
        bail!("building the list failed: {}", state.errors());
    }
    Ok(state)
}

fn fold(options: SmgOptions, length: usize, doubly: bool, distinct: bool, dot: bool) -> Result<()> {
    let mut state = build_list(options, length, doubly, distinct)?;
    let manager = AbstractionManager::default();
    while let Some(candidate) = manager.execute_one_step(&mut state)? {
        println!("folded {}", candidate);
    }
    if dot {
        println!("{}", state.graph().to_dot(state.explicit_values()));
    } else {
        println!("{}", state);
    }
    Ok(())
}
