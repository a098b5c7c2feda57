// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the subcommands `debug`, `infer` and `train` and all
// their configurable flags. Running without a subcommand decodes
// the demo sequences.
//
// Reference: Rust Book §12 (Building a CLI Program)

use anyhow::{Context, Result};
use clap::{Args, Subcommand, ValueEnum};

use crate::application::train_use_case::TrainConfig;
use crate::domain::tokens::TokenSequence;
use crate::ml::{cell::CellKind, loss::LossMask};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the debug graph and run the train-mode prediction twice
    Debug,

    /// Greedy-decode token sequences
    Infer(InferArgs),

    /// Train the attention and no-attention variants on the copy task
    Train(TrainArgs),
}

#[derive(Args, Debug)]
pub struct InferArgs {
    /// Comma-separated token ids, one flag per sequence (e.g. --input 5,4,6,7 --input 6,6)
    #[arg(long = "input")]
    pub inputs: Vec<String>,

    /// Directory where checkpoints were saved during training
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Which trained variant to load
    #[arg(long, default_value = "attention")]
    pub variant: String,
}

impl InferArgs {
    pub fn sequences(&self) -> Result<Vec<TokenSequence>> {
        self.inputs.iter().map(|s| parse_sequence(s)).collect()
    }
}

/// "5,4,6,7" → [5, 4, 6, 7]
pub fn parse_sequence(text: &str) -> Result<TokenSequence> {
    text.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| t.parse::<u32>().with_context(|| format!("Invalid token id '{t}'")))
        .collect()
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum CellArg {
    Gru,
    Lstm,
}

impl From<CellArg> for CellKind {
    fn from(c: CellArg) -> Self {
        match c {
            CellArg::Gru  => CellKind::Gru,
            CellArg::Lstm => CellKind::Lstm,
        }
    }
}

/// All arguments for the `train` command.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Directory for checkpoints, config and loss history
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    #[arg(long, value_enum, default_value_t = CellArg::Lstm)]
    pub cell: CellArg,

    #[arg(long, default_value_t = 10)]
    pub encoder_hidden: usize,

    /// Must equal encoder_hidden, doubled when --bidirectional is set
    #[arg(long, default_value_t = 10)]
    pub decoder_hidden: usize,

    #[arg(long, default_value_t = 10)]
    pub vocab_size: usize,

    #[arg(long, default_value_t = 10)]
    pub embedding_size: usize,

    #[arg(long)]
    pub bidirectional: bool,

    /// Use one cell for both encoder directions
    #[arg(long)]
    pub share_bidirectional_cell: bool,

    /// Count padded decoder positions in the loss average
    #[arg(long)]
    pub loss_all_positions: bool,

    /// Shortest generated sequence
    #[arg(long, default_value_t = 3)]
    pub length_from: usize,

    /// Longest generated sequence
    #[arg(long, default_value_t = 8)]
    pub length_to: usize,

    /// Smallest generated token id (0 and 1 are PAD and EOS)
    #[arg(long, default_value_t = 2)]
    pub vocab_lower: u32,

    /// One past the largest generated token id
    #[arg(long, default_value_t = 10)]
    pub vocab_upper: u32,

    #[arg(long, default_value_t = 100)]
    pub batch_size: usize,

    /// Training runs max_batches + 1 steps
    #[arg(long, default_value_t = 5000)]
    pub max_batches: usize,

    /// Print diagnostics every this many steps
    #[arg(long, default_value_t = 1000)]
    pub batches_in_epoch: usize,

    #[arg(long, default_value_t = 1e-3)]
    pub lr: f64,

    #[arg(long)]
    pub seed: Option<u64>,

    /// Skip the periodic diagnostics
    #[arg(long)]
    pub quiet: bool,
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            checkpoint_dir:   a.checkpoint_dir,
            cell:             a.cell.into(),
            encoder_hidden:   a.encoder_hidden,
            decoder_hidden:   a.decoder_hidden,
            vocab_size:       a.vocab_size,
            embedding_size:   a.embedding_size,
            bidirectional:    a.bidirectional,
            share_bidirectional_cell: a.share_bidirectional_cell,
            loss_mask: if a.loss_all_positions { LossMask::AllPositions } else { LossMask::TrainLength },
            max_decode_steps: TrainConfig::default().max_decode_steps,
            length_from:      a.length_from,
            length_to:        a.length_to,
            vocab_lower:      a.vocab_lower,
            vocab_upper:      a.vocab_upper,
            batch_size:       a.batch_size,
            max_batches:      a.max_batches,
            batches_in_epoch: a.batches_in_epoch,
            learning_rate:    a.lr,
            seed:             a.seed,
            verbose:          !a.quiet,
        }
    }
}
