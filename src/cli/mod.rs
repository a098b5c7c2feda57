// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All business logic is delegated to Layer 2 (application).
//
//   (none)  — decode the demo sequences
//   debug   — graph smoke test on the fixed debug batch
//   infer   — decode user sequences, from a checkpoint if present
//   train   — train both variants, report their final loss
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, InferArgs, TrainArgs};

use crate::application::infer_use_case::{DemoOutput, InferUseCase};
use crate::application::train_use_case::{TrainConfig, TrainUseCase};
use crate::infra::interrupt::InterruptFlag;

#[derive(Parser, Debug)]
#[command(
    name = "seq2seq-rnn",
    version = "0.1.0",
    about = "RNN encoder-decoder with optional attention, trained on a sequence copy task."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            None                        => run_demo(None),
            Some(Commands::Debug)       => run_debug(),
            Some(Commands::Infer(args)) => run_infer(args),
            Some(Commands::Train(args)) => run_train(args),
        }
    }
}

fn run_debug() -> Result<()> {
    let prediction = InferUseCase::new(None).debug_check()?;
    println!("{}", format_rows(&prediction));
    Ok(())
}

fn run_demo(checkpoint_dir: Option<String>) -> Result<()> {
    let out = InferUseCase::new(checkpoint_dir).run_demo(&[])?;
    print_demo(&out);
    Ok(())
}

fn run_infer(args: InferArgs) -> Result<()> {
    let inputs = args.sequences()?;
    let out = InferUseCase::new(Some(args.checkpoint_dir))
        .with_variant(args.variant)
        .run_demo(&inputs)?;
    print_demo(&out);
    Ok(())
}

fn run_train(args: TrainArgs) -> Result<()> {
    let config: TrainConfig = args.into();
    tracing::info!("Starting training, checkpoints in '{}'", config.checkpoint_dir);

    let interrupt = InterruptFlag::new();
    interrupt.install_ctrlc()?;

    let reports = TrainUseCase::new(config.clone(), interrupt).execute()?;
    for r in &reports {
        if r.report.was_interrupted() {
            println!("training interrupted ({})", r.variant);
        }
        match r.report.final_loss() {
            Some(loss) => println!(
                "{}: loss {:.4} after {} examples (batch_size={})",
                r.variant, loss, r.report.examples_seen(config.batch_size), config.batch_size,
            ),
            None => println!("{}: no steps completed", r.variant),
        }
    }
    Ok(())
}

fn print_demo(out: &DemoOutput) {
    if !out.from_checkpoint {
        println!("(untrained weights)");
    }
    println!("{}", format_rows(&out.time_major));
}

/// Time-major rows, one per line: "[5 4 1]"
fn format_rows(rows: &[Vec<u32>]) -> String {
    rows.iter()
        .map(|row| {
            let ids: Vec<String> = row.iter().map(u32::to_string).collect();
            format!("[{}]", ids.join(" "))
        })
        .collect::<Vec<_>>()
        .join("\n")
}
