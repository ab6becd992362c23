// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction, parsed with `clap`.
// All work is delegated to Layer 2 (application).
//
// Two commands are supported:
//   1. `train` — builds the vocabulary and trains on the given corpora
//   2. `chat`  — loads a checkpoint and answers lines from stdin
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use std::io;

use anyhow::Result;
use clap::Parser;
use commands::{ChatArgs, Commands, TrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "seq2seq-chat",
    version,
    about = "Train a GRU encoder-decoder chatbot with Luong attention, then chat with it."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Routes to the matching use case; never computes anything itself.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args) => run_train(args),
            Commands::Chat(args)  => run_chat(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    let checkpoint_dir = args.checkpoint_dir.clone();
    let summary = TrainUseCase::new(args.into()).execute()?;

    match (summary.last_epoch, summary.last_loss) {
        (Some(epoch), Some(loss)) => println!(
            "Training complete. {} epoch(s) run, last checkpoint {:03} (mean loss {:.4}) in '{}'.",
            summary.epochs_run, epoch, loss, checkpoint_dir.display(),
        ),
        _ => println!("Nothing to train: the requested epochs are already done."),
    }
    Ok(())
}

fn run_chat(args: ChatArgs) -> Result<()> {
    use crate::application::chat_use_case::ChatUseCase;

    let chat = ChatUseCase::from_checkpoint(&args.checkpoint_dir, args.epoch, args.max_length)?;
    let stdin = io::stdin();
    chat.run_interactive(stdin.lock(), &mut io::stdout())
}
