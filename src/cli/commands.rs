// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands, `train` and `chat`, and their flags.
//
// Reference: Rust Book §12 (Building a CLI Program)

use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::application::train_use_case::TrainConfig;
use crate::data::{
    loader::{CorpusKind, CorpusSource},
    normalizer::NormalizerKind,
};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the encoder-decoder on one or more dialogue corpora
    Train(TrainArgs),

    /// Chat with a trained checkpoint
    Chat(ChatArgs),
}

/// All arguments for the `train` command.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Cornell movie-dialogs corpus directory
    #[arg(long)]
    pub cornell_dir: Option<PathBuf>,

    /// Directory holding summer_wild_evaluation_dialogs.json
    #[arg(long)]
    pub convai2_dir: Option<PathBuf>,

    /// Directory of NUCC transcript .txt files
    #[arg(long)]
    pub nucc_dir: Option<PathBuf>,

    /// Where checkpoints, config, vocabulary and metrics are written
    #[arg(long, default_value = "weights")]
    pub checkpoint_dir: PathBuf,

    /// Sentences must be strictly shorter than this many tokens
    #[arg(long, default_value_t = 32)]
    pub max_length: usize,

    /// Words seen fewer times are trimmed from the vocabulary
    #[arg(long, default_value_t = 3)]
    pub min_count: usize,

    #[arg(short, long, default_value_t = 64)]
    pub batch_size: usize,

    #[arg(short = 'i', long, default_value_t = 10)]
    pub epochs: usize,

    /// Encoder learning rate
    #[arg(long, default_value_t = 1e-4)]
    pub lr: f64,

    /// Decoder learning rate = lr × this
    #[arg(long, default_value_t = 5.0)]
    pub decoder_learning_ratio: f64,

    /// Probability that a batch is trained with teacher forcing
    #[arg(long, default_value_t = 0.5)]
    pub teacher_forcing_ratio: f64,

    /// Global gradient-norm bound, per encoder / decoder
    #[arg(long, default_value_t = 50.0)]
    pub clip: f64,

    #[arg(long, default_value_t = 500)]
    pub hidden_size: usize,

    #[arg(long, default_value_t = 2)]
    pub encoder_layers: usize,

    #[arg(long, default_value_t = 2)]
    pub decoder_layers: usize,

    #[arg(long, default_value_t = 0.1)]
    pub dropout: f64,

    /// dot, general or concat
    #[arg(long, default_value = "dot")]
    pub attention: String,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Log the batch loss every N batches
    #[arg(long, default_value_t = 10)]
    pub log_every: usize,

    /// Keep corpus order instead of reshuffling every epoch
    #[arg(long)]
    pub no_shuffle: bool,

    /// Resume from this saved epoch
    #[arg(short, long)]
    pub load: Option<usize>,
}

impl TrainArgs {
    fn corpora(&self) -> Vec<CorpusSource> {
        [
            (CorpusKind::Cornell, &self.cornell_dir),
            (CorpusKind::ConvAi2, &self.convai2_dir),
            (CorpusKind::Nucc, &self.nucc_dir),
        ]
        .into_iter()
        .filter_map(|(kind, dir)| dir.as_ref().map(|d| CorpusSource::new(kind, d)))
        .collect()
    }
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
/// The application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        let corpora = a.corpora();
        // chat input is normalised like the first corpus
        let normalizer = corpora
            .first()
            .map(CorpusSource::normalizer_kind)
            .unwrap_or(NormalizerKind::Latin);

        TrainConfig {
            corpora,
            normalizer,
            checkpoint_dir:         a.checkpoint_dir,
            max_length:             a.max_length,
            min_count:              a.min_count,
            batch_size:             a.batch_size,
            epochs:                 a.epochs,
            learning_rate:          a.lr,
            decoder_learning_ratio: a.decoder_learning_ratio,
            teacher_forcing_ratio:  a.teacher_forcing_ratio,
            clip:                   a.clip,
            hidden_size:            a.hidden_size,
            encoder_layers:         a.encoder_layers,
            decoder_layers:         a.decoder_layers,
            dropout:                a.dropout,
            attention:              a.attention,
            seed:                   a.seed,
            log_every:              a.log_every,
            shuffle:                !a.no_shuffle,
            load_epoch:             a.load,
        }
    }
}

/// All arguments for the `chat` command
#[derive(Args, Debug)]
pub struct ChatArgs {
    /// Directory where training wrote its checkpoints
    #[arg(long, default_value = "weights")]
    pub checkpoint_dir: PathBuf,

    /// Epoch to load; the latest one when omitted
    #[arg(short, long)]
    pub epoch: Option<usize>,

    /// Number of tokens decoded per reply
    #[arg(long, default_value_t = 10)]
    pub max_length: usize,
}
