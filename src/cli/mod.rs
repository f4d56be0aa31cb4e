// ============================================================
// Layer 1: CLI / Presentation Layer
// ============================================================
// Parses arguments with clap and routes each subcommand to its
// use case in Layer 2. Printing results happens here.
//
//   train     fit BertAttBpr, one checkpoint + report set per epoch
//   eval      score a split with a saved checkpoint
//   baseline  fit a flat-feature baseline or the title classifier
//
// Reference: Rust Book §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{BaselineArgs, Commands, EvalArgs, TrainArgs};

use crate::domain::metric::{find_report, MetricValue};

#[derive(Parser, Debug)]
#[command(
    name = "viral-news-ranker",
    version = "0.1.0",
    about = "Rank news articles by predicted virality with a BERT + attention BPR model."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)    => run_train(args),
            Commands::Eval(args)     => run_eval(args),
            Commands::Baseline(args) => run_baseline(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Starting training on '{}'", args.data_path);
    let checkpoint_dir = args.checkpoint_dir.clone();
    let history = TrainUseCase::new(args.into()).execute()?;

    if let Some(last) = history.last() {
        println!(
            "Training complete after {} epoch(s): val_loss={:.4}, f1={:.3}. Checkpoints in '{}'.",
            last.epoch, last.val_loss, last.f1, checkpoint_dir,
        );
    }
    Ok(())
}

fn run_eval(args: EvalArgs) -> Result<()> {
    use crate::application::eval_use_case::EvalUseCase;

    let outcome = EvalUseCase::new(args.into()).execute()?;

    println!("Scored {} article(s)", outcome.labels.len());
    match find_report(&outcome.metrics) {
        Some(report) => println!("{report}"),
        None => print_scalars(&outcome.metrics),
    }
    if let Some(report) = &outcome.report {
        println!("Explanation rows: {}", report.len());
    }
    Ok(())
}

fn run_baseline(args: BaselineArgs) -> Result<()> {
    use crate::application::baseline_use_case::BaselineUseCase;

    let name    = args.model.name();
    let results = BaselineUseCase::new(args.into()).execute()?;

    println!("Baseline {name}:");
    print_scalars(&results);
    Ok(())
}

fn print_scalars(results: &[crate::domain::metric::MetricResult]) {
    for r in results {
        match &r.value {
            MetricValue::Scalar(v)  => println!("  {:<12} {:.4}", r.name, v),
            MetricValue::PerTask(v) => {
                let cells: Vec<String> = v.iter().map(|x| format!("{x:.4}")).collect();
                println!("  {:<12} [{}]", r.name, cells.join(", "));
            }
            MetricValue::Report(report) => println!("{report}"),
            MetricValue::Confusion(cm)  => println!("{cm}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::{baseline_use_case::BaselineConfig, train_use_case::TrainConfig};
    use crate::ml::baselines::BaselineKind;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_train_column_lists_split_on_commas() {
        let cli = Cli::try_parse_from([
            "viral-news-ranker", "train",
            "--numeric-cols", "sentiment_score,item_views",
            "--user-cols", "article_source,author",
            "--threshold", "-0.5",
        ])
        .unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };
        let cfg: TrainConfig = args.into();
        assert_eq!(cfg.numeric_cols, vec!["sentiment_score", "item_views"]);
        assert_eq!(cfg.user_cols, vec!["article_source", "author"]);
        assert!(cfg.categorical_cols.is_empty());
        assert_eq!(cfg.threshold, -0.5);
        assert_eq!(cfg.limit, None);
    }

    #[test]
    fn test_baseline_model_flag() {
        let cli = Cli::try_parse_from([
            "viral-news-ranker", "baseline", "--model", "llr", "--topic-cols", "t1,t2",
        ])
        .unwrap();
        let Commands::Baseline(args) = cli.command else { panic!("expected baseline") };
        let cfg: BaselineConfig = args.into();
        assert_eq!(cfg.kind, BaselineKind::Llr);
        assert_eq!(cfg.schema.topic_cols.len(), 2);
        assert_eq!(cfg.schema.user_cols, vec!["article_source"]);
    }

    #[test]
    fn test_text_baseline_takes_encoder_sizes() {
        let cli = Cli::try_parse_from([
            "viral-news-ranker", "baseline", "--model", "text",
            "--hidden", "64", "--num-heads", "4", "--lr", "1e-6",
        ])
        .unwrap();
        let Commands::Baseline(args) = cli.command else { panic!("expected baseline") };
        let cfg: BaselineConfig = args.into();
        assert_eq!(cfg.kind, BaselineKind::Text);
        assert_eq!(cfg.text_encoder(200).hidden, 64);
        assert_eq!(cfg.text_encoder(200).num_heads, 4);
        assert_eq!(cfg.dropout, 0.8);
        assert_eq!(cfg.lr, 1e-6);
    }

    #[test]
    fn test_eval_defaults_to_latest_epoch_with_explanations() {
        let cli = Cli::try_parse_from(["viral-news-ranker", "eval"]).unwrap();
        let Commands::Eval(args) = cli.command else { panic!("expected eval") };
        let cfg: crate::application::eval_use_case::EvalConfig = args.into();
        assert_eq!(cfg.epoch, None);
        assert!(cfg.explain);
        assert!(!cfg.all_rows);
        assert!(cfg.metrics.is_empty());
    }
}
