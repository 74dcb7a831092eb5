use {
  super::*,
  tracing::Level,
  tracing_subscriber::{filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Debug, Parser)]
#[clap(about = "Pneumonia X-ray classification with Grad-CAM heatmaps")]
pub(crate) struct Arguments {
  #[clap(
    short,
    long,
    action = clap::ArgAction::Count,
    global = true,
    help = "Increase log verbosity (-v info, -vv debug, -vvv trace)"
  )]
  verbose: u8,
  #[clap(subcommand)]
  subcommand: Subcommand,
}

impl Arguments {
  pub(crate) fn run(self) -> Result {
    let level = match self.verbose {
      0 => Level::WARN,
      1 => Level::INFO,
      2 => Level::DEBUG,
      _ => Level::TRACE,
    };

    tracing_subscriber::registry()
      .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
      .with(LevelFilter::from_level(level))
      .init();

    self.subcommand.run()
  }
}
