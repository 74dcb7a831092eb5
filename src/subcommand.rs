use {super::*, app::App, console::Console, init::Init, predict::Predict};

mod app;
mod console;
mod init;
mod predict;

#[derive(Debug, Parser)]
pub(crate) enum Subcommand {
  #[clap(name = "app", about = "Run the interactive GUI application")]
  App(App),
  #[clap(name = "console", about = "Analyze an image from interactive prompts")]
  Console(Console),
  #[clap(name = "init", about = "Write a randomly initialized model artifact")]
  Init(Init),
  #[clap(name = "predict", about = "Classify an X-ray and render its heatmap")]
  Predict(Predict),
}

impl Subcommand {
  pub(crate) fn run(self) -> Result {
    match self {
      Self::App(app) => app.run(),
      Self::Console(console) => console.run(),
      Self::Init(init) => init.run(),
      Self::Predict(predict) => predict.run(),
    }
  }
}

#[derive(Debug, Parser)]
pub(crate) struct ModelOptions {
  #[clap(short, long, default_value = "models/model.json")]
  model: PathBuf,
  #[clap(long, default_value = TARGET_LAYER)]
  target_layer: String,
}

impl ModelOptions {
  pub(crate) fn integrator(&self) -> Result<Integrator<ModelClassifier>> {
    let classifier = ModelClassifier::load(&self.model, &self.target_layer)
      .with_context(|| {
        format!("failed to load model `{}`", self.model.display())
      })?;

    Ok(Integrator::new(classifier))
  }
}

#[derive(Debug, Parser)]
pub(crate) struct OutputOptions {
  #[clap(long, default_value = "reports/historial.csv")]
  log: PathBuf,
  #[clap(long, default_value = "-")]
  delimiter: char,
  #[clap(long, default_value = "reports/figures")]
  reports: PathBuf,
}

impl OutputOptions {
  pub(crate) fn record_log(&self) -> Result<RecordLog> {
    Ok(RecordLog::new(&self.log, self.delimiter)?)
  }

  pub(crate) fn report_writer(&self) -> ReportWriter {
    ReportWriter::new(&self.reports)
  }
}

pub(crate) fn analyze<C: Classifier>(
  integrator: &Integrator<C>,
) -> Result<Diagnosis> {
  let spinner = ProgressBar::new_spinner();

  spinner.set_style(ProgressStyle::default_spinner().template("{spinner} {msg}")?);
  spinner.set_message("Analyzing image...");
  spinner.enable_steady_tick(Duration::from_millis(100));

  let diagnosis = integrator.analyze_image();

  spinner.finish_and_clear();

  diagnosis.context("failed to analyze image")
}
