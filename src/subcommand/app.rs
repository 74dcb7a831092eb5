use super::*;

#[derive(Debug, Parser)]
pub(crate) struct App {
  #[clap(flatten)]
  model: ModelOptions,
  #[clap(flatten)]
  output: OutputOptions,
}

impl App {
  pub(crate) fn run(self) -> Result {
    let app = Interface::new(
      self.model.integrator()?,
      self.output.record_log()?,
      self.output.report_writer(),
    );

    let native_options = NativeOptions {
      centered: true,
      hardware_acceleration: HardwareAcceleration::Preferred,
      viewport: ViewportBuilder {
        inner_size: Some(egui::vec2(1200.0, 600.0)),
        ..Default::default()
      },
      ..Default::default()
    };

    eframe::run_native(
      env!("CARGO_PKG_NAME"),
      native_options,
      Box::new(|_| Ok(Box::new(app))),
    )
    .map_err(|error| anyhow!("failed to run application: {error}"))
  }
}
