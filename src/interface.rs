use super::*;

const PREVIEW_SIZE: f32 = 250.0;

pub(crate) struct Interface {
  integrator: Integrator<ModelClassifier>,
  log: RecordLog,
  reports: ReportWriter,
  patient_id: String,
  path: String,
  diagnosis: Option<Diagnosis>,
  original: Option<TextureHandle>,
  heatmap: Option<TextureHandle>,
  status: Option<String>,
  confirm_clear: bool,
}

impl eframe::App for Interface {
  fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
    egui::CentralPanel::default().show(ctx, |ui| {
      self.ui(ui);
    });
  }
}

impl Interface {
  pub(crate) fn new(
    integrator: Integrator<ModelClassifier>,
    log: RecordLog,
    reports: ReportWriter,
  ) -> Self {
    Self {
      integrator,
      log,
      reports,
      patient_id: String::new(),
      path: String::new(),
      diagnosis: None,
      original: None,
      heatmap: None,
      status: None,
      confirm_clear: false,
    }
  }

  fn load_image(&mut self, ctx: &egui::Context) {
    let path = self.path.trim().trim_matches('"').to_owned();

    match self.integrator.load_and_prepare_image(path) {
      Ok(image) => {
        self.original = Some(texture(ctx, "original", &image.display));
        self.heatmap = None;
        self.diagnosis = None;
        self.status = None;
      }
      Err(error) => {
        warn!(%error, "could not load image");
        self.status = Some(format!("Could not load image: {error}"));
      }
    }
  }

  fn predict(&mut self, ctx: &egui::Context) {
    match self.integrator.analyze_image() {
      Ok(diagnosis) => {
        self.heatmap = Some(texture(
          ctx,
          "heatmap",
          &rgb_array_to_image(diagnosis.heatmap.view()),
        ));
        self.diagnosis = Some(diagnosis);
        self.status = None;
      }
      Err(error) => {
        warn!(%error, "prediction failed");
        self.status = Some(format!("Prediction failed: {error}"));
      }
    }
  }

  fn record(&mut self) -> Option<Record> {
    let diagnosis = self.diagnosis.as_ref()?;

    let patient_id = self.patient_id.trim();

    if patient_id.is_empty() {
      self.status = Some("Enter a patient ID first.".into());
      return None;
    }

    Some(Record::new(patient_id, diagnosis))
  }

  fn save(&mut self) {
    if self.diagnosis.is_none() {
      self.status = Some("Nothing to save yet.".into());
      return;
    }

    let Some(record) = self.record() else {
      return;
    };

    self.status = Some(match self.log.append(&record) {
      Ok(()) => format!("Saved to {}.", self.log.path().display()),
      Err(error) => {
        warn!(%error, "could not save record");
        format!("Could not save: {error}")
      }
    });
  }

  fn export(&mut self) {
    if self.diagnosis.is_none() || self.integrator.current().is_none() {
      self.status = Some("Nothing to export yet.".into());
      return;
    }

    let Some(record) = self.record() else {
      return;
    };

    let (Some(image), Some(diagnosis)) =
      (self.integrator.current(), self.diagnosis.as_ref())
    else {
      return;
    };

    let result =
      self
        .reports
        .export(&record, image.bgr.view(), diagnosis.heatmap.view());

    self.status = Some(match result {
      Ok(report) => format!("Report written to {}.", report.document.display()),
      Err(error) => {
        warn!(%error, "could not export report");
        format!("Could not export report: {error}")
      }
    });
  }

  fn clear(&mut self) {
    self.integrator.reset();
    self.patient_id.clear();
    self.path.clear();
    self.diagnosis = None;
    self.original = None;
    self.heatmap = None;
    self.status = None;
    self.confirm_clear = false;
  }

  pub(crate) fn ui(&mut self, ui: &mut egui::Ui) {
    ui.heading("Pneumonia diagnosis support");

    ui.add_space(10.0);

    ui.horizontal(|ui| {
      ui.vertical(|ui| {
        ui.strong("X-ray image");
        preview(ui, self.original.as_ref());
      });

      ui.vertical(|ui| {
        ui.strong("Image with heatmap");
        preview(ui, self.heatmap.as_ref());
      });

      ui.vertical(|ui| {
        ui.horizontal(|ui| {
          ui.strong("Cedula:");
          ui.text_edit_singleline(&mut self.patient_id);
        });

        ui.horizontal(|ui| {
          ui.strong("Prediccion:");

          if let Some(diagnosis) = &self.diagnosis {
            ui.label(diagnosis.label.as_str());
          }
        });

        ui.horizontal(|ui| {
          ui.strong("Probabilidad:");

          if let Some(diagnosis) = &self.diagnosis {
            ui.label(format!("{:.2}%", diagnosis.probability));
          }
        });
      });
    });

    ui.add_space(10.0);

    ui.horizontal(|ui| {
      ui.label("Image path:");
      ui.text_edit_singleline(&mut self.path);
    });

    ui.horizontal(|ui| {
      if ui.button("Load image").clicked() {
        self.load_image(ui.ctx());
      }

      let loaded = self.integrator.current().is_some();

      if ui.add_enabled(loaded, egui::Button::new("Predict")).clicked() {
        self.predict(ui.ctx());
      }

      if ui.button("Save").clicked() {
        self.save();
      }

      if ui.button("PDF").clicked() {
        self.export();
      }

      if ui.button("Clear").clicked() {
        self.confirm_clear = true;
      }
    });

    if self.confirm_clear {
      ui.horizontal(|ui| {
        ui.label("All data will be cleared.");

        if ui.button("Confirm").clicked() {
          self.clear();
        }

        if ui.button("Cancel").clicked() {
          self.confirm_clear = false;
        }
      });
    }

    if let Some(status) = &self.status {
      ui.separator();
      ui.label(status.as_str());
    }
  }
}

fn texture(ctx: &egui::Context, name: &str, image: &RgbImage) -> TextureHandle {
  let size = [image.width() as usize, image.height() as usize];

  ctx.load_texture(
    name,
    ColorImage::from_rgb(size, image.as_raw()),
    TextureOptions::LINEAR,
  )
}

fn preview(ui: &mut egui::Ui, texture: Option<&TextureHandle>) {
  let size = Vec2::splat(PREVIEW_SIZE);

  match texture {
    Some(texture) => {
      ui.image((texture.id(), size));
    }
    None => {
      ui.allocate_space(size);
    }
  }
}
