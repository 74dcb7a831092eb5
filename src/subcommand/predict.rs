use super::*;

#[derive(Debug, Parser)]
pub(crate) struct Predict {
  #[clap(short, long)]
  image: PathBuf,
  #[clap(
    short,
    long,
    required_if_eq_any([("save", "true"), ("report", "true")]),
    help = "Patient identifier, required with --save or --report"
  )]
  patient_id: Option<String>,
  #[clap(long, help = "Write the heatmap overlay to this PNG file")]
  heatmap: Option<PathBuf>,
  #[clap(long, help = "Append the result to the history log")]
  save: bool,
  #[clap(long, help = "Export a JPEG and PDF report")]
  report: bool,
  #[clap(long, help = "Print the result as JSON")]
  json: bool,
  #[clap(flatten)]
  model: ModelOptions,
  #[clap(flatten)]
  output: OutputOptions,
}

impl Predict {
  pub(crate) fn run(self) -> Result {
    let patient_id = self.patient_id()?;

    let mut integrator = self.model.integrator()?;

    integrator
      .load_and_prepare_image(&self.image)
      .with_context(|| format!("failed to load `{}`", self.image.display()))?;

    let diagnosis = analyze(&integrator)?;

    let record = Record::new(patient_id, &diagnosis);

    if self.json {
      println!("{}", serde_json::to_string(&record)?);
    } else {
      for line in record.summary() {
        println!("{line}");
      }
    }

    if let Some(path) = &self.heatmap {
      if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
      }

      rgb_array_to_image(diagnosis.heatmap.view())
        .save(path)
        .with_context(|| format!("failed to write `{}`", path.display()))?;
    }

    if self.save {
      self.output.record_log()?.append(&record)?;
    }

    if self.report {
      let image = integrator.current().context("no image loaded")?;

      let report = self.output.report_writer().export(
        &record,
        image.bgr.view(),
        diagnosis.heatmap.view(),
      )?;

      println!("Report written to {}", report.document.display());
    }

    Ok(())
  }

  /// Saved and exported results must name a patient.
  fn patient_id(&self) -> Result<&str> {
    let patient_id = self.patient_id.as_deref().unwrap_or_default().trim();

    if patient_id.is_empty() && (self.save || self.report) {
      bail!("--patient-id must not be empty when saving or exporting a result");
    }

    Ok(patient_id)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn parse(arguments: &[&str]) -> clap::error::Result<Predict> {
    Predict::try_parse_from(
      ["predict", "--image", "xray.png"].iter().chain(arguments),
    )
  }

  #[test]
  fn saving_requires_patient_id() {
    assert!(parse(&["--save"]).is_err());
    assert!(parse(&["--report"]).is_err());
    assert!(parse(&["--save", "--patient-id", "1234"]).is_ok());
  }

  #[test]
  fn blank_patient_id_is_rejected_when_saving() {
    let predict = parse(&["--report", "--patient-id", "  "]).unwrap();

    assert!(predict.patient_id().is_err());

    let predict = parse(&["--save", "--patient-id", " 1234 "]).unwrap();

    assert_eq!(predict.patient_id().unwrap(), "1234");
  }

  #[test]
  fn patient_id_is_optional_for_printing() {
    let predict = parse(&[]).unwrap();

    assert_eq!(predict.patient_id().unwrap(), "");
  }
}
