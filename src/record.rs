use super::*;

/// One saved analysis result.
#[derive(Clone, Debug, Serialize)]
pub(crate) struct Record {
  pub(crate) patient_id: String,
  pub(crate) label: Label,
  pub(crate) probability: f64,
}

impl Record {
  pub(crate) fn new(patient_id: impl Into<String>, diagnosis: &Diagnosis) -> Self {
    Self {
      patient_id: patient_id.into(),
      label: diagnosis.label,
      probability: diagnosis.probability,
    }
  }

  pub(crate) fn probability_text(&self) -> String {
    format!("{:.2}%", self.probability)
  }

  /// Result lines shown on the console and printed into reports.
  pub(crate) fn summary(&self) -> [String; 3] {
    [
      format!("Cedula: {}", self.patient_id),
      format!("Prediccion: {}", self.label),
      format!("Probabilidad: {}", self.probability_text()),
    ]
  }
}

/// Append-only delimited history of saved results.
#[derive(Clone, Debug)]
pub(crate) struct RecordLog {
  path: PathBuf,
  delimiter: u8,
}

impl RecordLog {
  pub(crate) fn new(path: impl Into<PathBuf>, delimiter: char) -> Result<Self, Error> {
    if delimiter == ',' || !delimiter.is_ascii() || delimiter.is_ascii_control() {
      return Err(Error::invalid_argument(format!(
        "log delimiter must be a printable ASCII character other than a comma, got {delimiter:?}"
      )));
    }

    Ok(Self {
      path: path.into(),
      delimiter: delimiter as u8,
    })
  }

  pub(crate) fn path(&self) -> &Path {
    &self.path
  }

  pub(crate) fn append(&self, record: &Record) -> Result<(), Error> {
    if let Some(parent) = self.path.parent() {
      fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new()
      .create(true)
      .append(true)
      .open(&self.path)?;

    let mut writer = csv::WriterBuilder::new()
      .delimiter(self.delimiter)
      .has_headers(false)
      .from_writer(file);

    writer.write_record([
      record.patient_id.as_str(),
      record.label.as_str(),
      record.probability_text().as_str(),
    ])?;

    writer.flush()?;

    info!(path = %self.path.display(), patient = %record.patient_id, "saved record");

    Ok(())
  }
}
