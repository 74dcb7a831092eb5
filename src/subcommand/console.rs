use super::*;

#[derive(Debug, Parser)]
pub(crate) struct Console {
  #[clap(long, help = "Append the result to the history log")]
  save: bool,
  #[clap(long, help = "Export a JPEG and PDF report")]
  report: bool,
  #[clap(flatten)]
  model: ModelOptions,
  #[clap(flatten)]
  output: OutputOptions,
}

impl Console {
  pub(crate) fn run(self) -> Result {
    let mut integrator = self.model.integrator()?;

    let log = self.output.record_log()?;

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut output = io::stdout();

    let (record, diagnosis) = session(&mut integrator, &mut input, &mut output)?;

    if self.save {
      log.append(&record)?;
      writeln!(output, "Saved to {}", log.path().display())?;
    }

    if self.report {
      let image = integrator.current().context("no image loaded")?;

      let report = self.output.report_writer().export(
        &record,
        image.bgr.view(),
        diagnosis.heatmap.view(),
      )?;

      writeln!(output, "Report written to {}", report.document.display())?;
    }

    Ok(())
  }
}

/// Prompts for a patient id and an image path, then analyzes the image and
/// prints the result.
fn session<C: Classifier>(
  integrator: &mut Integrator<C>,
  input: &mut impl BufRead,
  output: &mut impl Write,
) -> Result<(Record, Diagnosis)> {
  let patient_id = loop {
    let id = prompt(input, output, "Ingrese la cedula del paciente: ")?;

    if !id.is_empty() {
      break id;
    }
  };

  loop {
    let path = prompt(input, output, "Ingrese la ruta de la imagen: ")?;

    let path = PathBuf::from(path.trim_matches(|c| c == '"' || c == '\''));

    if !path.is_file() {
      writeln!(output, "No existe el archivo `{}`", path.display())?;
      continue;
    }

    match integrator.load_and_prepare_image(&path) {
      Ok(_) => break,
      Err(error) => writeln!(output, "No se pudo cargar la imagen: {error}")?,
    }
  }

  let diagnosis = analyze(integrator)?;

  let record = Record::new(patient_id, &diagnosis);

  for line in record.summary() {
    writeln!(output, "{line}")?;
  }

  Ok((record, diagnosis))
}

fn prompt(
  input: &mut impl BufRead,
  output: &mut impl Write,
  message: &str,
) -> Result<String> {
  write!(output, "{message}")?;
  output.flush()?;

  let mut line = String::new();

  if input.read_line(&mut line)? == 0 {
    bail!("unexpected end of input");
  }

  Ok(line.trim().to_owned())
}
