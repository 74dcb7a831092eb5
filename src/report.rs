use super::*;

const JPEG_QUALITY: u8 = 90;

const MARGIN: usize = 40;

const HEADER: usize = 120;

const FONT_SIZE: usize = 16;

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Report {
  pub(crate) image: PathBuf,
  pub(crate) document: PathBuf,
}

/// Writes numbered report files into one directory; numbering starts at 0
/// for every new writer and advances only on successful exports.
#[derive(Debug)]
pub(crate) struct ReportWriter {
  directory: PathBuf,
  next: usize,
}

impl ReportWriter {
  pub(crate) fn new(directory: impl Into<PathBuf>) -> Self {
    Self {
      directory: directory.into(),
      next: 0,
    }
  }

  /// Saves the original image next to its overlay as `Reporte{n}.jpg`, and
  /// the same picture with the result text as a one-page `Reporte{n}.pdf`.
  pub(crate) fn export(
    &mut self,
    record: &Record,
    original: ArrayView3<u8>,
    heatmap: ArrayView3<u8>,
  ) -> Result<Report, Error> {
    let canvas = side_by_side(original, heatmap)?;

    let mut jpeg = Vec::new();

    JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY).encode_image(&canvas)?;

    fs::create_dir_all(&self.directory)?;

    let report = Report {
      image: self.directory.join(format!("Reporte{}.jpg", self.next)),
      document: self.directory.join(format!("Reporte{}.pdf", self.next)),
    };

    fs::write(&report.image, &jpeg)?;

    fs::write(
      &report.document,
      pdf(&jpeg, canvas.dimensions(), &record.summary()),
    )?;

    self.next += 1;

    info!(
      image = %report.image.display(),
      document = %report.document.display(),
      "exported report"
    );

    Ok(report)
  }
}

fn side_by_side(
  original: ArrayView3<u8>,
  heatmap: ArrayView3<u8>,
) -> Result<RgbImage, Error> {
  if original.is_empty() || original.dim().2 != 3 {
    return Err(Error::invalid_argument("original must be a 3-channel image"));
  }

  if heatmap.dim() != (INPUT_SIZE, INPUT_SIZE, 3) {
    return Err(Error::invalid_argument(format!(
      "heatmap must be {INPUT_SIZE}x{INPUT_SIZE}x3, got {:?}",
      heatmap.dim()
    )));
  }

  let left = bgr_array_to_image(
    resize_image(original, (INPUT_SIZE, INPUT_SIZE)).view(),
  );

  let right = rgb_array_to_image(heatmap);

  let mut canvas = RgbImage::new(2 * INPUT_SIZE as u32, INPUT_SIZE as u32);

  imageops::replace(&mut canvas, &left, 0, 0);
  imageops::replace(&mut canvas, &right, INPUT_SIZE as i64, 0);

  Ok(canvas)
}

/// Minimal single-page PDF: text lines above a JPEG image XObject.
fn pdf(jpeg: &[u8], (width, height): (u32, u32), lines: &[String]) -> Vec<u8> {
  let (width, height) = (width as usize, height as usize);

  let page_width = width + 2 * MARGIN;
  let page_height = height + HEADER + MARGIN;

  let mut content = format!(
    "BT /F1 {FONT_SIZE} Tf {MARGIN} {} Td",
    page_height - MARGIN
  );

  for (index, line) in lines.iter().enumerate() {
    if index > 0 {
      content.push_str(&format!(" 0 -{} Td", FONT_SIZE + 8));
    }

    content.push_str(&format!(" ({}) Tj", escape(line)));
  }

  content.push_str(&format!(
    " ET\nq {width} 0 0 {height} {MARGIN} {MARGIN} cm /Im0 Do Q\n"
  ));

  let objects: Vec<Vec<u8>> = vec![
    b"<< /Type /Catalog /Pages 2 0 R >>".to_vec(),
    b"<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_vec(),
    format!(
      "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {page_width} {page_height}] \
       /Resources << /XObject << /Im0 4 0 R >> /Font << /F1 5 0 R >> >> \
       /Contents 6 0 R >>"
    )
    .into_bytes(),
    stream(
      &format!(
        "/Type /XObject /Subtype /Image /Width {width} /Height {height} \
         /ColorSpace /DeviceRGB /BitsPerComponent 8 /Filter /DCTDecode"
      ),
      jpeg,
    ),
    b"<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_vec(),
    stream("", content.as_bytes()),
  ];

  let mut output = b"%PDF-1.4\n".to_vec();

  let mut offsets = Vec::with_capacity(objects.len());

  for (index, object) in objects.iter().enumerate() {
    offsets.push(output.len());
    output.extend_from_slice(format!("{} 0 obj\n", index + 1).as_bytes());
    output.extend_from_slice(object);
    output.extend_from_slice(b"\nendobj\n");
  }

  let xref = output.len();

  output.extend_from_slice(
    format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes(),
  );

  for offset in offsets {
    output.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
  }

  output.extend_from_slice(
    format!(
      "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref}\n%%EOF\n",
      objects.len() + 1
    )
    .as_bytes(),
  );

  output
}

fn stream(dictionary: &str, data: &[u8]) -> Vec<u8> {
  let mut object =
    format!("<< {dictionary} /Length {} >>\nstream\n", data.len()).into_bytes();

  object.extend_from_slice(data);
  object.extend_from_slice(b"\nendstream");

  object
}

/// Escapes a PDF literal string; characters outside printable ASCII become
/// `?` since the page uses a standard Type 1 font.
fn escape(text: &str) -> String {
  text
    .chars()
    .map(|c| match c {
      '\\' | '(' | ')' => format!("\\{c}"),
      ' '..='~' => c.to_string(),
      _ => "?".into(),
    })
    .collect()
}
