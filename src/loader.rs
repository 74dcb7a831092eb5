use super::*;

/// Where an image comes from, chosen by file extension.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum ImageSource {
  Dicom(PathBuf),
  Raster(PathBuf),
}

impl ImageSource {
  pub(crate) fn from_path(path: impl Into<PathBuf>) -> Self {
    let path = path.into();

    let is_dicom = path
      .extension()
      .and_then(|extension| extension.to_str())
      .is_some_and(|extension| {
        extension.eq_ignore_ascii_case("dcm")
          || extension.eq_ignore_ascii_case("dicom")
      });

    if is_dicom {
      Self::Dicom(path)
    } else {
      Self::Raster(path)
    }
  }

  pub(crate) fn path(&self) -> &Path {
    match self {
      Self::Dicom(path) | Self::Raster(path) => path,
    }
  }

  /// Reads the samples as a photometrically stretched BGR image.
  pub(crate) fn read(&self) -> Result<Array3<u8>, Error> {
    let path = self.path();

    if !path.is_file() {
      return Err(Error::Io(io::Error::new(
        io::ErrorKind::NotFound,
        format!("no image file at `{}`", path.display()),
      )));
    }

    match self {
      Self::Dicom(path) => read_dicom(path),
      Self::Raster(path) => read_raster(path),
    }
  }
}

/// A loaded image: the normalized BGR tensor used for analysis and an RGB
/// rendition for display.
#[derive(Clone, Debug)]
pub(crate) struct LoadedImage {
  pub(crate) source: ImageSource,
  pub(crate) bgr: Array3<u8>,
  pub(crate) display: RgbImage,
}

pub(crate) struct ImageLoader;

impl ImageLoader {
  pub(crate) fn load(path: impl Into<PathBuf>) -> Result<LoadedImage, Error> {
    let source = ImageSource::from_path(path);

    let bgr = source.read()?;

    let (height, width, _) = bgr.dim();

    info!(path = %source.path().display(), height, width, "loaded image");

    Ok(LoadedImage {
      display: bgr_array_to_image(bgr.view()),
      source,
      bgr,
    })
  }
}

fn read_dicom(path: &Path) -> Result<Array3<u8>, Error> {
  let dicom_error = |error: &dyn Display| {
    Error::Dicom(format!("`{}`: {error}", path.display()))
  };

  let object =
    dicom_object::open_file(path).map_err(|error| dicom_error(&error))?;

  let pixels = object
    .decode_pixel_data()
    .map_err(|error| dicom_error(&error))?;

  if pixels.number_of_frames() != 1 || pixels.samples_per_pixel() != 1 {
    return Err(dicom_error(&format!(
      "expected a single-frame grayscale image, got {} frames of {} samples",
      pixels.number_of_frames(),
      pixels.samples_per_pixel()
    )));
  }

  let (rows, columns) = (pixels.rows() as usize, pixels.columns() as usize);

  let samples = pixels
    .to_vec::<f64>()
    .map_err(|error| dicom_error(&error))?;

  let plane = Array2::from_shape_vec((rows, columns), samples)
    .map_err(|error| dicom_error(&error))?;

  let gray = stretch_to_u8(plane.view());

  Ok(Array3::from_shape_fn((rows, columns, 3), |(y, x, _)| {
    gray[[y, x]]
  }))
}

fn read_raster(path: &Path) -> Result<Array3<u8>, Error> {
  let image = image::open(path)?.to_rgb8();

  let samples = rgb_image_to_bgr(&image).mapv(f64::from);

  Ok(stretch_to_u8(samples.view()))
}

#[cfg(test)]
mod tests {
  use {
    super::*,
    dicom_core::{DataElement, PrimitiveValue, Tag, VR},
    dicom_dictionary_std::tags,
    dicom_object::{FileMetaTableBuilder, InMemDicomObject},
    ndarray::array,
    tempdir::TempDir,
  };

  /// Writes an uncompressed 16-bit MONOCHROME2 file.
  fn write_dicom(
    path: &Path,
    (rows, columns): (u16, u16),
    frames: u16,
    pixels: &[u16],
  ) {
    let mut object = InMemDicomObject::new_empty();

    let mut put = |tag: Tag, vr: VR, value: PrimitiveValue| {
      object.put(DataElement::new(tag, vr, value));
    };

    put(tags::SOP_CLASS_UID, VR::UI, "1.2.840.10008.5.1.4.1.1.7".into());
    put(tags::SOP_INSTANCE_UID, VR::UI, "2.25.1".into());
    put(tags::SAMPLES_PER_PIXEL, VR::US, 1_u16.into());
    put(tags::PHOTOMETRIC_INTERPRETATION, VR::CS, "MONOCHROME2".into());
    put(tags::ROWS, VR::US, rows.into());
    put(tags::COLUMNS, VR::US, columns.into());
    put(tags::BITS_ALLOCATED, VR::US, 16_u16.into());
    put(tags::BITS_STORED, VR::US, 16_u16.into());
    put(tags::HIGH_BIT, VR::US, 15_u16.into());
    put(tags::PIXEL_REPRESENTATION, VR::US, 0_u16.into());

    if frames > 1 {
      put(tags::NUMBER_OF_FRAMES, VR::IS, frames.to_string().into());
    }

    put(
      tags::PIXEL_DATA,
      VR::OW,
      PrimitiveValue::U16(pixels.iter().copied().collect()),
    );

    object
      .with_meta(
        FileMetaTableBuilder::new()
          .media_storage_sop_class_uid("1.2.840.10008.5.1.4.1.1.7")
          .media_storage_sop_instance_uid("2.25.1")
          .transfer_syntax("1.2.840.10008.1.2.1"),
      )
      .unwrap()
      .write_to_file(path)
      .unwrap();
  }

  #[test]
  fn source_is_chosen_by_extension() {
    assert!(matches!(
      ImageSource::from_path("scan.dcm"),
      ImageSource::Dicom(_)
    ));

    assert!(matches!(
      ImageSource::from_path("scan.DICOM"),
      ImageSource::Dicom(_)
    ));

    assert!(matches!(
      ImageSource::from_path("scan.jpeg"),
      ImageSource::Raster(_)
    ));

    assert!(matches!(
      ImageSource::from_path("scan"),
      ImageSource::Raster(_)
    ));
  }

  #[test]
  fn raster_is_loaded_as_stretched_bgr() {
    let dir = TempDir::new("test").unwrap();

    let path = dir.path().join("xray.png");

    let mut image = RgbImage::from_pixel(4, 3, Rgb([50, 50, 50]));
    image.put_pixel(1, 2, Rgb([150, 100, 50]));
    image.save(&path).unwrap();

    let loaded = ImageLoader::load(&path).unwrap();

    assert_eq!(loaded.bgr.dim(), (3, 4, 3));
    assert_eq!(loaded.bgr.slice(s![2, 1, ..]).to_vec(), vec![0, 128, 255]);
    assert_eq!(loaded.bgr.slice(s![0, 0, ..]).to_vec(), vec![0, 0, 0]);
    assert_eq!(loaded.display.dimensions(), (4, 3));
    assert_eq!(loaded.display.get_pixel(1, 2), &Rgb([255, 128, 0]));
  }

  #[test]
  fn dicom_is_stretched_and_replicated() {
    let dir = TempDir::new("test").unwrap();

    let path = dir.path().join("chest.dcm");

    write_dicom(&path, (2, 3), 1, &[100, 200, 300, 400, 500, 1100]);

    let loaded = ImageLoader::load(&path).unwrap();

    assert!(matches!(loaded.source, ImageSource::Dicom(_)));
    assert_eq!(loaded.bgr.dim(), (2, 3, 3));

    let expected = array![[0u8, 26, 51], [77, 102, 255]];

    for channel in 0..3 {
      assert_eq!(loaded.bgr.index_axis(Axis(2), channel), expected);
    }

    assert_eq!(loaded.display.get_pixel(2, 1), &Rgb([255, 255, 255]));
  }

  #[test]
  fn multi_frame_dicom_is_rejected() {
    let dir = TempDir::new("test").unwrap();

    let path = dir.path().join("series.dcm");

    write_dicom(&path, (2, 2), 2, &[1, 2, 3, 4, 5, 6, 7, 8]);

    assert!(matches!(ImageLoader::load(&path), Err(Error::Dicom(_))));
  }

  #[test]
  fn missing_file_is_an_io_error() {
    let dir = TempDir::new("test").unwrap();

    assert!(matches!(
      ImageLoader::load(dir.path().join("missing.png")),
      Err(Error::Io(_))
    ));
  }

  #[test]
  fn corrupt_dicom_is_reported() {
    let dir = TempDir::new("test").unwrap();

    let path = dir.path().join("broken.dcm");

    fs::write(&path, b"definitely not DICOM").unwrap();

    assert!(matches!(ImageLoader::load(&path), Err(Error::Dicom(_))));
  }

  #[test]
  fn corrupt_raster_is_reported() {
    let dir = TempDir::new("test").unwrap();

    let path = dir.path().join("broken.png");

    fs::write(&path, b"definitely not PNG").unwrap();

    assert!(matches!(ImageLoader::load(&path), Err(Error::Image(_))));
  }
}
