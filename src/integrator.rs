use super::*;

/// Session orchestrator: owns the predictor and at most one current image.
pub(crate) struct Integrator<C> {
  predictor: Predictor<C>,
  current: Option<LoadedImage>,
}

impl<C: Classifier> Integrator<C> {
  pub(crate) fn new(classifier: C) -> Self {
    Self {
      predictor: Predictor::new(classifier),
      current: None,
    }
  }

  /// Loads an image and makes it current, replacing any previous one. On
  /// failure the previous image stays current.
  pub(crate) fn load_and_prepare_image(
    &mut self,
    path: impl Into<PathBuf>,
  ) -> Result<&LoadedImage, Error> {
    let image = ImageLoader::load(path)?;
    Ok(self.current.insert(image))
  }

  pub(crate) fn analyze_image(&self) -> Result<Diagnosis, Error> {
    let image = self.current.as_ref().ok_or(Error::NoImageLoaded)?;
    self.predictor.predict(image.bgr.view())
  }

  pub(crate) fn current(&self) -> Option<&LoadedImage> {
    self.current.as_ref()
  }

  pub(crate) fn reset(&mut self) {
    self.current = None;
  }
}

#[cfg(test)]
mod tests {
  use {
    super::*, crate::classifier::tests::StubClassifier, tempdir::TempDir,
  };

  fn write_image(dir: &TempDir, name: &str, value: u8) -> PathBuf {
    let path = dir.path().join(name);

    let mut image = RgbImage::from_pixel(32, 24, Rgb([value, value, value]));
    image.put_pixel(0, 0, Rgb([0, 0, 0]));
    image.save(&path).unwrap();

    path
  }

  #[test]
  fn analyze_before_load_fails() {
    let integrator = Integrator::new(StubClassifier::normal());

    assert!(matches!(
      integrator.analyze_image(),
      Err(Error::NoImageLoaded)
    ));
  }

  #[test]
  fn load_then_analyze() {
    let dir = TempDir::new("test").unwrap();

    let mut integrator = Integrator::new(StubClassifier::normal());

    let loaded = integrator
      .load_and_prepare_image(write_image(&dir, "a.png", 200))
      .unwrap();

    assert_eq!(loaded.bgr.dim(), (24, 32, 3));

    let diagnosis = integrator.analyze_image().unwrap();

    assert_eq!(diagnosis.label, Label::Normal);
    assert_eq!(diagnosis.heatmap.dim(), (512, 512, 3));
  }

  #[test]
  fn loading_replaces_current_image() {
    let dir = TempDir::new("test").unwrap();

    let mut integrator = Integrator::new(StubClassifier::normal());

    let first = write_image(&dir, "first.png", 200);
    let second = write_image(&dir, "second.png", 100);

    integrator.load_and_prepare_image(&first).unwrap();
    integrator.load_and_prepare_image(&second).unwrap();

    assert_eq!(integrator.current().unwrap().source.path(), second.as_path());
  }

  #[test]
  fn failed_load_keeps_current_image() {
    let dir = TempDir::new("test").unwrap();

    let mut integrator = Integrator::new(StubClassifier::normal());

    let path = write_image(&dir, "a.png", 200);

    integrator.load_and_prepare_image(&path).unwrap();

    assert!(integrator
      .load_and_prepare_image(dir.path().join("missing.png"))
      .is_err());

    assert_eq!(integrator.current().unwrap().source.path(), path.as_path());
    assert!(integrator.analyze_image().is_ok());
  }

  #[test]
  fn reset_is_idempotent() {
    let dir = TempDir::new("test").unwrap();

    let mut integrator = Integrator::new(StubClassifier::normal());

    integrator
      .load_and_prepare_image(write_image(&dir, "a.png", 200))
      .unwrap();

    integrator.reset();
    integrator.reset();

    assert!(integrator.current().is_none());
    assert!(matches!(
      integrator.analyze_image(),
      Err(Error::NoImageLoaded)
    ));
  }
}
