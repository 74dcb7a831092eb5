use super::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Label {
  Bacterial,
  Normal,
  Viral,
  Unknown,
}

impl Label {
  pub(crate) fn from_index(index: usize) -> Self {
    match index {
      0 => Self::Bacterial,
      1 => Self::Normal,
      2 => Self::Viral,
      _ => Self::Unknown,
    }
  }

  /// Name used in result records and history logs.
  pub(crate) fn as_str(self) -> &'static str {
    match self {
      Self::Bacterial => "bacteriana",
      Self::Normal => "normal",
      Self::Viral => "viral",
      Self::Unknown => "desconocida",
    }
  }
}

impl Display for Label {
  fn fmt(&self, f: &mut Formatter) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl Serialize for Label {
  fn serialize<S: serde::Serializer>(
    &self,
    serializer: S,
  ) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(self.as_str())
  }
}

/// Outcome of analyzing one image.
#[derive(Clone, Debug)]
pub(crate) struct Diagnosis {
  pub(crate) label: Label,
  /// Percentage in [0, 100].
  pub(crate) probability: f64,
  /// 512x512 RGB overlay.
  pub(crate) heatmap: Array3<u8>,
}

pub(crate) struct Predictor<C> {
  classifier: C,
}

impl<C: Classifier> Predictor<C> {
  pub(crate) fn new(classifier: C) -> Self {
    Self { classifier }
  }

  pub(crate) fn predict(&self, image: ArrayView3<u8>) -> Result<Diagnosis, Error> {
    if image.is_empty() {
      return Err(Error::invalid_argument("image is empty"));
    }

    let input = preprocess(image)?;

    let scores = self.classifier.forward(input.view())?;

    let class = argmax(&scores.view())
      .ok_or_else(|| Error::invalid_argument("classifier produced no scores"))?;

    let probability = 100.0 * scores[class];

    let label = Label::from_index(class);

    let heatmap = SaliencyGenerator::new(&self.classifier).generate(
      image,
      class,
      input.view(),
    )?;

    info!(%label, probability, "analyzed image");

    Ok(Diagnosis {
      label,
      probability,
      heatmap,
    })
  }
}

#[cfg(test)]
mod tests {
  use {
    super::*,
    crate::classifier::tests::StubClassifier,
    approx::assert_relative_eq,
    ndarray::array,
  };

  #[test]
  fn predicts_normal_from_stub_scores() {
    let predictor = Predictor::new(StubClassifier::normal());

    let diagnosis = predictor
      .predict(Array3::zeros((100, 100, 3)).view())
      .unwrap();

    assert_eq!(diagnosis.label, Label::Normal);
    assert_eq!(diagnosis.label.to_string(), "normal");
    assert_relative_eq!(diagnosis.probability, 80.0, epsilon = 1e-9);
    assert_eq!(diagnosis.heatmap.dim(), (512, 512, 3));
  }

  #[test]
  fn label_and_probability_share_the_winning_score() {
    let predictor = Predictor::new(StubClassifier::new(
      array![0.7, 0.2, 0.1],
      Array3::ones((2, 2, 1)),
      Array3::ones((2, 2, 1)),
    ));

    let diagnosis = predictor
      .predict(Array3::from_elem((30, 40, 3), 90).view())
      .unwrap();

    assert_eq!(diagnosis.label, Label::Bacterial);
    assert_relative_eq!(diagnosis.probability, 70.0, epsilon = 1e-9);
  }

  #[test]
  fn out_of_range_index_maps_to_unknown() {
    assert_eq!(Label::from_index(0).as_str(), "bacteriana");
    assert_eq!(Label::from_index(2).as_str(), "viral");
    assert_eq!(Label::from_index(7), Label::Unknown);
    assert_eq!(Label::Unknown.to_string(), "desconocida");
  }

  #[test]
  fn rejects_empty_image() {
    let predictor = Predictor::new(StubClassifier::normal());

    assert!(matches!(
      predictor.predict(Array3::zeros((0, 0, 3)).view()),
      Err(Error::InvalidArgument(_))
    ));
  }
}
