use super::*;

/// Target-layer activations, class scores and the gradient of one class
/// score, all taken from a single forward pass. Tensors are shaped
/// (1, height, width, channels).
#[derive(Clone, Debug)]
pub(crate) struct ClassActivations {
  pub(crate) activations: Array4<f64>,
  pub(crate) gradients: Array4<f64>,
  pub(crate) scores: Array1<f64>,
}

pub(crate) trait Classifier {
  fn class_count(&self) -> usize;

  fn forward(&self, input: ArrayView4<f64>) -> Result<Array1<f64>, Error>;

  fn activations(
    &self,
    input: ArrayView4<f64>,
    class: usize,
  ) -> Result<ClassActivations, Error>;
}

/// Checks that `input` is exactly one preprocessed image.
pub(crate) fn validate_input(input: &ArrayView4<f64>) -> Result<(), Error> {
  let expected = (1, INPUT_SIZE, INPUT_SIZE, 1);

  if input.dim() != expected {
    return Err(Error::invalid_argument(format!(
      "model input must have shape {expected:?}, got {:?}",
      input.dim()
    )));
  }

  Ok(())
}

/// Classifier backed by a loaded network with a resolved saliency target
/// layer.
#[derive(Debug)]
pub(crate) struct ModelClassifier {
  network: Network,
  target: usize,
}

impl ModelClassifier {
  pub(crate) fn new(network: Network, target_layer: &str) -> Result<Self, Error> {
    let target = network.layer_index(target_layer).ok_or_else(|| {
      Error::Configuration(format!("model has no layer named `{target_layer}`"))
    })?;

    if !network.layer(target).is_some_and(Layer::is_convolution) {
      return Err(Error::Configuration(format!(
        "layer `{target_layer}` is not a convolutional layer"
      )));
    }

    Ok(Self { network, target })
  }

  pub(crate) fn load(path: &Path, target_layer: &str) -> Result<Self, Error> {
    Self::new(Network::load(path)?, target_layer)
  }
}

impl Classifier for ModelClassifier {
  fn class_count(&self) -> usize {
    CLASS_COUNT
  }

  fn forward(&self, input: ArrayView4<f64>) -> Result<Array1<f64>, Error> {
    validate_input(&input)?;
    self.network.forward(input.index_axis(Axis(0), 0))
  }

  fn activations(
    &self,
    input: ArrayView4<f64>,
    class: usize,
  ) -> Result<ClassActivations, Error> {
    validate_input(&input)?;

    let trace = self.network.trace(input.index_axis(Axis(0), 0))?;

    Ok(ClassActivations {
      activations: trace.output(self.target)?.clone().insert_axis(Axis(0)),
      gradients: trace.gradient(self.target, class)?.insert_axis(Axis(0)),
      scores: trace.scores()?.clone(),
    })
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use {
    super::*,
    crate::network::tests::{random_input, small_config, small_network},
  };

  /// Classifier returning fixed scores, activations and gradients
  /// regardless of its input.
  pub(crate) struct StubClassifier {
    pub(crate) scores: Array1<f64>,
    pub(crate) activations: Array4<f64>,
    pub(crate) gradients: Array4<f64>,
  }

  impl StubClassifier {
    pub(crate) fn new(
      scores: Array1<f64>,
      activations: Array3<f64>,
      gradients: Array3<f64>,
    ) -> Self {
      Self {
        scores,
        activations: activations.insert_axis(Axis(0)),
        gradients: gradients.insert_axis(Axis(0)),
      }
    }

    /// Predicts "normal" with positive evidence in the top-left corner.
    pub(crate) fn normal() -> Self {
      let mut activations = Array3::zeros((4, 4, 2));
      activations[[0, 0, 0]] = 2.0;
      activations[[1, 1, 1]] = 1.0;

      Self::new(
        ndarray::array![0.1, 0.8, 0.1],
        activations,
        Array3::from_elem((4, 4, 2), 0.5),
      )
    }
  }

  impl Classifier for StubClassifier {
    fn class_count(&self) -> usize {
      self.scores.len()
    }

    fn forward(&self, input: ArrayView4<f64>) -> Result<Array1<f64>, Error> {
      validate_input(&input)?;
      Ok(self.scores.clone())
    }

    fn activations(
      &self,
      input: ArrayView4<f64>,
      class: usize,
    ) -> Result<ClassActivations, Error> {
      validate_input(&input)?;

      if class >= self.class_count() {
        return Err(Error::invalid_argument("class out of range"));
      }

      Ok(ClassActivations {
        activations: self.activations.clone(),
        gradients: self.gradients.clone(),
        scores: self.scores.clone(),
      })
    }
  }

  #[test]
  fn missing_target_layer_fails_at_construction() {
    assert!(matches!(
      ModelClassifier::new(small_network(), "missing"),
      Err(Error::Configuration(_))
    ));
  }

  #[test]
  fn non_convolutional_target_layer_is_rejected() {
    assert!(matches!(
      ModelClassifier::new(small_network(), "gap"),
      Err(Error::Configuration(_))
    ));
  }

  #[test]
  fn missing_target_layer_in_artifact_fails_on_load() {
    let dir = tempdir::TempDir::new("test").unwrap();

    let path = dir.path().join("model.json");

    let mut config = small_config();

    if let Layer::Conv2d { name, .. } = &mut config.layers[2] {
      *name = "conv_last".into();
    }

    Network::new(config).unwrap().save(&path).unwrap();

    assert!(matches!(
      ModelClassifier::load(&path, TARGET_LAYER),
      Err(Error::Configuration(_))
    ));
  }

  #[test]
  fn activations_and_scores_come_from_one_pass() {
    let classifier = ModelClassifier::new(small_network(), TARGET_LAYER).unwrap();

    let input = random_input().insert_axis(Axis(0));

    let result = classifier.activations(input.view(), 2).unwrap();

    assert_eq!(result.activations.dim(), (1, 16, 16, 3));
    assert_eq!(result.gradients.dim(), result.activations.dim());
    assert_eq!(result.scores, classifier.forward(input.view()).unwrap());
  }

  #[test]
  fn rejects_malformed_input() {
    let classifier = ModelClassifier::new(small_network(), TARGET_LAYER).unwrap();

    let input = Array4::zeros((1, 512, 512, 3));

    assert!(matches!(
      classifier.forward(input.view()),
      Err(Error::InvalidArgument(_))
    ));

    assert!(matches!(
      classifier.activations(input.view(), 0),
      Err(Error::InvalidArgument(_))
    ));
  }

  #[test]
  fn rejects_out_of_range_class() {
    let classifier = ModelClassifier::new(small_network(), TARGET_LAYER).unwrap();

    let input = random_input().insert_axis(Axis(0));

    assert!(matches!(
      classifier.activations(input.view(), 3),
      Err(Error::InvalidArgument(_))
    ));
  }
}
