use super::*;

/// Weight of the colorized heatmap when added onto the original image.
pub(crate) const TRANSPARENCY: f64 = 0.8;

/// Gradient-weighted class activation mapping over a classifier's target
/// layer.
pub(crate) struct SaliencyGenerator<'a, C: ?Sized> {
  classifier: &'a C,
}

impl<'a, C: Classifier + ?Sized> SaliencyGenerator<'a, C> {
  pub(crate) fn new(classifier: &'a C) -> Self {
    Self { classifier }
  }

  /// Overlays the class saliency of `input` onto `original` (BGR, any size),
  /// returning a 512x512 RGB image.
  pub(crate) fn generate<I>(
    &self,
    original: ArrayView3<u8>,
    class: I,
    input: ArrayView4<f64>,
  ) -> Result<Array3<u8>, Error>
  where
    I: TryInto<usize> + Copy + Debug,
  {
    let class = self.validate(class, &input)?;

    let (h, w, channels) = original.dim();

    if h == 0 || w == 0 || channels != 3 {
      return Err(Error::invalid_argument(format!(
        "original image must be a non-empty 3-channel image, got shape {:?}",
        original.dim()
      )));
    }

    let saliency = self.compute(class, input)?;

    let overlay = compose(colorize(saliency.view()).view(), original);

    Ok(swap_channels(overlay.view()))
  }

  /// Saliency map at the target layer's resolution, values in [0, 1].
  pub(crate) fn saliency_map<I>(
    &self,
    class: I,
    input: ArrayView4<f64>,
  ) -> Result<Array2<f64>, Error>
  where
    I: TryInto<usize> + Copy + Debug,
  {
    let class = self.validate(class, &input)?;
    self.compute(class, input)
  }

  fn validate<I>(&self, class: I, input: &ArrayView4<f64>) -> Result<usize, Error>
  where
    I: TryInto<usize> + Copy + Debug,
  {
    let index: usize = class.try_into().map_err(|_| {
      Error::invalid_argument(format!(
        "class index {class:?} is not a non-negative integer"
      ))
    })?;

    if index >= self.classifier.class_count() {
      return Err(Error::invalid_argument(format!(
        "class index {index} out of range for {} classes",
        self.classifier.class_count()
      )));
    }

    validate_input(input)?;

    Ok(index)
  }

  fn compute(
    &self,
    class: usize,
    input: ArrayView4<f64>,
  ) -> Result<Array2<f64>, Error> {
    let ClassActivations {
      activations,
      gradients,
      ..
    } = self.classifier.activations(input, class)?;

    if activations.dim() != gradients.dim() || activations.dim().0 != 1 {
      return Err(Error::invalid_argument(format!(
        "activations {:?} and gradients {:?} must share a single-batch shape",
        activations.dim(),
        gradients.dim()
      )));
    }

    let activations = activations.index_axis(Axis(0), 0);

    let weights = channel_importance(gradients.index_axis(Axis(0), 0))?;

    let saliency = normalize(weighted_sum(activations, weights.view()));

    debug!(
      class,
      channels = weights.len(),
      height = saliency.nrows(),
      width = saliency.ncols(),
      "computed saliency map"
    );

    Ok(saliency)
  }
}

/// Spatial mean of the gradient per channel.
pub(crate) fn channel_importance(
  gradients: ArrayView3<f64>,
) -> Result<Array1<f64>, Error> {
  gradients
    .mean_axis(Axis(0))
    .and_then(|rows| rows.mean_axis(Axis(0)))
    .ok_or_else(|| Error::invalid_argument("gradient has no spatial extent"))
}

/// Channel-weighted sum of the activations at every spatial position.
pub(crate) fn weighted_sum(
  activations: ArrayView3<f64>,
  weights: ArrayView1<f64>,
) -> Array2<f64> {
  activations.map_axis(Axis(2), |channels| channels.dot(&weights))
}

/// Clamps negative evidence to zero and scales the maximum to one. A surface
/// without positive values stays all zero.
pub(crate) fn normalize(surface: Array2<f64>) -> Array2<f64> {
  let rectified = surface.mapv(relu);

  let max = rectified.fold(0.0, |a: f64, &b| a.max(b));

  if max > 0.0 {
    rectified / max
  } else {
    rectified
  }
}

/// Upsamples a saliency map to the model input size and maps it through the
/// jet colormap. An all-zero map yields a black heatmap so the composition
/// leaves the original untouched.
pub(crate) fn colorize(saliency: ArrayView2<f64>) -> Array3<u8> {
  let mut heatmap = Array3::zeros((INPUT_SIZE, INPUT_SIZE, 3));

  if saliency.iter().all(|&value| value <= 0.0) {
    return heatmap;
  }

  let resized = resize_plane(saliency, (INPUT_SIZE, INPUT_SIZE));

  for ((y, x), &value) in resized.indexed_iter() {
    let color = jet((255.0 * value).clamp(0.0, 255.0) as u8);

    heatmap
      .slice_mut(s![y, x, ..])
      .assign(&ArrayView1::from(&color));
  }

  heatmap
}

/// Adds the heatmap, scaled by the transparency factor, onto the original
/// resized to the heatmap's size. Sums saturate at 255.
pub(crate) fn compose(
  heatmap: ArrayView3<u8>,
  original: ArrayView3<u8>,
) -> Array3<u8> {
  let (h, w, _) = heatmap.dim();

  let mut output = resize_image(original, (h, w));

  output.zip_mut_with(&heatmap, |base, &heat| {
    *base = base.saturating_add((f64::from(heat) * TRANSPARENCY) as u8);
  });

  output
}
