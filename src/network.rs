use super::*;

/// Intermediate value flowing between layers: a spatial feature map laid out
/// as (height, width, channels), or a flat vector.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Feature {
  Map(Array3<f64>),
  Vector(Array1<f64>),
}

impl Feature {
  fn map(&self, layer: &str) -> Result<&Array3<f64>, Error> {
    match self {
      Self::Map(map) => Ok(map),
      Self::Vector(_) => Err(Error::model_invalid(format!(
        "layer `{layer}` expects a feature map"
      ))),
    }
  }

  fn vector(&self, layer: &str) -> Result<&Array1<f64>, Error> {
    match self {
      Self::Vector(vector) => Ok(vector),
      Self::Map(_) => Err(Error::model_invalid(format!(
        "layer `{layer}` expects a vector"
      ))),
    }
  }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Shape {
  Map(usize, usize, usize),
  Vector(usize),
}

/// Every intermediate output of one forward pass; `features[0]` is the input
/// and `features[i + 1]` the output of layer `i`.
pub(crate) struct Trace<'a> {
  network: &'a Network,
  features: Vec<Feature>,
}

impl Trace<'_> {
  pub(crate) fn scores(&self) -> Result<&Array1<f64>, Error> {
    self
      .features
      .last()
      .ok_or_else(|| Error::model_invalid("model has no layers"))?
      .vector("output")
  }

  pub(crate) fn output(&self, layer: usize) -> Result<&Array3<f64>, Error> {
    let name = self.network.layer_name(layer)?;
    self.features[layer + 1].map(name)
  }

  /// Gradient of the score of `class` with respect to the output of
  /// `layer`, propagated back through the layers recorded after it.
  pub(crate) fn gradient(
    &self,
    layer: usize,
    class: usize,
  ) -> Result<Array3<f64>, Error> {
    let scores = self.scores()?;

    if class >= scores.len() {
      return Err(Error::invalid_argument(format!(
        "class index {class} out of range for {} classes",
        scores.len()
      )));
    }

    let mut grad = Array1::zeros(scores.len());
    grad[class] = 1.0;

    let mut grad = Feature::Vector(grad);

    let layers = &self.network.config.layers;

    for index in (layer + 1..layers.len()).rev() {
      grad = backward(
        &layers[index],
        &self.features[index],
        &self.features[index + 1],
        grad,
      )?;
    }

    match grad {
      Feature::Map(map) => Ok(map),
      Feature::Vector(_) => Err(Error::Configuration(format!(
        "layer `{}` does not produce a feature map",
        self.network.layer_name(layer)?
      ))),
    }
  }
}

#[derive(Clone, Debug)]
pub(crate) struct Network {
  config: NetworkConfig,
}

impl Network {
  /// Checks that every layer's weights agree with the shape flowing into it
  /// and that the network produces one score per class.
  pub(crate) fn new(config: NetworkConfig) -> Result<Self, Error> {
    if config.layers.is_empty() {
      return Err(Error::model_invalid("model has no layers"));
    }

    if config.input_shape != INPUT_SHAPE {
      return Err(Error::model_invalid(format!(
        "unusable input shape {:?}, expected {:?}",
        config.input_shape, INPUT_SHAPE
      )));
    }

    let mut names = HashSet::new();

    for layer in &config.layers {
      if !names.insert(layer.name()) {
        return Err(Error::model_invalid(format!(
          "duplicate layer name `{}`",
          layer.name()
        )));
      }
    }

    let (h, w, c) = config.input_shape;

    let output = config
      .layers
      .iter()
      .try_fold(Shape::Map(h, w, c), |shape, layer| output_shape(layer, shape))?;

    if output != Shape::Vector(CLASS_COUNT) {
      return Err(Error::model_invalid(format!(
        "model output {output:?} is not {CLASS_COUNT} class scores"
      )));
    }

    Ok(Self { config })
  }

  pub(crate) fn layer_index(&self, name: &str) -> Option<usize> {
    self
      .config
      .layers
      .iter()
      .position(|layer| layer.name() == name)
  }

  pub(crate) fn layer(&self, index: usize) -> Option<&Layer> {
    self.config.layers.get(index)
  }

  fn layer_name(&self, index: usize) -> Result<&str, Error> {
    self
      .layer(index)
      .map(Layer::name)
      .ok_or_else(|| Error::invalid_argument(format!("no layer {index}")))
  }

  pub(crate) fn forward(
    &self,
    input: ArrayView3<f64>,
  ) -> Result<Array1<f64>, Error> {
    Ok(self.trace(input)?.scores()?.clone())
  }

  pub(crate) fn trace(
    &self,
    input: ArrayView3<f64>,
  ) -> Result<Trace<'_>, Error> {
    if input.dim() != self.config.input_shape {
      return Err(Error::invalid_argument(format!(
        "input shape {:?} does not match model input {:?}",
        input.dim(),
        self.config.input_shape
      )));
    }

    let mut features = Vec::with_capacity(self.config.layers.len() + 1);

    features.push(Feature::Map(input.to_owned()));

    for layer in &self.config.layers {
      let output = forward(layer, &features[features.len() - 1])?;
      features.push(output);
    }

    Ok(Trace {
      network: self,
      features,
    })
  }

  /// Runs the model once on an all-zero input and checks the scores.
  pub(crate) fn smoke_test(&self) -> Result<(), Error> {
    let scores = self.forward(Array3::zeros(self.config.input_shape).view())?;

    if scores.len() != CLASS_COUNT || scores.iter().any(|s| !s.is_finite()) {
      return Err(Error::model_invalid(format!(
        "smoke test produced unusable scores {scores}"
      )));
    }

    Ok(())
  }

  pub(crate) fn save(&self, path: &Path) -> Result<(), Error> {
    let serializable_config: SerializableModelConfig =
      self.config.clone().into();

    let file = File::create(path)?;

    serde_json::to_writer(BufWriter::new(file), &serializable_config)
      .map_err(|error| Error::Io(error.into()))?;

    Ok(())
  }

  pub(crate) fn load(path: &Path) -> Result<Self, Error> {
    if !path.is_file() {
      return Err(Error::ModelNotFound(path.to_path_buf()));
    }

    let file = File::open(path)?;

    let serializable_config: SerializableModelConfig =
      serde_json::from_reader(BufReader::new(file)).map_err(|error| {
        Error::model_invalid(format!("failed to parse model: {error}"))
      })?;

    let network = Self::new(NetworkConfig::try_from(serializable_config)?)?;

    network.smoke_test()?;

    info!(
      path = %path.display(),
      layers = network.config.layers.len(),
      "loaded model"
    );

    Ok(network)
  }
}

fn output_shape(layer: &Layer, input: Shape) -> Result<Shape, Error> {
  let invalid = |message: String| {
    Error::model_invalid(format!("layer `{}`: {message}", layer.name()))
  };

  match (layer, input) {
    (
      Layer::Conv2d {
        weights,
        bias,
        stride,
        activation,
        ..
      },
      Shape::Map(h, w, c),
    ) => {
      let (filters, channels, kh, kw) = weights.dim();

      if channels != c {
        return Err(invalid(format!("expects {channels} channels, got {c}")));
      }

      if kh != kw || kh % 2 == 0 {
        return Err(invalid(format!("kernel {kh}x{kw} is not odd and square")));
      }

      if *stride == 0 {
        return Err(invalid("stride must be positive".into()));
      }

      if bias.len() != filters {
        return Err(invalid(format!("bias length {} != {filters}", bias.len())));
      }

      if *activation == Activation::Softmax {
        return Err(invalid("softmax is not supported on feature maps".into()));
      }

      Ok(Shape::Map(
        (h - 1) / stride + 1,
        (w - 1) / stride + 1,
        filters,
      ))
    }
    (Layer::MaxPool2d { size, .. }, Shape::Map(h, w, c)) => {
      if *size == 0 || *size > h || *size > w {
        return Err(invalid(format!("pool size {size} does not fit {h}x{w}")));
      }

      Ok(Shape::Map(h / size, w / size, c))
    }
    (Layer::GlobalAveragePool { .. }, Shape::Map(_, _, c)) => {
      Ok(Shape::Vector(c))
    }
    (Layer::Flatten { .. }, Shape::Map(h, w, c)) => Ok(Shape::Vector(h * w * c)),
    (Layer::Dense { weights, bias, .. }, Shape::Vector(n)) => {
      let (outputs, inputs) = weights.dim();

      if inputs != n {
        return Err(invalid(format!("expects {inputs} inputs, got {n}")));
      }

      if bias.len() != outputs {
        return Err(invalid(format!("bias length {} != {outputs}", bias.len())));
      }

      Ok(Shape::Vector(outputs))
    }
    (_, shape) => Err(invalid(format!("cannot accept input {shape:?}"))),
  }
}

fn activate(activation: Activation, x: f64) -> f64 {
  match activation {
    Activation::Relu => relu(x),
    Activation::Linear | Activation::Softmax => x,
  }
}

fn forward(layer: &Layer, input: &Feature) -> Result<Feature, Error> {
  let name = layer.name();

  Ok(match layer {
    Layer::Conv2d {
      weights,
      bias,
      stride,
      activation,
      ..
    } => {
      let mut output = convolve(input.map(name)?.view(), weights, bias, *stride);
      output.mapv_inplace(|x| activate(*activation, x));
      Feature::Map(output)
    }
    Layer::MaxPool2d { size, .. } => {
      let input = input.map(name)?;
      let (h, w, c) = input.dim();

      Feature::Map(Array3::from_shape_fn(
        (h / size, w / size, c),
        |(y, x, channel)| {
          input
            .slice(s![y * size..(y + 1) * size, x * size..(x + 1) * size, channel])
            .fold(f64::NEG_INFINITY, |a, &b| a.max(b))
        },
      ))
    }
    Layer::GlobalAveragePool { .. } => {
      let input = input.map(name)?;
      let (h, w, _) = input.dim();

      Feature::Vector(
        input
          .sum_axis(Axis(0))
          .sum_axis(Axis(0))
          .mapv(|x| x / (h * w) as f64),
      )
    }
    Layer::Flatten { .. } => {
      Feature::Vector(input.map(name)?.iter().copied().collect())
    }
    Layer::Dense {
      weights,
      bias,
      activation,
      ..
    } => {
      let z = weights.dot(input.vector(name)?) + bias;

      Feature::Vector(match activation {
        Activation::Softmax => softmax(z.view()),
        activation => z.mapv(|x| activate(*activation, x)),
      })
    }
  })
}

fn backward(
  layer: &Layer,
  input: &Feature,
  output: &Feature,
  grad: Feature,
) -> Result<Feature, Error> {
  let name = layer.name();

  Ok(match layer {
    Layer::Conv2d {
      weights,
      stride,
      activation,
      ..
    } => {
      let input = input.map(name)?;

      let mut delta = grad.map(name)?.clone();

      if *activation == Activation::Relu {
        delta.zip_mut_with(output.map(name)?, |d, &y| *d *= relu_derivative(y));
      }

      Feature::Map(convolve_transpose(delta.view(), weights, *stride, input.dim()))
    }
    Layer::MaxPool2d { size, .. } => {
      let input = input.map(name)?;
      let output = output.map(name)?;
      let grad = grad.map(name)?;

      let mut result = Array3::zeros(input.dim());

      for ((y, x, channel), &max) in output.indexed_iter() {
        let window = input.slice(s![
          y * size..(y + 1) * size,
          x * size..(x + 1) * size,
          channel
        ]);

        if let Some(((dy, dx), _)) =
          window.indexed_iter().find(|(_, value)| **value == max)
        {
          result[[y * size + dy, x * size + dx, channel]] += grad[[y, x, channel]];
        }
      }

      Feature::Map(result)
    }
    Layer::GlobalAveragePool { .. } => {
      let (h, w, c) = input.map(name)?.dim();
      let grad = grad.vector(name)?;
      let area = (h * w) as f64;

      Feature::Map(Array3::from_shape_fn((h, w, c), |(_, _, channel)| {
        grad[channel] / area
      }))
    }
    Layer::Flatten { .. } => {
      let dim = input.map(name)?.dim();

      Feature::Map(
        Array3::from_shape_vec(dim, grad.vector(name)?.to_vec()).map_err(
          |error| Error::model_invalid(format!("layer `{name}`: {error}")),
        )?,
      )
    }
    Layer::Dense {
      weights,
      activation,
      ..
    } => {
      let output = output.vector(name)?;
      let grad = grad.vector(name)?;

      let delta = match activation {
        Activation::Softmax => softmax_backward(output.view(), grad.view()),
        Activation::Relu => grad * &output.mapv(relu_derivative),
        Activation::Linear => grad.clone(),
      };

      Feature::Vector(weights.t().dot(&delta))
    }
  })
}

fn padding(kernel: usize) -> isize {
  (kernel / 2) as isize
}

/// "Same"-padded strided convolution, one output plane per filter computed
/// in parallel.
fn convolve(
  input: ArrayView3<f64>,
  weights: &Array4<f64>,
  bias: &Array1<f64>,
  stride: usize,
) -> Array3<f64> {
  let (h, w, _) = input.dim();
  let (filters, channels, kernel, _) = weights.dim();
  let (oh, ow) = ((h - 1) / stride + 1, (w - 1) / stride + 1);
  let pad = padding(kernel);

  let planes = (0..filters)
    .into_par_iter()
    .map(|filter| {
      let mut plane = Array2::from_elem((oh, ow), bias[filter]);

      for channel in 0..channels {
        let x = input.index_axis(Axis(2), channel);

        for ky in 0..kernel {
          for kx in 0..kernel {
            let weight = weights[[filter, channel, ky, kx]];

            if weight == 0.0 {
              continue;
            }

            for oy in 0..oh {
              let iy = (oy * stride + ky) as isize - pad;

              if iy < 0 || iy >= h as isize {
                continue;
              }

              for ox in 0..ow {
                let ix = (ox * stride + kx) as isize - pad;

                if ix < 0 || ix >= w as isize {
                  continue;
                }

                plane[[oy, ox]] += weight * x[[iy as usize, ix as usize]];
              }
            }
          }
        }
      }

      plane
    })
    .collect::<Vec<_>>();

  stack_planes(planes, (oh, ow))
}

/// Gradient of a convolution with respect to its input, one input channel
/// per task.
fn convolve_transpose(
  delta: ArrayView3<f64>,
  weights: &Array4<f64>,
  stride: usize,
  input_dim: (usize, usize, usize),
) -> Array3<f64> {
  let (h, w, channels) = input_dim;
  let (oh, ow, filters) = delta.dim();
  let kernel = weights.dim().2;
  let pad = padding(kernel);

  let planes = (0..channels)
    .into_par_iter()
    .map(|channel| {
      let mut plane = Array2::zeros((h, w));

      for filter in 0..filters {
        let d = delta.index_axis(Axis(2), filter);

        for ky in 0..kernel {
          for kx in 0..kernel {
            let weight = weights[[filter, channel, ky, kx]];

            if weight == 0.0 {
              continue;
            }

            for oy in 0..oh {
              let iy = (oy * stride + ky) as isize - pad;

              if iy < 0 || iy >= h as isize {
                continue;
              }

              for ox in 0..ow {
                let ix = (ox * stride + kx) as isize - pad;

                if ix < 0 || ix >= w as isize {
                  continue;
                }

                plane[[iy as usize, ix as usize]] += weight * d[[oy, ox]];
              }
            }
          }
        }
      }

      plane
    })
    .collect::<Vec<_>>();

  stack_planes(planes, (h, w))
}

fn stack_planes(planes: Vec<Array2<f64>>, (h, w): (usize, usize)) -> Array3<f64> {
  let mut output = Array3::zeros((h, w, planes.len()));

  for (channel, plane) in planes.iter().enumerate() {
    output.index_axis_mut(Axis(2), channel).assign(plane);
  }

  output
}
