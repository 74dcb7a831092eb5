use super::*;

pub(crate) const INPUT_SIZE: usize = 512;

pub(crate) const INPUT_SHAPE: (usize, usize, usize) = (INPUT_SIZE, INPUT_SIZE, 1);

pub(crate) const CLASS_COUNT: usize = 3;

pub(crate) const TARGET_LAYER: &str = "conv10_thisone";

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum Activation {
  Linear,
  Relu,
  Softmax,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct SerializableModelConfig {
  pub(crate) input_shape: Option<(usize, usize, usize)>,
  pub(crate) layers: Vec<SerializableLayer>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub(crate) enum SerializableLayer {
  Conv2d {
    name: String,
    weights: Vec<f64>,
    weights_shape: (usize, usize, usize, usize),
    bias: Vec<f64>,
    stride: usize,
    activation: Activation,
  },
  MaxPool2d {
    name: String,
    size: usize,
  },
  GlobalAveragePool {
    name: String,
  },
  Flatten {
    name: String,
  },
  Dense {
    name: String,
    weights: Vec<f64>,
    weights_shape: (usize, usize),
    bias: Vec<f64>,
    activation: Activation,
  },
}

/// In-memory layer. Convolution weights are laid out as
/// (filters, input channels, kernel height, kernel width), dense weights as
/// (outputs, inputs).
#[derive(Clone, Debug)]
pub(crate) enum Layer {
  Conv2d {
    name: String,
    weights: Array4<f64>,
    bias: Array1<f64>,
    stride: usize,
    activation: Activation,
  },
  MaxPool2d {
    name: String,
    size: usize,
  },
  GlobalAveragePool {
    name: String,
  },
  Flatten {
    name: String,
  },
  Dense {
    name: String,
    weights: Array2<f64>,
    bias: Array1<f64>,
    activation: Activation,
  },
}

impl Layer {
  pub(crate) fn name(&self) -> &str {
    match self {
      Self::Conv2d { name, .. }
      | Self::MaxPool2d { name, .. }
      | Self::GlobalAveragePool { name }
      | Self::Flatten { name }
      | Self::Dense { name, .. } => name,
    }
  }

  pub(crate) fn is_convolution(&self) -> bool {
    matches!(self, Self::Conv2d { .. })
  }

  fn conv2d<R: Rng>(
    rng: &mut R,
    name: &str,
    filters: usize,
    input_channels: usize,
    kernel_size: usize,
    stride: usize,
  ) -> Self {
    let fan_in = (input_channels * kernel_size * kernel_size) as f64;
    let limit = (6.0 / fan_in).sqrt();

    Self::Conv2d {
      name: name.into(),
      weights: Array4::random_using(
        (filters, input_channels, kernel_size, kernel_size),
        Uniform::new(-limit, limit),
        rng,
      ),
      bias: Array1::zeros(filters),
      stride,
      activation: Activation::Relu,
    }
  }
}

#[derive(Clone, Debug)]
pub(crate) struct NetworkConfig {
  pub(crate) input_shape: (usize, usize, usize),
  pub(crate) layers: Vec<Layer>,
}

impl NetworkConfig {
  /// He-uniform initialized reference topology ending in the saliency target
  /// layer, global average pooling and a softmax classifier.
  pub(crate) fn reference<R: Rng>(rng: &mut R) -> Self {
    let limit = (6.0 / 64.0f64).sqrt();

    Self {
      input_shape: INPUT_SHAPE,
      layers: vec![
        Layer::conv2d(rng, "conv1", 8, 1, 3, 2),
        Layer::MaxPool2d {
          name: "pool1".into(),
          size: 2,
        },
        Layer::conv2d(rng, "conv2", 16, 8, 3, 1),
        Layer::MaxPool2d {
          name: "pool2".into(),
          size: 2,
        },
        Layer::conv2d(rng, "conv3", 32, 16, 3, 1),
        Layer::MaxPool2d {
          name: "pool3".into(),
          size: 2,
        },
        Layer::conv2d(rng, TARGET_LAYER, 64, 32, 3, 1),
        Layer::GlobalAveragePool {
          name: "global_average_pool".into(),
        },
        Layer::Dense {
          name: "predictions".into(),
          weights: Array2::random_using(
            (CLASS_COUNT, 64),
            Uniform::new(-limit, limit),
            rng,
          ),
          bias: Array1::zeros(CLASS_COUNT),
          activation: Activation::Softmax,
        },
      ],
    }
  }
}

impl Default for NetworkConfig {
  fn default() -> Self {
    Self::reference(&mut rand::thread_rng())
  }
}

impl From<NetworkConfig> for SerializableModelConfig {
  fn from(config: NetworkConfig) -> Self {
    Self {
      input_shape: Some(config.input_shape),
      layers: config
        .layers
        .into_iter()
        .map(SerializableLayer::from)
        .collect(),
    }
  }
}

impl From<Layer> for SerializableLayer {
  fn from(layer: Layer) -> Self {
    match layer {
      Layer::Conv2d {
        name,
        weights,
        bias,
        stride,
        activation,
      } => Self::Conv2d {
        name,
        weights_shape: weights.dim(),
        weights: weights.iter().copied().collect(),
        bias: bias.to_vec(),
        stride,
        activation,
      },
      Layer::MaxPool2d { name, size } => Self::MaxPool2d { name, size },
      Layer::GlobalAveragePool { name } => Self::GlobalAveragePool { name },
      Layer::Flatten { name } => Self::Flatten { name },
      Layer::Dense {
        name,
        weights,
        bias,
        activation,
      } => Self::Dense {
        name,
        weights_shape: weights.dim(),
        weights: weights.iter().copied().collect(),
        bias: bias.to_vec(),
        activation,
      },
    }
  }
}

impl TryFrom<SerializableModelConfig> for NetworkConfig {
  type Error = Error;

  fn try_from(config: SerializableModelConfig) -> Result<Self, Error> {
    let input_shape = config
      .input_shape
      .ok_or_else(|| Error::model_invalid("missing input shape"))?;

    Ok(Self {
      input_shape,
      layers: config
        .layers
        .into_iter()
        .map(Layer::try_from)
        .collect::<Result<_, _>>()?,
    })
  }
}

impl TryFrom<SerializableLayer> for Layer {
  type Error = Error;

  fn try_from(layer: SerializableLayer) -> Result<Self, Error> {
    let shape_error = |name: &str, error: ndarray::ShapeError| {
      Error::model_invalid(format!("layer `{name}` has bad weights: {error}"))
    };

    Ok(match layer {
      SerializableLayer::Conv2d {
        name,
        weights,
        weights_shape,
        bias,
        stride,
        activation,
      } => Self::Conv2d {
        weights: Array4::from_shape_vec(weights_shape, weights)
          .map_err(|error| shape_error(&name, error))?,
        bias: Array1::from(bias),
        name,
        stride,
        activation,
      },
      SerializableLayer::MaxPool2d { name, size } => {
        Self::MaxPool2d { name, size }
      }
      SerializableLayer::GlobalAveragePool { name } => {
        Self::GlobalAveragePool { name }
      }
      SerializableLayer::Flatten { name } => Self::Flatten { name },
      SerializableLayer::Dense {
        name,
        weights,
        weights_shape,
        bias,
        activation,
      } => Self::Dense {
        weights: Array2::from_shape_vec(weights_shape, weights)
          .map_err(|error| shape_error(&name, error))?,
        bias: Array1::from(bias),
        name,
        activation,
      },
    })
  }
}
