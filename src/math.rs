use super::*;

/// Index of the largest element, first one wins on ties. NaNs never win.
pub(crate) fn argmax<D>(x: &ArrayView<f64, D>) -> Option<usize>
where
  D: ndarray::Dimension,
{
  x.iter()
    .enumerate()
    .filter(|(_, value)| !value.is_nan())
    .fold(None, |best: Option<(usize, f64)>, (index, &value)| match best {
      Some((_, current)) if current >= value => best,
      _ => Some((index, value)),
    })
    .map(|(index, _)| index)
}

pub(crate) fn relu(x: f64) -> f64 {
  x.max(0.0)
}

pub(crate) fn relu_derivative(x: f64) -> f64 {
  if x > 0.0 {
    1.0
  } else {
    0.0
  }
}

pub(crate) fn softmax(x: ArrayView1<f64>) -> Array1<f64> {
  let max = x.fold(f64::NEG_INFINITY, |a, &b| a.max(b));

  let exp = x.mapv(|value| (value - max).exp());

  let sum = exp.sum();

  exp / sum
}

/// Vector-Jacobian product of softmax: given the softmax output `s` and the
/// upstream gradient `g`, returns `s * (g - <g, s>)`.
pub(crate) fn softmax_backward(
  output: ArrayView1<f64>,
  grad: ArrayView1<f64>,
) -> Array1<f64> {
  let dot = output.dot(&grad);
  &output * &grad.mapv(|g| g - dot)
}

#[cfg(test)]
mod tests {
  use {super::*, approx::assert_relative_eq, ndarray::array};

  #[test]
  fn argmax_works() {
    let arr = array![0.1, 0.3, 0.2, 0.4, 0.1];
    assert_eq!(argmax(&arr.view()), Some(3));
  }

  #[test]
  fn argmax_prefers_first_on_ties() {
    let arr = array![0.5, 0.5, 0.1];
    assert_eq!(argmax(&arr.view()), Some(0));
  }

  #[test]
  fn argmax_of_empty_is_none() {
    let arr = Array1::<f64>::zeros(0);
    assert_eq!(argmax(&arr.view()), None);
  }

  #[test]
  fn relu_works() {
    assert_eq!(relu(1.0), 1.0);
    assert_eq!(relu(-1.0), 0.0);
    assert_eq!(relu(0.0), 0.0);
    assert_eq!(relu_derivative(2.0), 1.0);
    assert_eq!(relu_derivative(0.0), 0.0);
  }

  #[test]
  fn softmax_sums_to_one() {
    let output = softmax(array![1.0, 2.0, 3.0].view());

    assert_relative_eq!(output.sum(), 1.0, epsilon = 1e-12);
    assert_relative_eq!(output[2], 0.6652409557748219, epsilon = 1e-9);
  }

  #[test]
  fn softmax_backward_matches_finite_difference() {
    let logits = array![0.3, -1.2, 0.8];
    let output = softmax(logits.view());

    let grad = softmax_backward(output.view(), array![0.0, 1.0, 0.0].view());

    let h = 1e-6;

    for j in 0..3 {
      let mut shifted = logits.clone();
      shifted[j] += h;
      let numeric = (softmax(shifted.view())[1] - output[1]) / h;
      assert_relative_eq!(grad[j], numeric, epsilon = 1e-5);
    }
  }
}
