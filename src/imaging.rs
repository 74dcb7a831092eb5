use super::*;

/// Bilinear resize with pixel-center alignment, edges replicated. Samples
/// the same two source pixels per axis as OpenCV's `INTER_LINEAR`, also when
/// downscaling.
pub(crate) fn resize_plane(
  plane: ArrayView2<f64>,
  (height, width): (usize, usize),
) -> Array2<f64> {
  let (h, w) = plane.dim();

  if (h, w) == (height, width) {
    return plane.to_owned();
  }

  let ys = sample_positions(h, height);
  let xs = sample_positions(w, width);

  Array2::from_shape_fn((height, width), |(y, x)| {
    let (y0, y1, fy) = ys[y];
    let (x0, x1, fx) = xs[x];

    let top = plane[[y0, x0]] * (1.0 - fx) + plane[[y0, x1]] * fx;
    let bottom = plane[[y1, x0]] * (1.0 - fx) + plane[[y1, x1]] * fx;

    top * (1.0 - fy) + bottom * fy
  })
}

fn sample_positions(input: usize, output: usize) -> Vec<(usize, usize, f64)> {
  let scale = input as f64 / output as f64;

  (0..output)
    .map(|i| {
      let source = ((i as f64 + 0.5) * scale - 0.5).max(0.0);
      let lower = (source.floor() as usize).min(input - 1);
      let upper = (lower + 1).min(input - 1);
      (lower, upper, source - lower as f64)
    })
    .collect()
}

/// Resizes an 8-bit multi-channel image channel by channel.
pub(crate) fn resize_image(
  image: ArrayView3<u8>,
  size: (usize, usize),
) -> Array3<u8> {
  let channels = image.dim().2;

  let mut output = Array3::zeros((size.0, size.1, channels));

  for channel in 0..channels {
    let plane = image.index_axis(Axis(2), channel).mapv(f64::from);

    output
      .index_axis_mut(Axis(2), channel)
      .assign(&resize_plane(plane.view(), size).mapv(to_u8));
  }

  output
}

pub(crate) fn to_u8(value: f64) -> u8 {
  value.round().clamp(0.0, 255.0) as u8
}

/// Luma of a BGR image using ITU-R BT.601 weights.
pub(crate) fn bgr_to_gray(image: ArrayView3<u8>) -> Array2<u8> {
  image.map_axis(Axis(2), |pixel| {
    to_u8(
      0.114 * f64::from(pixel[0])
        + 0.587 * f64::from(pixel[1])
        + 0.299 * f64::from(pixel[2]),
    )
  })
}

/// Linearly stretches samples so the smallest maps to 0 and the largest to
/// 255. A constant image maps to 255, or to 0 when it is not positive.
pub(crate) fn stretch_to_u8<D>(samples: ArrayView<f64, D>) -> Array<u8, D>
where
  D: ndarray::Dimension,
{
  let (min, max) = samples
    .iter()
    .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &value| {
      (lo.min(value), hi.max(value))
    });

  let range = max - min;

  samples.mapv(|value| {
    if range > 0.0 {
      to_u8((value - min) / range * 255.0)
    } else if max > 0.0 {
      255
    } else {
      0
    }
  })
}

/// Jet colormap entry for an 8-bit intensity, returned in BGR order:
/// dark blue at 0, through cyan, green and yellow, to dark red at 255.
pub(crate) fn jet(value: u8) -> [u8; 3] {
  let x = f64::from(value) / 255.0;

  let channel = |center: f64| {
    to_u8((1.5 - (4.0 * x - center).abs()).clamp(0.0, 1.0) * 255.0)
  };

  [channel(1.0), channel(2.0), channel(3.0)]
}

/// Reverses the channel order of a 3-channel image (BGR <-> RGB).
pub(crate) fn swap_channels(image: ArrayView3<u8>) -> Array3<u8> {
  image.slice(s![.., .., ..;-1]).to_owned()
}

pub(crate) fn rgb_array_to_image(image: ArrayView3<u8>) -> RgbImage {
  let (h, w, _) = image.dim();

  RgbImage::from_fn(w as u32, h as u32, |x, y| {
    let (x, y) = (x as usize, y as usize);
    Rgb([image[[y, x, 0]], image[[y, x, 1]], image[[y, x, 2]]])
  })
}

pub(crate) fn bgr_array_to_image(image: ArrayView3<u8>) -> RgbImage {
  rgb_array_to_image(swap_channels(image).view())
}

pub(crate) fn rgb_image_to_bgr(image: &RgbImage) -> Array3<u8> {
  let (w, h) = image.dimensions();

  Array3::from_shape_fn((h as usize, w as usize, 3), |(y, x, c)| {
    image.get_pixel(x as u32, y as u32)[2 - c]
  })
}
