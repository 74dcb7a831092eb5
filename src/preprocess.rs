use super::*;

const CLIP_LIMIT: f64 = 2.0;

const TILE_GRID: (usize, usize) = (4, 4);

const BINS: usize = 256;

/// Turns a BGR image of any size into the (1, 512, 512, 1) model input:
/// resize, grayscale, contrast-limited adaptive histogram equalization, then
/// scaling to [0, 1].
pub(crate) fn preprocess(image: ArrayView3<u8>) -> Result<Array4<f64>, Error> {
  let (h, w, channels) = image.dim();

  if h == 0 || w == 0 || channels != 3 {
    return Err(Error::invalid_argument(format!(
      "expected a non-empty 3-channel image, got shape {:?}",
      image.dim()
    )));
  }

  let resized = resize_image(image, (INPUT_SIZE, INPUT_SIZE));

  let equalized = clahe(bgr_to_gray(resized.view()).view(), CLIP_LIMIT, TILE_GRID);

  Ok(
    equalized
      .mapv(|value| f64::from(value) / 255.0)
      .insert_axis(Axis(2))
      .insert_axis(Axis(0)),
  )
}

/// Contrast-limited adaptive histogram equalization. Each tile of the grid
/// gets its own clipped, redistributed histogram lookup table; pixels blend
/// the tables of the four nearest tile centers.
pub(crate) fn clahe(
  image: ArrayView2<u8>,
  clip_limit: f64,
  (tiles_y, tiles_x): (usize, usize),
) -> Array2<u8> {
  let (h, w) = image.dim();

  if h == 0 || w == 0 {
    return image.to_owned();
  }

  let tiles_y = tiles_y.clamp(1, h);
  let tiles_x = tiles_x.clamp(1, w);

  let tile_h = h.div_ceil(tiles_y);
  let tile_w = w.div_ceil(tiles_x);

  let mut luts = Array3::<u8>::zeros((tiles_y, tiles_x, BINS));

  for ty in 0..tiles_y {
    for tx in 0..tiles_x {
      let tile = image.slice(s![
        (ty * tile_h).min(h)..((ty + 1) * tile_h).min(h),
        (tx * tile_w).min(w)..((tx + 1) * tile_w).min(w)
      ]);

      luts
        .slice_mut(s![ty, tx, ..])
        .assign(&tile_lut(tile, clip_limit));
    }
  }

  let ys = tile_neighbors(h, tile_h, tiles_y);
  let xs = tile_neighbors(w, tile_w, tiles_x);

  Array2::from_shape_fn((h, w), |(y, x)| {
    let value = usize::from(image[[y, x]]);

    let (ty0, ty1, fy) = ys[y];
    let (tx0, tx1, fx) = xs[x];

    let lut = |ty: usize, tx: usize| f64::from(luts[[ty, tx, value]]);

    let top = lut(ty0, tx0) * (1.0 - fx) + lut(ty0, tx1) * fx;
    let bottom = lut(ty1, tx0) * (1.0 - fx) + lut(ty1, tx1) * fx;

    to_u8(top * (1.0 - fy) + bottom * fy)
  })
}

fn tile_lut(tile: ArrayView2<u8>, clip_limit: f64) -> Array1<u8> {
  let area = tile.len();

  let mut histogram = [0usize; BINS];

  for &value in tile.iter() {
    histogram[usize::from(value)] += 1;
  }

  if area == 0 {
    return Array1::zeros(BINS);
  }

  if clip_limit > 0.0 {
    let limit = ((clip_limit * area as f64 / BINS as f64) as usize).max(1);

    let mut clipped = 0;

    for count in histogram.iter_mut() {
      if *count > limit {
        clipped += *count - limit;
        *count = limit;
      }
    }

    let batch = clipped / BINS;
    let mut residual = clipped - batch * BINS;

    for count in histogram.iter_mut() {
      *count += batch;
    }

    if residual > 0 {
      let step = (BINS / residual).max(1);

      for index in (0..BINS).step_by(step) {
        if residual == 0 {
          break;
        }

        histogram[index] += 1;
        residual -= 1;
      }
    }
  }

  let scale = 255.0 / area as f64;

  let mut sum = 0;

  histogram
    .iter()
    .map(|count| {
      sum += count;
      to_u8(sum as f64 * scale)
    })
    .collect()
}

/// For each coordinate along one axis, the two neighboring tile indices and
/// the blend weight of the second.
fn tile_neighbors(
  length: usize,
  tile: usize,
  tiles: usize,
) -> Vec<(usize, usize, f64)> {
  (0..length)
    .map(|i| {
      let position = i as f64 / tile as f64 - 0.5;
      let lower = position.floor();
      let weight = position - lower;

      let first = lower.max(0.0) as usize;
      let second = ((lower + 1.0).max(0.0) as usize).min(tiles - 1);

      (first.min(tiles - 1), second, weight)
    })
    .collect()
}
