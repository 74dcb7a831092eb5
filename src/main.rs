use {
  crate::{
    arguments::Arguments,
    classifier::{validate_input, ClassActivations, Classifier, ModelClassifier},
    config::*,
    error::Error,
    grad_cam::SaliencyGenerator,
    imaging::*,
    integrator::Integrator,
    interface::Interface,
    loader::{ImageLoader, LoadedImage},
    math::*,
    network::Network,
    predictor::{Diagnosis, Label, Predictor},
    preprocess::preprocess,
    record::{Record, RecordLog},
    report::ReportWriter,
    subcommand::Subcommand,
  },
  anyhow::{anyhow, bail, Context},
  clap::Parser,
  dicom_pixeldata::PixelDecoder,
  eframe::{
    egui::{self, ColorImage, TextureHandle, TextureOptions, Vec2, ViewportBuilder},
    HardwareAcceleration, NativeOptions,
  },
  image::{codecs::jpeg::JpegEncoder, imageops, Rgb, RgbImage},
  indicatif::{ProgressBar, ProgressStyle},
  ndarray::{
    s, Array, Array1, Array2, Array3, Array4, ArrayView, ArrayView1,
    ArrayView2, ArrayView3, ArrayView4, Axis,
  },
  ndarray_rand::{rand_distr::Uniform, RandomExt},
  rand::{rngs::StdRng, Rng, SeedableRng},
  rayon::prelude::*,
  serde::{Deserialize, Serialize},
  std::{
    collections::HashSet,
    fmt::{self, Debug, Display, Formatter},
    fs::{self, File, OpenOptions},
    io::{self, BufRead, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
    process,
    time::Duration,
  },
  tracing::{debug, info, warn},
};

mod arguments;
mod classifier;
mod config;
mod error;
mod grad_cam;
mod imaging;
mod integrator;
mod interface;
mod loader;
mod math;
mod network;
mod predictor;
mod preprocess;
mod record;
mod report;
mod subcommand;

type Result<T = (), E = anyhow::Error> = std::result::Result<T, E>;

fn main() {
  if let Err(error) = Arguments::parse().run() {
    eprintln!("error: {error}");
    process::exit(1);
  }
}
