use super::*;

#[derive(Debug, Parser)]
pub(crate) struct Init {
  #[clap(short, long, default_value = "models/model.json")]
  output: PathBuf,
  #[clap(short, long, help = "Overwrite an existing model")]
  force: bool,
  #[clap(long, help = "Seed for reproducible weights")]
  seed: Option<u64>,
}

impl Init {
  pub(crate) fn run(self) -> Result {
    if self.output.exists() && !self.force {
      bail!(
        "`{}` already exists, pass --force to overwrite it",
        self.output.display()
      );
    }

    if let Some(parent) = self.output.parent() {
      fs::create_dir_all(parent)?;
    }

    let config = match self.seed {
      Some(seed) => NetworkConfig::reference(&mut StdRng::seed_from_u64(seed)),
      None => NetworkConfig::default(),
    };

    let network = Network::new(config)?;

    network
      .save(&self.output)
      .with_context(|| format!("failed to write `{}`", self.output.display()))?;

    println!("Wrote model to {}", self.output.display());

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use {super::*, tempdir::TempDir};

  #[test]
  fn writes_loadable_model() {
    let dir = TempDir::new("test").unwrap();

    let output = dir.path().join("models/model.json");

    Init {
      output: output.clone(),
      force: false,
      seed: None,
    }
    .run()
    .unwrap();

    let classifier = ModelClassifier::load(&output, TARGET_LAYER).unwrap();

    assert_eq!(classifier.class_count(), CLASS_COUNT);
  }

  #[test]
  fn refuses_to_overwrite_without_force() {
    let dir = TempDir::new("test").unwrap();

    let output = dir.path().join("model.json");

    fs::write(&output, "{}").unwrap();

    assert!(Init {
      output: output.clone(),
      force: false,
      seed: None,
    }
    .run()
    .is_err());

    assert_eq!(fs::read_to_string(&output).unwrap(), "{}");
  }

  #[test]
  fn same_seed_writes_same_model() {
    let dir = TempDir::new("test").unwrap();

    let write = |name: &str| {
      let output = dir.path().join(name);

      Init {
        output: output.clone(),
        force: false,
        seed: Some(42),
      }
      .run()
      .unwrap();

      let contents = fs::read_to_string(output).unwrap();
      contents
    };

    assert_eq!(write("a.json"), write("b.json"));
  }
}
