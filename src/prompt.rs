//! Interactive console prompts.
//!
//! Each prompt only runs for values the configuration left unset. Prompts read
//! whole lines, so they work the same on a terminal and on piped input.

use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};

use crate::config::{BenchConfig, InputMode, DEFAULT_INPUT_FOLDER};
use crate::device::Device;
use crate::models::{discover_models, MODEL_EXTENSION};
use crate::{InputShape, DEFAULT_INPUT_SIZE};

pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Print `question` and read one answer line. End of input reads as empty.
    fn ask(&mut self, question: &str) -> Result<String> {
        write!(self.output, "{question}")?;
        self.output.flush()?;
        let mut line = String::new();
        self.input
            .read_line(&mut line)
            .context("failed to read answer from console")?;
        Ok(line.trim().to_string())
    }

    pub fn input_mode(&mut self) -> Result<InputMode> {
        let answer = self.ask(&format!(
            "Enter input image folder directory (default '{}' or press enter to use camera): ",
            DEFAULT_INPUT_FOLDER
        ))?;
        Ok(InputMode::parse(&answer))
    }

    /// Pick one of `models`. A single model is chosen without asking.
    ///
    /// Indices past the end select the last model.
    pub fn choose_model(&mut self, models: &[PathBuf]) -> Result<PathBuf> {
        match models {
            [] => Err(anyhow!(
                "can not find any model (.{}) please put it in the model folder",
                MODEL_EXTENSION
            )),
            [only] => Ok(only.clone()),
            _ => {
                writeln!(self.output, "Find model: ")?;
                for (i, model) in models.iter().enumerate() {
                    writeln!(self.output, "({}): {}", i, model.display())?;
                }
                let answer = self.ask("Choose model: ")?;
                let index: usize = answer
                    .parse()
                    .map_err(|_| anyhow!("model choice must be a number, got '{}'", answer))?;
                writeln!(self.output)?;
                Ok(models[index.min(models.len() - 1)].clone())
            }
        }
    }

    /// Ask for one model input dimension. Empty selects the default.
    pub fn dimension(&mut self, label: &str) -> Result<u32> {
        let answer = self.ask(&format!(
            "Input model {:<6} [default {}]: ",
            label, DEFAULT_INPUT_SIZE
        ))?;
        if answer.is_empty() {
            return Ok(DEFAULT_INPUT_SIZE);
        }
        answer
            .parse()
            .map_err(|_| anyhow!("model {} must be a positive number, got '{}'", label, answer))
    }

    /// Ask for the device. Anything but 1 or 2 selects the CPU.
    pub fn device(&mut self) -> Result<Device> {
        let answer = self.ask("\nUse CPU (0) or GPU (1) VPU (2) to inference: ")?;
        writeln!(self.output)?;
        Ok(answer
            .parse::<i64>()
            .map(Device::from_index)
            .unwrap_or(Device::Cpu))
    }

    /// Fill every unset field of `config`: input, model, width, height, device.
    pub fn complete(&mut self, config: &mut BenchConfig) -> Result<()> {
        if config.input.is_none() {
            config.input = Some(self.input_mode()?);
        }
        if config.model_path.is_none() {
            let models = discover_models(&config.model_root);
            let model = self.choose_model(&models)?;
            config.model_path = Some(model.to_string_lossy().into_owned());
        }
        if config.width.is_none() {
            config.width = Some(self.dimension("width")?);
        }
        if config.height.is_none() {
            config.height = Some(self.dimension("height")?);
        }
        if config.device.is_none() {
            config.device = Some(self.device()?);
        }
        Ok(())
    }
}

/// Fill unset fields without asking: image folder `../input`, the only model
/// found, 256x256, CPU.
pub fn complete_with_defaults(config: &mut BenchConfig) -> Result<()> {
    if config.input.is_none() {
        config.input = Some(InputMode::Folder(PathBuf::from(DEFAULT_INPUT_FOLDER)));
    }
    if config.model_path.is_none() {
        let models = discover_models(&config.model_root);
        let model = match models.as_slice() {
            [only] => only.clone(),
            [] => {
                return Err(anyhow!(
                    "no .{} model found under {}",
                    MODEL_EXTENSION,
                    config.model_root.display()
                ))
            }
            _ => {
                return Err(anyhow!(
                    "{} models found under {}; pass --model to choose one",
                    models.len(),
                    config.model_root.display()
                ))
            }
        };
        config.model_path = Some(model.to_string_lossy().into_owned());
    }
    config.width.get_or_insert(DEFAULT_INPUT_SIZE);
    config.height.get_or_insert(DEFAULT_INPUT_SIZE);
    config.device.get_or_insert(Device::Cpu);
    Ok(())
}

/// Print the configuration summary shown before the run starts.
pub fn print_config<W: Write>(
    mut out: W,
    config: &BenchConfig,
    shape: &InputShape,
) -> Result<()> {
    writeln!(out, "\nConfiguration: ")?;
    if let Some(model) = &config.model_path {
        writeln!(out, "Model: {}", model)?;
    }
    if let Some(device) = config.device {
        writeln!(out, "Device: {}", device)?;
    }
    match &config.input {
        Some(InputMode::Folder(folder)) => writeln!(out, "Input: {}", folder.display())?,
        Some(InputMode::Camera) | None => writeln!(out, "Input: camera {}", config.camera.device)?,
    }
    writeln!(out, "Model Input Shape: {}", shape)?;
    writeln!(out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn prompter(answers: &str) -> Prompter<Cursor<Vec<u8>>, Vec<u8>> {
        Prompter::new(Cursor::new(answers.as_bytes().to_vec()), Vec::new())
    }

    #[test]
    fn empty_folder_answer_selects_camera() -> Result<()> {
        let mut p = prompter("\n");
        assert_eq!(p.input_mode()?, InputMode::Camera);
        let mut p = prompter("./photos\n");
        assert_eq!(p.input_mode()?, InputMode::Folder(PathBuf::from("./photos")));
        Ok(())
    }

    #[test]
    fn model_choice_lists_and_clamps() -> Result<()> {
        let models = vec![PathBuf::from("a.onnx"), PathBuf::from("b.onnx")];

        let mut p = prompter("1\n");
        assert_eq!(p.choose_model(&models)?, PathBuf::from("b.onnx"));
        let shown = String::from_utf8(p.output.clone()).unwrap();
        assert!(shown.contains("(0): a.onnx"));
        assert!(shown.contains("(1): b.onnx"));

        let mut p = prompter("9\n");
        assert_eq!(p.choose_model(&models)?, PathBuf::from("b.onnx"));

        let mut p = prompter("first\n");
        assert!(p.choose_model(&models).is_err());

        let mut p = prompter("");
        assert_eq!(p.choose_model(&models[..1])?, PathBuf::from("a.onnx"));
        assert!(p.choose_model(&[]).is_err());
        Ok(())
    }

    #[test]
    fn dimensions_default_and_parse() -> Result<()> {
        let mut p = prompter("\n384\nwide\n");
        assert_eq!(p.dimension("width")?, 256);
        assert_eq!(p.dimension("height")?, 384);
        assert!(p.dimension("width").is_err());
        let shown = String::from_utf8(p.output).unwrap();
        assert!(shown.contains("Input model width  [default 256]: "));
        assert!(shown.contains("Input model height [default 256]: "));
        Ok(())
    }

    #[test]
    fn device_answers_map_to_devices() -> Result<()> {
        let mut p = prompter("1\n2\n\nx\n");
        assert_eq!(p.device()?, Device::Gpu);
        assert_eq!(p.device()?, Device::Vpu);
        assert_eq!(p.device()?, Device::Cpu);
        assert_eq!(p.device()?, Device::Cpu);
        Ok(())
    }

    #[test]
    fn complete_asks_only_for_missing_values() -> Result<()> {
        let mut config = BenchConfig {
            model_path: Some("stub://depth".to_string()),
            device: Some(Device::Gpu),
            ..BenchConfig::default()
        };
        let mut p = prompter("\n300\n\n");
        p.complete(&mut config)?;

        assert_eq!(config.input, Some(InputMode::Camera));
        assert_eq!(config.width, Some(300));
        assert_eq!(config.height, Some(256));
        assert_eq!(config.device, Some(Device::Gpu));
        assert_eq!(config.shape()?.width, 288);
        Ok(())
    }

    #[test]
    fn defaults_require_a_single_model() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut config = BenchConfig {
            model_root: dir.path().to_path_buf(),
            ..BenchConfig::default()
        };
        assert!(complete_with_defaults(&mut config).is_err());

        std::fs::write(dir.path().join("midas.onnx"), b"")?;
        complete_with_defaults(&mut config)?;
        assert!(config.model_path.unwrap().ends_with("midas.onnx"));
        assert_eq!(config.device, Some(Device::Cpu));
        assert_eq!(
            config.input,
            Some(InputMode::Folder(PathBuf::from("../input")))
        );
        Ok(())
    }

    #[test]
    fn config_summary_shows_shape() -> Result<()> {
        let config = BenchConfig::default();
        let mut out = Vec::new();
        print_config(&mut out, &config, &InputShape::aligned(256, 192)?)?;
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Model Input Shape: ( 1 x 3 x 192 x 256 )"));
        Ok(())
    }
}
