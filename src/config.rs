use serde::{Serialize, Deserialize};
use std::collections::HashMap;
use std::fmt::Display;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

use crate::errors::Result;

pub const PROPERTIES_FILE: &str = "config.properties";
pub const BUILDER_CONFIG_FILE: &str = "config.json";

// shipped with the binary, used when the working directory has no config.properties
const BUNDLED_PROPERTIES: &str = include_str!("../resources/config.properties");

const KEY_DIMENSION: &str = "word2vec.dimension";
const KEY_WINDOW: &str = "word2vec.window";
const KEY_MIN_WORD_FREQUENCY: &str = "word2vec.minWordFrequency";
const KEY_ALGORITHM: &str = "word2vec.algorithm";
const KEY_MODEL_COMPRESSED: &str = "word2vec.modelCompressed";
const KEY_STOP_WORD_FILE: &str = "word2vec.stopWordFile";
const KEY_PREPROCESSOR: &str = "word2vec.preprocessor";


#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Algorithm {
    #[default]
    SkipGram,
    #[serde(rename = "CBOW")]
    Cbow,
}

impl Algorithm {
    /// Anything other than "CBOW" falls back to SkipGram.
    pub fn from_name(name: &str) -> Algorithm {
        match name.trim() {
            "CBOW" => Algorithm::Cbow,
            _ => Algorithm::SkipGram,
        }
    }
}

impl Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Algorithm::SkipGram => write!(f, "SkipGram"),
            Algorithm::Cbow => write!(f, "CBOW"),
        }
    }
}


/// Settings read from `config.properties`. Defaults live in the `Default` impl only.
#[derive(Clone, Debug, PartialEq)]
pub struct Properties {
    pub dimension: usize,
    pub window: usize,
    pub min_word_frequency: u64,
    pub algorithm: Algorithm,
    pub model_compressed: bool,
    pub stop_word_file: Option<PathBuf>,
    pub preprocessor: bool,
}

impl Default for Properties {
    fn default() -> Self {
        Self {
            dimension: 100,
            window: 5,
            min_word_frequency: 5,
            algorithm: Algorithm::SkipGram,
            model_compressed: true,
            stop_word_file: None,
            preprocessor: true,
        }
    }
}

impl Display for Properties {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "using properties:
        dimension: {},
        window: {},
        min_word_frequency: {},
        algorithm: {},
        model_compressed: {},
        stop_word_file: {:?},
        preprocessor: {}",
        self.dimension, self.window, self.min_word_frequency, self.algorithm,
        self.model_compressed, self.stop_word_file, self.preprocessor)
    }
}

impl Properties {

    /// Reads `config.properties` from `work_dir`, falling back to the bundled copy.
    pub fn load(work_dir: &Path) -> Properties {
        Properties::load_with(work_dir, Some(BUNDLED_PROPERTIES))
    }

    pub fn load_with(work_dir: &Path, bundled: Option<&str>) -> Properties {

        let path = work_dir.join(PROPERTIES_FILE);
        if path.is_file() {
            return match fs::read_to_string(&path) {
                Ok(text) => {
                    debug!("reading properties from {}", path.display());
                    Properties::parse(&text)
                },
                Err(e) => {
                    warn!("could not read {}: {}, using defaults", path.display(), e);
                    Properties::default()
                }
            };
        }

        match bundled {
            Some(text) => {
                debug!("reading bundled properties");
                Properties::parse(text)
            },
            None => {
                warn!("Sorry, unable to find {} in working directory or bundle", PROPERTIES_FILE);
                Properties::default()
            }
        }
    }

    pub fn parse(text: &str) -> Properties {
        Properties::from_map(&parse_properties(text))
    }

    fn from_map(map: &HashMap<String, String>) -> Properties {

        let defaults = Properties::default();

        let algorithm = match map.get(KEY_ALGORITHM) {
            Some(name) => Algorithm::from_name(name),
            None => defaults.algorithm
        };
        let stop_word_file = match map.get(KEY_STOP_WORD_FILE) {
            Some(path) if !path.is_empty() => Some(PathBuf::from(path)),
            _ => None
        };

        Properties {
            dimension: parse_or_default(map, KEY_DIMENSION, defaults.dimension),
            window: parse_or_default(map, KEY_WINDOW, defaults.window),
            min_word_frequency: parse_or_default(map, KEY_MIN_WORD_FREQUENCY, defaults.min_word_frequency),
            algorithm,
            model_compressed: flag_or_default(map, KEY_MODEL_COMPRESSED, defaults.model_compressed),
            stop_word_file,
            preprocessor: flag_or_default(map, KEY_PREPROCESSOR, defaults.preprocessor),
        }
    }

    /// Builder configuration made from the discrete properties.
    pub fn to_vectors_configuration(&self) -> VectorsConfiguration {
        VectorsConfiguration {
            layers_size: self.dimension,
            window: self.window,
            min_word_frequency: self.min_word_frequency,
            elements_learning_algorithm: self.algorithm,
            ..VectorsConfiguration::default()
        }
    }
}

fn parse_or_default<T: FromStr + Display + Copy>(map: &HashMap<String, String>, key: &str, default: T) -> T {
    match map.get(key) {
        Some(value) => match value.parse::<T>() {
            Ok(parsed) => parsed,
            Err(_) => {
                warn!("given {} '{}' is not numeric, using {}", key, value, default);
                default
            }
        },
        None => default
    }
}

// java's Boolean semantics: only "true" (any case) is true
fn flag_or_default(map: &HashMap<String, String>, key: &str, default: bool) -> bool {
    match map.get(key) {
        Some(value) => value.eq_ignore_ascii_case("true"),
        None => default
    }
}

/// Parses a java-style properties document. Supports `=`, `:` or whitespace separators
/// and `#` / `!` comment lines; later keys win.
pub fn parse_properties(text: &str) -> HashMap<String, String> {

    let mut map = HashMap::new();
    for line in text.lines() {

        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }

        let split_at = line.find(|c: char| c == '=' || c == ':' || c.is_whitespace());
        let (key, value) = match split_at {
            Some(i) => {
                let rest = line[i..].trim_start();
                let rest = rest.strip_prefix(|c: char| c == '=' || c == ':').unwrap_or(rest);
                (&line[..i], rest.trim())
            },
            None => (line, "")
        };
        map.insert(key.to_string(), value.to_string());
    }
    map
}


/// Full model configuration, persisted as `config.json` next to the weights.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VectorsConfiguration {
    pub layers_size: usize,
    pub window: usize,
    pub min_word_frequency: u64,
    pub learning_rate: f32,
    pub min_learning_rate: f32,
    pub negative: usize,
    pub use_hierarchic_softmax: bool,
    pub sampling: f64,
    pub epochs: usize,
    pub iterations: usize,
    pub seed: u64,
    pub elements_learning_algorithm: Algorithm,
    pub stop_list: Vec<String>,
}

impl Default for VectorsConfiguration {
    fn default() -> Self {
        Self {
            layers_size: 100,
            window: 5,
            min_word_frequency: 5,
            learning_rate: 0.025,
            min_learning_rate: 1e-4,
            negative: 0,
            use_hierarchic_softmax: true,
            sampling: 0.0,
            epochs: 1,
            iterations: 1,
            seed: 42,
            elements_learning_algorithm: Algorithm::SkipGram,
            stop_list: Vec::new(),
        }
    }
}

impl Display for VectorsConfiguration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "training hyper parameters:
        layers_size: {},
        window: {},
        min_word_frequency: {},
        learning_rate: {},
        min_learning_rate: {},
        negative: {},
        use_hierarchic_softmax: {},
        sampling: {},
        epochs: {},
        iterations: {},
        seed: {},
        algorithm: {}",
        self.layers_size, self.window, self.min_word_frequency, self.learning_rate, self.min_learning_rate,
        self.negative, self.use_hierarchic_softmax, self.sampling, self.epochs, self.iterations, self.seed,
        self.elements_learning_algorithm)
    }
}

impl VectorsConfiguration {

    pub fn from_json(json: &str) -> Result<VectorsConfiguration> {
        Ok(serde_json::from_str(json.trim())?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Reads `config.json` from `work_dir` if one exists.
    pub fn from_work_dir(work_dir: &Path) -> Result<Option<VectorsConfiguration>> {
        let path = work_dir.join(BUILDER_CONFIG_FILE);
        if !path.exists() {
            return Ok(None)
        }
        let text = fs::read_to_string(path)?;
        Ok(Some(VectorsConfiguration::from_json(&text)?))
    }
}


/// Reads a stop word file: every line is a comma separated list, spaces are dropped.
pub fn read_stop_words(path: &Path) -> Result<Vec<String>> {

    let f = BufReader::new(File::open(path)?);
    let mut stop_words = Vec::new();
    for line in f.lines() {
        let line = line?.replace(' ', "");
        stop_words.extend(line.split(',').filter(|w| !w.is_empty()).map(|w| w.to_string()));
    }
    Ok(stop_words)
}
